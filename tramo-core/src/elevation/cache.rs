//! Persistent cache of computed elevation profiles.
//!
//! Profiles are keyed by the Google-polyline encoding of the edge geometry
//! (1e-5 degree precision) so the cache survives graph rebuilds that keep the
//! same street geometry. The on-disk format is a bincode payload behind a
//! version prefix; unknown versions are rejected instead of misread.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use geo::LineString;

use crate::Error;
use crate::model::ElevationProfile;

/// File name used inside the configured cache directory.
pub const CACHE_FILE_NAME: &str = "cached_elevations.bin";

const CACHE_FORMAT_VERSION: u32 = 1;

/// Google-polyline key for an edge geometry, at 1e-5 degree precision.
pub(crate) fn encoded_polyline(geometry: &LineString<f64>) -> Result<String, Error> {
    polyline::encode_coordinates(geometry.coords().copied(), 5)
        .map_err(|e| Error::InvalidData(format!("polyline encoding failed: {e}")))
}

/// In-memory mapping from encoded polylines to elevation profiles.
///
/// Read-only after load; the pipeline reads it from many workers at once.
#[derive(Debug, Default)]
pub struct ElevationCache {
    profiles: HashMap<String, ElevationProfile>,
}

impl ElevationCache {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let version: u32 = bincode::deserialize_from(&mut reader)
            .map_err(|e| Error::CacheError(format!("unreadable elevation cache header: {e}")))?;
        if version != CACHE_FORMAT_VERSION {
            return Err(Error::CacheError(format!(
                "unsupported elevation cache version {version} (expected {CACHE_FORMAT_VERSION})"
            )));
        }

        let profiles = bincode::deserialize_from(&mut reader)
            .map_err(|e| Error::CacheError(format!("corrupt elevation cache: {e}")))?;
        Ok(Self { profiles })
    }

    pub fn get(&self, encoded_polyline: &str) -> Option<&ElevationProfile> {
        self.profiles.get(encoded_polyline)
    }

    pub fn insert(&mut self, encoded_polyline: String, profile: ElevationProfile) {
        self.profiles.insert(encoded_polyline, profile);
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Write the cache next to `path` and rename it into place, so readers
    /// never observe a half-written file.
    pub fn write_atomic(&self, path: &Path) -> Result<(), Error> {
        let tmp_path = path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, &CACHE_FORMAT_VERSION)
                .and_then(|()| bincode::serialize_into(&mut writer, &self.profiles))
                .map_err(|e| Error::CacheError(format!("failed to encode elevation cache: {e}")))?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
