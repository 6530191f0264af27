//! The elevation build: parallel per-edge sampling, cache handling, and the
//! repair pass.
//!
//! The per-edge fan-out runs on a rayon pool sized to the machine. Each
//! worker owns a lazily-built coverage instance (the factory's constructor is
//! not reentrant, so construction is serialized), samples edges against it,
//! and hands the computed profiles back to the driver. Profiles are applied
//! serially after the pool drains, so the graph and the issue store only ever
//! see one writer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use geo::Coord;
use hashbrown::HashMap;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::cache::{self, CACHE_FILE_NAME, ElevationCache};
use super::coverage::{Coverage, CoverageFactory};
use super::repair;
use super::sampler::{self, SampleCounters, SamplerSettings};
use crate::issues::{DataImportIssue, IssueStore};
use crate::model::{ElevationProfile, StreetGraph};
use crate::{DEFAULT_DISTANCE_BETWEEN_SAMPLES_M, EdgeId, Error, VertexId};

/// Hard ceiling on the parallel sampling phase.
const BUILD_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

/// Progress is reported every this many processed edges.
const PROGRESS_LOG_INTERVAL: usize = 50_000;

/// Configuration of the elevation build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevationConfig {
    /// Spacing between elevation samples along an edge, in meters.
    pub distance_between_samples_m: f64,
    /// Unit conversion multiplier for elevation values. No conversion is
    /// needed when the source data is already in meters; for decimeter data
    /// set 0.1.
    pub elevation_unit_multiplier: f64,
    /// Correct raw elevations by the ellipsoid-to-geoid difference.
    pub include_ellipsoid_to_geoid_difference: bool,
    /// Attempt to read a cache of previously computed profiles.
    pub read_cached_elevations: bool,
    /// Write the computed profiles back out for subsequent builds.
    pub write_cached_elevations: bool,
    /// Directory holding the cache file.
    pub cache_directory: Option<PathBuf>,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            distance_between_samples_m: DEFAULT_DISTANCE_BETWEEN_SAMPLES_M,
            elevation_unit_multiplier: 1.0,
            include_ellipsoid_to_geoid_difference: true,
            read_cached_elevations: false,
            write_cached_elevations: false,
            cache_directory: None,
        }
    }
}

/// Counters accumulated over one build.
#[derive(Debug, Default, Clone)]
pub struct ElevationStats {
    /// Street-with-elevation edges found in the graph.
    pub elevation_edge_count: usize,
    /// Edges handled by the fan-out (including cache hits and skips).
    pub edges_processed: usize,
    pub points_evaluated: usize,
    pub points_outside_coverage: usize,
    /// Edges that ended the build with a sampled, non-flattened profile.
    pub edges_with_calculated_elevations: usize,
}

/// Graph-build module that applies elevation data to street edges.
pub struct ElevationModule<'a, F: CoverageFactory> {
    factory: &'a F,
    config: ElevationConfig,
}

impl<'a, F: CoverageFactory> ElevationModule<'a, F> {
    pub fn new(factory: &'a F, config: ElevationConfig) -> Self {
        Self { factory, config }
    }

    pub fn with_defaults(factory: &'a F) -> Self {
        Self::new(factory, ElevationConfig::default())
    }

    pub fn provides(&self) -> Vec<&'static str> {
        vec!["elevation"]
    }

    pub fn prerequisites(&self) -> Vec<&'static str> {
        vec!["streets"]
    }

    /// Validate factory inputs and report on cache availability.
    pub fn check_inputs(&self) -> Result<(), Error> {
        self.factory.check_inputs()?;

        if self.config.read_cached_elevations {
            match self.cache_file_path() {
                Some(path) if path.exists() => info!("Cached elevations file found!"),
                _ => warn!(
                    "No cached elevations file found or read access not allowed! Unable to load \
                     in cached elevations. This could take a while..."
                ),
            }
        } else {
            warn!("Not using cached elevations! This could take a while...");
        }
        Ok(())
    }

    /// Run the elevation build over the graph.
    ///
    /// `known_elevations` carries per-vertex overrides from the source data
    /// (e.g. surveyed spot heights); they act as additional repair anchors.
    ///
    /// # Errors
    ///
    /// Only exceeding the 24-hour build deadline is fatal. Everything else -
    /// unreadable caches, failed samples, isolated regions - degrades into
    /// issues and partial results.
    pub fn build(
        &self,
        graph: &mut StreetGraph,
        known_elevations: Option<&HashMap<VertexId, f64>>,
        issue_store: &IssueStore,
    ) -> Result<ElevationStats, Error> {
        // announced ahead of sampling: slope calculation downstream needs it
        graph.set_distance_between_elevation_samples(self.config.distance_between_samples_m);

        let cache = self.load_cache(issue_store);

        info!("Setting street elevation profiles from digital elevation model...");

        let elevation_edges = graph.elevation_edge_ids();
        let total_elevation_edges = elevation_edges.len();

        let settings = SamplerSettings {
            distance_between_samples_m: self.config.distance_between_samples_m,
            elevation_unit_multiplier: self.config.elevation_unit_multiplier,
            include_ellipsoid_to_geoid_difference: self.config.include_ellipsoid_to_geoid_difference,
        };
        let counters = SampleCounters::default();
        let n_edges_processed = AtomicUsize::new(0);
        let construction_lock = Mutex::new(());
        let deadline = Instant::now() + BUILD_DEADLINE;

        let graph_view: &StreetGraph = graph;
        let factory = self.factory;

        let results: Vec<Option<(EdgeId, ElevationProfile)>> = elevation_edges
            .par_iter()
            .map_init(
                || WorkerCoverage::new(factory, &construction_lock),
                |worker, &edge_id| {
                    let result = process_edge(
                        graph_view, edge_id, worker, &cache, &settings, &counters, deadline,
                    );
                    let processed = n_edges_processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if processed % PROGRESS_LOG_INTERVAL == 0 {
                        info!("set elevation on {processed}/{total_elevation_edges} edges");
                    }
                    result
                },
            )
            .collect();

        if Instant::now() > deadline {
            error!("Multi-threaded elevation calculations timed-out!");
            return Err(Error::BuildDeadlineExceeded(BUILD_DEADLINE));
        }

        // apply profiles serially now that the pool has drained
        for (edge_id, profile) in results.into_iter().flatten() {
            if let Some(edge) = graph.graph.edge_weight_mut(edge_id) {
                if edge.set_elevation_profile(profile, false) {
                    issue_store.add(DataImportIssue::ElevationFlattened {
                        edge: edge_id.index(),
                    });
                }
            }
        }

        let points_evaluated = counters.points_evaluated.load(Ordering::Relaxed);
        let points_outside = counters.points_outside_coverage.load(Ordering::Relaxed);
        if points_outside > 0 {
            let failure_percentage = if points_evaluated > 0 {
                points_outside as f64 / points_evaluated as f64 * 100.0
            } else {
                100.0
            };
            if failure_percentage > 50.0 {
                issue_store.add(DataImportIssue::Graphwide {
                    message: format!(
                        "Fetching elevation failed at {points_outside}/{points_evaluated} points \
                         ({failure_percentage:.0}%)"
                    ),
                });
                warn!(
                    "Elevation is missing at a large number of points. DEM may be for the wrong \
                     region. If it is unprojected, perhaps the axes are not in (longitude, \
                     latitude) order."
                );
            }
        }

        // collected after the pool instead of inside it, so no shared list
        // needs locking
        let edges_with_calculated_elevations: Vec<EdgeId> = elevation_edges
            .iter()
            .copied()
            .filter(|&id| {
                graph
                    .edge(id)
                    .is_some_and(|e| e.has_packed_elevation_profile() && !e.is_elevation_flattened())
            })
            .collect();

        repair::assign_missing_elevations(
            graph,
            &edges_with_calculated_elevations,
            known_elevations,
            issue_store,
        );

        if self.config.write_cached_elevations {
            self.write_cache(graph, &edges_with_calculated_elevations, issue_store);
        }

        // Sampling allocates heavily and glibc does not always hand freed
        // memory back to the system; release the tail of the heap here.
        //
        // # Safety
        //
        // Safe on linux with the glibc implementation, which the cfg
        // attribute checks at compile time.
        #[cfg(all(target_os = "linux", target_env = "gnu"))]
        unsafe {
            if libc::malloc_trim(0) == 0 {
                warn!("Memory trimming failed - continuing anyway");
            } else {
                debug!("Successfully trimmed unused heap memory");
            }
        }

        Ok(ElevationStats {
            elevation_edge_count: total_elevation_edges,
            edges_processed: n_edges_processed.load(Ordering::Relaxed),
            points_evaluated,
            points_outside_coverage: points_outside,
            edges_with_calculated_elevations: edges_with_calculated_elevations.len(),
        })
    }

    fn cache_file_path(&self) -> Option<PathBuf> {
        self.config
            .cache_directory
            .as_ref()
            .map(|dir| dir.join(CACHE_FILE_NAME))
    }

    fn load_cache(&self, issue_store: &IssueStore) -> ElevationCache {
        if !self.config.read_cached_elevations {
            return ElevationCache::empty();
        }
        let Some(path) = self.cache_file_path() else {
            return ElevationCache::empty();
        };
        match ElevationCache::load(&path) {
            Ok(cache) => {
                info!("Cached elevation data loaded into memory!");
                cache
            }
            Err(e) => {
                issue_store.add(DataImportIssue::Graphwide {
                    message: format!("Cached elevations file could not be read in due to error: {e}!"),
                });
                ElevationCache::empty()
            }
        }
    }

    fn write_cache(&self, graph: &StreetGraph, edges: &[EdgeId], issue_store: &IssueStore) {
        let Some(path) = self.cache_file_path() else {
            warn!("No cache directory configured; skipping elevation cache write");
            return;
        };

        let mut new_cache = ElevationCache::empty();
        for &edge_id in edges {
            let Some(edge) = graph.edge(edge_id) else {
                continue;
            };
            let Some(profile) = edge.elevation_profile() else {
                continue;
            };
            match cache::encoded_polyline(&edge.geometry) {
                Ok(key) => new_cache.insert(key, profile.clone()),
                Err(e) => debug!("skipping uncacheable edge {edge_id:?}: {e}"),
            }
        }

        if let Err(e) = new_cache.write_atomic(&path) {
            error!("{e}");
            issue_store.add(DataImportIssue::Graphwide {
                message: "Failed to write cached elevation file!".to_string(),
            });
        }
    }
}

/// Per-worker slot holding the lazily constructed coverage instance.
struct WorkerCoverage<'f, F: CoverageFactory> {
    factory: &'f F,
    construction_lock: &'f Mutex<()>,
    instance: Option<Box<dyn Coverage + Send>>,
}

impl<'f, F: CoverageFactory> WorkerCoverage<'f, F> {
    fn new(factory: &'f F, construction_lock: &'f Mutex<()>) -> Self {
        Self {
            factory,
            construction_lock,
            instance: None,
        }
    }

    /// The worker's coverage, built on first use.
    ///
    /// Construction happens under a coarse lock because the factory is not
    /// reentrant, and the fresh instance is primed with one evaluation so any
    /// shared one-time initialization completes while the lock is still held.
    fn coverage(&mut self, prime_at: Coord<f64>) -> &mut (dyn Coverage + Send) {
        let factory = self.factory;
        let lock = self.construction_lock;
        self.instance
            .get_or_insert_with(|| {
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                let mut coverage = factory.grid_coverage();
                let _ = coverage.evaluate(prime_at.x, prime_at.y);
                coverage
            })
            .as_mut()
    }
}

/// Produce the elevation profile for one edge, or `None` when the edge is
/// skipped or abandoned.
fn process_edge<F: CoverageFactory>(
    graph: &StreetGraph,
    edge_id: EdgeId,
    worker: &mut WorkerCoverage<'_, F>,
    cache: &ElevationCache,
    settings: &SamplerSettings,
    counters: &SampleCounters,
    deadline: Instant,
) -> Option<(EdgeId, ElevationProfile)> {
    if Instant::now() > deadline {
        // the driver has given up; do no further work
        return None;
    }

    let edge = graph.edge(edge_id)?;
    if edge.has_packed_elevation_profile() {
        return None; /* already set up */
    }

    // a cache hit avoids touching this worker's coverage at all
    if !cache.is_empty() {
        if let Ok(key) = cache::encoded_polyline(&edge.geometry) {
            if let Some(profile) = cache.get(&key) {
                return Some((edge_id, profile.clone()));
            }
        }
    }

    let first_coord = *edge.geometry.0.first()?;
    let coverage = worker.coverage(first_coord);
    match sampler::sample_edge_profile(&edge.geometry, coverage, settings, counters) {
        Ok(profile) => Some((edge_id, profile)),
        Err(e) => {
            debug!("Error processing elevation for edge {edge_id:?} due to error: {e}");
            None
        }
    }
}
