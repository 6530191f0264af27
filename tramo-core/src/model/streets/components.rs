//! Street network components - vertices and edges

use std::rc::Rc;

use geo::{LineString, Point};

use crate::model::profile::ElevationProfile;
use crate::routing::state::{State, StateEditor};
use crate::{DEFAULT_WALK_SPEED_MPS, EdgeId, MAX_USABLE_SLOPE, VertexId, geometry};

/// Street graph vertex
#[derive(Debug, Clone)]
pub struct StreetVertex {
    /// Stable identifier from the source data
    pub id: u64,
    /// Vertex coordinates
    pub geometry: Point<f64>,
}

impl StreetVertex {
    pub fn new(id: u64, geometry: Point<f64>) -> Self {
        Self { id, geometry }
    }
}

/// Classification of a street graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeClass {
    /// A street segment that carries an elevation profile.
    StreetWithElevation,
    /// A street segment without elevation data (e.g. inside tunnels).
    Street,
    /// A non-street connector (entrances, transit links).
    Link,
}

impl EdgeClass {
    /// Whether the edge is part of the walkable street network.
    pub fn is_street(self) -> bool {
        matches!(self, EdgeClass::Street | EdgeClass::StreetWithElevation)
    }
}

/// Street graph edge (street segment)
#[derive(Debug, Clone)]
pub struct StreetEdge {
    /// Planar geometry of the segment, as (lon, lat) coordinates
    pub geometry: LineString<f64>,
    length_m: f64,
    class: EdgeClass,
    profile: Option<ElevationProfile>,
    elevation_flattened: bool,
    slope_override: bool,
}

impl StreetEdge {
    /// Build an edge from its geometry; the geodesic length is derived from
    /// the polyline.
    pub fn new(geometry: LineString<f64>, class: EdgeClass) -> Self {
        let length_m = geometry::line_length_m(&geometry);
        Self {
            geometry,
            length_m,
            class,
            profile: None,
            elevation_flattened: false,
            slope_override: false,
        }
    }

    /// Mark the edge as a slope override (bridges, tunnels): sampled
    /// elevations do not apply to it beyond its endpoints.
    pub fn with_slope_override(mut self) -> Self {
        self.slope_override = true;
        self
    }

    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    pub fn class(&self) -> EdgeClass {
        self.class
    }

    pub fn has_packed_elevation_profile(&self) -> bool {
        self.profile.is_some()
    }

    pub fn elevation_profile(&self) -> Option<&ElevationProfile> {
        self.profile.as_ref()
    }

    pub fn is_elevation_flattened(&self) -> bool {
        self.elevation_flattened
    }

    pub fn is_slope_override(&self) -> bool {
        self.slope_override
    }

    /// Attach an elevation profile to the edge.
    ///
    /// `computed` marks profiles synthesized from endpoint interpolation
    /// rather than sampled from a coverage. Sampled profiles on slope-override
    /// edges, and sampled profiles steeper than [`MAX_USABLE_SLOPE`], are
    /// collapsed to a flat two-point profile at the first sampled elevation.
    ///
    /// Returns whether the stored profile ended up flattened.
    pub fn set_elevation_profile(&mut self, profile: ElevationProfile, computed: bool) -> bool {
        if self.class != EdgeClass::StreetWithElevation {
            return false;
        }
        let mut flattened = computed;
        let mut profile = profile;
        if !computed && (self.slope_override || profile.max_slope() > MAX_USABLE_SLOPE) {
            let first = profile.first_elevation();
            profile = ElevationProfile::two_point(self.length_m, first, first);
            flattened = true;
        }
        self.profile = Some(profile);
        self.elevation_flattened = flattened;
        flattened
    }

    /// Generalized cost of walking this edge.
    pub fn traversal_weight(&self) -> f64 {
        self.length_m
    }

    /// Walking time over the edge in whole seconds.
    pub fn traversal_duration_secs(&self) -> i64 {
        (self.length_m / DEFAULT_WALK_SPEED_MPS).round() as i64
    }

    /// Traverse this edge from `parent`, producing the state at `to_vertex`.
    ///
    /// Returns `None` when the traversal is unsatisfiable (degenerate weight
    /// increments are rejected by the editor). The returned state may carry a
    /// chain of further results via `next_result`; plain street walking yields
    /// exactly one.
    pub fn traverse(
        &self,
        parent: &Rc<State>,
        edge_id: EdgeId,
        to_vertex: VertexId,
    ) -> Option<State> {
        let mut editor = StateEditor::child(parent, edge_id, to_vertex);
        editor.increment_weight(self.traversal_weight());
        editor.increment_time_secs(self.traversal_duration_secs());
        editor.make_state()
    }
}
