//! Street network model

pub mod components;
pub mod network;

pub use components::{EdgeClass, StreetEdge, StreetVertex};
pub use network::{IndexedPoint, StreetGraph};
