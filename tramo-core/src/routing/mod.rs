//! Graph search: A*, its shortest-path tree, and the supporting heap.

pub mod astar;
pub mod binheap;
pub mod path;
pub mod spt;
pub mod state;

// Re-export main interfaces
pub use astar::{AStar, AStarBuilder};
pub use binheap::BinHeap;
pub use path::GraphPath;
pub use spt::{DominanceFunction, MinimumWeight, ShortestPathTree};
pub use state::{State, StateEditor};
