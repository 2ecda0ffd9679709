//! Graph layer: SQLite store, neighbor lookup, traversal, pathfinding and ranking.

pub mod adjacency;
pub mod call_chain;
pub mod centrality;
pub mod impact;
pub mod pathfinding;
pub mod ranking;
pub mod store;
pub mod traversal;

pub use adjacency::{AdjacencyIndex, EdgeFilter, NeighborSource};
pub use store::{GraphStore, NewSymbol};
