//! Core graph element model
//!
//! This module implements the latched in-memory graph:
//! - Per-element reader/writer latches that never block (bounded retry,
//!   then a collision error)
//! - Vertices with outgoing and incoming adjacency grouped by edge type
//! - Directed edges with immutable endpoints
//! - A positional element table where an element's id is its slot

pub mod edge;
pub mod element;
pub mod latch;
pub mod property;
pub mod store;
pub mod table;
pub mod types;
pub mod vertex;

// Re-export main types
pub use edge::Edge;
pub use element::{Element, ElementState, GraphElement};
pub use latch::{ElementLatch, LatchReadGuard, LatchState, LatchWriteGuard, LatchedCell};
pub use property::{PropertyMap, PropertyValue};
pub use store::{GraphError, GraphResult, GraphStatistics, GraphStore};
pub use table::ElementTable;
pub use types::{AccessMode, EdgeTypeId, ElementId, PropertyId};
pub use vertex::{Adjacency, Direction, Vertex, VertexState};
