//! Graphvault
//!
//! An in-memory property graph core with per-element latching and
//! partitioned, parallel binary snapshots.
//!
//! # Architecture
//!
//! - [`graph`]: vertices and edges guarded by non-blocking reader/writer
//!   latches, adjacency grouped by edge type, a positional element table and
//!   the [`GraphStore`] facade
//! - [`persistence`]: a snapshot writer that encodes element partitions and
//!   indices in parallel behind an atomically published manifest, and a
//!   two-phase reader that parses first and resolves references second
//! - [`index`]: the persistable index boundary and a B-tree property index
//! - [`config`]: latch retry and snapshot settings, loadable from YAML/JSON
//!
//! ## Example Usage
//!
//! ```rust
//! use graphvault::graph::{EdgeTypeId, Element, GraphStore, PropertyId};
//! use graphvault::index::PropertyIndexFactory;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut store = GraphStore::new();
//!
//! let alice = store.create_vertex().unwrap();
//! let bob = store.create_vertex().unwrap();
//! store.vertex(alice).unwrap().set_property(PropertyId::new(1), "Alice").unwrap();
//! let knows = store.create_edge(alice, bob, EdgeTypeId::new(7)).unwrap();
//!
//! let report = store.save(dir.path().join("graph")).unwrap();
//! let restored = GraphStore::restore(
//!     &report.manifest_path,
//!     &PropertyIndexFactory,
//!     store.config().clone(),
//! )
//! .unwrap();
//!
//! assert_eq!(restored.edge(knows).unwrap().source(), alice);
//! assert_eq!(restored.vertex(alice).unwrap().out_degree().unwrap(), 1);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod graph;
pub mod index;
pub mod persistence;

// Re-export main types for convenience
pub use config::{ConfigError, DanglingPolicy, GraphConfig, LatchConfig, PersistenceConfig};

pub use graph::{
    Edge, EdgeTypeId, Element, ElementId, GraphElement, GraphError, GraphResult, GraphStore,
    PropertyId, PropertyMap, PropertyValue, Vertex,
};

pub use index::{Index, IndexError, IndexFactory, PropertyIndex, PropertyIndexFactory};

pub use persistence::{
    PersistenceError, PersistenceResult, SaveReport, Snapshot, SnapshotReader, SnapshotWriter,
    StructuralLoadError,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
