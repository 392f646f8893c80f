//! Snapshot persistence for the in-memory graph
//!
//! A snapshot is a manifest file plus one file per element partition and one
//! file per named index:
//! - [`SnapshotWriter`] encodes partitions and indices in parallel and
//!   publishes the manifest last
//! - [`SnapshotReader`] parses every partition in parallel into unresolved
//!   records, then binds all ids to live elements in a single resolution pass

pub mod codec;
pub mod manifest;
pub mod reader;
pub mod record;
pub mod writer;

pub use manifest::Manifest;
pub use reader::{Snapshot, SnapshotReader};
pub use writer::{SaveReport, SnapshotWriter};

use crate::graph::{EdgeTypeId, ElementId, GraphError};
use crate::index::IndexError;
use std::fmt;
use thiserror::Error;

/// What kind of reference could not be bound on load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    EdgeSource,
    EdgeTarget,
    /// The edge's source vertex does not list it as outgoing, so its type
    /// cannot be recovered
    SourceAdjacency,
    OutgoingEdge(EdgeTypeId),
    IncomingEdge(EdgeTypeId),
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::EdgeSource => write!(f, "edge source"),
            ReferenceKind::EdgeTarget => write!(f, "edge target"),
            ReferenceKind::SourceAdjacency => write!(f, "edge missing from source adjacency"),
            ReferenceKind::OutgoingEdge(t) => write!(f, "outgoing edge of type {}", t),
            ReferenceKind::IncomingEdge(t) => write!(f, "incoming edge of type {}", t),
        }
    }
}

/// A reference from `from` to an id that is absent or of the wrong kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DanglingReference {
    pub from: ElementId,
    pub to: ElementId,
    pub kind: ReferenceKind,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.kind)
    }
}

/// Every reference the resolution pass could not bind
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} dangling reference(s), first: {}", .references.len(), first_reference(.references))]
pub struct StructuralLoadError {
    pub references: Vec<DanglingReference>,
}

fn first_reference(references: &[DanglingReference]) -> String {
    references
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

/// Persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Structural load error: {0}")]
    Structural(#[from] StructuralLoadError),

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Corrupt record in slot {slot}: {reason}")]
    Corrupt { slot: usize, reason: String },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Index {name} failed: {source}")]
    Index {
        name: String,
        #[source]
        source: IndexError,
    },

    #[error("Invalid index name: {0:?}")]
    InvalidIndexName(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Dedicated pool for save/load workers; 0 threads means one per core
pub(crate) fn build_pool(worker_threads: usize) -> PersistenceResult<rayon::ThreadPool> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(worker_threads)
        .thread_name(|i| format!("graphvault-io-{}", i))
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_error_display() {
        let err = StructuralLoadError {
            references: vec![
                DanglingReference {
                    from: ElementId::new(10),
                    to: ElementId::new(4),
                    kind: ReferenceKind::EdgeTarget,
                },
                DanglingReference {
                    from: ElementId::new(1),
                    to: ElementId::new(12),
                    kind: ReferenceKind::OutgoingEdge(EdgeTypeId::new(7)),
                },
            ],
        };
        let msg = PersistenceError::from(err).to_string();
        assert!(msg.contains("2 dangling reference(s)"));
        assert!(msg.contains("ElementId(10) -> ElementId(4) (edge target)"));
    }

    #[test]
    fn test_build_pool() {
        let pool = build_pool(2).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
        assert_eq!(pool.install(|| 21 * 2), 42);
    }
}
