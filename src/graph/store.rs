//! Graph store facade
//!
//! Owns the id counter, the element table and the named indices, and ties
//! the element model to the snapshot engine. Structural changes take
//! `&mut self`; per-element reads and writes go through the elements
//! themselves and only need `&self`.

use super::edge::Edge;
use super::element::{Element, GraphElement};
use super::table::ElementTable;
use super::types::{now_millis, AccessMode, EdgeTypeId, ElementId};
use super::vertex::{Direction, Vertex};
use crate::config::GraphConfig;
use crate::index::{Index, IndexFactory};
use crate::persistence::{
    PersistenceResult, SaveReport, SnapshotReader, SnapshotWriter,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during graph operations
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    /// The element latch could not be acquired within its retry budget
    #[error("Collision on {id}: {mode} latch unavailable")]
    Collision { id: ElementId, mode: AccessMode },

    #[error("Element {0} not found")]
    ElementNotFound(ElementId),

    #[error("Element {0} already exists")]
    ElementAlreadyExists(ElementId),

    #[error("Element id {0} is not a valid table slot")]
    InvalidElementId(ElementId),

    #[error("Element {0} is not a vertex")]
    NotAVertex(ElementId),

    #[error("Element {0} is not an edge")]
    NotAnEdge(ElementId),

    #[error("Invalid edge: source vertex {0} does not exist")]
    InvalidEdgeSource(ElementId),

    #[error("Invalid edge: target vertex {0} does not exist")]
    InvalidEdgeTarget(ElementId),

    #[error("Element id space exhausted")]
    IdSpaceExhausted,
}

impl GraphError {
    /// Whether retrying the same operation later may succeed
    pub fn is_collision(&self) -> bool {
        matches!(self, GraphError::Collision { .. })
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Counts reported by [`GraphStore::statistics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStatistics {
    pub next_id: i32,
    pub slots: usize,
    pub vertices: usize,
    pub edges: usize,
    pub holes: usize,
    pub indices: usize,
}

/// In-memory graph: element table plus named indices
#[derive(Debug)]
pub struct GraphStore {
    config: GraphConfig,
    next_id: i32,
    elements: ElementTable,
    indices: HashMap<String, Box<dyn Index>>,
}

impl GraphStore {
    /// Create a new empty graph store
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        GraphStore {
            config,
            next_id: 0,
            elements: ElementTable::new(),
            indices: HashMap::new(),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Next id handed out by `create_vertex` / `create_edge`
    pub fn next_id(&self) -> i32 {
        self.next_id
    }

    pub fn elements(&self) -> &ElementTable {
        &self.elements
    }

    pub fn element(&self, id: ElementId) -> Option<&GraphElement> {
        self.elements.get(id)
    }

    pub fn vertex(&self, id: ElementId) -> Option<&Vertex> {
        self.elements.vertex(id)
    }

    pub fn edge(&self, id: ElementId) -> Option<&Edge> {
        self.elements.edge(id)
    }

    fn allocate_id(&mut self) -> GraphResult<ElementId> {
        let id = ElementId::new(self.next_id);
        self.next_id = self.next_id.checked_add(1).ok_or(GraphError::IdSpaceExhausted)?;
        Ok(id)
    }

    /// Counter value after `id` is taken; checked before anything is inserted
    fn next_id_after(&self, id: ElementId) -> GraphResult<i32> {
        if id.slot().is_none() {
            return Err(GraphError::InvalidElementId(id));
        }
        if id.as_i32() < self.next_id {
            return Ok(self.next_id);
        }
        id.as_i32().checked_add(1).ok_or(GraphError::IdSpaceExhausted)
    }

    /// Create a vertex with the next free id
    pub fn create_vertex(&mut self) -> GraphResult<ElementId> {
        let id = self.allocate_id()?;
        self.add_vertex(id, now_millis())?;
        Ok(id)
    }

    /// Insert a vertex with a caller-supplied id and creation time
    pub fn add_vertex(&mut self, id: ElementId, created_at: i64) -> GraphResult<&Vertex> {
        let next_id = self.next_id_after(id)?;
        let vertex = Vertex::with_config(id, created_at, self.config.latch);
        self.elements.insert(vertex.into())?;
        self.next_id = next_id;
        self.elements.vertex(id).ok_or(GraphError::ElementNotFound(id))
    }

    /// Create an edge with the next free id and wire it into both endpoints
    pub fn create_edge(
        &mut self,
        source: ElementId,
        target: ElementId,
        edge_type: EdgeTypeId,
    ) -> GraphResult<ElementId> {
        self.check_endpoints(source, target)?;
        let id = self.allocate_id()?;
        self.add_edge(id, now_millis(), source, target, edge_type)?;
        Ok(id)
    }

    /// Insert an edge with a caller-supplied id and wire it into the source's
    /// outgoing and the target's incoming adjacency.
    ///
    /// If the target wiring fails the source wiring is undone and the edge is
    /// not inserted.
    pub fn add_edge(
        &mut self,
        id: ElementId,
        created_at: i64,
        source: ElementId,
        target: ElementId,
        edge_type: EdgeTypeId,
    ) -> GraphResult<&Edge> {
        self.check_endpoints(source, target)?;
        let next_id = self.next_id_after(id)?;
        if self.elements.contains(id) {
            return Err(GraphError::ElementAlreadyExists(id));
        }

        let source_vertex = self.elements.vertex(source).ok_or(GraphError::InvalidEdgeSource(source))?;
        let target_vertex = self.elements.vertex(target).ok_or(GraphError::InvalidEdgeTarget(target))?;

        source_vertex.add_outgoing_edge(edge_type, id)?;
        if let Err(err) = target_vertex.add_incoming_edge(edge_type, id) {
            if let Err(rollback) = source_vertex.remove_outgoing_edge(edge_type, id) {
                warn!("Could not unwire edge {} from {}: {}", id, source, rollback);
            }
            return Err(err);
        }

        let edge = Edge::from_parts(
            id,
            created_at,
            created_at,
            Default::default(),
            source,
            target,
            edge_type,
            self.config.latch,
        );
        self.elements.insert(edge.into())?;
        self.next_id = next_id;
        self.elements.edge(id).ok_or(GraphError::ElementNotFound(id))
    }

    fn check_endpoints(&self, source: ElementId, target: ElementId) -> GraphResult<()> {
        if self.elements.vertex(source).is_none() {
            return Err(GraphError::InvalidEdgeSource(source));
        }
        if self.elements.vertex(target).is_none() {
            return Err(GraphError::InvalidEdgeTarget(target));
        }
        Ok(())
    }

    /// Remove an element, leaving a hole in its slot.
    ///
    /// Removing an edge unlinks it from its endpoints; removing a vertex
    /// removes every incident edge first.
    pub fn remove_element(&mut self, id: ElementId) -> GraphResult<GraphElement> {
        match self.elements.get(id) {
            None => return Err(GraphError::ElementNotFound(id)),
            Some(GraphElement::Edge(edge)) => self.unlink_edge(edge)?,
            Some(GraphElement::Vertex(vertex)) => {
                let mut incident: Vec<ElementId> = Vec::new();
                for groups in [vertex.get_outgoing_edges()?, vertex.get_incoming_edges()?] {
                    incident.extend(groups.into_values().flatten());
                }
                incident.sort_unstable();
                incident.dedup();
                for edge_id in incident {
                    if let Some(edge) = self.elements.edge(edge_id) {
                        self.unlink_edge(edge)?;
                        self.elements.remove(edge_id);
                        debug!("Removed edge {} incident to vertex {}", edge_id, id);
                    }
                }
            }
        }
        self.elements.remove(id).ok_or(GraphError::ElementNotFound(id))
    }

    fn unlink_edge(&self, edge: &Edge) -> GraphResult<()> {
        let ends = [
            (edge.source(), Direction::Outgoing),
            (edge.target(), Direction::Incoming),
        ];
        for (vertex_id, direction) in ends {
            if let Some(vertex) = self.elements.vertex(vertex_id) {
                vertex.remove_edge(direction, edge.edge_type(), edge.id())?;
            }
        }
        Ok(())
    }

    /// Register a named index; replaces and returns any index with that name
    pub fn add_index(&mut self, name: impl Into<String>, index: Box<dyn Index>) -> Option<Box<dyn Index>> {
        self.indices.insert(name.into(), index)
    }

    pub fn index(&self, name: &str) -> Option<&dyn Index> {
        self.indices.get(name).map(|index| index.as_ref())
    }

    pub fn remove_index(&mut self, name: &str) -> Option<Box<dyn Index>> {
        self.indices.remove(name)
    }

    pub fn indices(&self) -> &HashMap<String, Box<dyn Index>> {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.elements.vertices().count()
    }

    pub fn edge_count(&self) -> usize {
        self.elements.edges().count()
    }

    pub fn statistics(&self) -> GraphStatistics {
        GraphStatistics {
            next_id: self.next_id,
            slots: self.elements.len(),
            vertices: self.vertex_count(),
            edges: self.edge_count(),
            holes: self.elements.hole_count(),
            indices: self.indices.len(),
        }
    }

    /// Snapshot the whole graph to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> PersistenceResult<SaveReport> {
        SnapshotWriter::new(self.config.persistence.clone()).save(
            self.next_id,
            self.elements.slots(),
            &self.indices,
            path,
        )
    }

    /// Rebuild a graph from the snapshot at `path`; a missing snapshot gives
    /// an empty graph
    pub fn restore(
        path: impl AsRef<Path>,
        factory: &dyn IndexFactory,
        config: GraphConfig,
    ) -> PersistenceResult<Self> {
        let reader = SnapshotReader::new(config.persistence.clone(), config.latch);
        let Some(snapshot) = reader.load(path.as_ref(), factory)? else {
            info!("No snapshot at {:?}, starting from an empty graph", path.as_ref());
            return Ok(Self::with_config(config));
        };
        Ok(GraphStore {
            config,
            next_id: snapshot.next_id,
            elements: snapshot.elements,
            indices: snapshot.indices,
        })
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
