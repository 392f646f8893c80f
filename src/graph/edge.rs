//! Edge implementation
//!
//! An edge has exactly one source and one target vertex, both referenced by
//! id and fixed at construction. Only the inherited properties and the
//! modification timestamp change afterwards.

use super::element::{Element, ElementState};
use super::latch::LatchedCell;
use super::property::PropertyMap;
use super::types::{EdgeTypeId, ElementId};
use crate::config::LatchConfig;

/// A directed edge of the graph
#[derive(Debug)]
pub struct Edge {
    id: ElementId,
    created_at: i64,
    source: ElementId,
    target: ElementId,
    edge_type: EdgeTypeId,
    state: LatchedCell<ElementState>,
}

impl Edge {
    /// Create a directed edge with no properties
    pub fn new(
        id: ElementId,
        created_at: i64,
        source: ElementId,
        target: ElementId,
        edge_type: EdgeTypeId,
    ) -> Self {
        Self::from_parts(
            id,
            created_at,
            created_at,
            PropertyMap::new(),
            source,
            target,
            edge_type,
            LatchConfig::default(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: ElementId,
        created_at: i64,
        modified_at: i64,
        properties: PropertyMap,
        source: ElementId,
        target: ElementId,
        edge_type: EdgeTypeId,
        latch: LatchConfig,
    ) -> Self {
        Edge {
            id,
            created_at,
            source,
            target,
            edge_type,
            state: LatchedCell::new(ElementState::new(modified_at, properties), latch),
        }
    }

    /// Source vertex id (edge goes FROM this vertex)
    pub fn source(&self) -> ElementId {
        self.source
    }

    /// Target vertex id (edge goes TO this vertex)
    pub fn target(&self) -> ElementId {
        self.target
    }

    pub fn edge_type(&self) -> EdgeTypeId {
        self.edge_type
    }

    /// Check if this edge connects two specific vertices (in either direction)
    pub fn connects(&self, a: ElementId, b: ElementId) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

impl Element for Edge {
    type State = ElementState;

    fn id(&self) -> ElementId {
        self.id
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn state_cell(&self) -> &LatchedCell<ElementState> {
        &self.state
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Edge {}

impl std::hash::Hash for Edge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
