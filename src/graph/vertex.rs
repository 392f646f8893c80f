//! Vertex implementation
//!
//! A vertex keeps two adjacency structures, outgoing and incoming. Each maps
//! an edge type id to the ordered list of edge ids of that type. Edges are
//! referenced by id only; the vertex never owns them. A group exists only
//! while it holds at least one edge.

use super::element::{Element, ElementState};
use super::latch::LatchedCell;
use super::property::PropertyMap;
use super::store::GraphResult;
use super::table::ElementTable;
use super::types::{EdgeTypeId, ElementId};
use crate::config::LatchConfig;
use indexmap::IndexMap;

/// Edge lists grouped by edge type, in group creation order
pub type Adjacency = IndexMap<EdgeTypeId, Vec<ElementId>>;

/// Edge direction relative to a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Latched state of a vertex
#[derive(Debug, Clone, PartialEq)]
pub struct VertexState {
    pub(crate) base: ElementState,
    pub(crate) outgoing: Adjacency,
    pub(crate) incoming: Adjacency,
}

impl VertexState {
    fn side(&self, direction: Direction) -> &Adjacency {
        match direction {
            Direction::Outgoing => &self.outgoing,
            Direction::Incoming => &self.incoming,
        }
    }

    fn side_mut(&mut self, direction: Direction) -> &mut Adjacency {
        match direction {
            Direction::Outgoing => &mut self.outgoing,
            Direction::Incoming => &mut self.incoming,
        }
    }
}

impl AsRef<ElementState> for VertexState {
    fn as_ref(&self) -> &ElementState {
        &self.base
    }
}

impl AsMut<ElementState> for VertexState {
    fn as_mut(&mut self) -> &mut ElementState {
        &mut self.base
    }
}

/// A vertex of the graph
#[derive(Debug)]
pub struct Vertex {
    id: ElementId,
    created_at: i64,
    state: LatchedCell<VertexState>,
}

impl Vertex {
    /// Create a vertex with no properties and no edges
    pub fn new(id: ElementId, created_at: i64) -> Self {
        Self::with_config(id, created_at, LatchConfig::default())
    }

    /// Create a vertex whose latch uses the given retry budget
    pub fn with_config(id: ElementId, created_at: i64, latch: LatchConfig) -> Self {
        Self::from_parts(id, created_at, created_at, PropertyMap::new(), latch)
    }

    /// Rebuild a vertex from persisted parts; adjacency is installed later
    /// with [`replace_outgoing_edges`](Self::replace_outgoing_edges) and
    /// [`replace_incoming_edges`](Self::replace_incoming_edges)
    pub fn from_parts(
        id: ElementId,
        created_at: i64,
        modified_at: i64,
        properties: PropertyMap,
        latch: LatchConfig,
    ) -> Self {
        Vertex {
            id,
            created_at,
            state: LatchedCell::new(
                VertexState {
                    base: ElementState::new(modified_at, properties),
                    outgoing: Adjacency::new(),
                    incoming: Adjacency::new(),
                },
                latch,
            ),
        }
    }

    pub fn add_outgoing_edge(&self, edge_type: EdgeTypeId, edge: ElementId) -> GraphResult<()> {
        self.add_edge(Direction::Outgoing, edge_type, edge)
    }

    pub fn add_incoming_edge(&self, edge_type: EdgeTypeId, edge: ElementId) -> GraphResult<()> {
        self.add_edge(Direction::Incoming, edge_type, edge)
    }

    /// Append `edge` to its type group, creating the group if needed
    pub fn add_edge(
        &self,
        direction: Direction,
        edge_type: EdgeTypeId,
        edge: ElementId,
    ) -> GraphResult<()> {
        let mut state = self.write_state()?;
        state.side_mut(direction).entry(edge_type).or_default().push(edge);
        state.base.touch();
        Ok(())
    }

    pub fn remove_outgoing_edge(&self, edge_type: EdgeTypeId, edge: ElementId) -> GraphResult<bool> {
        self.remove_edge(Direction::Outgoing, edge_type, edge)
    }

    pub fn remove_incoming_edge(&self, edge_type: EdgeTypeId, edge: ElementId) -> GraphResult<bool> {
        self.remove_edge(Direction::Incoming, edge_type, edge)
    }

    /// Remove one reference to `edge`; a group left empty is removed too
    pub fn remove_edge(
        &self,
        direction: Direction,
        edge_type: EdgeTypeId,
        edge: ElementId,
    ) -> GraphResult<bool> {
        let mut state = self.write_state()?;
        let side = state.side_mut(direction);
        let Some(edges) = side.get_mut(&edge_type) else {
            return Ok(false);
        };
        let Some(pos) = edges.iter().position(|e| *e == edge) else {
            return Ok(false);
        };
        edges.remove(pos);
        if edges.is_empty() {
            side.shift_remove(&edge_type);
        }
        state.base.touch();
        Ok(true)
    }

    /// Install a whole outgoing adjacency at once (load path).
    /// Empty groups are dropped and the modification time is left alone.
    pub fn replace_outgoing_edges(&self, groups: Adjacency) -> GraphResult<()> {
        self.replace_edges(Direction::Outgoing, groups)
    }

    /// Incoming counterpart of [`replace_outgoing_edges`](Self::replace_outgoing_edges)
    pub fn replace_incoming_edges(&self, groups: Adjacency) -> GraphResult<()> {
        self.replace_edges(Direction::Incoming, groups)
    }

    fn replace_edges(&self, direction: Direction, mut groups: Adjacency) -> GraphResult<()> {
        groups.retain(|_, edges| !edges.is_empty());
        let mut state = self.write_state()?;
        *state.side_mut(direction) = groups;
        Ok(())
    }

    /// Copy of the outgoing adjacency
    pub fn get_outgoing_edges(&self) -> GraphResult<Adjacency> {
        Ok(self.read_state()?.outgoing.clone())
    }

    /// Copy of the incoming adjacency
    pub fn get_incoming_edges(&self) -> GraphResult<Adjacency> {
        Ok(self.read_state()?.incoming.clone())
    }

    pub fn get_outgoing_edge_type_ids(&self) -> GraphResult<Vec<EdgeTypeId>> {
        Ok(self.read_state()?.outgoing.keys().copied().collect())
    }

    pub fn get_incoming_edge_type_ids(&self) -> GraphResult<Vec<EdgeTypeId>> {
        Ok(self.read_state()?.incoming.keys().copied().collect())
    }

    /// Copy of one outgoing group, `None` when the vertex has no such edges
    pub fn try_get_outgoing_edges(&self, edge_type: EdgeTypeId) -> GraphResult<Option<Vec<ElementId>>> {
        Ok(self.read_state()?.outgoing.get(&edge_type).cloned())
    }

    pub fn try_get_incoming_edges(&self, edge_type: EdgeTypeId) -> GraphResult<Option<Vec<ElementId>>> {
        Ok(self.read_state()?.incoming.get(&edge_type).cloned())
    }

    /// Targets of all outgoing edges followed by sources of all incoming
    /// edges, duplicates kept. Edges no longer in `table` are skipped.
    pub fn get_all_neighbors(&self, table: &ElementTable) -> GraphResult<Vec<ElementId>> {
        let state = self.read_state()?;
        let mut neighbors = Vec::new();
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for edge_id in state.side(direction).values().flatten() {
                if let Some(edge) = table.edge(*edge_id) {
                    neighbors.push(match direction {
                        Direction::Outgoing => edge.target(),
                        Direction::Incoming => edge.source(),
                    });
                }
            }
        }
        Ok(neighbors)
    }

    pub fn out_degree(&self) -> GraphResult<usize> {
        Ok(self.read_state()?.outgoing.values().map(Vec::len).sum())
    }

    pub fn in_degree(&self) -> GraphResult<usize> {
        Ok(self.read_state()?.incoming.values().map(Vec::len).sum())
    }
}

impl Element for Vertex {
    type State = VertexState;

    fn id(&self) -> ElementId {
        self.id
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn state_cell(&self) -> &LatchedCell<VertexState> {
        &self.state
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Vertex {}

impl std::hash::Hash for Vertex {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
