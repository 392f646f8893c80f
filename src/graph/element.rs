//! Graph element base: identity, timestamps and latched properties
//!
//! Vertices and edges share the fields in [`ElementState`] and the property
//! operations of the [`Element`] trait. Every read goes through the element's
//! read latch and every mutation through its write latch; a failed
//! acquisition is reported as [`GraphError::Collision`] and changes nothing.

use super::edge::Edge;
use super::latch::{LatchReadGuard, LatchWriteGuard, LatchedCell};
use super::property::{PropertyMap, PropertyValue};
use super::store::{GraphError, GraphResult};
use super::types::{now_millis, AccessMode, ElementId, PropertyId};
use super::vertex::Vertex;

/// Mutable state common to every element
#[derive(Debug, Clone, PartialEq)]
pub struct ElementState {
    pub(crate) modified_at: i64,
    pub(crate) properties: PropertyMap,
}

impl ElementState {
    pub fn new(modified_at: i64, properties: PropertyMap) -> Self {
        Self {
            modified_at,
            properties,
        }
    }

    /// Bump the modification timestamp; it never moves backwards
    pub(crate) fn touch(&mut self) {
        self.modified_at = now_millis().max(self.modified_at);
    }
}

impl AsRef<ElementState> for ElementState {
    fn as_ref(&self) -> &ElementState {
        self
    }
}

impl AsMut<ElementState> for ElementState {
    fn as_mut(&mut self) -> &mut ElementState {
        self
    }
}

/// Operations shared by vertices and edges
pub trait Element {
    /// Latched state of this element kind
    type State: AsRef<ElementState> + AsMut<ElementState>;

    fn id(&self) -> ElementId;

    /// Creation timestamp (Unix milliseconds); immutable, no latch needed
    fn created_at(&self) -> i64;

    #[doc(hidden)]
    fn state_cell(&self) -> &LatchedCell<Self::State>;

    /// Read-latched access to the state
    fn read_state(&self) -> GraphResult<LatchReadGuard<'_, Self::State>> {
        self.state_cell().try_read().ok_or(GraphError::Collision {
            id: self.id(),
            mode: AccessMode::Read,
        })
    }

    /// Write-latched access to the state
    fn write_state(&self) -> GraphResult<LatchWriteGuard<'_, Self::State>> {
        self.state_cell().try_write().ok_or(GraphError::Collision {
            id: self.id(),
            mode: AccessMode::Write,
        })
    }

    fn modified_at(&self) -> GraphResult<i64> {
        Ok(self.read_state()?.as_ref().modified_at)
    }

    /// Copy of the whole property map
    fn read_properties(&self) -> GraphResult<PropertyMap> {
        Ok(self.read_state()?.as_ref().properties.clone())
    }

    fn get_property(&self, key: PropertyId) -> GraphResult<Option<PropertyValue>> {
        Ok(self.read_state()?.as_ref().properties.get(&key).cloned())
    }

    fn property_count(&self) -> GraphResult<usize> {
        Ok(self.read_state()?.as_ref().properties.len())
    }

    /// Set a property, returning the previous value
    fn set_property(
        &self,
        key: PropertyId,
        value: impl Into<PropertyValue>,
    ) -> GraphResult<Option<PropertyValue>> {
        let mut guard = self.write_state()?;
        let state = guard.as_mut();
        let old = state.properties.insert(key, value.into());
        state.touch();
        Ok(old)
    }

    /// Remove a property; the timestamp only moves if something was removed
    fn remove_property(&self, key: PropertyId) -> GraphResult<Option<PropertyValue>> {
        let mut guard = self.write_state()?;
        let state = guard.as_mut();
        let removed = state.properties.remove(&key);
        if removed.is_some() {
            state.touch();
        }
        Ok(removed)
    }
}

/// A slot value of the element table: a vertex or an edge
#[derive(Debug)]
pub enum GraphElement {
    Vertex(Vertex),
    Edge(Edge),
}

impl GraphElement {
    pub fn id(&self) -> ElementId {
        match self {
            GraphElement::Vertex(v) => v.id(),
            GraphElement::Edge(e) => e.id(),
        }
    }

    pub fn created_at(&self) -> i64 {
        match self {
            GraphElement::Vertex(v) => v.created_at(),
            GraphElement::Edge(e) => e.created_at(),
        }
    }

    pub fn modified_at(&self) -> GraphResult<i64> {
        match self {
            GraphElement::Vertex(v) => v.modified_at(),
            GraphElement::Edge(e) => e.modified_at(),
        }
    }

    pub fn read_properties(&self) -> GraphResult<PropertyMap> {
        match self {
            GraphElement::Vertex(v) => v.read_properties(),
            GraphElement::Edge(e) => e.read_properties(),
        }
    }

    pub fn get_property(&self, key: PropertyId) -> GraphResult<Option<PropertyValue>> {
        match self {
            GraphElement::Vertex(v) => v.get_property(key),
            GraphElement::Edge(e) => e.get_property(key),
        }
    }

    pub fn set_property(
        &self,
        key: PropertyId,
        value: impl Into<PropertyValue>,
    ) -> GraphResult<Option<PropertyValue>> {
        match self {
            GraphElement::Vertex(v) => v.set_property(key, value),
            GraphElement::Edge(e) => e.set_property(key, value),
        }
    }

    pub fn remove_property(&self, key: PropertyId) -> GraphResult<Option<PropertyValue>> {
        match self {
            GraphElement::Vertex(v) => v.remove_property(key),
            GraphElement::Edge(e) => e.remove_property(key),
        }
    }

    pub fn is_vertex(&self) -> bool {
        matches!(self, GraphElement::Vertex(_))
    }

    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            GraphElement::Vertex(v) => Some(v),
            GraphElement::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            GraphElement::Edge(e) => Some(e),
            GraphElement::Vertex(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GraphElement::Vertex(_) => "vertex",
            GraphElement::Edge(_) => "edge",
        }
    }
}

impl From<Vertex> for GraphElement {
    fn from(vertex: Vertex) -> Self {
        GraphElement::Vertex(vertex)
    }
}

impl From<Edge> for GraphElement {
    fn from(edge: Edge) -> Self {
        GraphElement::Edge(edge)
    }
}

impl PartialEq for GraphElement {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for GraphElement {}

impl std::hash::Hash for GraphElement {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}
