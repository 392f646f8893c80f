//! Positional element table
//!
//! Slot `i` holds the element whose id is `i`, or a hole. Holes are kept so
//! ids stay positional across removals and snapshots. Structural changes
//! (insert, remove) take `&mut self`; element-level reads and writes only
//! need `&self` and are arbitrated by each element's latch.

use super::edge::Edge;
use super::element::GraphElement;
use super::store::{GraphError, GraphResult};
use super::types::ElementId;
use super::vertex::Vertex;

#[derive(Debug, Default)]
pub struct ElementTable {
    slots: Vec<Option<GraphElement>>,
}

impl ElementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table of `len` holes
    pub fn with_len(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        ElementTable { slots }
    }

    pub(crate) fn from_slots(slots: Vec<Option<GraphElement>>) -> Self {
        ElementTable { slots }
    }

    /// Number of slots, holes included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Option<GraphElement>] {
        &self.slots
    }

    /// Place an element in the slot named by its id, growing the table with
    /// holes as needed
    pub fn insert(&mut self, element: GraphElement) -> GraphResult<()> {
        let id = element.id();
        let slot = id.slot().ok_or(GraphError::InvalidElementId(id))?;
        if slot >= self.slots.len() {
            self.slots.resize_with(slot + 1, || None);
        }
        if self.slots[slot].is_some() {
            return Err(GraphError::ElementAlreadyExists(id));
        }
        self.slots[slot] = Some(element);
        Ok(())
    }

    /// Turn the element's slot into a hole and hand the element back
    pub fn remove(&mut self, id: ElementId) -> Option<GraphElement> {
        self.slots.get_mut(id.slot()?)?.take()
    }

    pub fn get(&self, id: ElementId) -> Option<&GraphElement> {
        self.slots.get(id.slot()?)?.as_ref()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    pub fn vertex(&self, id: ElementId) -> Option<&Vertex> {
        self.get(id)?.as_vertex()
    }

    pub fn edge(&self, id: ElementId) -> Option<&Edge> {
        self.get(id)?.as_edge()
    }

    /// Live elements in slot order
    pub fn iter(&self) -> impl Iterator<Item = &GraphElement> {
        self.slots.iter().flatten()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.iter().filter_map(GraphElement::as_vertex)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.iter().filter_map(GraphElement::as_edge)
    }

    pub fn hole_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }
}
