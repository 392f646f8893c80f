//! Core type definitions for the graph element model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a graph element (vertex or edge)
///
/// Ids are assigned by the caller, are unique within one graph and double as
/// the element's slot in the [`ElementTable`](super::ElementTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ElementId(pub i32);

impl ElementId {
    pub fn new(id: i32) -> Self {
        ElementId(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }

    /// Slot index in the element table, `None` for negative ids
    pub fn slot(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({})", self.0)
    }
}

impl From<i32> for ElementId {
    fn from(id: i32) -> Self {
        ElementId(id)
    }
}

/// Edge type identifier, the grouping key of vertex adjacency lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EdgeTypeId(pub i32);

impl EdgeTypeId {
    pub fn new(id: i32) -> Self {
        EdgeTypeId(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for EdgeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeTypeId({})", self.0)
    }
}

impl From<i32> for EdgeTypeId {
    fn from(id: i32) -> Self {
        EdgeTypeId(id)
    }
}

/// Property key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct PropertyId(pub i32);

impl PropertyId {
    pub fn new(id: i32) -> Self {
        PropertyId(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({})", self.0)
    }
}

impl From<i32> for PropertyId {
    fn from(id: i32) -> Self {
        PropertyId(id)
    }
}

/// Which side of the latch an access wanted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => write!(f, "read"),
            AccessMode::Write => write!(f, "write"),
        }
    }
}

/// Current time as Unix milliseconds
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_id() {
        let id = ElementId::new(42);
        assert_eq!(id.as_i32(), 42);
        assert_eq!(format!("{}", id), "ElementId(42)");

        let id2: ElementId = 100.into();
        assert_eq!(id2.as_i32(), 100);
    }

    #[test]
    fn test_element_id_slot() {
        assert_eq!(ElementId::new(7).slot(), Some(7));
        assert_eq!(ElementId::new(-1).slot(), None);
    }

    #[test]
    fn test_edge_type_and_property_ids() {
        let edge_type = EdgeTypeId::new(7);
        assert_eq!(edge_type.as_i32(), 7);
        assert_eq!(format!("{}", edge_type), "EdgeTypeId(7)");

        let prop: PropertyId = 3.into();
        assert_eq!(format!("{}", prop), "PropertyId(3)");
    }

    #[test]
    fn test_id_ordering() {
        let id1 = ElementId::new(1);
        let id2 = ElementId::new(2);
        assert!(id1 < id2);
    }
}
