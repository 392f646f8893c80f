//! B-Tree based property index
//!
//! Maps the scalar values of one property to the elements carrying them.

use super::{Index, IndexError, IndexFactory, IndexResult};
use crate::graph::{ElementId, ElementTable, GraphResult, PropertyId, PropertyValue};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};

/// Orderable form of the property values an index can hold
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexKey {
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl IndexKey {
    /// `None` for values that are not indexable (floats, bytes, arrays, null)
    pub fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Boolean(b) => Some(IndexKey::Boolean(*b)),
            PropertyValue::Integer(i) | PropertyValue::DateTime(i) => Some(IndexKey::Integer(*i)),
            PropertyValue::String(s) => Some(IndexKey::String(s.clone())),
            _ => None,
        }
    }
}

/// Index for a specific property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyIndex {
    property: PropertyId,
    /// Value -> set of element ids
    index: BTreeMap<IndexKey, BTreeSet<ElementId>>,
}

impl PropertyIndex {
    pub fn new(property: PropertyId) -> Self {
        Self {
            property,
            index: BTreeMap::new(),
        }
    }

    /// Index every element of `table` that carries the property
    pub fn build(property: PropertyId, table: &ElementTable) -> GraphResult<Self> {
        let mut index = Self::new(property);
        for element in table.iter() {
            if let Some(value) = element.get_property(property)? {
                index.insert(&value, element.id());
            }
        }
        Ok(index)
    }

    pub fn property(&self) -> PropertyId {
        self.property
    }

    /// Returns false if the value is not indexable
    pub fn insert(&mut self, value: &PropertyValue, id: ElementId) -> bool {
        match IndexKey::from_value(value) {
            Some(key) => {
                self.index.entry(key).or_default().insert(id);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, value: &PropertyValue, id: ElementId) {
        let Some(key) = IndexKey::from_value(value) else {
            return;
        };
        if let Some(ids) = self.index.get_mut(&key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.index.remove(&key);
            }
        }
    }

    pub fn get(&self, value: &PropertyValue) -> Vec<ElementId> {
        IndexKey::from_value(value)
            .and_then(|key| self.index.get(&key))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn range<R>(&self, range: R) -> Vec<ElementId>
    where
        R: std::ops::RangeBounds<IndexKey>,
    {
        self.index
            .range(range)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Number of distinct indexed values
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Index for PropertyIndex {
    fn save(&self, writer: &mut dyn Write) -> IndexResult<()> {
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "property"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Restores every index file as a [`PropertyIndex`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyIndexFactory;

impl IndexFactory for PropertyIndexFactory {
    fn restore(&self, name: &str, reader: &mut dyn Read) -> IndexResult<Box<dyn Index>> {
        let index: PropertyIndex = bincode::deserialize_from(reader).map_err(|e| match *e {
            bincode::ErrorKind::Io(io) => IndexError::Io(io),
            _ => IndexError::Unknown(format!("{}: {}", name, e)),
        })?;
        Ok(Box::new(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Element, Vertex};
    use std::io::Cursor;
    use std::ops::Bound;

    #[test]
    fn test_property_index_ops() {
        let mut index = PropertyIndex::new(PropertyId::new(1));
        let n1 = ElementId::new(1);
        let n2 = ElementId::new(2);
        let val = PropertyValue::Integer(100);

        assert!(index.insert(&val, n1));
        assert!(index.insert(&val, n2));
        assert!(!index.insert(&PropertyValue::Float(1.0), n1));

        let results = index.get(&val);
        assert_eq!(results, vec![n1, n2]);

        index.remove(&val, n1);
        assert_eq!(index.get(&val), vec![n2]);
        index.remove(&val, n2);
        assert!(index.is_empty());
    }

    #[test]
    fn test_property_index_range() {
        let mut index = PropertyIndex::new(PropertyId::new(1));
        for i in 1..=10 {
            index.insert(&PropertyValue::Integer(i), ElementId::new(i as i32));
        }

        let range = (
            Bound::Included(IndexKey::Integer(3)),
            Bound::Included(IndexKey::Integer(7)),
        );
        let results = index.range(range);
        assert_eq!(results.len(), 5);
        for i in 3..=7 {
            assert!(results.contains(&ElementId::new(i)));
        }
    }

    #[test]
    fn test_build_from_table() {
        let mut table = ElementTable::new();
        for i in 0..4 {
            let vertex = Vertex::new(ElementId::new(i), 0);
            if i % 2 == 0 {
                vertex.set_property(PropertyId::new(9), "even").unwrap();
            }
            table.insert(vertex.into()).unwrap();
        }
        let index = PropertyIndex::build(PropertyId::new(9), &table).unwrap();
        assert_eq!(
            index.get(&PropertyValue::from("even")),
            vec![ElementId::new(0), ElementId::new(2)]
        );
    }

    #[test]
    fn test_save_and_restore_through_factory() {
        let mut index = PropertyIndex::new(PropertyId::new(4));
        index.insert(&PropertyValue::from("x"), ElementId::new(3));

        let mut bytes = Vec::new();
        index.save(&mut bytes).unwrap();

        let restored = PropertyIndexFactory
            .restore("by_x", &mut Cursor::new(bytes))
            .unwrap();
        assert_eq!(restored.kind(), "property");
        let restored = restored.as_any().downcast_ref::<PropertyIndex>().unwrap();
        assert_eq!(restored, &index);
    }
}
