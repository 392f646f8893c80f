//! Property values carried by graph elements
//!
//! Values are opaque to the element model and to persistence: they travel
//! through the value codec in `persistence::codec` without being inspected.
//! Only the property index looks inside, to order its keys.

use super::types::PropertyId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Unix milliseconds
    DateTime(i64),
    Bytes(Vec<u8>),
    Array(Vec<PropertyValue>),
    Null,
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(bytes: Vec<u8>) -> Self {
        PropertyValue::Bytes(bytes)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(values: Vec<PropertyValue>) -> Self {
        PropertyValue::Array(values)
    }
}

/// Properties of one element; at most one value per property id
pub type PropertyMap = HashMap<PropertyId, PropertyValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(PropertyValue::from("hello"), PropertyValue::String("hello".to_string()));
        assert_eq!(PropertyValue::from(42i64), PropertyValue::Integer(42));
        assert_eq!(PropertyValue::from(2.5), PropertyValue::Float(2.5));
        assert_eq!(PropertyValue::from(true), PropertyValue::Boolean(true));
        assert_eq!(PropertyValue::from(vec![1u8, 2]), PropertyValue::Bytes(vec![1, 2]));
        assert_eq!(
            PropertyValue::from(vec![PropertyValue::Null]),
            PropertyValue::Array(vec![PropertyValue::Null])
        );
    }

    #[test]
    fn test_property_map_keeps_one_value_per_id() {
        let mut props = PropertyMap::new();
        props.insert(PropertyId::new(1), "Alice".into());
        let old = props.insert(PropertyId::new(1), "Bob".into());

        assert_eq!(old, Some(PropertyValue::from("Alice")));
        assert_eq!(props.len(), 1);
    }
}
