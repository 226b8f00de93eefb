use crate::{Reference, Value};
use serde_json::Map;
use std::collections::BTreeMap;

/// A materialized record: its identity, its type and its property values.
///
/// Array-valued properties are never stored as empty arrays; a property without any value is
/// absent from the document.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    id: String,
    type_name: String,
    properties: BTreeMap<String, Value>,
}

impl Document {
    /// Creates an empty document.
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// The identifier of the record (`_id`).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The type of the record (`_type`).
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns a `{_id, _type}` reference to this record.
    pub fn reference(&self) -> Reference {
        Reference::new(self.id.clone(), self.type_name.clone())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.properties.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Iterates over the properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Sorts every array and removes empty arrays, so that two documents holding the same values
    /// compare equal regardless of the order of their array elements.
    #[must_use]
    pub fn normalized(self) -> Self {
        let properties = self
            .properties
            .into_iter()
            .filter(|(_, value)| !matches!(value, Value::Array(values) if values.is_empty()))
            .map(|(name, value)| (name, value.normalized()))
            .collect();
        Self {
            id: self.id,
            type_name: self.type_name,
            properties,
        }
    }

    /// Keeps only the given properties. `_id` and `_type` are always kept.
    #[must_use]
    pub fn project(mut self, fields: &[String]) -> Self {
        self.properties
            .retain(|name, _| fields.iter().any(|field| field == name));
        self
    }

    /// Converts the document into a JSON object with `_id` and `_type` keys.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = Map::new();
        object.insert("_id".to_owned(), self.id.clone().into());
        object.insert("_type".to_owned(), self.type_name.clone().into());
        for (name, value) in &self.properties {
            object.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(object)
    }
}
