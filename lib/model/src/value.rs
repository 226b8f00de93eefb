use crate::{Date, DateTime, ThinResult};
use serde_json::{Map, Number};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The identity of a related record, carried instead of an embedded document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub id: String,
    pub type_name: String,
}

impl Reference {
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
        }
    }

    /// Returns the `{_id, _type}` stub of this reference.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = Map::new();
        object.insert("_id".to_owned(), self.id.clone().into());
        object.insert("_type".to_owned(), self.type_name.clone().into());
        serde_json::Value::Object(object)
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.type_name, self.id)
    }
}

/// A typed value of a document property or of a query operand.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime),
    Reference(Reference),
    Array(Vec<Value>),
}

impl Value {
    /// Parses an ISO 8601 date or date-time.
    ///
    /// Plain dates (`2015-03-01`) are widened to the date-time at midnight of that day.
    pub fn parse_date(value: &str) -> ThinResult<DateTime> {
        let value = value.trim();
        match DateTime::from_str(value) {
            Ok(date_time) => Ok(date_time),
            Err(_) => Ok(DateTime::try_from(Date::from_str(value)?)?),
        }
    }

    /// Returns the string content if this is a [Value::String].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the reference if this is a [Value::Reference].
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// A total order over values used to normalize arrays.
    ///
    /// Numbers compare numerically, strings lexically and references by their id. Values of
    /// different kinds are ordered by kind.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(lhs), Value::String(rhs)) => lhs.cmp(rhs),
            (Value::Number(lhs), Value::Number(rhs)) => lhs.total_cmp(rhs),
            (Value::Boolean(lhs), Value::Boolean(rhs)) => lhs.cmp(rhs),
            (Value::Date(lhs), Value::Date(rhs)) => lhs
                .partial_cmp(rhs)
                .unwrap_or_else(|| lhs.to_string().cmp(&rhs.to_string())),
            (Value::Reference(lhs), Value::Reference(rhs)) => lhs.cmp(rhs),
            (Value::Array(lhs), Value::Array(rhs)) => {
                for (lhs, rhs) in lhs.iter().zip(rhs) {
                    let ordering = lhs.total_cmp(rhs);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                lhs.len().cmp(&rhs.len())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Date(_) => 3,
            Value::Reference(_) => 4,
            Value::Array(_) => 5,
        }
    }

    /// Sorts nested arrays with [Self::total_cmp].
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Value::Array(values) => {
                let mut values = values
                    .into_iter()
                    .map(Value::normalized)
                    .collect::<Vec<_>>();
                values.sort_by(Value::total_cmp);
                Value::Array(values)
            }
            value => value,
        }
    }

    /// Converts the value into its JSON representation. Dates become ISO 8601 strings and
    /// references become `{_id, _type}` stubs.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(value) => serde_json::Value::String(value.clone()),
            Value::Number(value) => Number::from_f64(*value)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Boolean(value) => serde_json::Value::Bool(*value),
            Value::Date(value) => serde_json::Value::String(value.to_string()),
            Value::Reference(reference) => reference.to_json(),
            Value::Array(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(value) => write!(f, "{value:?}"),
            Value::Number(value) => write!(f, "{value}"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Date(value) => write!(f, "{value}"),
            Value::Reference(reference) => write!(f, "{reference}"),
            Value::Array(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<DateTime> for Value {
    fn from(value: DateTime) -> Self {
        Value::Date(value)
    }
}

impl From<Reference> for Value {
    fn from(value: Reference) -> Self {
        Value::Reference(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_dates_and_date_times() {
        let date = Value::parse_date("2015-03-01").unwrap();
        let date_time = Value::parse_date("2015-03-01T00:00:00").unwrap();
        assert_eq!(date, date_time);
        assert!(Value::parse_date("2015-03-01T10:30:00Z").is_ok());
        assert!(Value::parse_date("yesterday").is_err());
    }

    #[test]
    fn normalized_sorts_numbers_numerically() {
        let value = Value::Array(vec![10.0.into(), 9.0.into(), 1.5.into()]).normalized();
        assert_eq!(
            value,
            Value::Array(vec![1.5.into(), 9.0.into(), 10.0.into()])
        );
    }

    #[test]
    fn normalized_sorts_references_by_id() {
        let value = Value::Array(vec![
            Reference::new("b", "Tag").into(),
            Reference::new("a", "Tag").into(),
        ])
        .normalized();
        assert_eq!(
            value,
            Value::Array(vec![
                Reference::new("a", "Tag").into(),
                Reference::new("b", "Tag").into(),
            ])
        );
    }

    #[test]
    fn references_serialize_as_stubs() {
        let json = Value::from(Reference::new("u1", "User")).to_json();
        assert_eq!(json, serde_json::json!({"_id": "u1", "_type": "User"}));
    }
}
