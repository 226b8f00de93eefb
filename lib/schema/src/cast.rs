use crate::{
    Constraints, PropertyKind, ResolvedProperty, ScalarType, Schema, ID_PROPERTY, TYPE_PROPERTY,
};
use rdf_mapper_common::error::ValidationError;
use rdf_mapper_model::{Reference, Value};
use serde_json::Value as Json;

const TRUE_WORDS: [&str; 4] = ["true", "1", "yes", "on"];
const FALSE_WORDS: [&str; 4] = ["false", "0", "no", "off"];

impl ResolvedProperty<'_> {
    /// Casts a raw value into a typed value of this property.
    ///
    /// Array properties accept an array (every element is cast) or a single element, which is
    /// wrapped. Errors of elements carry the element index as their path, errors of the value
    /// itself carry an empty path.
    pub fn cast(&self, schema: &Schema, raw: &Json) -> Result<Value, Vec<ValidationError>> {
        match (self.kind(), raw) {
            (PropertyKind::Array(_), Json::Array(elements)) => {
                let mut values = Vec::with_capacity(elements.len());
                let mut errors = Vec::new();
                for (index, element) in elements.iter().enumerate() {
                    match self.cast_item(schema, element) {
                        Ok(value) => values.push(value),
                        Err(message) => {
                            errors.push(ValidationError::new(index.to_string(), message));
                        }
                    }
                }
                if errors.is_empty() {
                    Ok(Value::Array(values))
                } else {
                    Err(errors)
                }
            }
            (PropertyKind::Array(_), element) => self
                .cast_item(schema, element)
                .map(|value| Value::Array(vec![value]))
                .map_err(|message| vec![ValidationError::new("", message)]),
            (_, Json::Array(_)) => Err(vec![ValidationError::new(
                "",
                format!("expected a single {}, got an array", self.kind().item()),
            )]),
            (_, raw) => self
                .cast_item(schema, raw)
                .map_err(|message| vec![ValidationError::new("", message)]),
        }
    }

    /// Casts a single value of this property: the property value itself or one array element.
    pub fn cast_item(&self, schema: &Schema, raw: &Json) -> Result<Value, String> {
        let unconstrained = Constraints::default();
        let constraints = self.constraints().unwrap_or(&unconstrained);
        match self.kind().item() {
            PropertyKind::Scalar(ScalarType::Number) => cast_number(raw, constraints),
            PropertyKind::Scalar(ScalarType::Boolean) => cast_boolean(raw),
            PropertyKind::Scalar(ScalarType::Date) => cast_date(raw),
            PropertyKind::Scalar(ScalarType::String) => cast_string(raw, constraints),
            PropertyKind::Relation(target) => cast_reference(schema, target, raw),
            PropertyKind::Array(_) => Err("nested arrays are not supported".to_owned()),
        }
    }
}

/// Rounds half away from zero to `precision` decimal places.
pub(crate) fn round(value: f64, precision: u32) -> f64 {
    let factor = 10_f64.powi(i32::try_from(precision).unwrap_or(i32::MAX));
    if !factor.is_finite() {
        return value;
    }
    (value * factor).round() / factor
}

fn cast_number(raw: &Json, constraints: &Constraints) -> Result<Value, String> {
    let number = match raw {
        Json::Number(number) => number.as_f64(),
        Json::String(string) if !string.trim().is_empty() => string.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
    .ok_or_else(|| format!("expected a number, got {raw}"))?;

    let number = match constraints.precision {
        Some(precision) => round(number, precision),
        None => number,
    };
    if let Some(min) = constraints.min {
        if number < min {
            return Err(format!("{number} is less than the minimum {min}"));
        }
    }
    if let Some(max) = constraints.max {
        if number > max {
            return Err(format!("{number} is greater than the maximum {max}"));
        }
    }
    Ok(Value::Number(number))
}

/// Reads a boolean from `true`/`false`, `1`/`0` or one of the words `true`, `yes`, `on`,
/// `false`, `no`, `off` (case-insensitive).
pub fn parse_boolean(raw: &Json) -> Option<bool> {
    match raw {
        Json::Bool(boolean) => Some(*boolean),
        Json::Number(number) => match number.as_f64() {
            Some(value) if value == 1.0 => Some(true),
            Some(value) if value == 0.0 => Some(false),
            _ => None,
        },
        Json::String(string) => {
            let string = string.trim().to_ascii_lowercase();
            if TRUE_WORDS.contains(&string.as_str()) {
                Some(true)
            } else if FALSE_WORDS.contains(&string.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn cast_boolean(raw: &Json) -> Result<Value, String> {
    parse_boolean(raw)
        .map(Value::Boolean)
        .ok_or_else(|| format!("expected a boolean, got {raw}"))
}

fn cast_date(raw: &Json) -> Result<Value, String> {
    let Json::String(string) = raw else {
        return Err(format!("expected a date, got {raw}"));
    };
    Value::parse_date(string)
        .map(Value::Date)
        .map_err(|_| format!("'{string}' is not a valid date"))
}

fn cast_string(raw: &Json, constraints: &Constraints) -> Result<Value, String> {
    let Json::String(string) = raw else {
        return Err(format!("expected a string, got {raw}"));
    };
    let length = string.chars().count();
    if let Some(min_length) = constraints.min_length {
        if length < min_length {
            return Err(format!("must be at least {min_length} characters long"));
        }
    }
    if let Some(max_length) = constraints.max_length {
        if length > max_length {
            return Err(format!("must be at most {max_length} characters long"));
        }
    }
    if let Some(pattern) = &constraints.pattern {
        if !pattern.is_match(string) {
            return Err(format!("'{string}' does not match the pattern {pattern}"));
        }
    }
    if let Some(one_of) = &constraints.one_of {
        if !one_of.contains(string) {
            return Err(format!("'{string}' is not one of {}", one_of.join(", ")));
        }
    }
    Ok(Value::String(string.clone()))
}

/// References are given as a bare id or as a `{_id, _type}` stub. A stub may name a subtype of
/// the relation target; the cast reference always carries the target, which is the type stored
/// references are read back with.
fn cast_reference(schema: &Schema, target: &str, raw: &Json) -> Result<Value, String> {
    match raw {
        Json::String(id) if !id.is_empty() => Ok(Value::Reference(Reference::new(id, target))),
        Json::Object(object) => {
            let Some(Json::String(id)) = object.get(ID_PROPERTY) else {
                return Err(format!("a reference to '{target}' needs a string '{ID_PROPERTY}'"));
            };
            let type_name = match object.get(TYPE_PROPERTY) {
                None => target,
                Some(Json::String(type_name)) => type_name.as_str(),
                Some(other) => return Err(format!("expected a type name, got {other}")),
            };
            match schema.get(type_name) {
                Some(descriptor) if descriptor.is_a(target) => {
                    Ok(Value::Reference(Reference::new(id.as_str(), target)))
                }
                Some(_) => Err(format!("'{type_name}' is not a '{target}'")),
                None => Err(format!("unknown type '{type_name}'")),
            }
        }
        _ => Err(format!("expected a reference to '{target}', got {raw}")),
    }
}

#[cfg(test)]
mod tests {
    use super::round;
    use crate::{Schema, SchemaOptions};
    use rdf_mapper_common::error::ValidationError;
    use rdf_mapper_model::{BaseIriMapping, Reference, Value};
    use serde_json::json;
    use std::sync::Arc;

    fn schema() -> Schema {
        Schema::from_json(
            json!({
                "User": {
                    "properties": {
                        "name": {"type": "string", "validate": {"minLength": 2, "maxLength": 8}},
                        "role": {"type": "string", "validate": {"oneOf": ["admin", "editor"]}},
                        "email": {"type": "string", "validate": {"pattern": "^[^@]+@[^@]+$"}},
                        "active": "boolean",
                        "born": "date",
                        "score": {"type": "number", "validate": {"precision": 2, "min": 0, "max": 100}},
                        "nicknames": {"type": "array", "items": "string"},
                        "friends": {"type": "array", "items": "User"}
                    }
                },
                "Admin": {"mixins": ["User"]},
                "Post": {"properties": {"author": "User"}}
            }),
            Arc::new(BaseIriMapping::default()),
            SchemaOptions::default(),
        )
        .unwrap()
    }

    fn cast(type_name: &str, path: &str, raw: serde_json::Value) -> Result<Value, String> {
        let schema = schema();
        let property = schema.resolve_property(type_name, path).unwrap();
        property.cast_item(&schema, &raw)
    }

    #[test]
    fn numbers_are_rounded_to_their_precision() {
        assert_eq!(cast("User", "score", json!(2.434)), Ok(Value::Number(2.43)));
        assert_eq!(cast("User", "score", json!(2.436)), Ok(Value::Number(2.44)));
        assert_eq!(cast("User", "score", json!("7")), Ok(Value::Number(7.0)));
        assert_eq!(round(-2.5, 0), -3.0);
    }

    #[test]
    fn numbers_respect_bounds() {
        assert_eq!(
            cast("User", "score", json!(-1)),
            Err("-1 is less than the minimum 0".to_owned())
        );
        assert_eq!(
            cast("User", "score", json!(100.001)),
            Ok(Value::Number(100.0))
        );
        assert!(cast("User", "score", json!("abc")).is_err());
        assert!(cast("User", "score", json!(true)).is_err());
    }

    #[test]
    fn booleans_accept_common_spellings() {
        for raw in [json!(true), json!("Yes"), json!("on"), json!("1"), json!(1)] {
            assert_eq!(cast("User", "active", raw), Ok(Value::Boolean(true)));
        }
        for raw in [json!(false), json!("NO"), json!("off"), json!("0"), json!(0)] {
            assert_eq!(cast("User", "active", raw), Ok(Value::Boolean(false)));
        }
        assert!(cast("User", "active", json!("maybe")).is_err());
        assert!(cast("User", "active", json!(2)).is_err());
    }

    #[test]
    fn dates_accept_dates_and_date_times() {
        let date = cast("User", "born", json!("2015-03-01")).unwrap();
        let date_time = cast("User", "born", json!("2015-03-01T00:00:00")).unwrap();
        assert_eq!(date, date_time);
        assert!(cast("User", "born", json!("yesterday")).is_err());
        assert!(cast("User", "born", json!(12)).is_err());
    }

    #[test]
    fn strings_are_checked_against_constraints() {
        assert_eq!(
            cast("User", "name", json!("Ann")),
            Ok(Value::String("Ann".to_owned()))
        );
        assert_eq!(
            cast("User", "name", json!("A")),
            Err("must be at least 2 characters long".to_owned())
        );
        assert!(cast("User", "name", json!("Bartholomew")).is_err());
        assert!(cast("User", "role", json!("guest")).is_err());
        assert!(cast("User", "email", json!("nobody")).is_err());
        assert!(cast("User", "name", json!(12)).is_err());
    }

    #[test]
    fn references_accept_ids_and_stubs() {
        assert_eq!(
            cast("Post", "author", json!("u1")),
            Ok(Value::Reference(Reference::new("u1", "User")))
        );
        assert_eq!(
            cast("Post", "author", json!({"_id": "a1", "_type": "Admin"})),
            Ok(Value::Reference(Reference::new("a1", "User")))
        );
        assert_eq!(
            cast("Post", "author", json!({"_id": "p1", "_type": "Post"})),
            Err("'Post' is not a 'User'".to_owned())
        );
        assert!(cast("Post", "author", json!({"_type": "User"})).is_err());
    }

    #[test]
    fn arrays_cast_every_element() {
        let schema = schema();
        let nicknames = schema.resolve_property("User", "nicknames").unwrap();
        assert_eq!(
            nicknames.cast(&schema, &json!("Al")),
            Ok(Value::Array(vec![Value::String("Al".to_owned())]))
        );

        let friends = schema.resolve_property("User", "friends").unwrap();
        assert_eq!(
            friends.cast(&schema, &json!(["u1", 3])),
            Err(vec![ValidationError::new(
                "1",
                "expected a reference to 'User', got 3"
            )])
        );

        let name = schema.resolve_property("User", "name").unwrap();
        assert_eq!(
            name.cast(&schema, &json!(["a", "b"])),
            Err(vec![ValidationError::new(
                "",
                "expected a single string, got an array"
            )])
        );
    }
}
