use crate::path::resolve_path;
use crate::{Condition, FieldPath, Filter, PathTarget, TypedQuery};
use rdf_mapper_common::error::{ContractError, ValidationError};
use rdf_mapper_model::Value;
use rdf_mapper_schema::{
    parse_boolean, PropertyKind, ResolveError, ResolvedProperty, ScalarType, Schema,
};
use regex::Regex;
use serde_json::{Map, Value as Json};

/// The operators a filter may use.
pub const OPERATORS: [&str; 13] = [
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$all", "$nall", "$regex",
    "$iregex", "$exists",
];

/// Validates untyped filter objects against a [Schema] and casts their operands.
///
/// Problems with the query itself are collected as [ValidationError]s so that a caller can
/// report all of them at once. Only misuse of the schema (e.g. walking through a scalar
/// property) aborts the validation with a [ContractError].
#[derive(Debug, Clone, Copy)]
pub struct QueryValidator<'schema> {
    schema: &'schema Schema,
}

impl<'schema> QueryValidator<'schema> {
    pub fn new(schema: &'schema Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'schema Schema {
        self.schema
    }

    /// Validates `raw` as a filter on records of `type_name`.
    ///
    /// The returned query only contains the filters that could be cast; it should not be
    /// compiled unless the error list is empty.
    pub fn validate(
        &self,
        type_name: &str,
        raw: &Json,
    ) -> Result<(TypedQuery, Vec<ValidationError>), ContractError> {
        self.schema.type_descriptor(type_name)?;
        let mut query = TypedQuery::all(type_name);
        let mut errors = Vec::new();
        match raw {
            Json::Null => {}
            Json::Object(object) => {
                for (key, value) in object {
                    if let Some(filter) = self.validate_key(type_name, key, value, &mut errors)? {
                        query.filters.push(filter);
                    }
                }
            }
            other => errors.push(ValidationError::new(
                "",
                format!("expected a filter object, got {other}"),
            )),
        }
        Ok((query, errors))
    }

    fn validate_key(
        &self,
        type_name: &str,
        key: &str,
        raw: &Json,
        errors: &mut Vec<ValidationError>,
    ) -> Result<Option<Filter>, ContractError> {
        let (path, property) = match resolve_path(self.schema, type_name, key) {
            Ok(resolved) => resolved,
            Err(ResolveError::Contract(error)) => return Err(error),
            Err(error) => {
                errors.push(ValidationError::new(key, error.to_string()));
                return Ok(None);
            }
        };

        // `author: "u1"` is short for `author._id: "u1"`.
        let (path, property) = match property {
            Some(property) if property.is_relation() && is_identifier(raw) => {
                (path.into_id_path(), None)
            }
            property => (path, property),
        };

        let error_count = errors.len();
        let operand = Operand {
            schema: self.schema,
            path: &path,
            property,
        };
        let conditions = match operators(raw) {
            Ok(Some(operators)) => operators
                .iter()
                .filter_map(|(operator, value)| {
                    operand.condition(key, operator, value, errors)
                })
                .collect(),
            Ok(None) => operand
                .cast(raw)
                .map_err(|message| errors.push(ValidationError::new(key, message)))
                .map(|value| vec![Condition::Eq(value)])
                .unwrap_or_default(),
            Err(message) => {
                errors.push(ValidationError::new(key, message));
                Vec::new()
            }
        };

        if errors.len() > error_count {
            return Ok(None);
        }
        Ok(Some(Filter { path, conditions }))
    }
}

/// Returns the operator object of a filter value, or `None` for an implicit `$eq`.
fn operators(raw: &Json) -> Result<Option<&Map<String, Json>>, String> {
    let Json::Object(object) = raw else {
        return Ok(None);
    };
    let operators = object.keys().filter(|key| key.starts_with('$')).count();
    if operators == 0 {
        Ok(None)
    } else if operators == object.len() {
        Ok(Some(object))
    } else {
        Err("operators cannot be mixed with plain values".to_owned())
    }
}

fn is_identifier(raw: &Json) -> bool {
    matches!(raw, Json::String(_) | Json::Number(_))
}

/// The path an operand is compared with.
struct Operand<'query, 'schema> {
    schema: &'schema Schema,
    path: &'query FieldPath,
    property: Option<ResolvedProperty<'schema>>,
}

impl Operand<'_, '_> {
    fn condition(
        &self,
        key: &str,
        operator: &str,
        raw: &Json,
        errors: &mut Vec<ValidationError>,
    ) -> Option<Condition> {
        let mut fail = |message: String| {
            errors.push(ValidationError::new(key, message));
            None
        };
        if !OPERATORS.contains(&operator) {
            return fail(format!("unknown operator '{operator}'"));
        }
        if let Some(message) = self.unsupported(operator) {
            return fail(message);
        }

        match operator {
            "$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte" => {
                let value = match self.cast(raw) {
                    Ok(value) => value,
                    Err(message) => return fail(message),
                };
                Some(match operator {
                    "$eq" => Condition::Eq(value),
                    "$ne" => Condition::Ne(value),
                    "$gt" => Condition::Gt(value),
                    "$gte" => Condition::Gte(value),
                    "$lt" => Condition::Lt(value),
                    _ => Condition::Lte(value),
                })
            }
            "$in" | "$nin" | "$all" | "$nall" => {
                let Json::Array(elements) = raw else {
                    return fail(format!("{operator} expects an array, got {raw}"));
                };
                let mut values = Vec::with_capacity(elements.len());
                for (index, element) in elements.iter().enumerate() {
                    match self.cast(element) {
                        Ok(value) => values.push(value),
                        Err(message) => {
                            errors.push(ValidationError::new(format!("{key}.{index}"), message));
                        }
                    }
                }
                if values.len() < elements.len() {
                    return None;
                }
                Some(match operator {
                    "$in" => Condition::In(values),
                    "$nin" => Condition::Nin(values),
                    "$all" => Condition::All(values),
                    _ => Condition::Nall(values),
                })
            }
            "$regex" | "$iregex" => {
                let Json::String(pattern) = raw else {
                    return fail(format!("{operator} expects a pattern string, got {raw}"));
                };
                if let Err(error) = Regex::new(pattern) {
                    return fail(format!("invalid pattern: {error}"));
                }
                Some(if operator == "$regex" {
                    Condition::Regex(pattern.clone())
                } else {
                    Condition::IRegex(pattern.clone())
                })
            }
            _ => match parse_boolean(raw) {
                Some(exists) => Some(Condition::Exists(exists)),
                None => fail(format!("$exists expects a boolean, got {raw}")),
            },
        }
    }

    /// Checks whether `operator` can be applied to the path at all.
    fn unsupported(&self, operator: &str) -> Option<String> {
        let item = self.path.value_kind().map(PropertyKind::item);
        let supported = match (self.path.target(), operator) {
            (PathTarget::Id | PathTarget::Type, "$eq" | "$ne" | "$in" | "$nin") => true,
            (PathTarget::Id | PathTarget::Type, _) => false,
            (PathTarget::Value, "$gt" | "$gte" | "$lt" | "$lte") => {
                matches!(item, Some(PropertyKind::Scalar(_)))
            }
            (PathTarget::Value, "$regex" | "$iregex") => {
                matches!(item, Some(PropertyKind::Scalar(ScalarType::String)))
            }
            (PathTarget::Value, "$all" | "$nall") => self
                .path
                .value_kind()
                .is_some_and(PropertyKind::is_array),
            (PathTarget::Value, _) => true,
        };
        (!supported).then(|| format!("{operator} cannot be applied to '{}'", self.path))
    }

    /// Casts a single operand to the type of the path.
    fn cast(&self, raw: &Json) -> Result<Value, String> {
        match self.path.target() {
            PathTarget::Id => match raw {
                Json::String(id) if !id.is_empty() => Ok(Value::String(id.clone())),
                Json::Number(id) => Ok(Value::String(id.to_string())),
                _ => Err(format!("expected an identifier, got {raw}")),
            },
            PathTarget::Type => match raw {
                Json::String(type_name) if self.schema.get(type_name).is_some() => {
                    Ok(Value::String(type_name.clone()))
                }
                Json::String(type_name) => Err(format!("unknown type '{type_name}'")),
                _ => Err(format!("expected a type name, got {raw}")),
            },
            PathTarget::Value => match &self.property {
                Some(property) => property.cast_item(self.schema, raw),
                None => Err(format!("'{}' has no values", self.path)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_schema::blog;
    use insta::assert_snapshot;
    use rdf_mapper_common::error::ValidationErrors;
    use rdf_mapper_model::Reference;
    use serde_json::json;

    fn validate(type_name: &str, raw: Json) -> (TypedQuery, Vec<ValidationError>) {
        let schema = blog();
        QueryValidator::new(&schema).validate(type_name, &raw).unwrap()
    }

    #[test]
    fn operands_are_cast_to_native_values() {
        let (query, errors) = validate(
            "BlogPost",
            json!({
                "ratting": {"$gt": "3", "$lte": 8.126},
                "published": "yes",
                "title": {"$iregex": "^hello"},
            }),
        );
        assert!(errors.is_empty());
        assert_snapshot!(query, @r#"BlogPost {"published":{"$eq":true},"ratting":{"$gt":3.0,"$lte":8.13},"title":{"$iregex":"^hello"}}"#);
    }

    #[test]
    fn every_invalid_key_is_reported() {
        let (_, errors) = validate(
            "BlogPost",
            json!({
                "ratting": {"$gt": "many"},
                "nope": 1,
                "title": {"$near": 3},
                "tags": {"$in": ["a", 2, "c", false]},
                "published": {"$exists": "perhaps"},
            }),
        );
        assert_snapshot!(ValidationErrors::new(errors), @r#"
        Validation failed with 6 error(s):
        - nope: unknown property 'nope'
        - published: $exists expects a boolean, got "perhaps"
        - ratting: expected a number, got "many"
        - tags.1: expected a string, got 2
        - tags.3: expected a string, got false
        - title: unknown operator '$near'
        "#);
    }

    #[test]
    fn relation_shorthand_compares_identifiers() {
        let (query, errors) = validate("BlogPost", json!({"author": "u1"}));
        assert!(errors.is_empty());
        assert_eq!(query.filters[0].path.to_string(), "author._id");
        assert_eq!(
            query.filters[0].conditions,
            vec![Condition::Eq(Value::String("u1".to_owned()))]
        );
    }

    #[test]
    fn relation_operands_are_references() {
        let (query, errors) = validate("BlogPost", json!({"author": {"$in": ["u1", "u2"]}}));
        assert!(errors.is_empty());
        assert_eq!(
            query.filters[0].conditions,
            vec![Condition::In(vec![
                Value::Reference(Reference::new("u1", "User")),
                Value::Reference(Reference::new("u2", "User")),
            ])]
        );
    }

    #[test]
    fn nested_paths_are_validated_against_the_related_type() {
        let (query, errors) = validate(
            "Comment",
            json!({"post.author.name": {"$regex": "^J"}, "post.author.age": "old"}),
        );
        assert_eq!(
            errors,
            vec![ValidationError::new("post.author.age", "unknown property 'age'")]
        );
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.filters[0].path.segments().len(), 3);
    }

    #[test]
    fn traversing_a_scalar_is_a_contract_error() {
        let schema = blog();
        let error = QueryValidator::new(&schema)
            .validate("BlogPost", &json!({"title.length": 3}))
            .unwrap_err();
        assert_eq!(
            error,
            ContractError::NotARelation {
                path: "title.length".to_owned(),
                segment: "title".to_owned(),
            }
        );
    }

    #[test]
    fn identifiers_and_types_pass_through() {
        let (query, errors) = validate(
            "Content",
            json!({"_id": {"$in": ["a", "b"]}, "_type": "BlogPost"}),
        );
        assert!(errors.is_empty());
        assert_eq!(query.identity_lookup(), None);
        assert_snapshot!(query, @r#"Content {"_id":{"$in":["a","b"]},"_type":{"$eq":"BlogPost"}}"#);
    }

    #[test]
    fn identity_lookups_intersect() {
        let (query, _) = validate("BlogPost", json!({"_id": {"$in": ["b", "a", "c"], "$eq": "a"}}));
        assert_eq!(query.identity_lookup(), Some(vec!["a".to_owned()]));
    }

    #[test]
    fn array_operators_need_array_properties() {
        let (_, errors) = validate("BlogPost", json!({"title": {"$all": ["a"]}}));
        assert_eq!(
            errors,
            vec![ValidationError::new(
                "title",
                "$all cannot be applied to 'title'"
            )]
        );
    }

    #[test]
    fn mixed_operator_objects_are_rejected() {
        let (_, errors) = validate("BlogPost", json!({"ratting": {"$gt": 1, "value": 2}}));
        assert_eq!(
            errors,
            vec![ValidationError::new(
                "ratting",
                "operators cannot be mixed with plain values"
            )]
        );
    }

    #[test]
    fn invalid_patterns_are_reported() {
        let (_, errors) = validate("BlogPost", json!({"title": {"$regex": "(unclosed"}}));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("invalid pattern"));
    }

    #[test]
    fn unknown_types_are_contract_errors() {
        let schema = blog();
        let error = QueryValidator::new(&schema)
            .validate("Nope", &json!({}))
            .unwrap_err();
        assert_eq!(error, ContractError::UnknownType("Nope".to_owned()));
    }
}
