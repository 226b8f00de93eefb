use crate::options::{count_option, options_object, sort_keys};
use crate::path::resolve_path;
use crate::{AggregateOptions, FieldPath, LabelSort, PathTarget, QueryValidator};
use rdf_mapper_common::error::{ContractError, ValidationError};
use rdf_mapper_schema::{PropertyKind, ResolveError, ScalarType};
use serde_json::Value as Json;
use std::fmt::{Display, Formatter};

/// An aggregate function of an [Aggregator] field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    /// Joins the values with `,`.
    Concat,
}

impl AggregateFunction {
    fn from_operator(operator: &str) -> Option<Self> {
        match operator {
            "$count" => Some(Self::Count),
            "$sum" => Some(Self::Sum),
            "$avg" => Some(Self::Avg),
            "$min" => Some(Self::Min),
            "$max" => Some(Self::Max),
            "$concat" => Some(Self::Concat),
            _ => None,
        }
    }
}

impl Display for AggregateFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Count => "$count",
            Self::Sum => "$sum",
            Self::Avg => "$avg",
            Self::Min => "$min",
            Self::Max => "$max",
            Self::Concat => "$concat",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateKind {
    /// The rows are grouped by the values of the path.
    Group(FieldPath),
    /// `path` is `None` for counting the records of a group.
    Apply {
        function: AggregateFunction,
        path: Option<FieldPath>,
    },
}

/// A labelled output column of an aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateField {
    pub label: String,
    pub kind: AggregateKind,
}

/// A validated aggregation: output labels mapped to group keys or aggregate functions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregator {
    pub fields: Vec<AggregateField>,
}

impl Aggregator {
    pub fn field(&self, label: &str) -> Option<&AggregateField> {
        self.fields.iter().find(|field| field.label == label)
    }

    /// The paths the rows are grouped by.
    pub fn group_paths(&self) -> impl Iterator<Item = (&str, &FieldPath)> {
        self.fields.iter().filter_map(|field| match &field.kind {
            AggregateKind::Group(path) => Some((field.label.as_str(), path)),
            AggregateKind::Apply { .. } => None,
        })
    }

    /// Validates the options of an aggregation. Sort keys must be labels of this aggregator.
    pub fn validate_options(&self, raw: &Json) -> (AggregateOptions, Vec<ValidationError>) {
        let mut options = AggregateOptions::default();
        let mut errors = Vec::new();
        let Some(object) = options_object(raw, &["limit", "offset", "sort"], &mut errors) else {
            return (options, errors);
        };

        options.limit = count_option(object, "limit", &mut errors);
        options.offset = count_option(object, "offset", &mut errors).unwrap_or_default();
        for (label, descending) in sort_keys(object, &mut errors) {
            if self.field(&label).is_some() {
                options.sort.push(LabelSort { label, descending });
            } else {
                errors.push(ValidationError::new(
                    "options.sort",
                    format!("unknown label '{label}'"),
                ));
            }
        }
        (options, errors)
    }
}

impl QueryValidator<'_> {
    /// Validates an aggregator object on `type_name`.
    ///
    /// Each label maps either to a property path (`"author.name"`), which groups the rows, or to
    /// an object with a single aggregate operator (`{"$avg": "ratting"}`). `{"$count": true}`
    /// counts the records of each group.
    pub fn validate_aggregator(
        &self,
        type_name: &str,
        raw: &Json,
    ) -> Result<(Aggregator, Vec<ValidationError>), ContractError> {
        self.schema().type_descriptor(type_name)?;
        let mut aggregator = Aggregator::default();
        let mut errors = Vec::new();
        let object = match raw {
            Json::Object(object) if !object.is_empty() => object,
            other => {
                errors.push(ValidationError::new(
                    "aggregator",
                    format!("expected a non-empty object, got {other}"),
                ));
                return Ok((aggregator, errors));
            }
        };

        for (label, value) in object {
            let error_path = format!("aggregator.{label}");
            if !is_label(label) {
                errors.push(ValidationError::new(
                    error_path,
                    "labels may only contain ASCII letters, digits and '_'",
                ));
                continue;
            }
            match self.aggregate_kind(type_name, value) {
                Ok(Ok(kind)) => aggregator.fields.push(AggregateField {
                    label: label.clone(),
                    kind,
                }),
                Ok(Err(message)) => errors.push(ValidationError::new(error_path, message)),
                Err(error) => return Err(error),
            }
        }
        Ok((aggregator, errors))
    }

    fn aggregate_kind(
        &self,
        type_name: &str,
        raw: &Json,
    ) -> Result<Result<AggregateKind, String>, ContractError> {
        match raw {
            Json::String(path) => Ok(self
                .aggregate_path(type_name, path)?
                .map(AggregateKind::Group)),
            Json::Object(object) if object.len() == 1 => {
                let Some((operator, operand)) = object.iter().next() else {
                    return Ok(Err("expected a single aggregate operator".to_owned()));
                };
                let Some(function) = AggregateFunction::from_operator(operator) else {
                    return Ok(Err(format!("unknown aggregate operator '{operator}'")));
                };
                let path = match (function, operand) {
                    (AggregateFunction::Count, Json::Bool(true)) => None,
                    (_, Json::String(path)) => match self.aggregate_path(type_name, path)? {
                        Ok(path) => Some(path),
                        Err(message) => return Ok(Err(message)),
                    },
                    (_, other) => {
                        return Ok(Err(format!("{function} expects a property path, got {other}")))
                    }
                };
                if let Some(path) = &path {
                    if let Some(message) = unsupported(function, path) {
                        return Ok(Err(message));
                    }
                }
                Ok(Ok(AggregateKind::Apply { function, path }))
            }
            other => Ok(Err(format!(
                "expected a property path or an aggregate operator, got {other}"
            ))),
        }
    }

    fn aggregate_path(
        &self,
        type_name: &str,
        path: &str,
    ) -> Result<Result<FieldPath, String>, ContractError> {
        match resolve_path(self.schema(), type_name, path) {
            Ok((path, _)) if path.target() == PathTarget::Type => {
                Ok(Err(format!("cannot aggregate over '{path}'")))
            }
            Ok((path, _)) => Ok(Ok(path)),
            Err(ResolveError::Contract(error)) => Err(error),
            Err(error) => Ok(Err(error.to_string())),
        }
    }
}

fn unsupported(function: AggregateFunction, path: &FieldPath) -> Option<String> {
    let item = path.value_kind().map(PropertyKind::item);
    let supported = match function {
        AggregateFunction::Sum | AggregateFunction::Avg => {
            matches!(item, Some(PropertyKind::Scalar(ScalarType::Number)))
        }
        AggregateFunction::Min | AggregateFunction::Max => {
            matches!(item, Some(PropertyKind::Scalar(_)))
        }
        AggregateFunction::Count | AggregateFunction::Concat => true,
    };
    (!supported).then(|| format!("{function} cannot be applied to '{path}'"))
}

fn is_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|char| char.is_ascii_alphanumeric() || char == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_schema::blog;
    use serde_json::json;

    #[test]
    fn labels_map_to_groups_and_functions() {
        let schema = blog();
        let (aggregator, errors) = QueryValidator::new(&schema)
            .validate_aggregator(
                "BlogPost",
                &json!({
                    "author": "author.name",
                    "posts": {"$count": true},
                    "average": {"$avg": "ratting"},
                }),
            )
            .unwrap();
        assert!(errors.is_empty());
        assert_eq!(aggregator.fields.len(), 3);
        assert_eq!(
            aggregator.group_paths().map(|(label, _)| label).collect::<Vec<_>>(),
            ["author"]
        );
        assert_eq!(
            aggregator.field("posts").unwrap().kind,
            AggregateKind::Apply {
                function: AggregateFunction::Count,
                path: None
            }
        );
    }

    #[test]
    fn invalid_fields_are_reported() {
        let schema = blog();
        let (_, errors) = QueryValidator::new(&schema)
            .validate_aggregator(
                "BlogPost",
                &json!({
                    "a b": "title",
                    "sum": {"$sum": "title"},
                    "median": {"$median": "ratting"},
                    "kind": "_type",
                    "none": "nope",
                }),
            )
            .unwrap();
        let paths = errors
            .iter()
            .map(|error| format!("{}: {}", error.path, error.message))
            .collect::<Vec<_>>();
        assert_eq!(
            paths,
            [
                "aggregator.a b: labels may only contain ASCII letters, digits and '_'",
                "aggregator.kind: cannot aggregate over '_type'",
                "aggregator.median: unknown aggregate operator '$median'",
                "aggregator.none: unknown property 'nope'",
                "aggregator.sum: $sum cannot be applied to 'title'",
            ]
        );
    }

    #[test]
    fn options_sort_by_labels() {
        let schema = blog();
        let (aggregator, _) = QueryValidator::new(&schema)
            .validate_aggregator("BlogPost", &json!({"count": {"$count": true}}))
            .unwrap();
        let (options, errors) =
            aggregator.validate_options(&json!({"sort": "-count,other", "limit": 3}));
        assert_eq!(options.limit, Some(3));
        assert_eq!(
            options.sort,
            vec![LabelSort {
                label: "count".to_owned(),
                descending: true
            }]
        );
        assert_eq!(
            errors,
            vec![ValidationError::new("options.sort", "unknown label 'other'")]
        );
    }
}
