use crate::path::resolve_path;
use crate::{FieldPath, PathTarget, QueryValidator};
use rdf_mapper_common::error::{ContractError, ValidationError};
use rdf_mapper_schema::{ResolveError, TypeDescriptor, ID_PROPERTY, TYPE_PROPERTY};
use serde_json::{Map, Value as Json};

/// A sort key of a find query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub path: FieldPath,
    pub descending: bool,
}

/// The result-set constraints of a find query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindOptions {
    pub limit: Option<usize>,
    pub offset: usize,
    pub sort: Vec<SortKey>,
    /// The properties materialized for each record. All of them if `None`.
    pub fields: Option<Vec<String>>,
    pub distinct: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            limit: None,
            offset: 0,
            sort: Vec::new(),
            fields: None,
            distinct: true,
        }
    }
}

/// A sort key of an aggregation, referring to one of its labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSort {
    pub label: String,
    pub descending: bool,
}

/// The result-set constraints of an aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    pub limit: Option<usize>,
    pub offset: usize,
    pub sort: Vec<LabelSort>,
}

const FIND_OPTIONS: [&str; 5] = ["limit", "offset", "sort", "fields", "distinct"];

impl QueryValidator<'_> {
    /// Validates the options of a find query on `type_name`.
    ///
    /// `sort` is either a comma separated string (`"-ratting,title"`) or a list of keys; a
    /// leading `-` sorts descending.
    pub fn validate_options(
        &self,
        type_name: &str,
        raw: &Json,
    ) -> Result<(FindOptions, Vec<ValidationError>), ContractError> {
        let descriptor = self.schema().type_descriptor(type_name)?;
        let mut options = FindOptions::default();
        let mut errors = Vec::new();
        let Some(object) = options_object(raw, &FIND_OPTIONS, &mut errors) else {
            return Ok((options, errors));
        };

        options.limit = count_option(object, "limit", &mut errors);
        options.offset = count_option(object, "offset", &mut errors).unwrap_or_default();

        for (key, descending) in sort_keys(object, &mut errors) {
            match resolve_path(self.schema(), type_name, &key) {
                Ok((path, _)) if path.target() == PathTarget::Type => errors.push(
                    ValidationError::new("options.sort", format!("cannot sort by '{key}'")),
                ),
                Ok((path, _)) => options.sort.push(SortKey { path, descending }),
                Err(ResolveError::Contract(error)) => return Err(error),
                Err(error) => errors.push(ValidationError::new("options.sort", error.to_string())),
            }
        }

        match object.get("fields") {
            None => {}
            Some(Json::Array(fields)) => {
                options.fields = Some(projected_fields(descriptor, fields, &mut errors));
            }
            Some(other) => errors.push(ValidationError::new(
                "options.fields",
                format!("expected a list of property names, got {other}"),
            )),
        }

        match object.get("distinct") {
            None => {}
            Some(Json::Bool(distinct)) => options.distinct = *distinct,
            Some(other) => errors.push(ValidationError::new(
                "options.distinct",
                format!("expected a boolean, got {other}"),
            )),
        }

        Ok((options, errors))
    }
}

/// Checks `fields` against the forward properties of `descriptor`.
fn projected_fields(
    descriptor: &TypeDescriptor,
    fields: &[Json],
    errors: &mut Vec<ValidationError>,
) -> Vec<String> {
    let mut names = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let path = format!("options.fields.{index}");
        let Json::String(name) = field else {
            errors.push(ValidationError::new(
                path,
                format!("expected a property name, got {field}"),
            ));
            continue;
        };
        if name == ID_PROPERTY || name == TYPE_PROPERTY {
            continue;
        }
        match descriptor.property(name) {
            Some(property) if property.is_inverse() => errors.push(ValidationError::new(
                path,
                format!("the inverse relationship '{name}' cannot be projected"),
            )),
            Some(_) => names.push(name.clone()),
            None => errors.push(ValidationError::new(
                path,
                format!("unknown property '{name}'"),
            )),
        }
    }
    names
}

pub(crate) fn options_object<'raw>(
    raw: &'raw Json,
    allowed: &[&str],
    errors: &mut Vec<ValidationError>,
) -> Option<&'raw Map<String, Json>> {
    let object = match raw {
        Json::Null => return None,
        Json::Object(object) => object,
        other => {
            errors.push(ValidationError::new(
                "options",
                format!("expected an options object, got {other}"),
            ));
            return None;
        }
    };
    for key in object.keys() {
        if !allowed.contains(&key.as_str()) {
            errors.push(ValidationError::new(
                format!("options.{key}"),
                "unknown option",
            ));
        }
    }
    Some(object)
}

pub(crate) fn count_option(
    object: &Map<String, Json>,
    key: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<usize> {
    let raw = object.get(key)?;
    let count = match raw {
        Json::Number(number) => number.as_u64(),
        Json::String(string) => string.trim().parse::<u64>().ok(),
        _ => None,
    }
    .and_then(|count| usize::try_from(count).ok());
    if count.is_none() {
        errors.push(ValidationError::new(
            format!("options.{key}"),
            format!("expected a non-negative integer, got {raw}"),
        ));
    }
    count
}

/// Reads `sort` as `(key, descending)` pairs.
pub(crate) fn sort_keys(
    object: &Map<String, Json>,
    errors: &mut Vec<ValidationError>,
) -> Vec<(String, bool)> {
    let entries = match object.get("sort") {
        None => return Vec::new(),
        Some(Json::String(keys)) => keys.split(',').map(str::to_owned).collect::<Vec<_>>(),
        Some(Json::Array(keys)) => {
            let mut entries = Vec::new();
            for key in keys {
                match key {
                    Json::String(key) => entries.push(key.clone()),
                    other => errors.push(ValidationError::new(
                        "options.sort",
                        format!("expected a sort key, got {other}"),
                    )),
                }
            }
            entries
        }
        Some(other) => {
            errors.push(ValidationError::new(
                "options.sort",
                format!("expected a string or a list of sort keys, got {other}"),
            ));
            return Vec::new();
        }
    };

    entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.strip_prefix('-') {
            Some(key) => (key.to_owned(), true),
            None => (entry.strip_prefix('+').unwrap_or(entry).to_owned(), false),
        })
        .collect()
}
