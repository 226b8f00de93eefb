use crate::FieldPath;
use rdf_mapper_model::Value;
use serde_json::{Map, Value as Json};
use std::fmt::{Display, Formatter};

/// A single cast comparison of a [Filter].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    /// Every operand is among the values.
    All(Vec<Value>),
    /// No operand is among the values.
    Nall(Vec<Value>),
    Regex(String),
    IRegex(String),
    Exists(bool),
}

impl Condition {
    /// The operator name, including the `$` prefix.
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Eq(_) => "$eq",
            Condition::Ne(_) => "$ne",
            Condition::Gt(_) => "$gt",
            Condition::Gte(_) => "$gte",
            Condition::Lt(_) => "$lt",
            Condition::Lte(_) => "$lte",
            Condition::In(_) => "$in",
            Condition::Nin(_) => "$nin",
            Condition::All(_) => "$all",
            Condition::Nall(_) => "$nall",
            Condition::Regex(_) => "$regex",
            Condition::IRegex(_) => "$iregex",
            Condition::Exists(_) => "$exists",
        }
    }

    /// Whether the condition compares the values bound by the path, as opposed to testing the
    /// existence of a sub-pattern.
    pub fn binds_value(&self) -> bool {
        !matches!(
            self,
            Condition::All(_) | Condition::Nall(_) | Condition::Exists(_)
        )
    }

    fn operand_json(&self) -> Json {
        match self {
            Condition::Eq(value)
            | Condition::Ne(value)
            | Condition::Gt(value)
            | Condition::Gte(value)
            | Condition::Lt(value)
            | Condition::Lte(value) => value.to_json(),
            Condition::In(values)
            | Condition::Nin(values)
            | Condition::All(values)
            | Condition::Nall(values) => Json::Array(values.iter().map(Value::to_json).collect()),
            Condition::Regex(pattern) | Condition::IRegex(pattern) => Json::String(pattern.clone()),
            Condition::Exists(exists) => Json::Bool(*exists),
        }
    }
}

/// The conditions on one path. All of them must hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub path: FieldPath,
    pub conditions: Vec<Condition>,
}

/// A validated query: the conjunction of its filters.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedQuery {
    pub type_name: String,
    pub filters: Vec<Filter>,
}

impl TypedQuery {
    /// A query matching every record of `type_name`.
    pub fn all(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            filters: Vec::new(),
        }
    }

    /// Returns the identifiers a query is restricted to if it only filters the record
    /// identifier with `$eq` or `$in`. Several conditions intersect.
    pub fn identity_lookup(&self) -> Option<Vec<String>> {
        if self.filters.is_empty() {
            return None;
        }
        let mut ids: Option<Vec<String>> = None;
        for filter in &self.filters {
            if !filter.path.is_root_id() {
                return None;
            }
            for condition in &filter.conditions {
                let candidates = match condition {
                    Condition::Eq(value) => vec![value.as_str()?.to_owned()],
                    Condition::In(values) => values
                        .iter()
                        .map(|value| value.as_str().map(str::to_owned))
                        .collect::<Option<Vec<_>>>()?,
                    _ => return None,
                };
                ids = Some(match ids {
                    None => candidates,
                    Some(ids) => ids
                        .into_iter()
                        .filter(|id| candidates.contains(id))
                        .collect(),
                });
            }
        }
        ids.map(|mut ids| {
            ids.sort();
            ids.dedup();
            ids
        })
    }

    /// Renders the cast query as a filter object.
    pub fn to_json(&self) -> Json {
        let mut object = Map::new();
        for filter in &self.filters {
            let operators = filter
                .conditions
                .iter()
                .map(|condition| (condition.operator().to_owned(), condition.operand_json()))
                .collect::<Map<_, _>>();
            match object.get_mut(&filter.path.to_string()) {
                Some(Json::Object(existing)) => existing.extend(operators),
                _ => {
                    object.insert(filter.path.to_string(), Json::Object(operators));
                }
            }
        }
        Json::Object(object)
    }
}

impl Display for TypedQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.type_name, self.to_json())
    }
}
