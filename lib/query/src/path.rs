use rdf_mapper_common::error::ContractError;
use rdf_mapper_model::NamedNode;
use rdf_mapper_schema::{
    PropertyKind, ResolveError, ResolvedProperty, Schema, ID_PROPERTY, TYPE_PROPERTY,
};
use std::fmt::{Display, Formatter};

/// The direction in which an edge is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `(previous, iri, next)`
    Forward,
    /// `(next, iri, previous)`: an inverse relationship reads the forward edge backwards.
    Inverse,
}

/// A single property of a [FieldPath].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub name: String,
    pub iri: NamedNode,
    pub direction: Direction,
    pub kind: PropertyKind,
}

impl Segment {
    fn new(property: &ResolvedProperty<'_>) -> Self {
        Self {
            name: property.name().to_owned(),
            iri: property.iri().clone(),
            direction: if property.is_inverse() {
                Direction::Inverse
            } else {
                Direction::Forward
            },
            kind: property.kind().clone(),
        }
    }
}

/// What the end of a [FieldPath] denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathTarget {
    /// The identifier of the record reached by the relation segments.
    Id,
    /// The types of the record reached by the relation segments.
    Type,
    /// The values of the last segment.
    Value,
}

/// A resolved, dotted property path such as `author.name` or `comments._id`.
///
/// All segments but the last of a [PathTarget::Value] path are relations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
    target: PathTarget,
    /// The type reached by the relation segments.
    record_type: String,
}

impl FieldPath {
    /// The identifier of the queried record itself.
    pub fn id(type_name: impl Into<String>) -> Self {
        Self {
            segments: Vec::new(),
            target: PathTarget::Id,
            record_type: type_name.into(),
        }
    }

    /// The edges that lead to the compared node. For [PathTarget::Value] paths this includes the
    /// final property.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn target(&self) -> PathTarget {
        self.target
    }

    /// The type of the record whose identifier, types or value this path denotes.
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// The kind of the values of a [PathTarget::Value] path.
    pub fn value_kind(&self) -> Option<&PropertyKind> {
        match self.target {
            PathTarget::Value => self.segments.last().map(|segment| &segment.kind),
            PathTarget::Id | PathTarget::Type => None,
        }
    }

    /// Whether the path starts at the queried record and ends at its identifier.
    pub fn is_root_id(&self) -> bool {
        self.segments.is_empty() && self.target == PathTarget::Id
    }

    /// Turns a relation-valued path into the path of the related record's identifier.
    #[must_use]
    pub fn into_id_path(mut self) -> Self {
        let target = self
            .value_kind()
            .and_then(PropertyKind::target_type)
            .map(str::to_owned);
        if let Some(target) = target {
            self.record_type = target;
            self.target = PathTarget::Id;
        }
        self
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut names = self
            .segments
            .iter()
            .map(|segment| segment.name.as_str())
            .collect::<Vec<_>>();
        match self.target {
            PathTarget::Id => names.push(ID_PROPERTY),
            PathTarget::Type => names.push(TYPE_PROPERTY),
            PathTarget::Value => {}
        }
        f.write_str(&names.join("."))
    }
}

/// Resolves a dotted path against `type_name`, returning the resolved property of
/// [PathTarget::Value] paths as well.
pub(crate) fn resolve_path<'schema>(
    schema: &'schema Schema,
    type_name: &str,
    path: &str,
) -> Result<(FieldPath, Option<ResolvedProperty<'schema>>), ResolveError> {
    schema.type_descriptor(type_name)?;
    let parts = path.split('.').collect::<Vec<_>>();
    let mut segments = Vec::new();
    let mut record_type = type_name.to_owned();

    for (index, part) in parts.iter().enumerate() {
        let is_last = index + 1 == parts.len();
        let target = match *part {
            ID_PROPERTY => Some(PathTarget::Id),
            TYPE_PROPERTY => Some(PathTarget::Type),
            _ => None,
        };
        if let Some(target) = target {
            if !is_last {
                return Err(not_a_relation(path, &parts[..=index]));
            }
            let field_path = FieldPath {
                segments,
                target,
                record_type,
            };
            return Ok((field_path, None));
        }

        let property = schema.resolve_segment(&record_type, part)?;
        segments.push(Segment::new(&property));
        if is_last {
            let field_path = FieldPath {
                segments,
                target: PathTarget::Value,
                record_type,
            };
            return Ok((field_path, Some(property)));
        }
        match property.target_type() {
            Some(target) => target.clone_into(&mut record_type),
            None => return Err(not_a_relation(path, &parts[..=index])),
        }
    }

    Err(ResolveError::NotFound {
        name: path.to_owned(),
    })
}

fn not_a_relation(path: &str, walked: &[&str]) -> ResolveError {
    ResolveError::Contract(ContractError::NotARelation {
        path: path.to_owned(),
        segment: walked.join("."),
    })
}
