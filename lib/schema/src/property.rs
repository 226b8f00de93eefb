use rdf_mapper_model::NamedNode;
use regex::Regex;
use std::fmt::{Display, Formatter};

/// The scalar types a property can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Number,
    Boolean,
    Date,
}

impl ScalarType {
    /// Parses the declared name of a scalar type.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ScalarType::String),
            "number" => Some(ScalarType::Number),
            "boolean" => Some(ScalarType::Boolean),
            "date" => Some(ScalarType::Date),
            _ => None,
        }
    }
}

impl Display for ScalarType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ScalarType::String => "string",
            ScalarType::Number => "number",
            ScalarType::Boolean => "boolean",
            ScalarType::Date => "date",
        })
    }
}

/// What kind of value a property holds. Resolved once while building the schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Scalar(ScalarType),
    Array(Box<PropertyKind>),
    /// A relation to a record of the named type.
    Relation(String),
}

impl PropertyKind {
    pub fn is_array(&self) -> bool {
        matches!(self, PropertyKind::Array(_))
    }

    /// Whether the property (or the elements of the array property) identify other records.
    pub fn is_relation(&self) -> bool {
        matches!(self.item(), PropertyKind::Relation(_))
    }

    /// The kind of a single value: the element kind of arrays, the kind itself otherwise.
    pub fn item(&self) -> &PropertyKind {
        match self {
            PropertyKind::Array(inner) => inner.item(),
            kind => kind,
        }
    }

    /// The type related records belong to.
    pub fn target_type(&self) -> Option<&str> {
        match self.item() {
            PropertyKind::Relation(target) => Some(target),
            _ => None,
        }
    }
}

impl Display for PropertyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyKind::Scalar(scalar) => write!(f, "{scalar}"),
            PropertyKind::Array(inner) => write!(f, "[{inner}]"),
            PropertyKind::Relation(target) => write!(f, "{target}"),
        }
    }
}

/// What happens to related records when a record is deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Propagation {
    #[default]
    None,
    /// The related records are deleted as well.
    Delete,
    /// The named property of the related records is removed where it points at the deleted
    /// record.
    Unset(String),
}

impl Propagation {
    pub fn is_none(&self) -> bool {
        matches!(self, Propagation::None)
    }
}

/// Validation constraints of a property.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub precision: Option<u32>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<Regex>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub one_of: Option<Vec<String>>,
}

impl PartialEq for Constraints {
    fn eq(&self, other: &Self) -> bool {
        self.precision == other.precision
            && self.min == other.min
            && self.max == other.max
            && self.pattern.as_ref().map(Regex::as_str) == other.pattern.as_ref().map(Regex::as_str)
            && self.min_length == other.min_length
            && self.max_length == other.max_length
            && self.one_of == other.one_of
    }
}

/// A declared property of a type.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) declaring_type: String,
    pub(crate) kind: PropertyKind,
    pub(crate) constraints: Constraints,
    pub(crate) propagation: Propagation,
    pub(crate) iri: NamedNode,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type (or mixin) whose declaration introduced this property.
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn propagation(&self) -> &Propagation {
        &self.propagation
    }

    /// The predicate IRI of this property in the store.
    pub fn iri(&self) -> &NamedNode {
        &self.iri
    }
}

/// A synthetic, always array-valued property of type B meaning "all A's whose property P points
/// at this B".
#[derive(Debug, Clone, PartialEq)]
pub struct InverseRelationProperty {
    pub(crate) name: String,
    pub(crate) declaring_type: String,
    pub(crate) source_type: String,
    pub(crate) source_property: String,
    pub(crate) kind: PropertyKind,
    pub(crate) propagation: Propagation,
    pub(crate) iri: NamedNode,
}

impl InverseRelationProperty {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// The type A declaring the forward relation.
    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    /// The forward relation P on [Self::source_type].
    pub fn source_property(&self) -> &str {
        &self.source_property
    }

    /// Always `[source_type]`.
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn propagation(&self) -> &Propagation {
        &self.propagation
    }

    /// The predicate IRI of the forward relation.
    pub fn iri(&self) -> &NamedNode {
        &self.iri
    }
}

/// The result of resolving a property name or path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedProperty<'schema> {
    Forward(&'schema Property),
    Inverse(&'schema InverseRelationProperty),
}

impl<'schema> ResolvedProperty<'schema> {
    pub fn name(&self) -> &'schema str {
        match self {
            ResolvedProperty::Forward(property) => property.name(),
            ResolvedProperty::Inverse(property) => property.name(),
        }
    }

    pub fn declaring_type(&self) -> &'schema str {
        match self {
            ResolvedProperty::Forward(property) => property.declaring_type(),
            ResolvedProperty::Inverse(property) => property.declaring_type(),
        }
    }

    pub fn kind(&self) -> &'schema PropertyKind {
        match self {
            ResolvedProperty::Forward(property) => property.kind(),
            ResolvedProperty::Inverse(property) => property.kind(),
        }
    }

    pub fn iri(&self) -> &'schema NamedNode {
        match self {
            ResolvedProperty::Forward(property) => property.iri(),
            ResolvedProperty::Inverse(property) => property.iri(),
        }
    }

    pub fn propagation(&self) -> &'schema Propagation {
        match self {
            ResolvedProperty::Forward(property) => property.propagation(),
            ResolvedProperty::Inverse(property) => property.propagation(),
        }
    }

    /// The constraints values of this property are validated against. Inverse relationships
    /// carry no constraints.
    pub fn constraints(&self) -> Option<&'schema Constraints> {
        match self {
            ResolvedProperty::Forward(property) => Some(property.constraints()),
            ResolvedProperty::Inverse(_) => None,
        }
    }

    pub fn is_relation(&self) -> bool {
        self.kind().is_relation()
    }

    pub fn is_array(&self) -> bool {
        self.kind().is_array()
    }

    pub fn is_inverse(&self) -> bool {
        matches!(self, ResolvedProperty::Inverse(_))
    }

    pub fn propagates_deletion(&self) -> bool {
        !self.propagation().is_none()
    }

    pub fn target_type(&self) -> Option<&'schema str> {
        self.kind().target_type()
    }

    /// Returns the forward property, if this is not an inverse relationship.
    pub fn as_forward(&self) -> Option<&'schema Property> {
        match self {
            ResolvedProperty::Forward(property) => Some(property),
            ResolvedProperty::Inverse(_) => None,
        }
    }
}
