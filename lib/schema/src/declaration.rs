use serde::Deserialize;
use std::collections::BTreeMap;

/// The raw declaration of a schema: type name to [TypeDeclaration].
///
/// ```
/// use rdf_mapper_schema::SchemaDeclaration;
///
/// let declaration: SchemaDeclaration = serde_json::from_value(serde_json::json!({
///     "User": {
///         "properties": {
///             "name": "string",
///             "age": {"type": "number", "validate": {"min": 0}}
///         }
///     },
///     "BlogPost": {
///         "properties": {
///             "title": "string",
///             "author": {"type": "User", "reverse": "blogPosts"}
///         }
///     }
/// })).unwrap();
/// assert_eq!(declaration.len(), 2);
/// ```
pub type SchemaDeclaration = BTreeMap<String, TypeDeclaration>;

/// The raw declaration of a single type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TypeDeclaration {
    /// The mixins composed into this type, in order. Later mixins win on name collisions.
    #[serde(default)]
    pub mixins: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDeclaration>,
    #[serde(default)]
    pub inverse_relationships: BTreeMap<String, InverseRelationshipDeclaration>,
}

/// A property is either declared with its type name only (`"string"`) or with a full
/// [PropertyDefinition].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PropertyDeclaration {
    Shorthand(String),
    Full(Box<PropertyDefinition>),
}

impl PropertyDeclaration {
    /// Returns the full definition of this declaration.
    pub fn definition(&self) -> PropertyDefinition {
        match self {
            PropertyDeclaration::Shorthand(type_name) => PropertyDefinition {
                type_name: type_name.clone(),
                ..PropertyDefinition::default()
            },
            PropertyDeclaration::Full(definition) => definition.as_ref().clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PropertyDefinition {
    /// `string`, `number`, `boolean`, `date`, `array` or the name of a declared type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// The declaration of the elements of an `array` property.
    #[serde(default)]
    pub items: Option<PropertyDeclaration>,
    #[serde(default)]
    pub validate: Option<ConstraintsDeclaration>,
    #[serde(default)]
    pub propagate_deletion: Option<PropagationDeclaration>,
    /// Declares an inverse relationship on the target type of this relation.
    #[serde(default)]
    pub reverse: Option<ReverseDeclaration>,
    /// A custom predicate IRI.
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ConstraintsDeclaration {
    /// Number of decimal places numbers are rounded to.
    pub precision: Option<u32>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// A regular expression strings must match.
    pub pattern: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// The allowed values of a string.
    pub one_of: Option<Vec<String>>,
}

/// `true` deletes the related records with the record, a property name only removes that property
/// of the related records.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PropagationDeclaration {
    Flag(bool),
    Property(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ReverseDeclaration {
    Name(String),
    Full(ReverseDefinition),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ReverseDefinition {
    pub name: String,
    #[serde(default)]
    pub propagate_deletion: Option<PropagationDeclaration>,
}

impl ReverseDeclaration {
    pub fn name(&self) -> &str {
        match self {
            ReverseDeclaration::Name(name) => name,
            ReverseDeclaration::Full(definition) => &definition.name,
        }
    }

    pub fn propagate_deletion(&self) -> Option<&PropagationDeclaration> {
        match self {
            ReverseDeclaration::Name(_) => None,
            ReverseDeclaration::Full(definition) => definition.propagate_deletion.as_ref(),
        }
    }
}

/// "All records of `type` whose `property` points at this record".
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct InverseRelationshipDeclaration {
    #[serde(rename = "type")]
    pub type_name: String,
    pub property: String,
    #[serde(default)]
    pub propagate_deletion: Option<PropagationDeclaration>,
}
