use crate::builder::SchemaBuilder;
use crate::{ResolvedProperty, SchemaDeclaration, TypeDescriptor};
use rdf_mapper_common::error::{ContractError, StructureError};
use rdf_mapper_model::{IdentifierMapping, IdentifierMappingRef, NamedNodeRef};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// How a bare property name is resolved when it is not a property of the queried type and
/// several unrelated mixins composing that type declare it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Report the name as ambiguous.
    #[default]
    Error,
    /// Pick the candidate whose declaring type sorts first by name.
    FirstByDeclaringType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    pub ambiguity: AmbiguityPolicy,
}

/// Why a property path could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown property '{name}'")]
    NotFound { name: String },
    #[error("ambiguous property '{name}', declared by {}", .candidates.join(", "))]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// The registry of every record type of a database.
///
/// The schema is immutable once built; share it behind an [Arc] between concurrent callers.
pub struct Schema {
    pub(crate) types: BTreeMap<String, TypeDescriptor>,
    pub(crate) mapping: IdentifierMappingRef,
    pub(crate) options: SchemaOptions,
    /// Predicate IRI to property name.
    pub(crate) property_index: HashMap<String, String>,
    /// Class IRI to type name.
    pub(crate) class_index: HashMap<String, String>,
}

impl Schema {
    /// Builds a schema from its declaration.
    pub fn new(
        declaration: &SchemaDeclaration,
        mapping: IdentifierMappingRef,
        options: SchemaOptions,
    ) -> Result<Self, StructureError> {
        SchemaBuilder::new(declaration, mapping, options).build()
    }

    /// Builds a schema from a JSON declaration.
    pub fn from_json(
        declaration: serde_json::Value,
        mapping: IdentifierMappingRef,
        options: SchemaOptions,
    ) -> Result<Self, StructureError> {
        let declaration: SchemaDeclaration =
            serde_json::from_value(declaration).map_err(StructureError::MalformedDeclaration)?;
        Self::new(&declaration, mapping, options)
    }

    pub fn mapping(&self) -> &dyn IdentifierMapping {
        self.mapping.as_ref()
    }

    pub fn mapping_ref(&self) -> IdentifierMappingRef {
        Arc::clone(&self.mapping)
    }

    pub fn options(&self) -> SchemaOptions {
        self.options
    }

    /// Returns the descriptor of `type_name`, if it is registered.
    pub fn get(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }

    /// Returns the descriptor of `type_name` or a [ContractError] if it is not registered.
    pub fn type_descriptor(&self, type_name: &str) -> Result<&TypeDescriptor, ContractError> {
        self.get(type_name)
            .ok_or_else(|| ContractError::UnknownType(type_name.to_owned()))
    }

    /// Iterates over all registered types in name order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    /// Resolves a single property name against `type_name`.
    ///
    /// Properties of the type and of its mixins are found directly. Otherwise, every type that
    /// is composed of `type_name` is searched, which finds properties declared by sibling
    /// mixins of records that are queried through a shared mixin.
    pub fn resolve_segment(
        &self,
        type_name: &str,
        name: &str,
    ) -> Result<ResolvedProperty<'_>, ResolveError> {
        let descriptor = self.type_descriptor(type_name)?;
        if let Some(property) = descriptor.property(name) {
            return Ok(property);
        }

        let mut candidates = self.find_properties(name, Some(&[type_name][..]));
        match candidates.len() {
            0 => Err(ResolveError::NotFound {
                name: name.to_owned(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => match self.options.ambiguity {
                AmbiguityPolicy::FirstByDeclaringType => Ok(candidates.remove(0)),
                AmbiguityPolicy::Error => Err(ResolveError::Ambiguous {
                    name: name.to_owned(),
                    candidates: candidates
                        .iter()
                        .map(|candidate| format!("{}.{}", candidate.declaring_type(), name))
                        .collect(),
                }),
            },
        }
    }

    /// Resolves a dotted property path against `type_name`.
    ///
    /// Every segment but the last must be a relation (forward or inverse); the walk continues
    /// against the target type of that relation.
    pub fn resolve_property(
        &self,
        type_name: &str,
        path: &str,
    ) -> Result<ResolvedProperty<'_>, ResolveError> {
        let mut current_type = type_name;
        let mut segments = path.split('.').peekable();
        let mut walked = Vec::new();
        while let Some(segment) = segments.next() {
            walked.push(segment);
            let property = self.resolve_segment(current_type, segment)?;
            if segments.peek().is_none() {
                return Ok(property);
            }
            current_type = property.target_type().ok_or_else(|| {
                ContractError::NotARelation {
                    path: path.to_owned(),
                    segment: walked.join("."),
                }
            })?;
        }
        Err(ResolveError::NotFound {
            name: path.to_owned(),
        })
    }

    /// Whether `path` resolves against `type_name`.
    pub fn has_property(&self, type_name: &str, path: &str) -> bool {
        self.resolve_property(type_name, path).is_ok()
    }

    /// Collects every property named `name` across all registered types.
    ///
    /// With a `mixin_filter`, only types whose mixin chain contains one of the given names are
    /// searched. A property inherited by several types is returned once. The result is ordered
    /// by declaring type name.
    pub fn find_properties(
        &self,
        name: &str,
        mixin_filter: Option<&[&str]>,
    ) -> Vec<ResolvedProperty<'_>> {
        let mut candidates: Vec<ResolvedProperty<'_>> = Vec::new();
        for descriptor in self.types.values() {
            let included = mixin_filter
                .map_or(true, |filter| filter.iter().any(|mixin| descriptor.is_a(mixin)));
            if !included {
                continue;
            }
            let Some(property) = descriptor.property(name) else {
                continue;
            };
            let duplicate = candidates.iter().any(|candidate| {
                candidate.declaring_type() == property.declaring_type()
                    && candidate.is_inverse() == property.is_inverse()
            });
            if !duplicate {
                candidates.push(property);
            }
        }
        candidates.sort_by(|lhs, rhs| lhs.declaring_type().cmp(rhs.declaring_type()));
        candidates
    }

    /// Maps a predicate IRI back to a property name. Built once with the schema.
    pub fn property_name(&self, iri: NamedNodeRef<'_>) -> Option<&str> {
        self.property_index.get(iri.as_str()).map(String::as_str)
    }

    /// Maps a class IRI back to a type name.
    pub fn type_name(&self, class_iri: NamedNodeRef<'_>) -> Option<&str> {
        self.class_index.get(class_iri.as_str()).map(String::as_str)
    }

    /// Picks the most specific of the given types: the one composed of all the others. Ties
    /// are broken by the longest mixin chain, then by name.
    pub fn most_specific_type<'names>(
        &self,
        type_names: impl IntoIterator<Item = &'names str>,
    ) -> Option<&str> {
        let descriptors = type_names
            .into_iter()
            .filter_map(|name| self.get(name))
            .collect::<Vec<_>>();
        let covers_all = |candidate: &TypeDescriptor| {
            descriptors
                .iter()
                .all(|other| candidate.is_a(other.name()))
        };
        descriptors
            .iter()
            .copied()
            .min_by(|lhs, rhs| {
                covers_all(rhs)
                    .cmp(&covers_all(lhs))
                    .then_with(|| rhs.mixin_chain().len().cmp(&lhs.mixin_chain().len()))
                    .then_with(|| lhs.name().cmp(rhs.name()))
            })
            .map(TypeDescriptor::name)
    }
}

impl Debug for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .field("mapping", &self.mapping)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
