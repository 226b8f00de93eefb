use crate::{InverseRelationProperty, Property, ResolvedProperty};
use rdf_mapper_model::NamedNode;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A registered record type with its flattened property table.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub(crate) name: String,
    pub(crate) class_iri: NamedNode,
    pub(crate) mixins: Vec<String>,
    /// Flattened, de-duplicated, leaf-last. Contains the type itself.
    pub(crate) mixin_chain: Vec<String>,
    pub(crate) own_properties: BTreeMap<String, Arc<Property>>,
    pub(crate) own_inverse_relationships: BTreeMap<String, Arc<InverseRelationProperty>>,
    pub(crate) properties: BTreeMap<String, Arc<Property>>,
    pub(crate) inverse_relationships: BTreeMap<String, Arc<InverseRelationProperty>>,
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The IRI asserted with `rdf:type` for records of this type.
    pub fn class_iri(&self) -> &NamedNode {
        &self.class_iri
    }

    /// The declared mixins, in declaration order.
    pub fn mixins(&self) -> &[String] {
        &self.mixins
    }

    /// Every type this type is composed of, including itself as the last element.
    pub fn mixin_chain(&self) -> &[String] {
        &self.mixin_chain
    }

    /// Whether records of this type are also records of `type_name`.
    pub fn is_a(&self, type_name: &str) -> bool {
        self.mixin_chain.iter().any(|name| name == type_name)
    }

    /// Looks up a property of this type, including the properties of its mixins. Forward
    /// properties take precedence over inverse relationships of the same name.
    pub fn property(&self, name: &str) -> Option<ResolvedProperty<'_>> {
        if let Some(property) = self.properties.get(name) {
            return Some(ResolvedProperty::Forward(property));
        }
        self.inverse_relationships
            .get(name)
            .map(|property| ResolvedProperty::Inverse(property))
    }

    /// The effective forward properties, in name order.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values().map(AsRef::as_ref)
    }

    /// The effective inverse relationships, in name order.
    pub fn inverse_relationships(&self) -> impl Iterator<Item = &InverseRelationProperty> {
        self.inverse_relationships.values().map(AsRef::as_ref)
    }

    /// Properties declared by this type itself.
    pub fn own_properties(&self) -> impl Iterator<Item = &Property> {
        self.own_properties.values().map(AsRef::as_ref)
    }

    /// Inverse relationships declared by (or reversed onto) this type itself.
    pub fn own_inverse_relationships(&self) -> impl Iterator<Item = &InverseRelationProperty> {
        self.own_inverse_relationships.values().map(AsRef::as_ref)
    }

    /// Every forward property followed by every inverse relationship.
    pub fn all_properties(&self) -> impl Iterator<Item = ResolvedProperty<'_>> {
        self.properties()
            .map(ResolvedProperty::Forward)
            .chain(self.inverse_relationships().map(ResolvedProperty::Inverse))
    }
}
