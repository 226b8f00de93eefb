use crate::{Iri, IriParseError, NamedNode, NamedNodeRef};
use std::fmt::Debug;
use std::sync::Arc;

/// Maps schema names and record identifiers to the IRIs used in the triple store.
///
/// Implementations must be pure: the same input always maps to the same IRI, and
/// [Self::instance_id] is the inverse of [Self::instance_iri].
pub trait IdentifierMapping: Debug + Send + Sync {
    /// The IRI of the class asserted with `rdf:type` for records of `type_name`.
    fn class_iri(&self, type_name: &str) -> NamedNode;

    /// The predicate IRI of a property that does not declare its own `uri`.
    fn property_iri(&self, property_name: &str) -> NamedNode;

    /// The IRI of the record `id` of type `type_name`.
    fn instance_iri(&self, type_name: &str, id: &str) -> NamedNode;

    /// The record identifier of `iri`, a record of type `type_name`.
    fn instance_id(&self, type_name: &str, iri: NamedNodeRef<'_>) -> String;
}

pub type IdentifierMappingRef = Arc<dyn IdentifierMapping>;

/// The default [IdentifierMapping]. Every IRI is minted below a single base IRI:
///
/// - classes: `<base>classes/<Type>`
/// - properties: `<base>properties/<name>`
/// - instances: `<base>instances/<id>` (the id is percent-encoded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseIriMapping {
    base: String,
}

impl BaseIriMapping {
    pub const DEFAULT_BASE_IRI: &'static str = "http://rdf-mapper.org/";

    /// Creates a new mapping. A `/` is appended to `base` if it does not end with `/` or `#`.
    pub fn new(base: impl Into<String>) -> Result<Self, IriParseError> {
        let mut base = base.into();
        if !base.ends_with('/') && !base.ends_with('#') {
            base.push('/');
        }
        let base = Iri::parse(base)?.into_inner();
        Ok(Self { base })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn instance_prefix(&self) -> String {
        format!("{}instances/", self.base)
    }
}

impl Default for BaseIriMapping {
    fn default() -> Self {
        Self {
            base: Self::DEFAULT_BASE_IRI.to_owned(),
        }
    }
}

impl IdentifierMapping for BaseIriMapping {
    fn class_iri(&self, type_name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("{}classes/{type_name}", self.base))
    }

    fn property_iri(&self, property_name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("{}properties/{property_name}", self.base))
    }

    fn instance_iri(&self, _type_name: &str, id: &str) -> NamedNode {
        NamedNode::new_unchecked(format!(
            "{}{}",
            self.instance_prefix(),
            urlencoding::encode(id)
        ))
    }

    fn instance_id(&self, _type_name: &str, iri: NamedNodeRef<'_>) -> String {
        let prefix = self.instance_prefix();
        match iri.as_str().strip_prefix(&prefix) {
            Some(encoded) => urlencoding::decode(encoded)
                .map_or_else(|_| encoded.to_owned(), |id| id.into_owned()),
            None => iri.as_str().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_iris_round_trip() {
        let mapping = BaseIriMapping::new("http://example.com/db").unwrap();
        let iri = mapping.instance_iri("User", "john doe");
        assert_eq!(iri.as_str(), "http://example.com/db/instances/john%20doe");
        assert_eq!(mapping.instance_id("User", iri.as_ref()), "john doe");
    }

    #[test]
    fn foreign_iris_are_kept_as_ids() {
        let mapping = BaseIriMapping::default();
        let iri = NamedNode::new_unchecked("http://elsewhere.org/thing");
        assert_eq!(
            mapping.instance_id("User", iri.as_ref()),
            "http://elsewhere.org/thing"
        );
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(BaseIriMapping::new("not an iri").is_err());
    }
}
