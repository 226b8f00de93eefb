use rdf_mapper_model::BaseIriMapping;
use rdf_mapper_schema::AmbiguityPolicy;
use serde::Deserialize;

/// Holds the configuration of a [Database](crate::Database).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// The IRI below which classes, properties and instances are minted.
    pub base_iri: String,
    /// How bare property names declared by several unrelated mixins are resolved.
    pub ambiguity: AmbiguityPolicy,
    /// The limit of find queries that do not set one.
    pub default_limit: Option<usize>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            base_iri: BaseIriMapping::DEFAULT_BASE_IRI.to_owned(),
            ambiguity: AmbiguityPolicy::default(),
            default_limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_the_defaults() {
        let config: DatabaseConfig =
            serde_json::from_str(r#"{"defaultLimit": 20, "ambiguity": "first-by-declaring-type"}"#)
                .unwrap();
        assert_eq!(
            config,
            DatabaseConfig {
                base_iri: "http://rdf-mapper.org/".to_owned(),
                ambiguity: AmbiguityPolicy::FirstByDeclaringType,
                default_limit: Some(20),
            }
        );
    }
}
