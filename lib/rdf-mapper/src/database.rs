use crate::config::DatabaseConfig;
use crate::error::MapperError;
use rdf_mapper_common::error::{StorageError, StructureError, ValidationErrors};
use rdf_mapper_common::TripleStore;
use rdf_mapper_logical::{
    AggregateRow, CascadePlanner, DocumentWriter, Materializer, QueryCompiler,
};
use rdf_mapper_model::{BaseIriMapping, Document};
use rdf_mapper_query::{AggregateOptions, Aggregator, FindOptions, QueryValidator, TypedQuery};
use rdf_mapper_schema::{Schema, SchemaOptions};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::Arc;

/// A schema bound to a triple store.
///
/// Every operation validates its raw input against the schema, compiles it to SPARQL, evaluates
/// it with the [TripleStore] and decodes the result. Validation problems are reported all at
/// once as [MapperError::Validation].
///
/// Usage example:
/// ```ignore
/// let database = Database::from_declaration(declaration, store, DatabaseConfig::default())?;
/// let posts = database
///     .find("BlogPost", &json!({"ratting": {"$gt": 3}}), &json!({"sort": "-ratting"}))
///     .await?;
/// ```
#[derive(Clone)]
pub struct Database {
    schema: Arc<Schema>,
    store: Arc<dyn TripleStore>,
    config: DatabaseConfig,
}

impl Database {
    pub fn new(schema: Arc<Schema>, store: Arc<dyn TripleStore>, config: DatabaseConfig) -> Self {
        Self {
            schema,
            store,
            config,
        }
    }

    /// Builds the schema from its JSON declaration, minting IRIs below the configured base IRI.
    pub fn from_declaration(
        declaration: Json,
        store: Arc<dyn TripleStore>,
        config: DatabaseConfig,
    ) -> Result<Self, MapperError> {
        let mapping = BaseIriMapping::new(config.base_iri.as_str()).map_err(|error| {
            StructureError::InvalidBaseIri {
                iri: config.base_iri.clone(),
                error,
            }
        })?;
        let schema = Schema::from_json(
            declaration,
            Arc::new(mapping),
            SchemaOptions {
                ambiguity: config.ambiguity,
            },
        )?;
        Ok(Self::new(Arc::new(schema), store, config))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn validator(&self) -> QueryValidator<'_> {
        QueryValidator::new(&self.schema)
    }

    fn compiler(&self) -> QueryCompiler<'_> {
        QueryCompiler::new(&self.schema)
    }

    fn materializer(&self) -> Materializer<'_> {
        Materializer::new(&self.schema)
    }

    /// Validates a filter on `type_name` and returns the cast query.
    pub fn validate(&self, type_name: &str, query: &Json) -> Result<TypedQuery, MapperError> {
        let (query, errors) = self.validator().validate(type_name, query)?;
        Ok(ValidationErrors::new(errors).into_result(query)?)
    }

    fn validate_find(
        &self,
        type_name: &str,
        query: &Json,
        options: &Json,
    ) -> Result<(TypedQuery, FindOptions), MapperError> {
        let validator = self.validator();
        let (query, mut errors) = validator.validate(type_name, query)?;
        let (mut options, option_errors) = validator.validate_options(type_name, options)?;
        errors.extend(option_errors);
        ValidationErrors::new(errors).into_result(())?;
        if options.limit.is_none() {
            options.limit = self.config.default_limit;
        }
        Ok((query, options))
    }

    fn validate_aggregate(
        &self,
        type_name: &str,
        aggregator: &Json,
        query: &Json,
        options: &Json,
    ) -> Result<(TypedQuery, Aggregator, AggregateOptions), MapperError> {
        let validator = self.validator();
        let (aggregator, mut errors) = validator.validate_aggregator(type_name, aggregator)?;
        let (query, query_errors) = validator.validate(type_name, query)?;
        let (options, option_errors) = aggregator.validate_options(options);
        errors.extend(query_errors);
        errors.extend(option_errors);
        ValidationErrors::new(errors).into_result(())?;
        Ok((query, aggregator, options))
    }

    /// Finds the records of `type_name` matching `query`.
    ///
    /// `options` may set `limit`, `offset`, `sort`, `fields` and `distinct`. A query that only
    /// restricts `_id` is answered by fetching the records directly.
    pub async fn find(
        &self,
        type_name: &str,
        query: &Json,
        options: &Json,
    ) -> Result<Vec<Document>, MapperError> {
        let (query, options) = self.validate_find(type_name, query, options)?;
        if let Some(ids) = identity_lookup(&query, &options) {
            tracing::debug!(type_name, ids = ids.len(), "Answering find by identity");
            let mut documents = self
                .describe(type_name, &ids, options.fields.as_deref())
                .await?;
            if let Some(limit) = options.limit {
                documents.truncate(limit);
            }
            return Ok(documents);
        }

        let compiled = self.compiler().find(&query, &options)?;
        let solutions = self.store.select(&compiled).await?;
        let ids = self.materializer().identifiers(type_name, &solutions);
        self.fetch(type_name, &ids, options.fields.as_deref()).await
    }

    /// Finds the first record matching `query` in the order requested by `options`.
    pub async fn first(
        &self,
        type_name: &str,
        query: &Json,
        options: &Json,
    ) -> Result<Option<Document>, MapperError> {
        let mut options = options.clone();
        match &mut options {
            Json::Object(object) => {
                object.insert("limit".to_owned(), 1.into());
            }
            Json::Null => options = serde_json::json!({"limit": 1}),
            _ => {}
        }
        let documents = self.find(type_name, query, &options).await?;
        Ok(documents.into_iter().next())
    }

    /// Fetches the records `ids` of `type_name`, in the order of `ids`. Unknown identifiers are
    /// skipped.
    pub async fn fetch(
        &self,
        type_name: &str,
        ids: &[String],
        fields: Option<&[String]>,
    ) -> Result<Vec<Document>, MapperError> {
        let positions = ids
            .iter()
            .enumerate()
            .map(|(position, id)| (id.as_str(), position))
            .collect::<HashMap<_, _>>();
        let mut documents = self.describe(type_name, ids, fields).await?;
        documents.sort_by_key(|document| positions.get(document.id()).copied());
        Ok(documents)
    }

    /// Fetches and materializes the records `ids`, in identifier order.
    async fn describe(
        &self,
        type_name: &str,
        ids: &[String],
        fields: Option<&[String]>,
    ) -> Result<Vec<Document>, MapperError> {
        if ids.is_empty() {
            self.schema.type_descriptor(type_name)?;
            return Ok(Vec::new());
        }
        let compiled = self.compiler().describe(type_name, ids, fields)?;
        let triples = self.store.construct(&compiled).await?;
        Ok(self.materializer().materialize(type_name, &triples)?)
    }

    /// Counts the records of `type_name` matching `query`.
    pub async fn count(&self, type_name: &str, query: &Json) -> Result<usize, MapperError> {
        let query = self.validate(type_name, query)?;
        let compiled = self.compiler().count(&query)?;
        let solutions = self.store.select(&compiled).await?;
        let count = Materializer::count(&solutions).ok_or_else(|| {
            StorageError::UnexpectedResult("the count query did not bind ?_count".to_owned())
        })?;
        Ok(count)
    }

    /// Aggregates the records of `type_name` matching `query`.
    ///
    /// `aggregator` maps output labels to group-by paths or aggregate operators. `options` may
    /// set `limit`, `offset` and a `sort` over the labels.
    pub async fn aggregate(
        &self,
        type_name: &str,
        aggregator: &Json,
        query: &Json,
        options: &Json,
    ) -> Result<Vec<AggregateRow>, MapperError> {
        let (query, aggregator, options) =
            self.validate_aggregate(type_name, aggregator, query, options)?;
        let compiled = self.compiler().aggregate(&query, &aggregator, &options)?;
        let solutions = self.store.select(&compiled).await?;
        let materializer = self.materializer();
        Ok(solutions
            .iter()
            .map(|solution| materializer.aggregate_row(&aggregator, solution))
            .collect())
    }

    /// Validates `raw` as a record of `type_name` and replaces the stored record with it.
    ///
    /// Returns the saved document, including a generated `_id` if `raw` has none.
    pub async fn save(&self, type_name: &str, raw: &Json) -> Result<Document, MapperError> {
        let document = self.validate_document(type_name, raw)?;
        let update = DocumentWriter::new(&self.schema).save(&document)?;
        self.store.update(&update).await?;
        tracing::debug!(
            type_name = document.type_name(),
            id = document.id(),
            "Saved record"
        );
        Ok(document)
    }

    fn validate_document(&self, type_name: &str, raw: &Json) -> Result<Document, MapperError> {
        let (document, errors) = self.validator().validate_document(type_name, raw)?;
        Ok(ValidationErrors::new(errors).into_result(document)?)
    }

    /// Deletes the record `id` of `type_name` together with every record and edge its
    /// propagating relations reach.
    pub async fn delete(&self, type_name: &str, id: &str) -> Result<(), MapperError> {
        let plan = CascadePlanner::new(&self.schema).plan(type_name, id)?;
        self.store.update(&plan.to_update()).await?;
        tracing::debug!(type_name, id, "Deleted record");
        Ok(())
    }

    /// The SPARQL query [Self::find] sends to select the matching records.
    pub fn explain_find(
        &self,
        type_name: &str,
        query: &Json,
        options: &Json,
    ) -> Result<String, MapperError> {
        let (query, options) = self.validate_find(type_name, query, options)?;
        Ok(self.compiler().find(&query, &options)?.to_string())
    }

    /// The SPARQL query [Self::count] sends.
    pub fn explain_count(&self, type_name: &str, query: &Json) -> Result<String, MapperError> {
        let query = self.validate(type_name, query)?;
        Ok(self.compiler().count(&query)?.to_string())
    }

    /// The SPARQL query [Self::aggregate] sends.
    pub fn explain_aggregate(
        &self,
        type_name: &str,
        aggregator: &Json,
        query: &Json,
        options: &Json,
    ) -> Result<String, MapperError> {
        let (query, aggregator, options) =
            self.validate_aggregate(type_name, aggregator, query, options)?;
        Ok(self
            .compiler()
            .aggregate(&query, &aggregator, &options)?
            .to_string())
    }

    /// The SPARQL update [Self::save] sends.
    pub fn explain_save(&self, type_name: &str, raw: &Json) -> Result<String, MapperError> {
        let document = self.validate_document(type_name, raw)?;
        Ok(DocumentWriter::new(&self.schema).save(&document)?.to_string())
    }

    /// The SPARQL update [Self::delete] sends.
    pub fn explain_delete(&self, type_name: &str, id: &str) -> Result<String, MapperError> {
        let plan = CascadePlanner::new(&self.schema).plan(type_name, id)?;
        Ok(plan.to_update().to_string())
    }
}

/// The identifiers a find query can be answered with directly. Sorting and paging other than a
/// limit need the store.
fn identity_lookup(query: &TypedQuery, options: &FindOptions) -> Option<Vec<String>> {
    if !options.sort.is_empty() || options.offset > 0 {
        return None;
    }
    query.identity_lookup()
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("schema", &self.schema)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
