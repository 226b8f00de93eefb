use crate::error::StorageError;
use async_trait::async_trait;
use rdf_mapper_model::Triple;
use sparesults::QuerySolution;
use spargebra::{Query, Update};

/// The execution collaborator of the mapper.
///
/// The mapper only compiles queries; a [TripleStore] is responsible for evaluating them against
/// an actual store, for example over the SPARQL 1.1 protocol. Timeouts and cancellation are part of
/// the implementation of this trait.
#[async_trait]
pub trait TripleStore: Send + Sync {
    /// Evaluates a `SELECT` query and returns its solutions in order.
    async fn select(&self, query: &Query) -> Result<Vec<QuerySolution>, StorageError>;

    /// Evaluates a `CONSTRUCT` query and returns the resulting triples.
    async fn construct(&self, query: &Query) -> Result<Vec<Triple>, StorageError>;

    /// Applies all operations of `update` atomically.
    async fn update(&self, update: &Update) -> Result<(), StorageError>;
}
