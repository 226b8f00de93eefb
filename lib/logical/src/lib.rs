//! Compilation of validated queries to SPARQL algebra, and the way back from triples to
//! documents.
//!
//! The [QueryCompiler] turns typed filters and aggregators into `SELECT` and `CONSTRUCT`
//! queries, the [DocumentWriter] and the [CascadePlanner] produce the updates of the write
//! path and the [Materializer] rebuilds documents and aggregate rows from query results.
//! All of them share a [TermCodec] that fixes how values are represented in the store.

mod cascade;
mod compiler;
mod materializer;
mod pattern;
mod terms;
pub mod variables;
mod writer;

pub use cascade::{CascadePlan, CascadePlanner};
pub use compiler::QueryCompiler;
pub use materializer::{AggregateRow, Materializer};
pub use terms::TermCodec;
pub use writer::DocumentWriter;

#[cfg(test)]
pub(crate) mod test_schema {
    use rdf_mapper_model::BaseIriMapping;
    use rdf_mapper_schema::{Schema, SchemaOptions};
    use serde_json::json;
    use std::sync::Arc;

    pub fn blog() -> Schema {
        Schema::from_json(
            json!({
                "Content": {
                    "properties": {
                        "title": "string",
                        "body": "string"
                    }
                },
                "Taggable": {
                    "properties": {
                        "tags": {"type": "array", "items": "string"}
                    }
                },
                "User": {
                    "properties": {
                        "name": "string"
                    }
                },
                "Admin": {"mixins": ["User"]},
                "BlogPost": {
                    "mixins": ["Content", "Taggable"],
                    "properties": {
                        "ratting": {"type": "number", "validate": {"precision": 2}},
                        "published": "boolean",
                        "date": "date",
                        "author": {"type": "User", "reverse": "blogPosts"}
                    },
                    "inverseRelationships": {
                        "comments": {"type": "Comment", "property": "post"}
                    }
                },
                "Comment": {
                    "mixins": ["Content"],
                    "properties": {
                        "post": "BlogPost",
                        "replies": {"type": "array", "items": "Comment"}
                    }
                }
            }),
            Arc::new(BaseIriMapping::default()),
            SchemaOptions::default(),
        )
        .unwrap()
    }
}
