use async_trait::async_trait;
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use rdf_mapper::common::error::StorageError;
use rdf_mapper::common::QuerySolution;
use rdf_mapper::model::Triple;
use rdf_mapper::{Database, DatabaseConfig, TripleStore};
use serde_json::json;
use spargebra::{Query, Update};
use std::sync::Arc;

/// Evaluates the compiled SPARQL text with an in-memory Oxigraph store.
pub struct OxigraphStore {
    store: Store,
}

impl std::fmt::Debug for OxigraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OxigraphStore").finish_non_exhaustive()
    }
}

impl OxigraphStore {
    pub fn new() -> Result<Self, StorageError> {
        Ok(Self {
            store: Store::new().map_err(StorageError::other)?,
        })
    }

    fn query(&self, query: &Query) -> Result<QueryResults, StorageError> {
        self.store
            .query(query.to_string().as_str())
            .map_err(StorageError::other)
    }
}

#[async_trait]
impl TripleStore for OxigraphStore {
    async fn select(&self, query: &Query) -> Result<Vec<QuerySolution>, StorageError> {
        match self.query(query)? {
            QueryResults::Solutions(solutions) => solutions
                .collect::<Result<Vec<_>, _>>()
                .map_err(StorageError::other),
            _ => Err(StorageError::UnexpectedResult(
                "expected solutions".to_owned(),
            )),
        }
    }

    async fn construct(&self, query: &Query) -> Result<Vec<Triple>, StorageError> {
        match self.query(query)? {
            QueryResults::Graph(triples) => triples
                .collect::<Result<Vec<_>, _>>()
                .map_err(StorageError::other),
            _ => Err(StorageError::UnexpectedResult("expected a graph".to_owned())),
        }
    }

    async fn update(&self, update: &Update) -> Result<(), StorageError> {
        self.store
            .update(update.to_string().as_str())
            .map_err(StorageError::other)
    }
}

pub fn blog_schema() -> serde_json::Value {
    json!({
        "Content": {
            "properties": {
                "title": "string",
                "body": "string"
            }
        },
        "User": {
            "properties": {"name": "string"}
        },
        "BlogPost": {
            "mixins": ["Content"],
            "properties": {
                "ratting": {"type": "number", "validate": {"precision": 2}},
                "published": "boolean",
                "date": "date",
                "tags": {"type": "array", "items": "string"},
                "author": {
                    "type": "User",
                    "reverse": {"name": "blogPosts", "propagateDeletion": true}
                }
            },
            "inverseRelationships": {
                "comments": {"type": "Comment", "property": "post", "propagateDeletion": true}
            }
        },
        "Comment": {
            "mixins": ["Content"],
            "properties": {
                "post": "BlogPost",
                "replies": {"type": "array", "items": "Comment", "propagateDeletion": true}
            }
        }
    })
}

pub fn empty_database() -> Database {
    let store = OxigraphStore::new().unwrap();
    Database::from_declaration(blog_schema(), Arc::new(store), DatabaseConfig::default()).unwrap()
}

/// Three users and ten blog posts `p0` to `p9`, rated with their number. Post `i` is written by
/// `u{i % 3}`, even posts are published and have a body. `p0` has two comments.
pub async fn blog_database() -> Database {
    let database = empty_database();
    for (id, name) in [("u0", "alice"), ("u1", "bob"), ("u2", "carol")] {
        database
            .save("User", &json!({"_id": id, "name": name}))
            .await
            .unwrap();
    }
    for i in 0..10 {
        let mut tags = vec!["rust"];
        if i < 3 {
            tags.push("sparql");
        }
        let mut post = json!({
            "_id": format!("p{i}"),
            "title": format!("Post {i}"),
            "ratting": i,
            "published": i % 2 == 0,
            "date": format!("2020-01-{:02}T00:00:00Z", i + 1),
            "tags": tags,
            "author": format!("u{}", i % 3),
        });
        if i % 2 == 0 {
            post["body"] = json!(format!("Body of post {i}"));
        }
        database.save("BlogPost", &post).await.unwrap();
    }
    database
        .save(
            "Comment",
            &json!({"_id": "c1", "title": "Comment 1", "post": "p0"}),
        )
        .await
        .unwrap();
    database
        .save(
            "Comment",
            &json!({"_id": "c0", "title": "Comment 0", "post": "p0", "replies": ["c1"]}),
        )
        .await
        .unwrap();
    database
}
