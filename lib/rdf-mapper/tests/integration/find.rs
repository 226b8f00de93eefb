use crate::store::blog_database;
use rdf_mapper::model::Document;
use rdf_mapper::{Database, MapperError};
use serde_json::{json, Value as Json};
use std::error::Error;

async fn find_ids(database: &Database, type_name: &str, query: Json) -> Vec<String> {
    database
        .find(type_name, &query, &Json::Null)
        .await
        .unwrap()
        .iter()
        .map(|document| document.id().to_owned())
        .collect()
}

fn posts(numbers: &[usize]) -> Vec<String> {
    numbers.iter().map(|number| format!("p{number}")).collect()
}

#[tokio::test]
async fn every_operator_selects_the_expected_records() {
    let database = blog_database().await;
    let cases = [
        (json!({"ratting": 3}), posts(&[3])),
        (json!({"ratting": {"$eq": "3"}}), posts(&[3])),
        (json!({"ratting": {"$ne": 3}}), posts(&[0, 1, 2, 4, 5, 6, 7, 8, 9])),
        (json!({"ratting": {"$gt": 3}}), posts(&[4, 5, 6, 7, 8, 9])),
        (json!({"ratting": {"$gte": 7}}), posts(&[7, 8, 9])),
        (json!({"ratting": {"$lt": 2}}), posts(&[0, 1])),
        (json!({"ratting": {"$lte": 2}}), posts(&[0, 1, 2])),
        (json!({"ratting": {"$gt": 2, "$lt": 5}}), posts(&[3, 4])),
        (json!({"ratting": {"$in": [1, 8]}}), posts(&[1, 8])),
        (json!({"ratting": {"$nin": [1, 8]}}), posts(&[0, 2, 3, 4, 5, 6, 7, 9])),
        (json!({"title": {"$regex": "[0-2]$"}}), posts(&[0, 1, 2])),
        (json!({"title": {"$regex": "^post 1"}}), posts(&[])),
        (json!({"title": {"$iregex": "^post 1"}}), posts(&[1])),
        (json!({"body": {"$exists": true}}), posts(&[0, 2, 4, 6, 8])),
        (json!({"body": {"$exists": false}}), posts(&[1, 3, 5, 7, 9])),
        (json!({"published": "1"}), posts(&[0, 2, 4, 6, 8])),
        (json!({"date": "2020-01-04T00:00:00Z"}), posts(&[3])),
        (json!({"date": {"$gte": "2020-01-09T00:00:00Z"}}), posts(&[8, 9])),
    ];
    for (query, expected) in cases {
        assert_eq!(
            find_ids(&database, "BlogPost", query.clone()).await,
            expected,
            "{query}"
        );
    }
}

#[tokio::test]
async fn array_operators_test_every_element() {
    let database = blog_database().await;
    assert_eq!(
        find_ids(&database, "BlogPost", json!({"tags": "sparql"})).await,
        posts(&[0, 1, 2])
    );
    assert_eq!(
        find_ids(&database, "BlogPost", json!({"tags": {"$all": ["rust", "sparql"]}})).await,
        posts(&[0, 1, 2])
    );
    assert_eq!(
        find_ids(&database, "BlogPost", json!({"tags": {"$nall": ["sparql"]}})).await,
        posts(&[3, 4, 5, 6, 7, 8, 9])
    );
}

#[tokio::test]
async fn relation_paths_agree_with_their_inverse() {
    let database = blog_database().await;
    assert_eq!(
        find_ids(&database, "BlogPost", json!({"author.name": "alice"})).await,
        posts(&[0, 3, 6, 9])
    );
    assert_eq!(
        find_ids(&database, "BlogPost", json!({"author": "u0"})).await,
        posts(&[0, 3, 6, 9])
    );
    assert_eq!(
        find_ids(&database, "User", json!({"blogPosts.ratting": {"$gte": 8}})).await,
        ["u0", "u2"]
    );
    assert_eq!(
        find_ids(&database, "BlogPost", json!({"comments.title": "Comment 1"})).await,
        posts(&[0])
    );
}

#[tokio::test]
async fn mixin_types_match_every_composing_type() {
    let database = blog_database().await;
    assert_eq!(database.count("Content", &Json::Null).await.unwrap(), 12);
    let documents = database
        .find("Content", &json!({"title": "Post 3"}), &Json::Null)
        .await
        .unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].type_name(), "BlogPost");
}

#[tokio::test]
async fn find_options_order_and_page() {
    let database = blog_database().await;
    let top = database
        .find("BlogPost", &Json::Null, &json!({"sort": "-ratting", "limit": 3}))
        .await
        .unwrap();
    assert_eq!(
        top.iter().map(Document::id).collect::<Vec<_>>(),
        ["p9", "p8", "p7"]
    );

    let page = database
        .find(
            "BlogPost",
            &json!({"published": true}),
            &json!({"sort": ["ratting"], "offset": 1, "limit": 2}),
        )
        .await
        .unwrap();
    assert_eq!(
        page.iter().map(Document::id).collect::<Vec<_>>(),
        ["p2", "p4"]
    );

    let by_author = database
        .find("BlogPost", &Json::Null, &json!({"sort": "author.name,-ratting", "limit": 5}))
        .await
        .unwrap();
    assert_eq!(
        by_author.iter().map(Document::id).collect::<Vec<_>>(),
        ["p9", "p6", "p3", "p0", "p7"]
    );
}

#[tokio::test]
async fn fields_restrict_the_materialized_properties() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    let post = database
        .first("BlogPost", &json!({"ratting": 4}), &json!({"fields": ["title"]}))
        .await?
        .ok_or("p4 not found")?;
    assert_eq!(
        post.to_json(),
        json!({"_id": "p4", "_type": "BlogPost", "title": "Post 4"})
    );
    Ok(())
}

#[tokio::test]
async fn materialized_documents_carry_relation_stubs() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    let documents = database.fetch("BlogPost", &["p1".to_owned()], None).await?;
    assert_eq!(
        documents[0].to_json(),
        json!({
            "_id": "p1",
            "_type": "BlogPost",
            "title": "Post 1",
            "ratting": 1.0,
            "published": false,
            "date": "2020-01-02T00:00:00Z",
            "tags": ["rust", "sparql"],
            "author": {"_id": "u1", "_type": "User"},
        })
    );
    Ok(())
}

#[tokio::test]
async fn identity_lookups_match_the_general_path() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    let query = json!({"_id": {"$in": ["p3", "p1", "missing"]}});
    let direct = database.find("BlogPost", &query, &Json::Null).await?;
    let sorted = database
        .find("BlogPost", &query, &json!({"sort": "_id"}))
        .await?;
    assert_eq!(direct.iter().map(Document::id).collect::<Vec<_>>(), ["p1", "p3"]);
    assert_eq!(direct, sorted);
    Ok(())
}

#[tokio::test]
async fn fetch_keeps_the_requested_order() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    let ids = ["p5", "u0", "p2"].map(str::to_owned);
    let documents = database.fetch("BlogPost", &ids, None).await?;
    assert_eq!(
        documents.iter().map(Document::id).collect::<Vec<_>>(),
        ["p5", "p2"]
    );
    Ok(())
}

#[tokio::test]
async fn count_counts_distinct_records() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    assert_eq!(database.count("BlogPost", &Json::Null).await?, 10);
    assert_eq!(database.count("BlogPost", &json!({"published": true})).await?, 5);
    assert_eq!(database.count("BlogPost", &json!({"tags": "rust"})).await?, 10);
    assert_eq!(database.count("User", &json!({"name": "nobody"})).await?, 0);
    Ok(())
}

#[tokio::test]
async fn invalid_queries_report_every_problem() {
    let database = blog_database().await;
    let error = database
        .find(
            "BlogPost",
            &json!({"ratting": {"$gt": "high"}, "nope": 1}),
            &json!({"limit": -1}),
        )
        .await
        .unwrap_err();
    let MapperError::Validation(errors) = error else {
        panic!("expected a validation error, got {error}");
    };
    assert_eq!(errors.len(), 3);
}
