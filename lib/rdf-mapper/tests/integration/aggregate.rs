use crate::store::blog_database;
use rdf_mapper::logical::AggregateRow;
use rdf_mapper::model::Value;
use serde_json::{json, Map, Value as Json};
use std::error::Error;

fn to_json(rows: &[AggregateRow]) -> Json {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|(label, value)| (label.clone(), value.to_json()))
                .collect::<Map<_, _>>()
                .into()
        })
        .collect::<Vec<Json>>()
        .into()
}

#[tokio::test]
async fn groups_are_aggregated_and_sorted_by_label() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    let rows = database
        .aggregate(
            "BlogPost",
            &json!({
                "author": "author.name",
                "posts": {"$count": true},
                "average": {"$avg": "ratting"},
                "best": {"$max": "ratting"},
            }),
            &Json::Null,
            &json!({"sort": "-average"}),
        )
        .await?;
    assert_eq!(
        to_json(&rows),
        json!([
            {"author": "carol", "posts": 3.0, "average": 5.0, "best": 8.0},
            {"author": "alice", "posts": 4.0, "average": 4.5, "best": 9.0},
            {"author": "bob", "posts": 3.0, "average": 4.0, "best": 7.0},
        ])
    );
    Ok(())
}

#[tokio::test]
async fn aggregations_respect_the_filter() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    let rows = database
        .aggregate(
            "BlogPost",
            &json!({"published": "published", "total": {"$sum": "ratting"}}),
            &json!({"ratting": {"$lt": 4}}),
            &Json::Null,
        )
        .await?;
    assert_eq!(
        to_json(&rows),
        json!([
            {"published": false, "total": 4.0},
            {"published": true, "total": 2.0},
        ])
    );
    Ok(())
}

#[tokio::test]
async fn relation_groups_decode_to_references() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    let rows = database
        .aggregate(
            "BlogPost",
            &json!({"author": "author", "first": {"$min": "date"}}),
            &Json::Null,
            &json!({"limit": 1}),
        )
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("author").map(Value::to_json),
        Some(json!({"_id": "u0", "_type": "User"}))
    );
    assert_eq!(
        rows[0].get("first").map(Value::to_json),
        Some(json!("2020-01-01T00:00:00Z"))
    );
    Ok(())
}

#[tokio::test]
async fn unknown_sort_labels_are_rejected() {
    let database = blog_database().await;
    let error = database
        .aggregate(
            "BlogPost",
            &json!({"posts": {"$count": true}}),
            &Json::Null,
            &json!({"sort": "ratting"}),
        )
        .await
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Validation failed with 1 error(s):\n- options.sort: unknown label 'ratting'"
    );
}
