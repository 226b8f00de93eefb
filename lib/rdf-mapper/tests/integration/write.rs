use crate::store::{blog_database, empty_database};
use insta::assert_snapshot;
use rdf_mapper::MapperError;
use serde_json::{json, Value as Json};
use std::error::Error;

#[tokio::test]
async fn saved_documents_are_materialized_unchanged() -> Result<(), Box<dyn Error>> {
    let database = empty_database();
    let saved = database
        .save(
            "BlogPost",
            &json!({
                "title": "Hello",
                "ratting": "2.436",
                "tags": ["b", "a"],
                "date": "2015-03-01",
            }),
        )
        .await?;
    assert_eq!(saved.id().len(), 36);

    let fetched = database
        .fetch("BlogPost", &[saved.id().to_owned()], None)
        .await?;
    assert_eq!(fetched, vec![saved.clone()]);
    assert_eq!(fetched[0].to_json()["ratting"], json!(2.44));
    assert_eq!(fetched[0].to_json()["tags"], json!(["a", "b"]));
    Ok(())
}

#[tokio::test]
async fn saving_replaces_the_whole_record() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    database
        .save("BlogPost", &json!({"_id": "p1", "title": "Changed", "author": "u2"}))
        .await?;
    let post = database
        .first("BlogPost", &json!({"_id": "p1"}), &Json::Null)
        .await?
        .ok_or("p1 not found")?;
    assert_eq!(
        post.to_json(),
        json!({
            "_id": "p1",
            "_type": "BlogPost",
            "title": "Changed",
            "author": {"_id": "u2", "_type": "User"},
        })
    );
    assert_eq!(database.count("BlogPost", &json!({"author": "u1"})).await?, 2);
    Ok(())
}

#[tokio::test]
async fn invalid_documents_are_not_written() {
    let database = blog_database().await;
    let error = database
        .save(
            "BlogPost",
            &json!({"_id": "p1", "ratting": "many", "comments": ["c0"]}),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, MapperError::Validation(_)));
    assert_snapshot!(error, @r#"
    Validation failed with 2 error(s):
    - comments: inverse relationships are read-only
    - ratting: expected a number, got "many"
    "#);
    assert_eq!(
        database.count("BlogPost", &json!({"title": "Post 1"})).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn deleting_a_user_cascades_into_posts_and_comments() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    database.delete("User", "u0").await?;
    assert_eq!(database.count("User", &Json::Null).await?, 2);
    assert_eq!(database.count("BlogPost", &Json::Null).await?, 6);
    assert_eq!(database.count("BlogPost", &json!({"author": "u0"})).await?, 0);
    assert_eq!(database.count("Comment", &Json::Null).await?, 0);
    Ok(())
}

#[tokio::test]
async fn records_without_dependents_can_be_deleted() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    database.delete("BlogPost", "p1").await?;
    assert!(database
        .fetch("BlogPost", &["p1".to_owned()], None)
        .await?
        .is_empty());
    assert_eq!(database.count("User", &Json::Null).await?, 3);
    assert_eq!(database.count("BlogPost", &Json::Null).await?, 9);
    Ok(())
}

#[tokio::test]
async fn self_references_only_lose_the_edge() -> Result<(), Box<dyn Error>> {
    let database = blog_database().await;
    database.delete("Comment", "c0").await?;
    let remaining = database.find("Comment", &Json::Null, &Json::Null).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id(), "c1");
    Ok(())
}

#[test]
fn explained_updates_are_sparql() -> Result<(), Box<dyn Error>> {
    let database = empty_database();
    let save = database.explain_save("User", &json!({"_id": "u1", "name": "alice"}))?;
    assert!(save.contains("INSERT DATA"));
    assert!(save.contains(
        r#"<http://rdf-mapper.org/instances/u1> <http://rdf-mapper.org/properties/name> "alice""#
    ));
    let delete = database.explain_delete("User", "u1")?;
    assert!(delete.starts_with("DELETE"));
    assert!(delete.contains(
        "<http://rdf-mapper.org/properties/author> <http://rdf-mapper.org/instances/u1>"
    ));
    Ok(())
}
