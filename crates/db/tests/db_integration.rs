//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `bubbles_test`)
//!   `TEST_DB_PASSWORD` (default: `bubbles_test`)
//!   `TEST_DB_NAME` (default: `bubbles_test`)

#![allow(clippy::unwrap_used)]

use bubbles_common::{AppError, IdGenerator};
use bubbles_db::entities::filter::{IndexedBy, ResourceKind};
use bubbles_db::repositories::{
    BubbleRepository, CreateFilterInput, FilterRepository, ResourceRepository,
};
use bubbles_db::test_utils::{
    TestDatabase, TestDbConfig, delete_bucket, grant_access, insert_bucket, insert_tag, insert_user,
};
use serde_json::json;

fn filter_input(creator_id: &str, bucket_ids: &[&str]) -> CreateFilterInput {
    let bucket_ids: Vec<String> = bucket_ids.iter().map(ToString::to_string).collect();
    CreateFilterInput {
        id: IdGenerator::new().generate(),
        creator_id: creator_id.to_string(),
        params: json!({ "bucket_ids": bucket_ids }),
        bucket_ids,
        tag_ids: Vec::new(),
        assignee_ids: Vec::new(),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_filter_is_uniqueness_race() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    insert_user(db.connection(), "u1", "acc1").await.unwrap();
    insert_bucket(db.connection(), "b1", "acc1").await.unwrap();

    let conn = db.shared();
    let repo = FilterRepository::new(conn);

    let first = repo.create(filter_input("u1", &["b1"])).await.unwrap();
    let second = repo.create(filter_input("u1", &["b1"])).await;
    assert!(matches!(second, Err(AppError::UniquenessRace(_))));

    let found = repo
        .find_by_creator_and_params("u1", &json!({ "bucket_ids": ["b1"] }))
        .await
        .unwrap();
    assert_eq!(found.map(|f| f.id), Some(first.id.clone()));

    let ids = repo.relation_ids(&first.id).await.unwrap();
    assert_eq!(ids.bucket_ids, vec!["b1"]);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_remove_reference_unlinks_and_touches() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    insert_user(db.connection(), "u1", "acc1").await.unwrap();
    insert_bucket(db.connection(), "b5", "acc1").await.unwrap();
    insert_bucket(db.connection(), "b6", "acc1").await.unwrap();

    let repo = FilterRepository::new(db.shared());
    let created = repo.create(filter_input("u1", &["b5", "b6"])).await.unwrap();

    let updated = repo
        .remove_reference(
            &created.id,
            ResourceKind::Bucket,
            "b5",
            json!({ "bucket_ids": ["b6"] }),
        )
        .await
        .unwrap()
        .unwrap();

    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.params, json!({ "bucket_ids": ["b6"] }));
    assert_eq!(
        repo.relation_ids(&created.id).await.unwrap().bucket_ids,
        vec!["b6"]
    );
    assert_eq!(
        repo.find_ids_referencing(ResourceKind::Bucket, "b6").await.unwrap(),
        vec![created.id]
    );

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_deleted_bucket_is_found_through_params() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    insert_user(db.connection(), "u1", "acc1").await.unwrap();
    insert_bucket(db.connection(), "b5", "acc1").await.unwrap();
    insert_bucket(db.connection(), "b6", "acc1").await.unwrap();

    let repo = FilterRepository::new(db.shared());
    let created = repo.create(filter_input("u1", &["b5", "b6"])).await.unwrap();

    delete_bucket(db.connection(), "b5").await.unwrap();

    assert_eq!(
        repo.relation_ids(&created.id).await.unwrap().bucket_ids,
        vec!["b6"]
    );
    assert_eq!(
        repo.find_ids_referencing(ResourceKind::Bucket, "b5").await.unwrap(),
        vec![created.id]
    );

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_scope_lookup_ignores_other_accounts() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    insert_user(db.connection(), "u1", "acc1").await.unwrap();
    insert_tag(db.connection(), "t1", "acc1").await.unwrap();
    insert_tag(db.connection(), "t2", "acc2").await.unwrap();

    let repo = ResourceRepository::new(db.shared());
    let account = repo.account_of("u1").await.unwrap().unwrap();
    let found = repo
        .ids_in_account(&account, ResourceKind::Tag, &["t1".to_string(), "t2".to_string()])
        .await
        .unwrap();

    assert!(found.contains("t1"));
    assert!(!found.contains("t2"));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_accessible_bubbles_query_runs() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    insert_user(db.connection(), "u1", "acc1").await.unwrap();
    insert_bucket(db.connection(), "b1", "acc1").await.unwrap();
    grant_access(db.connection(), "b1", "u1").await.unwrap();

    let repo = BubbleRepository::new(db.shared());
    let bubbles = repo
        .accessible_bubbles("u1")
        .indexed_by(IndexedBy::Newest)
        .active()
        .unassigned()
        .fetch(10)
        .await
        .unwrap();

    assert!(bubbles.is_empty());

    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}

#[test]
fn test_postgres_url_format() {
    let config = TestDbConfig::default();
    let url = config.postgres_url();
    assert!(url.ends_with("/postgres"));
}
