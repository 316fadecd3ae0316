//! Integration tests for the store connector and queries.
//!
//! Skipped unless `TEST_MONGODB_URI` points at a live MongoDB instance.

use std::sync::Arc;

use chrono::{Duration, Utc};
use lyrics_post_api::config::Config;
use lyrics_post_api::store::{self, NewPost, PostPatch, StoreManager};
use mongodb::bson::oid::ObjectId;

macro_rules! require_mongo {
    () => {
        match std::env::var("TEST_MONGODB_URI") {
            Ok(uri) => uri,
            Err(_) => {
                eprintln!("TEST_MONGODB_URI not set, skipping");
                return;
            }
        }
    };
}

fn test_config(uri: &str) -> Config {
    let suffix = ObjectId::new().to_hex();
    Config {
        mongodb_uri: uri.to_string(),
        db_name: "lyrics_api_test".to_string(),
        posts_collection: format!("lyrics_{suffix}"),
        notifications_collection: format!("notifications_{suffix}"),
        categories_collection: format!("categories_{suffix}"),
        subcategories_collection: format!("subcategories_{suffix}"),
        admins_collection: format!("admins_{suffix}"),
        admin_enabled: true,
        default_admin_username: "Abel".to_string(),
        default_admin_password: "123".to_string(),
        default_admin_from_fallback: true,
        bcrypt_cost: 4,
        pack_version: "1.0.0".to_string(),
        web_host: "127.0.0.1".to_string(),
        web_port: 0,
        body_limit_bytes: 2 * 1024 * 1024,
    }
}

fn new_post(title: &str) -> NewPost {
    NewPost {
        title: title.to_string(),
        teacher: String::new(),
        category: String::new(),
        sub_category: String::new(),
        body: "body".to_string(),
        language: String::new(),
        tags: Vec::new(),
    }
}

#[tokio::test]
async fn test_concurrent_callers_share_one_store() {
    let uri = require_mongo!();
    let manager = Arc::new(StoreManager::new(Arc::new(test_config(&uri))));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager.get().await.map(|store| store as *const _ as usize)
        }));
    }

    let mut addresses = Vec::new();
    for handle in handles {
        addresses.push(handle.await.unwrap().expect("store should be ready"));
    }
    // Everyone observed the same memoized instance
    assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_seeding_is_idempotent_across_restarts() {
    let uri = require_mongo!();
    let config = Arc::new(test_config(&uri));

    let first = StoreManager::new(Arc::clone(&config));
    let store = first.get().await.expect("store should be ready");
    let seeded = store::find_admin_by_username(store, "Abel")
        .await
        .unwrap()
        .expect("default admin should be seeded");

    // A second manager against the same collections re-runs the seed path
    let second = StoreManager::new(Arc::clone(&config));
    let store = second.get().await.expect("store should be ready");
    let after = store::find_admin_by_username(store, "Abel")
        .await
        .unwrap()
        .expect("default admin should still exist");

    assert_eq!(seeded.id, after.id);
    assert_eq!(seeded.password_hash, after.password_hash);
}

#[tokio::test]
async fn test_post_queries_roundtrip_and_ordering() {
    let uri = require_mongo!();
    let manager = StoreManager::new(Arc::new(test_config(&uri)));
    let store = manager.get().await.expect("store should be ready");

    let base = Utc::now();
    let older = store::insert_post(store, new_post("older"), base - Duration::seconds(5))
        .await
        .unwrap();
    let newer = store::insert_post(store, new_post("newer"), base)
        .await
        .unwrap();

    let fetched = store::get_post(store, older.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "older");
    assert_eq!(fetched.body, "body");
    assert_eq!(fetched.created_at, fetched.updated_at);

    // updatedAt descending
    let posts = store::list_posts(store).await.unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].id, newer.id);
    assert_eq!(posts[1].id, older.id);

    assert_eq!(store::count_posts(store).await.unwrap(), 2);

    // Patching one field bumps it to the top of the list
    let patch = PostPatch {
        language: Some("am".to_string()),
        ..PostPatch::default()
    };
    let patched = store::update_post(store, older.id, patch, base + Duration::seconds(5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(patched.language, "am");
    assert_eq!(patched.title, "older");

    let posts = store::list_posts(store).await.unwrap();
    assert_eq!(posts[0].id, older.id);

    // Deleting twice: second attempt reports nothing matched
    assert!(store::delete_post(store, older.id).await.unwrap());
    assert!(!store::delete_post(store, older.id).await.unwrap());
    assert!(store::get_post(store, older.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_missing_post_returns_none() {
    let uri = require_mongo!();
    let manager = StoreManager::new(Arc::new(test_config(&uri)));
    let store = manager.get().await.expect("store should be ready");

    let result = store::update_post(store, ObjectId::new(), PostPatch::default(), Utc::now())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_connect_failure_is_not_memoized() {
    // Nothing listens on port 1; both calls must fail rather than the
    // second observing a poisoned success.
    let config = test_config("mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=1000");
    let manager = StoreManager::new(Arc::new(config));

    assert!(manager.get().await.is_err());
    assert!(manager.get().await.is_err());
}
