use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson};
use mongodb::options::ReturnDocument;

use super::models::{Admin, Category, NewPost, Notification, Post, PostPatch, Subcategory};
use super::Store;

fn bson_now(now: DateTime<Utc>) -> mongodb::bson::DateTime {
    mongodb::bson::DateTime::from_chrono(now)
}

// ========== Posts ==========

/// Get all posts ordered by `updatedAt` descending.
pub async fn list_posts(store: &Store) -> Result<Vec<Post>> {
    store
        .posts()
        .clone_with_type::<Post>()
        .find(doc! {})
        .sort(doc! { "updatedAt": -1 })
        .await
        .context("Failed to query posts")?
        .try_collect()
        .await
        .context("Failed to collect posts")
}

/// Get a post by its identifier.
pub async fn get_post(store: &Store, id: ObjectId) -> Result<Option<Post>> {
    store
        .posts()
        .clone_with_type::<Post>()
        .find_one(doc! { "_id": id })
        .await
        .context("Failed to fetch post")
}

/// Insert a new post, stamping `createdAt` and `updatedAt` with `now`.
pub async fn insert_post(store: &Store, new: NewPost, now: DateTime<Utc>) -> Result<Post> {
    let document = doc! {
        "title": &new.title,
        "teacher": &new.teacher,
        "category": &new.category,
        "subCategory": &new.sub_category,
        "body": &new.body,
        "language": &new.language,
        "tags": new.tags.iter().map(|t| Bson::from(t.as_str())).collect::<Vec<_>>(),
        "createdAt": bson_now(now),
        "updatedAt": bson_now(now),
    };

    let result = store
        .posts()
        .insert_one(document)
        .await
        .context("Failed to insert post")?;
    let id = result
        .inserted_id
        .as_object_id()
        .context("Insert did not return an ObjectId")?;

    Ok(Post {
        id,
        title: new.title,
        teacher: new.teacher,
        category: new.category,
        sub_category: new.sub_category,
        body: new.body,
        language: new.language,
        tags: new.tags,
        created_at: now,
        updated_at: now,
    })
}

/// Apply a partial update, returning the post-update document.
/// Returns `None` when no post matches the identifier.
pub async fn update_post(
    store: &Store,
    id: ObjectId,
    patch: PostPatch,
    now: DateTime<Utc>,
) -> Result<Option<Post>> {
    store
        .posts()
        .clone_with_type::<Post>()
        .find_one_and_update(doc! { "_id": id }, doc! { "$set": patch.into_set_document(now) })
        .return_document(ReturnDocument::After)
        .await
        .context("Failed to update post")
}

/// Delete a post by identifier. Returns false when nothing matched.
pub async fn delete_post(store: &Store, id: ObjectId) -> Result<bool> {
    let result = store
        .posts()
        .delete_one(doc! { "_id": id })
        .await
        .context("Failed to delete post")?;
    Ok(result.deleted_count > 0)
}

/// Count all stored posts.
pub async fn count_posts(store: &Store) -> Result<u64> {
    store
        .posts()
        .count_documents(doc! {})
        .await
        .context("Failed to count posts")
}

// ========== Notifications ==========

/// Get all notifications ordered by `createdAt` descending.
pub async fn list_notifications(store: &Store) -> Result<Vec<Notification>> {
    store
        .notifications()
        .clone_with_type::<Notification>()
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await
        .context("Failed to query notifications")?
        .try_collect()
        .await
        .context("Failed to collect notifications")
}

/// Append a notification. The feed is append-only.
pub async fn insert_notification(
    store: &Store,
    message: &str,
    now: DateTime<Utc>,
) -> Result<Notification> {
    let result = store
        .notifications()
        .insert_one(doc! { "message": message, "createdAt": bson_now(now) })
        .await
        .context("Failed to insert notification")?;
    let id = result
        .inserted_id
        .as_object_id()
        .context("Insert did not return an ObjectId")?;

    Ok(Notification {
        id,
        message: message.to_string(),
        created_at: now,
    })
}

// ========== Categories ==========

/// Get all categories ordered by name ascending.
pub async fn list_categories(store: &Store) -> Result<Vec<Category>> {
    store
        .categories()
        .clone_with_type::<Category>()
        .find(doc! {})
        .sort(doc! { "name": 1 })
        .await
        .context("Failed to query categories")?
        .try_collect()
        .await
        .context("Failed to collect categories")
}

pub async fn insert_category(store: &Store, name: &str, now: DateTime<Utc>) -> Result<Category> {
    let result = store
        .categories()
        .insert_one(doc! { "name": name, "createdAt": bson_now(now) })
        .await
        .context("Failed to insert category")?;
    let id = result
        .inserted_id
        .as_object_id()
        .context("Insert did not return an ObjectId")?;

    Ok(Category {
        id,
        name: name.to_string(),
        created_at: now,
    })
}

/// Rename a category. Returns `None` when no category matches.
pub async fn update_category(store: &Store, id: ObjectId, name: &str) -> Result<Option<Category>> {
    store
        .categories()
        .clone_with_type::<Category>()
        .find_one_and_update(doc! { "_id": id }, doc! { "$set": { "name": name } })
        .return_document(ReturnDocument::After)
        .await
        .context("Failed to update category")
}

/// Delete a category. Subcategories referencing it are left dangling.
pub async fn delete_category(store: &Store, id: ObjectId) -> Result<bool> {
    let result = store
        .categories()
        .delete_one(doc! { "_id": id })
        .await
        .context("Failed to delete category")?;
    Ok(result.deleted_count > 0)
}

// ========== Subcategories ==========

/// Get subcategories ordered by name ascending, optionally filtered by
/// parent category.
pub async fn list_subcategories(
    store: &Store,
    category_id: Option<ObjectId>,
) -> Result<Vec<Subcategory>> {
    let filter = match category_id {
        Some(id) => doc! { "categoryId": id },
        None => doc! {},
    };
    store
        .subcategories()
        .clone_with_type::<Subcategory>()
        .find(filter)
        .sort(doc! { "name": 1 })
        .await
        .context("Failed to query subcategories")?
        .try_collect()
        .await
        .context("Failed to collect subcategories")
}

pub async fn insert_subcategory(
    store: &Store,
    name: &str,
    category_id: ObjectId,
    now: DateTime<Utc>,
) -> Result<Subcategory> {
    let result = store
        .subcategories()
        .insert_one(doc! {
            "name": name,
            "categoryId": category_id,
            "createdAt": bson_now(now),
        })
        .await
        .context("Failed to insert subcategory")?;
    let id = result
        .inserted_id
        .as_object_id()
        .context("Insert did not return an ObjectId")?;

    Ok(Subcategory {
        id,
        name: name.to_string(),
        category_id,
        created_at: now,
    })
}

/// Update a subcategory's name and, when supplied, its parent category.
/// Returns `None` when no subcategory matches.
pub async fn update_subcategory(
    store: &Store,
    id: ObjectId,
    name: &str,
    category_id: Option<ObjectId>,
) -> Result<Option<Subcategory>> {
    let mut set = doc! { "name": name };
    if let Some(category_id) = category_id {
        set.insert("categoryId", category_id);
    }
    store
        .subcategories()
        .clone_with_type::<Subcategory>()
        .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await
        .context("Failed to update subcategory")
}

pub async fn delete_subcategory(store: &Store, id: ObjectId) -> Result<bool> {
    let result = store
        .subcategories()
        .delete_one(doc! { "_id": id })
        .await
        .context("Failed to delete subcategory")?;
    Ok(result.deleted_count > 0)
}

// ========== Admins ==========

/// Look up an admin by exact (case-sensitive) username.
pub async fn find_admin_by_username(store: &Store, username: &str) -> Result<Option<Admin>> {
    store
        .admins()
        .clone_with_type::<Admin>()
        .find_one(doc! { "username": username })
        .await
        .context("Failed to fetch admin")
}

/// Insert a new admin credential, returning its identifier.
pub async fn insert_admin(
    store: &Store,
    username: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<ObjectId> {
    let result = store
        .admins()
        .insert_one(doc! {
            "username": username,
            "passwordHash": password_hash,
            "createdAt": bson_now(now),
        })
        .await
        .context("Failed to insert admin")?;
    result
        .inserted_id
        .as_object_id()
        .context("Insert did not return an ObjectId")
}
