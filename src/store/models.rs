use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::serde_helpers::serialize_object_id_as_hex_string;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};

/// A lyrics post.
///
/// Stored posts always have a non-empty title and body; the optional
/// content fields default to the empty string and `tags` to an empty list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id", serialize_with = "serialize_object_id_as_hex_string")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "subCategory", default)]
    pub sub_category: String,
    pub body: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(
        rename = "createdAt",
        deserialize_with = "chrono_datetime_as_bson_datetime::deserialize"
    )]
    pub created_at: DateTime<Utc>,
    #[serde(
        rename = "updatedAt",
        deserialize_with = "chrono_datetime_as_bson_datetime::deserialize"
    )]
    pub updated_at: DateTime<Utc>,
}

/// Validated data for a new post. Built by the create handler after
/// required-field checks and tags coercion.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub teacher: String,
    pub category: String,
    pub sub_category: String,
    pub body: String,
    pub language: String,
    pub tags: Vec<String>,
}

/// A partial update to a post. `None` means the field was absent from the
/// request and keeps its stored value; `Some` overwrites, even with an
/// empty value.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub teacher: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub body: Option<String>,
    pub language: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl PostPatch {
    /// Build the `$set` document for this patch. `updatedAt` is always
    /// refreshed, even for an empty patch.
    #[must_use]
    pub fn into_set_document(self, now: DateTime<Utc>) -> Document {
        let mut set = Document::new();
        if let Some(title) = self.title {
            set.insert("title", title);
        }
        if let Some(teacher) = self.teacher {
            set.insert("teacher", teacher);
        }
        if let Some(category) = self.category {
            set.insert("category", category);
        }
        if let Some(sub_category) = self.sub_category {
            set.insert("subCategory", sub_category);
        }
        if let Some(body) = self.body {
            set.insert("body", body);
        }
        if let Some(language) = self.language {
            set.insert("language", language);
        }
        if let Some(tags) = self.tags {
            set.insert("tags", tags.into_iter().map(Bson::from).collect::<Vec<_>>());
        }
        set.insert("updatedAt", mongodb::bson::DateTime::from_chrono(now));
        set
    }
}

/// A taxonomy category. Deleting one does not cascade to subcategories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id", serialize_with = "serialize_object_id_as_hex_string")]
    pub id: ObjectId,
    pub name: String,
    #[serde(
        rename = "createdAt",
        deserialize_with = "chrono_datetime_as_bson_datetime::deserialize"
    )]
    pub created_at: DateTime<Utc>,
}

/// A subcategory. `categoryId` is a weak lookup key toward a category;
/// dangling references are permitted and must be tolerated by readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcategory {
    #[serde(rename = "_id", serialize_with = "serialize_object_id_as_hex_string")]
    pub id: ObjectId,
    pub name: String,
    #[serde(
        rename = "categoryId",
        serialize_with = "serialize_object_id_as_hex_string"
    )]
    pub category_id: ObjectId,
    #[serde(
        rename = "createdAt",
        deserialize_with = "chrono_datetime_as_bson_datetime::deserialize"
    )]
    pub created_at: DateTime<Utc>,
}

/// An append-only notification feed entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id", serialize_with = "serialize_object_id_as_hex_string")]
    pub id: ObjectId,
    pub message: String,
    #[serde(
        rename = "createdAt",
        deserialize_with = "chrono_datetime_as_bson_datetime::deserialize"
    )]
    pub created_at: DateTime<Utc>,
}

/// An admin credential. The password hash never leaves this layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id", serialize_with = "serialize_object_id_as_hex_string")]
    pub id: ObjectId,
    pub username: String,
    #[serde(rename = "passwordHash", skip_serializing)]
    pub password_hash: String,
    #[serde(
        rename = "createdAt",
        deserialize_with = "chrono_datetime_as_bson_datetime::deserialize"
    )]
    pub created_at: DateTime<Utc>,
}
