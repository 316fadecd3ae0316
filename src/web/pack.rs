use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::error::ApiError;
use super::AppState;
use crate::store::{self, Post};

/// Denormalized projection of one post for external consumers, decoupled
/// from the internal storage shape.
#[derive(Debug, Serialize)]
pub struct PackItem {
    pub id: String,
    pub title: String,
    pub teacher: String,
    pub category: String,
    #[serde(rename = "subCategory")]
    pub sub_category: String,
    pub body: String,
    pub language: String,
    pub tags: Vec<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct Pack {
    pub version: String,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    pub items: Vec<PackItem>,
}

impl From<Post> for PackItem {
    fn from(post: Post) -> Self {
        Self {
            id: post.id.to_hex(),
            title: post.title,
            teacher: post.teacher,
            category: post.category,
            sub_category: post.sub_category,
            body: post.body,
            language: post.language,
            tags: post.tags,
            updated_at: post.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Handler for the export pack route (GET /api/posts/pack).
pub async fn export_pack(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store().await?;
    let posts = store::list_posts(store).await?;

    Ok(Json(Pack {
        version: state.config.pack_version.clone(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        items: posts.into_iter().map(PackItem::from).collect(),
    }))
}
