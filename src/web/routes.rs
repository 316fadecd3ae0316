use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::error::ApiError;
use super::validate::{coerce_tags, non_empty, parse_object_id};
use super::{health, pack, AppState};
use crate::auth::{hash_password, verify_password};
use crate::config::Config;
use crate::store::{self, NewPost, PostPatch, Store};

/// Current time truncated to millisecond precision, so the timestamps in a
/// create/update response match the stored BSON datetimes exactly.
fn now() -> chrono::DateTime<Utc> {
    mongodb::bson::DateTime::now().to_chrono()
}

/// Create the router with all routes.
///
/// The posts routes are mounted twice: under `/api/posts` and under the
/// legacy `/api/lyrics` alias. Both prefixes must stay behaviorally
/// identical, so they share one route builder.
pub fn router(config: &Config) -> Router<AppState> {
    let mut api = Router::new()
        .nest("/posts", post_routes())
        .nest("/lyrics", post_routes())
        .route(
            "/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            put(update_category).delete(delete_category),
        )
        .route(
            "/subcategories",
            get(list_subcategories).post(create_subcategory),
        )
        .route(
            "/subcategories/:id",
            put(update_subcategory).delete(delete_subcategory),
        );

    if config.admin_enabled {
        api = api
            .route("/admins", post(create_admin))
            .route("/admins/login", post(login_admin));
    }

    Router::new()
        .nest("/api", api)
        .route("/health", get(health::health))
        .route("/health-details", get(health::health_details))
}

fn post_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_posts).post(create_post).delete(delete_post_from_query),
        )
        .route("/pack", get(pack::export_pack))
        .route(
            "/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
}

// ========== Posts ==========

/// Post create/update payload. Every field is optional at the wire level;
/// required-field checks happen in the handlers so absent and
/// present-but-empty can be told apart.
#[derive(Debug, Default, Deserialize)]
pub struct PostBody {
    title: Option<String>,
    teacher: Option<String>,
    category: Option<String>,
    #[serde(rename = "subCategory")]
    sub_category: Option<String>,
    body: Option<String>,
    language: Option<String>,
    tags: Option<Value>,
}

async fn list_posts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store().await?;
    let posts = store::list_posts(store).await?;
    Ok(Json(posts))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id("post", &id)?;
    let store = state.store().await?;
    let post = store::get_post(store, id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(post))
}

async fn create_post(
    State(state): State<AppState>,
    payload: Option<Json<PostBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map_or_else(PostBody::default, |Json(p)| p);

    let (Some(title), Some(body)) = (non_empty(payload.title), non_empty(payload.body)) else {
        return Err(ApiError::MissingField("Title and body are required."));
    };

    let new = NewPost {
        title,
        teacher: payload.teacher.unwrap_or_default(),
        category: payload.category.unwrap_or_default(),
        sub_category: payload.sub_category.unwrap_or_default(),
        body,
        language: payload.language.unwrap_or_default(),
        tags: payload.tags.as_ref().map(coerce_tags).unwrap_or_default(),
    };

    let store = state.store().await?;
    let post = store::insert_post(store, new, now()).await?;

    // Best-effort side effect: the post is already created, so a failed
    // notification write is logged and never surfaced.
    if let Err(e) = notify_post_created(store).await {
        error!("Failed to create post notification: {e:#}");
    }

    Ok((StatusCode::CREATED, Json(post)))
}

async fn notify_post_created(store: &Store) -> anyhow::Result<()> {
    let total = store::count_posts(store).await?;
    let message = format!("New post published – total posts: {total}.");
    store::insert_notification(store, &message, now()).await?;
    Ok(())
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<PostBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id("post", &id)?;
    let payload = payload.map_or_else(PostBody::default, |Json(p)| p);

    let patch = PostPatch {
        title: payload.title,
        teacher: payload.teacher,
        category: payload.category,
        sub_category: payload.sub_category,
        body: payload.body,
        language: payload.language,
        tags: payload.tags.as_ref().map(coerce_tags),
    };

    let store = state.store().await?;
    let post = store::update_post(store, id, patch, now())
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id("post", &id)?;
    let store = state.store().await?;
    if !store::delete_post(store, id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    id: Option<String>,
}

/// Delete variant for clients that cannot issue path-based DELETEs: the
/// identifier comes from the query string or, failing that, the body.
async fn delete_post_from_query(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
    payload: Option<Json<Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let id = non_empty(query.id).or_else(|| {
        payload.and_then(|Json(body)| {
            body.get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    });
    let Some(id) = id else {
        return Err(ApiError::MissingField("Post id is required."));
    };

    let id = parse_object_id("post", &id)?;
    let store = state.store().await?;
    if !store::delete_post(store, id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(json!({ "ok": true })))
}

// ========== Notifications ==========

#[derive(Debug, Default, Deserialize)]
pub struct NotificationBody {
    message: Option<String>,
}

async fn list_notifications(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store().await?;
    let notifications = store::list_notifications(store).await?;
    Ok(Json(notifications))
}

async fn create_notification(
    State(state): State<AppState>,
    payload: Option<Json<NotificationBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map_or_else(NotificationBody::default, |Json(p)| p);
    let Some(message) = non_empty(payload.message) else {
        return Err(ApiError::MissingField("Message is required."));
    };

    let store = state.store().await?;
    let notification = store::insert_notification(store, &message, now()).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

// ========== Categories ==========

#[derive(Debug, Default, Deserialize)]
pub struct CategoryBody {
    name: Option<String>,
}

async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store().await?;
    let categories = store::list_categories(store).await?;
    Ok(Json(categories))
}

async fn create_category(
    State(state): State<AppState>,
    payload: Option<Json<CategoryBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map_or_else(CategoryBody::default, |Json(p)| p);
    let Some(name) = non_empty(payload.name) else {
        return Err(ApiError::MissingField("Name is required."));
    };

    let store = state.store().await?;
    let category = store::insert_category(store, &name, now()).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<CategoryBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id("category", &id)?;
    let payload = payload.map_or_else(CategoryBody::default, |Json(p)| p);
    let Some(name) = non_empty(payload.name) else {
        return Err(ApiError::MissingField("Name is required."));
    };

    let store = state.store().await?;
    let category = store::update_category(store, id, &name)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(category))
}

/// Delete a category. No cascade: subcategories referencing it keep their
/// now-dangling `categoryId`.
async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id("category", &id)?;
    let store = state.store().await?;
    if !store::delete_category(store, id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(json!({ "ok": true })))
}

// ========== Subcategories ==========

#[derive(Debug, Default, Deserialize)]
pub struct SubcategoryBody {
    name: Option<String>,
    #[serde(rename = "categoryId")]
    category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubcategoryQuery {
    #[serde(rename = "categoryId")]
    category_id: Option<String>,
}

async fn list_subcategories(
    State(state): State<AppState>,
    Query(query): Query<SubcategoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // Lenient filter policy: a malformed categoryId drops the filter
    // instead of rejecting the request.
    let filter = query
        .category_id
        .as_deref()
        .and_then(|id| parse_object_id("category", id).ok());

    let store = state.store().await?;
    let subcategories = store::list_subcategories(store, filter).await?;
    Ok(Json(subcategories))
}

async fn create_subcategory(
    State(state): State<AppState>,
    payload: Option<Json<SubcategoryBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map_or_else(SubcategoryBody::default, |Json(p)| p);
    let (Some(name), Some(category_id)) =
        (non_empty(payload.name), non_empty(payload.category_id))
    else {
        return Err(ApiError::MissingField("Name and categoryId are required."));
    };
    // The reference must be well-formed, but it is a weak key: whether the
    // category still exists is not checked.
    let Ok(category_id) = parse_object_id("category", &category_id) else {
        return Err(ApiError::MissingField("Name and categoryId are required."));
    };

    let store = state.store().await?;
    let subcategory = store::insert_subcategory(store, &name, category_id, now()).await?;
    Ok((StatusCode::CREATED, Json(subcategory)))
}

async fn update_subcategory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<SubcategoryBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id("subcategory", &id)?;
    let payload = payload.map_or_else(SubcategoryBody::default, |Json(p)| p);
    let Some(name) = non_empty(payload.name) else {
        return Err(ApiError::MissingField("Name is required."));
    };
    // Optional reference change, applied only when syntactically valid.
    let category_id = non_empty(payload.category_id)
        .and_then(|id| parse_object_id("category", &id).ok());

    let store = state.store().await?;
    let subcategory = store::update_subcategory(store, id, &name, category_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(subcategory))
}

async fn delete_subcategory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id("subcategory", &id)?;
    let store = state.store().await?;
    if !store::delete_subcategory(store, id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(json!({ "ok": true })))
}

// ========== Admins ==========

#[derive(Debug, Default, Deserialize)]
pub struct AdminBody {
    username: Option<String>,
    password: Option<String>,
}

/// Compared against when the username does not exist (bcrypt of an
/// unguessable throwaway string).
const DUMMY_PASSWORD_HASH: &str = "$2b$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

async fn create_admin(
    State(state): State<AppState>,
    payload: Option<Json<AdminBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map_or_else(AdminBody::default, |Json(p)| p);
    let (Some(username), Some(password)) =
        (non_empty(payload.username), non_empty(payload.password))
    else {
        return Err(ApiError::MissingField(
            "Username and password are required.",
        ));
    };
    let username = username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::MissingField("Invalid username."));
    }

    let store = state.store().await?;
    if store::find_admin_by_username(store, &username)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict);
    }

    let password_hash = hash_password(&password, state.config.bcrypt_cost)?;
    let id = store::insert_admin(store, &username, &password_hash, now()).await?;

    // The hash never leaves this layer.
    Ok((
        StatusCode::CREATED,
        Json(json!({ "username": username, "_id": id.to_hex() })),
    ))
}

async fn login_admin(
    State(state): State<AppState>,
    payload: Option<Json<AdminBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map_or_else(AdminBody::default, |Json(p)| p);
    let (Some(username), Some(password)) =
        (non_empty(payload.username), non_empty(payload.password))
    else {
        return Err(ApiError::MissingField(
            "Username and password are required.",
        ));
    };
    let username = username.trim();

    let store = state.store().await?;
    // Unknown username and wrong password produce the same response, and
    // the hash comparison runs in both cases to keep their timing aligned.
    let admin = store::find_admin_by_username(store, username).await?;
    let verified = match &admin {
        Some(admin) => verify_password(&password, &admin.password_hash)?,
        None => {
            let _ = verify_password(&password, DUMMY_PASSWORD_HASH);
            false
        }
    };
    let admin = admin.filter(|_| verified).ok_or(ApiError::Unauthorized)?;

    Ok(Json(json!({ "username": admin.username })))
}
