use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use mongodb::bson::{doc, Bson};
use serde_json::{json, Value};

use super::AppState;

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Handler for GET /health. Reports store reachability.
pub async fn health(State(state): State<AppState>) -> Response {
    let reachable = match state.store.get().await {
        Ok(store) => store.ping().await.is_ok(),
        Err(_) => false,
    };

    if reachable {
        (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "timestamp": timestamp(),
                "uptime": state.started_at.elapsed().as_secs(),
                "database": "connected",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "timestamp": timestamp(),
                "database": "disconnected",
                "error": "Database connection failed",
            })),
        )
            .into_response()
    }
}

/// Handler for GET /health-details. Adds database statistics to the
/// connectivity report.
pub async fn health_details(State(state): State<AppState>) -> Response {
    match collect_details(&state).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => {
            tracing::warn!("Health details unavailable: {e:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "timestamp": timestamp(),
                    "database": {
                        "status": "disconnected",
                        "error": "Database connection failed",
                    },
                    "version": env!("CARGO_PKG_VERSION"),
                })),
            )
                .into_response()
        }
    }
}

async fn collect_details(state: &AppState) -> anyhow::Result<Value> {
    let store = state.store.get().await?;
    store.ping().await?;

    let stats = store.db().run_command(doc! { "dbStats": 1 }).await?;
    let collections = store.db().list_collection_names().await?;

    Ok(json!({
        "status": "healthy",
        "timestamp": timestamp(),
        "uptime": state.started_at.elapsed().as_secs(),
        "database": {
            "status": "connected",
            "name": state.config.db_name,
            "collections": collections.len(),
            "dataSize": stat(&stats, "dataSize"),
            "storageSize": stat(&stats, "storageSize"),
            "indexes": stat(&stats, "indexes"),
            "indexSize": stat(&stats, "indexSize"),
        },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn stat(stats: &mongodb::bson::Document, key: &str) -> Value {
    stats
        .get(key)
        .cloned()
        .map_or(Value::Null, Bson::into_relaxed_extjson)
}
