pub mod list;
pub mod upload;
pub mod validation;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, UploadActionConfig};
use crate::error::StorageError;
use crate::storage::ObjectStorage;

use list::{ListAction, ListMode};
use upload::UploadAction;
use validation::UploadMode;

/// Request level error, rendered as `{"error": message}` / 请求级错误
#[derive(Debug, Error)]
pub enum ActionError {
    /// Wrong method or malformed body; not retried / 错误的请求
    #[error("{0}")]
    BadRequest(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ActionError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ActionError::Storage(e) => {
                tracing::error!("Storage request failed: {}", e);
                (StatusCode::BAD_GATEWAY, "Storage is unavailable.".to_string())
            }
            ActionError::Io(e) => {
                tracing::error!("Failed to spool upload: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// GET /api/health - 版本信息
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "build_time": env!("BUILD_TIME"),
    }))
}

/// Build the application router / 创建路由
pub fn create_router(storage: Arc<ObjectStorage>, config: &AppConfig) -> Router {
    let upload = &config.upload;

    let list_route = |path: &str, mode: ListMode| -> Router {
        Router::new()
            .route(path, any(list::list))
            .with_state(Arc::new(ListAction::new(storage.clone(), mode)))
    };
    let upload_route = |path: &str, mode: UploadMode, settings: &UploadActionConfig| -> Router {
        Router::new()
            .route(path, any(upload::upload))
            .with_state(Arc::new(UploadAction::from_config(storage.clone(), mode, settings)))
    };

    let body_limit = match config.server.max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/api/health", get(health))
        .merge(list_route("/api/images", ListMode::Images))
        .merge(list_route("/api/files", ListMode::Files))
        .merge(upload_route("/api/images/upload", UploadMode::Image, &upload.images))
        .merge(upload_route("/api/files/upload", UploadMode::File, &upload.files))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
