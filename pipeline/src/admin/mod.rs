use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::set_header::response::SetResponseHeaderLayer;

use crate::worker::TaskQueue;

pub mod dto;
pub mod job_handlers;
pub mod layer_handlers;

// ---------- shared state ----------

#[derive(Clone)]
pub struct AdminState {
    pub db: DatabaseConnection,
    /// Worker pool and job registry for imports and deletes.
    pub queue: TaskQueue,
}

// ---------- error type ----------

/// A JSON error response: `{"error": "..."}` with an HTTP status.
pub struct ApiErr(StatusCode, String);

impl ApiErr {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(status, msg.into())
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(StatusCode::CONFLICT, msg.into())
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.1 });
        (self.0, Json(body)).into_response()
    }
}

// ---------- router ----------

pub fn admin_router(state: AdminState, cors_allowed_origins: &[String]) -> Router {
    let allowed_origins: Vec<HeaderValue> = cors_allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new() // no origins allowed = same-origin only
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api/v1", api_v1())
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .with_state(state)
}

fn api_v1() -> Router<AdminState> {
    Router::new()
        // layers
        .route("/layers", get(layer_handlers::list_layers))
        .route("/layers/import", post(layer_handlers::bulk_import))
        .route("/layers/reset", post(layer_handlers::bulk_reset))
        .route(
            "/layers/{id}",
            get(layer_handlers::get_layer).delete(layer_handlers::delete_layer),
        )
        .route("/layers/{id}/import", post(layer_handlers::submit_import))
        .route("/layers/{id}/catalog", get(layer_handlers::get_catalog_layer))
        // jobs
        .route("/jobs/{job_id}", get(job_handlers::job_status))
        .route("/jobs/{job_id}/events", get(job_handlers::job_events))
}
