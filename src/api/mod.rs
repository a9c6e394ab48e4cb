use axum::{http::StatusCode, middleware::from_fn, Json, Router};

use self::rest::router as rest_router;

pub mod graphql;
pub mod middleware;
pub mod rest;

pub fn build_router() -> Router {
    Router::new()
        .nest("/api", rest_router())
        .nest("/api", graphql::router())
        .fallback(not_found)
        .layer(from_fn(middleware::idempotency))
        .layer(from_fn(middleware::rate_limit))
}

pub async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": {"code": "NOT_FOUND", "message": "resource not found"}})),
    )
}
