use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        vendors::{VendorOnboardingRequest, VendorService},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", post(onboard).get(list))
        .route("/me", get(me))
        .route("/:id", get(find))
        .route("/:id/review", post(review))
}

async fn onboard(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<VendorOnboardingRequest>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let vendor = VendorService::new(state)
        .onboard(user.tenant_id, payload)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "vendor": vendor })))
}

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let vendors = VendorService::new(state)
        .list(user.tenant_id)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "vendors": vendors })))
}

async fn me(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await
        .map_err(|err| to_response(ServiceError::Internal(err.to_string())))?;
    let vendor = VendorService::new(state)
        .resolve_for_user(user.tenant_id, &email)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "vendor": vendor })))
}

async fn find(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let vendor = VendorService::new(state)
        .find(user.tenant_id, id)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "vendor": vendor })))
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    approve: bool,
}

async fn review(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let vendor = VendorService::new(state)
        .review(&user, user.tenant_id, id, payload.approve)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "vendor": vendor })))
}

fn to_response(err: ServiceError) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } })),
    )
}
