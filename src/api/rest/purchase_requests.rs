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
        approvals::ApprovalAction,
        errors::ServiceError,
        purchase_requests::{CreatePrRequest, PurchaseRequestService},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create))
        .route("/:id", get(find))
        .route("/:id/submit", post(submit))
        .route("/:id/decide", post(decide))
        .route("/:id/cancel", post(cancel))
}

async fn create(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreatePrRequest>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let pr = PurchaseRequestService::new(state)
        .create_draft(&user, payload)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "purchase_request": pr })))
}

async fn find(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let service = PurchaseRequestService::new(state);
    let pr = service.find(user.tenant_id, id).await.map_err(to_response)?;
    let line_items = service.line_items(id).await.map_err(to_response)?;
    Ok(Json(serde_json::json!({ "purchase_request": pr, "line_items": line_items })))
}

async fn submit(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let pr = PurchaseRequestService::new(state)
        .submit(&user, id)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "purchase_request": pr })))
}

#[derive(Debug, Deserialize)]
struct DecideRequest {
    approve: bool,
    comments: Option<String>,
}

async fn decide(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecideRequest>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let action = if payload.approve {
        ApprovalAction::Approve
    } else {
        ApprovalAction::Reject
    };
    let pr = PurchaseRequestService::new(state)
        .decide(&user, id, action, payload.comments)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "purchase_request": pr })))
}

async fn cancel(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let pr = PurchaseRequestService::new(state)
        .cancel(&user, id)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "purchase_request": pr })))
}

fn to_response(err: ServiceError) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } })),
    )
}
