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
        invoices::{InvoiceService, UploadInvoiceRequest},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", post(upload))
        .route("/:id", get(find))
        .route("/:id/match", post(run_match))
        .route("/:id/decide", post(decide))
        .route("/:id/override", post(override_match))
        .route("/:id/dispute", post(dispute))
}

async fn upload(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<UploadInvoiceRequest>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let invoice = InvoiceService::new(state)
        .upload(&user, payload)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "invoice": invoice })))
}

async fn find(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let invoice = InvoiceService::new(state)
        .find(user.tenant_id, id)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "invoice": invoice })))
}

#[derive(Debug, Deserialize)]
struct DepartmentScopedRequest {
    department_id: Uuid,
}

async fn run_match(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DepartmentScopedRequest>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let invoice = InvoiceService::new(state)
        .run_match_and_route(user.tenant_id, id, payload.department_id)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "invoice": invoice })))
}

#[derive(Debug, Deserialize)]
struct DecideRequest {
    department_id: Uuid,
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
    let invoice = InvoiceService::new(state)
        .decide_payment(&user, id, payload.department_id, action, payload.comments)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "invoice": invoice })))
}

#[derive(Debug, Deserialize)]
struct ReasonRequest {
    reason: String,
}

async fn override_match(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReasonRequest>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let invoice = InvoiceService::new(state)
        .override_match(&user, id, payload.reason)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "invoice": invoice })))
}

async fn dispute(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReasonRequest>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let invoice = InvoiceService::new(state)
        .dispute(&user, id, payload.reason)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "invoice": invoice })))
}

fn to_response(err: ServiceError) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } })),
    )
}
