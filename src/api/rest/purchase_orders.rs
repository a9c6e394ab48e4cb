use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        purchase_orders::{IssuePoRequest, PurchaseOrderService},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", post(issue))
        .route("/:id", get(find))
        .route("/:id/acknowledge", post(acknowledge))
        .route("/:id/cancel", post(cancel))
}

async fn issue(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<IssuePoRequest>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let po = PurchaseOrderService::new(state)
        .issue(&user, payload)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "purchase_order": po })))
}

async fn find(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let service = PurchaseOrderService::new(state);
    let po = service.find(user.tenant_id, id).await.map_err(to_response)?;
    let line_items = service.line_items(id).await.map_err(to_response)?;
    Ok(Json(serde_json::json!({ "purchase_order": po, "line_items": line_items })))
}

async fn acknowledge(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let po = PurchaseOrderService::new(state)
        .acknowledge(user.tenant_id, user.user_id, id)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "purchase_order": po })))
}

async fn cancel(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let po = PurchaseOrderService::new(state)
        .cancel(user.tenant_id, user.user_id, id)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "purchase_order": po })))
}

fn to_response(err: ServiceError) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } })),
    )
}
