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
        receipts::{ReceiptService, RecordReceiptRequest},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", post(record))
        .route("/:id", get(find))
}

async fn record(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<RecordReceiptRequest>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let receipt = ReceiptService::new(state)
        .record(&user, payload)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "receipt": receipt })))
}

async fn find(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let service = ReceiptService::new(state);
    let receipt = service.find(user.tenant_id, id).await.map_err(to_response)?;
    let line_items = service.line_items(id).await.map_err(to_response)?;
    Ok(Json(serde_json::json!({ "receipt": receipt, "line_items": line_items })))
}

fn to_response(err: ServiceError) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } })),
    )
}
