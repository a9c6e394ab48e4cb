use std::sync::Arc;

use axum::{body::Bytes, extract::Extension, routing::post, Json, Router};
use tracing::warn;

use crate::{
    infrastructure::{integrations, state::AppState},
    services::{errors::ServiceError, invoices::InvoiceService},
};

pub fn router() -> Router {
    Router::new().route("/stripe", post(stripe))
}

async fn stripe(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let event = integrations::parse_payment_webhook(&body).map_err(|err| {
        warn!(error = %err, "rejected malformed payment webhook");
        to_response(ServiceError::Validation(err.to_string()))
    })?;

    if !event.paid {
        return Ok(Json(serde_json::json!({ "received": true, "applied": false })));
    }

    let tenant_id: uuid::Uuid =
        sqlx::query_scalar("SELECT tenant_id FROM invoices WHERE id = $1")
            .bind(event.invoice_id)
            .fetch_optional(&state.pool)
            .await
            .map_err(|err| to_response(ServiceError::Internal(err.to_string())))?
            .ok_or(ServiceError::NotFound)
            .map_err(to_response)?;

    InvoiceService::new(state)
        .confirm_payment(tenant_id, event.invoice_id)
        .await
        .map_err(to_response)?;

    Ok(Json(serde_json::json!({ "received": true, "applied": true })))
}

fn to_response(err: ServiceError) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } })),
    )
}
