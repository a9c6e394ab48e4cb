use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use crate::{
    domain::models::{AuditLog, Role},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::errors::{map_sqlx_error, ServiceError},
};

pub fn router() -> Router {
    Router::new().route("/", get(list))
}

const ALLOWED_ROLES: [Role; 4] = [Role::Admin, Role::FinanceHead, Role::Cfo, Role::ProcurementLead];

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    if !ALLOWED_ROLES.contains(&user.role) {
        return Err(to_response(ServiceError::Forbidden));
    }
    let logs = sqlx::query_as::<_, AuditLog>(
        "SELECT * FROM audit_logs WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT 200",
    )
    .bind(user.tenant_id)
    .fetch_all(&state.pool)
    .await
    .map_err(map_sqlx_error)
    .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "audit_logs": logs })))
}

fn to_response(err: ServiceError) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } })),
    )
}
