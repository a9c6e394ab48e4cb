use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, Json};
use tracing::warn;

use crate::infrastructure::state::AppState;

pub async fn healthcheck(
    Extension(state): Extension<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(|err| warn!(error = %err, "health check: database unreachable"))
        .is_ok();

    let cache_ok = state
        .cache
        .ping()
        .await
        .map_err(|err| warn!(error = %err, "health check: cache unreachable"))
        .unwrap_or(false);

    let status = if db_ok && cache_ok { "ok" } else { "unavailable" };
    let code = if db_ok && cache_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(serde_json::json!({
            "status": status,
            "database": db_ok,
            "cache": cache_ok,
        })),
    )
}
