//! HTTP-triggerable surface for the scheduled sweeps in `crate::jobs`,
//! for operators who want to run them on demand or from an external
//! scheduler instead of waiting for the in-process interval. Gated by
//! `X-Internal-Secret` rather than a bearer JWT; bypassed only when
//! `config.app.debug` is set, matching the `bypass_auth` precedent.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use subtle::ConstantTimeEq;

use crate::{infrastructure::state::AppState, jobs};

pub fn router() -> Router {
    Router::new()
        .route("/approval-timeouts", post(approval_timeouts))
        .route("/budget-alerts", post(budget_alerts))
        .route("/risk-score-refresh", post(risk_score_refresh))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    if state.config.app.debug {
        return Ok(());
    }
    let expected = state.config.security.internal_job_secret.as_bytes();
    let provided = headers
        .get("x-internal-secret")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !expected.is_empty() && provided.as_bytes().ct_eq(expected).into() {
        Ok(())
    } else {
        Err(unauthorized())
    }
}

fn unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": { "code": "UNAUTHORIZED", "message": "missing or invalid X-Internal-Secret" } })),
    )
}

async fn approval_timeouts(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    authorize(&state, &headers)?;
    jobs::check_approval_timeouts(&state)
        .await
        .map_err(internal_error)?;
    Ok(Json(serde_json::json!({ "ran": "approval-timeouts" })))
}

async fn budget_alerts(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    authorize(&state, &headers)?;
    jobs::check_budget_utilization(&state)
        .await
        .map_err(internal_error)?;
    Ok(Json(serde_json::json!({ "ran": "budget-alerts" })))
}

async fn risk_score_refresh(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    authorize(&state, &headers)?;
    jobs::refresh_vendor_risk_scores(&state)
        .await
        .map_err(internal_error)?;
    Ok(Json(serde_json::json!({ "ran": "risk-score-refresh" })))
}

fn internal_error(err: anyhow::Error) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": { "code": "INTERNAL_ERROR", "message": err.to_string() } })),
    )
}
