use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    domain::fiscal::fiscal_period,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{budget::BudgetService, errors::ServiceError},
};

pub fn router() -> Router {
    Router::new().route("/availability", get(availability))
}

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    department_id: Uuid,
    fiscal_year: Option<i32>,
    quarter: Option<i32>,
}

async fn availability(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(params): Query<AvailabilityQuery>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let (default_year, default_quarter) = fiscal_period(chrono::Utc::now().date_naive());
    let availability = BudgetService::new(state)
        .check_availability(
            user.tenant_id,
            params.department_id,
            params.fiscal_year.unwrap_or(default_year),
            params.quarter.unwrap_or(default_quarter),
        )
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({
        "budget_id": availability.budget_id,
        "total_cents": availability.total_cents,
        "spent_cents": availability.spent_cents,
        "reserved_cents": availability.reserved_cents,
        "available_cents": availability.available_cents,
    })))
}

fn to_response(err: ServiceError) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } })),
    )
}
