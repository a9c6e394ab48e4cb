use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    domain::models::{Department, Role},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::errors::{map_sqlx_error, ServiceError},
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(find))
}

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let departments = sqlx::query_as::<_, Department>(
        "SELECT * FROM departments WHERE tenant_id = $1 ORDER BY name",
    )
    .bind(user.tenant_id)
    .fetch_all(&state.pool)
    .await
    .map_err(map_sqlx_error)
    .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "departments": departments })))
}

async fn find(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let department = sqlx::query_as::<_, Department>(
        "SELECT * FROM departments WHERE id = $1 AND tenant_id = $2",
    )
    .bind(id)
    .bind(user.tenant_id)
    .fetch_optional(&state.pool)
    .await
    .map_err(map_sqlx_error)
    .map_err(to_response)?
    .ok_or(ServiceError::NotFound)
    .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "department": department })))
}

#[derive(Debug, Deserialize)]
struct CreateDepartmentRequest {
    name: String,
    code: Option<String>,
    manager_id: Option<Uuid>,
    parent_department_id: Option<Uuid>,
}

async fn create(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateDepartmentRequest>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    if user.role != Role::Admin {
        return Err(to_response(ServiceError::Forbidden));
    }
    let department = sqlx::query_as::<_, Department>(
        r#"
        INSERT INTO departments (id, tenant_id, name, code, manager_id, parent_department_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, now())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.tenant_id)
    .bind(&payload.name)
    .bind(&payload.code)
    .bind(payload.manager_id)
    .bind(payload.parent_department_id)
    .fetch_one(&state.pool)
    .await
    .map_err(map_sqlx_error)
    .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "department": department })))
}

fn to_response(err: ServiceError) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } })),
    )
}
