use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    domain::models::User,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::errors::{map_sqlx_error, ServiceError},
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/me", get(me))
        .route("/:id", get(find))
}

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let users = if let Some(department_id) = manager_scope(&user) {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 AND deleted_at IS NULL AND department_id = $2 ORDER BY email",
        )
        .bind(user.tenant_id)
        .bind(department_id)
        .fetch_all(&state.pool)
        .await
    } else {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 AND deleted_at IS NULL ORDER BY email",
        )
        .bind(user.tenant_id)
        .fetch_all(&state.pool)
        .await
    }
    .map_err(map_sqlx_error)
    .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "users": users.into_iter().map(redact).collect::<Vec<_>>() })))
}

async fn find(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let found = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(user.tenant_id)
    .fetch_optional(&state.pool)
    .await
    .map_err(map_sqlx_error)
    .map_err(to_response)?
    .ok_or(ServiceError::NotFound)
    .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "user": redact(found) })))
}

async fn me(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)> {
    let found = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(map_sqlx_error)
        .map_err(to_response)?
        .ok_or(ServiceError::NotFound)
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "user": redact(found) })))
}

fn manager_scope(user: &AuthenticatedUser) -> Option<Uuid> {
    match user.role {
        crate::domain::models::Role::Manager => user.department_id,
        _ => None,
    }
}

fn redact(mut user: User) -> User {
    user.password_hash = None;
    user
}

fn to_response(err: ServiceError) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } })),
    )
}
