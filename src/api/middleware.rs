//! Cross-cutting request handling applied ahead of every REST handler:
//! role-tiered rate limiting and `Idempotency-Key` replay for mutating
//! requests. Both read the bearer token themselves rather than depending
//! on the `AuthenticatedUser` extractor, since they run before routing
//! resolves which extractor a handler needs.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Extension, Request},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::{
    infrastructure::{auth::decode_bearer_token, state::AppState},
    services::{
        errors::ServiceError,
        idempotency::{CachedResponse, IdempotencyCheck, IdempotencyService},
        rate_limit::{RateLimiter, RoleTier},
    },
};

const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

pub async fn rate_limit(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let identity = caller_identity(&state, request.headers());
    let tier = RoleTier::for_role(identity.role);

    let limiter = RateLimiter::new(&state);
    if let Err(err) = limiter
        .check(tier, &path, &RateLimiter::identity_for(identity.user_id, &identity.client_ip))
        .await
    {
        return to_response(err).into_response();
    }

    next.run(request).await
}

pub async fn idempotency(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !matches!(request.method(), &axum::http::Method::POST | &axum::http::Method::PUT) {
        return next.run(request).await;
    }
    let Some(key) = request
        .headers()
        .get("idempotency-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
    else {
        return next.run(request).await;
    };
    let identity = caller_identity(&state, request.headers());
    let Some(tenant_id) = identity.tenant_id else {
        return next.run(request).await;
    };

    let service = IdempotencyService::new(&state);
    let tenant_id = tenant_id.to_string();
    match service.begin(&tenant_id, &key).await {
        Ok(IdempotencyCheck::Replay(cached)) => return replay(cached),
        Ok(IdempotencyCheck::Proceed) => {}
        Err(err) => return to_response(err).into_response(),
    }

    let response = next.run(request).await;
    let status = response.status();
    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = ?err, "failed to buffer response for idempotency cache");
            service.abandon(&tenant_id, &key).await;
            return Response::from_parts(parts, Body::empty());
        }
    };

    if status.is_server_error() {
        service.abandon(&tenant_id, &key).await;
    } else {
        let body_json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        let cached = CachedResponse {
            status_code: status.as_u16(),
            body: body_json,
        };
        service.store(&tenant_id, &key, &cached).await;
    }

    Response::from_parts(parts, Body::from(bytes))
}

struct CallerIdentity {
    user_id: Option<uuid::Uuid>,
    tenant_id: Option<uuid::Uuid>,
    role: Option<crate::domain::models::Role>,
    client_ip: String,
}

fn caller_identity(state: &AppState, headers: &HeaderMap) -> CallerIdentity {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let user = bearer.and_then(|token| decode_bearer_token(state, token).ok());
    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    CallerIdentity {
        user_id: user.as_ref().map(|user| user.user_id),
        tenant_id: user.as_ref().map(|user| user.tenant_id),
        role: user.as_ref().map(|user| user.role),
        client_ip,
    }
}

fn replay(cached: CachedResponse) -> Response {
    let status = StatusCode::from_u16(cached.status_code).unwrap_or(StatusCode::OK);
    (status, Json(cached.body)).into_response()
}

fn to_response(err: ServiceError) -> (StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } })),
    )
}
