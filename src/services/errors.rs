use axum::http::StatusCode;
use thiserror::Error;

/// Stable, machine-readable error code surfaced in API error bodies
/// alongside the HTTP status, so API consumers can branch on the code
/// without parsing the message.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid state transition: {0}")]
    State(String),
    #[error("budget not found")]
    BudgetNotFound,
    #[error("budget exceeded: requested {requested_cents} over {available_cents} available")]
    BudgetExceeded {
        requested_cents: i64,
        available_cents: i64,
    },
    #[error("approval is not pending for this approver")]
    ApprovalNotYourTurn,
    #[error("a requester may not approve their own request")]
    ApprovalSelfApprove,
    #[error("concurrent request already in flight for this idempotency key")]
    ConcurrentRequest,
    #[error("rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound | ServiceError::BudgetNotFound => StatusCode::NOT_FOUND,
            ServiceError::Forbidden
            | ServiceError::ApprovalNotYourTurn
            | ServiceError::ApprovalSelfApprove => StatusCode::FORBIDDEN,
            ServiceError::Validation(_) | ServiceError::State(_) => StatusCode::BAD_REQUEST,
            ServiceError::BudgetExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::ConcurrentRequest => StatusCode::CONFLICT,
            ServiceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound => "NOT_FOUND",
            ServiceError::Forbidden => "FORBIDDEN",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::State(_) => "INVALID_STATE",
            ServiceError::BudgetNotFound => "BUDGET_NOT_FOUND",
            ServiceError::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            ServiceError::ApprovalNotYourTurn => "APPROVAL_NOT_YOUR_TURN",
            ServiceError::ApprovalSelfApprove => "APPROVAL_SELF_APPROVE_001",
            ServiceError::ConcurrentRequest => "CONCURRENT_REQUEST",
            ServiceError::RateLimited { .. } => "RATE_LIMITED",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub fn map_sqlx_error(err: sqlx::Error) -> ServiceError {
    match err {
        sqlx::Error::RowNotFound => ServiceError::NotFound,
        other => ServiceError::Internal(other.to_string()),
    }
}
