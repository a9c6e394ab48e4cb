//! Resource groups named in the interface surface but outside the
//! core component design: rfqs, contracts, fx-rates, devices,
//! notifications, and generic file uploads. Mounted so clients get a
//! stable 501 instead of a 404 until each is designed.

use axum::{http::StatusCode, Json, Router};

pub fn router() -> Router {
    Router::new().fallback(not_implemented)
}

async fn not_implemented() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(serde_json::json!({ "error": { "code": "NOT_IMPLEMENTED", "message": "this resource is not yet implemented" } })),
    )
}
