use axum::{routing::get, Router};

pub mod audit_logs;
pub mod auth;
pub mod budgets;
pub mod departments;
pub mod health;
pub mod internal_jobs;
pub mod invoices;
pub mod placeholders;
pub mod purchase_orders;
pub mod purchase_requests;
pub mod receipts;
pub mod users;
pub mod vendors;
pub mod webhooks;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health::healthcheck))
        .nest("/auth", auth::router())
        .nest("/vendors", vendors::router())
        .nest("/budgets", budgets::router())
        .nest("/purchase-requests", purchase_requests::router())
        .nest("/purchase-orders", purchase_orders::router())
        .nest("/receipts", receipts::router())
        .nest("/invoices", invoices::router())
        .nest("/departments", departments::router())
        .nest("/users", users::router())
        .nest("/audit-logs", audit_logs::router())
        .nest("/webhooks", webhooks::router())
        .nest("/internal/jobs", internal_jobs::router())
        .nest("/rfqs", placeholders::router())
        .nest("/contracts", placeholders::router())
        .nest("/fx-rates", placeholders::router())
        .nest("/devices", placeholders::router())
        .nest("/notifications", placeholders::router())
        .nest("/files", placeholders::router())
}
