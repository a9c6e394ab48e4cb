pub mod approvals;
pub mod audit;
pub mod budget;
pub mod errors;
pub mod idempotency;
pub mod invoices;
pub mod matching;
pub mod purchase_orders;
pub mod purchase_requests;
pub mod rate_limit;
pub mod receipts;
pub mod vendors;
