use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Implements `sqlx::Type`/`Encode`/`Decode` for Postgres `TEXT` columns
/// in terms of the type's own `as_str`/`FromStr`, so status and kind
/// enums can be bound and fetched directly in raw queries.
macro_rules! pg_text_enum {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                raw.parse::<$ty>().map_err(Into::into)
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    Admin,
    Cfo,
    FinanceHead,
    Finance,
    ProcurementLead,
    Procurement,
    Manager,
    Vendor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cfo => "cfo",
            Role::FinanceHead => "finance_head",
            Role::Finance => "finance",
            Role::ProcurementLead => "procurement_lead",
            Role::Procurement => "procurement",
            Role::Manager => "manager",
            Role::Vendor => "vendor",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "cfo" => Ok(Role::Cfo),
            "finance_head" => Ok(Role::FinanceHead),
            "finance" => Ok(Role::Finance),
            "procurement_lead" => Ok(Role::ProcurementLead),
            "procurement" => Ok(Role::Procurement),
            "manager" => Ok(Role::Manager),
            "vendor" => Ok(Role::Vendor),
            other => Err(format!("unknown role {other}")),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

pg_text_enum!(Role);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: String,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Department {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub manager_id: Option<Uuid>,
    pub parent_department_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
    pub fcm_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Budget {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub department_id: Uuid,
    pub fiscal_year: i32,
    pub quarter: i32,
    pub total_cents: i64,
    pub spent_cents: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReservationStatus {
    Committed,
    Spent,
    Released,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Committed => "COMMITTED",
            ReservationStatus::Spent => "SPENT",
            ReservationStatus::Released => "RELEASED",
        }
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMMITTED" => Ok(ReservationStatus::Committed),
            "SPENT" => Ok(ReservationStatus::Spent),
            "RELEASED" => Ok(ReservationStatus::Released),
            other => Err(format!("unknown reservation status {other}")),
        }
    }
}

impl From<ReservationStatus> for String {
    fn from(status: ReservationStatus) -> Self {
        status.as_str().to_string()
    }
}

pg_text_enum!(ReservationStatus);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BudgetEntityType {
    Pr,
    Po,
    Invoice,
}

impl BudgetEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetEntityType::Pr => "PR",
            BudgetEntityType::Po => "PO",
            BudgetEntityType::Invoice => "INVOICE",
        }
    }
}

impl FromStr for BudgetEntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PR" => Ok(BudgetEntityType::Pr),
            "PO" => Ok(BudgetEntityType::Po),
            "INVOICE" => Ok(BudgetEntityType::Invoice),
            other => Err(format!("unknown budget entity type {other}")),
        }
    }
}

impl From<BudgetEntityType> for String {
    fn from(kind: BudgetEntityType) -> Self {
        kind.as_str().to_string()
    }
}

pg_text_enum!(BudgetEntityType);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BudgetReservation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub budget_id: Uuid,
    pub entity_type: BudgetEntityType,
    pub entity_id: Uuid,
    pub amount_cents: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VendorStatus {
    Draft,
    PendingReview,
    Active,
    Blocked,
}

impl VendorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorStatus::Draft => "DRAFT",
            VendorStatus::PendingReview => "PENDING_REVIEW",
            VendorStatus::Active => "ACTIVE",
            VendorStatus::Blocked => "BLOCKED",
        }
    }
}

impl FromStr for VendorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(VendorStatus::Draft),
            "PENDING_REVIEW" => Ok(VendorStatus::PendingReview),
            "ACTIVE" => Ok(VendorStatus::Active),
            "BLOCKED" => Ok(VendorStatus::Blocked),
            other => Err(format!("unknown vendor status {other}")),
        }
    }
}

impl From<VendorStatus> for String {
    fn from(status: VendorStatus) -> Self {
        status.as_str().to_string()
    }
}

pg_text_enum!(VendorStatus);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vendor {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub legal_name: String,
    pub tax_id: Option<String>,
    pub email: String,
    pub status: VendorStatus,
    pub risk_score: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PrStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrStatus::Draft => "DRAFT",
            PrStatus::Pending => "PENDING",
            PrStatus::Approved => "APPROVED",
            PrStatus::Rejected => "REJECTED",
            PrStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for PrStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(PrStatus::Draft),
            "PENDING" => Ok(PrStatus::Pending),
            "APPROVED" => Ok(PrStatus::Approved),
            "REJECTED" => Ok(PrStatus::Rejected),
            "CANCELLED" => Ok(PrStatus::Cancelled),
            other => Err(format!("unknown PR status {other}")),
        }
    }
}

impl From<PrStatus> for String {
    fn from(status: PrStatus) -> Self {
        status.as_str().to_string()
    }
}

pg_text_enum!(PrStatus);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub pr_number: String,
    pub requester_id: Uuid,
    pub department_id: Uuid,
    pub status: PrStatus,
    pub total_cents: i64,
    pub currency: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PrLineItem {
    pub id: Uuid,
    pub pr_id: Uuid,
    pub line_number: i32,
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PoStatus {
    Draft,
    Issued,
    Acknowledged,
    PartiallyFulfilled,
    Fulfilled,
    Closed,
    Cancelled,
}

impl PoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoStatus::Draft => "DRAFT",
            PoStatus::Issued => "ISSUED",
            PoStatus::Acknowledged => "ACKNOWLEDGED",
            PoStatus::PartiallyFulfilled => "PARTIALLY_FULFILLED",
            PoStatus::Fulfilled => "FULFILLED",
            PoStatus::Closed => "CLOSED",
            PoStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PoStatus::Closed | PoStatus::Cancelled)
    }
}

impl FromStr for PoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(PoStatus::Draft),
            "ISSUED" => Ok(PoStatus::Issued),
            "ACKNOWLEDGED" => Ok(PoStatus::Acknowledged),
            "PARTIALLY_FULFILLED" => Ok(PoStatus::PartiallyFulfilled),
            "FULFILLED" => Ok(PoStatus::Fulfilled),
            "CLOSED" => Ok(PoStatus::Closed),
            "CANCELLED" => Ok(PoStatus::Cancelled),
            other => Err(format!("unknown PO status {other}")),
        }
    }
}

impl From<PoStatus> for String {
    fn from(status: PoStatus) -> Self {
        status.as_str().to_string()
    }
}

pg_text_enum!(PoStatus);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub po_number: String,
    pub pr_id: Option<Uuid>,
    pub vendor_id: Uuid,
    pub status: PoStatus,
    pub total_cents: i64,
    pub currency: String,
    pub expected_delivery_date: Option<NaiveDate>,
    pub issued_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PoLineItem {
    pub id: Uuid,
    pub po_id: Uuid,
    pub line_number: i32,
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub received_quantity: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReceiptStatus {
    Draft,
    Confirmed,
    Cancelled,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Draft => "DRAFT",
            ReceiptStatus::Confirmed => "CONFIRMED",
            ReceiptStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for ReceiptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(ReceiptStatus::Draft),
            "CONFIRMED" => Ok(ReceiptStatus::Confirmed),
            "CANCELLED" => Ok(ReceiptStatus::Cancelled),
            other => Err(format!("unknown receipt status {other}")),
        }
    }
}

impl From<ReceiptStatus> for String {
    fn from(status: ReceiptStatus) -> Self {
        status.as_str().to_string()
    }
}

pg_text_enum!(ReceiptStatus);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReceiptCondition {
    Good,
    Damaged,
    Partial,
}

impl ReceiptCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptCondition::Good => "GOOD",
            ReceiptCondition::Damaged => "DAMAGED",
            ReceiptCondition::Partial => "PARTIAL",
        }
    }
}

impl FromStr for ReceiptCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GOOD" => Ok(ReceiptCondition::Good),
            "DAMAGED" => Ok(ReceiptCondition::Damaged),
            "PARTIAL" => Ok(ReceiptCondition::Partial),
            other => Err(format!("unknown receipt line condition {other}")),
        }
    }
}

impl From<ReceiptCondition> for String {
    fn from(condition: ReceiptCondition) -> Self {
        condition.as_str().to_string()
    }
}

pg_text_enum!(ReceiptCondition);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Receipt {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub receipt_number: String,
    pub po_id: Uuid,
    pub received_by: Uuid,
    pub receipt_date: NaiveDate,
    pub status: ReceiptStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReceiptLineItem {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub po_line_item_id: Uuid,
    pub quantity_received: i32,
    pub condition: ReceiptCondition,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvoiceStatus {
    Uploaded,
    Matched,
    Exception,
    Disputed,
    Approved,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Uploaded => "UPLOADED",
            InvoiceStatus::Matched => "MATCHED",
            InvoiceStatus::Exception => "EXCEPTION",
            InvoiceStatus::Disputed => "DISPUTED",
            InvoiceStatus::Approved => "APPROVED",
            InvoiceStatus::Paid => "PAID",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOADED" => Ok(InvoiceStatus::Uploaded),
            "MATCHED" => Ok(InvoiceStatus::Matched),
            "EXCEPTION" => Ok(InvoiceStatus::Exception),
            "DISPUTED" => Ok(InvoiceStatus::Disputed),
            "APPROVED" => Ok(InvoiceStatus::Approved),
            "PAID" => Ok(InvoiceStatus::Paid),
            other => Err(format!("unknown invoice status {other}")),
        }
    }
}

impl From<InvoiceStatus> for String {
    fn from(status: InvoiceStatus) -> Self {
        status.as_str().to_string()
    }
}

pg_text_enum!(InvoiceStatus);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OcrStatus {
    Pending,
    Complete,
    LowConfidence,
    UnsupportedFormat,
    Failed,
    Skipped,
}

impl OcrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrStatus::Pending => "PENDING",
            OcrStatus::Complete => "COMPLETE",
            OcrStatus::LowConfidence => "LOW_CONFIDENCE",
            OcrStatus::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            OcrStatus::Failed => "FAILED",
            OcrStatus::Skipped => "SKIPPED",
        }
    }
}

impl FromStr for OcrStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OcrStatus::Pending),
            "COMPLETE" => Ok(OcrStatus::Complete),
            "LOW_CONFIDENCE" => Ok(OcrStatus::LowConfidence),
            "UNSUPPORTED_FORMAT" => Ok(OcrStatus::UnsupportedFormat),
            "FAILED" => Ok(OcrStatus::Failed),
            "SKIPPED" => Ok(OcrStatus::Skipped),
            other => Err(format!("unknown OCR status {other}")),
        }
    }
}

impl From<OcrStatus> for String {
    fn from(status: OcrStatus) -> Self {
        status.as_str().to_string()
    }
}

pg_text_enum!(OcrStatus);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MatchStatus {
    Pass,
    Fail,
    Override,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pass => "PASS",
            MatchStatus::Fail => "FAIL",
            MatchStatus::Override => "OVERRIDE",
        }
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(MatchStatus::Pass),
            "FAIL" => Ok(MatchStatus::Fail),
            "OVERRIDE" => Ok(MatchStatus::Override),
            other => Err(format!("unknown match status {other}")),
        }
    }
}

impl From<MatchStatus> for String {
    fn from(status: MatchStatus) -> Self {
        status.as_str().to_string()
    }
}

pg_text_enum!(MatchStatus);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_number: String,
    pub po_id: Option<Uuid>,
    pub vendor_id: Uuid,
    pub status: InvoiceStatus,
    pub total_cents: i64,
    pub currency: String,
    pub document_key: Option<String>,
    pub ocr_status: Option<OcrStatus>,
    pub match_status: Option<MatchStatus>,
    pub match_exceptions: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_payment_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceLineItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub line_number: i32,
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
            ApprovalStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ApprovalStatus::Pending),
            "APPROVED" => Ok(ApprovalStatus::Approved),
            "REJECTED" => Ok(ApprovalStatus::Rejected),
            "CANCELLED" => Ok(ApprovalStatus::Cancelled),
            other => Err(format!("unknown approval status {other}")),
        }
    }
}

impl From<ApprovalStatus> for String {
    fn from(status: ApprovalStatus) -> Self {
        status.as_str().to_string()
    }
}

pg_text_enum!(ApprovalStatus);

/// Polymorphic entity kind an Approval points at, by (entity_type,
/// entity_id) rather than a database foreign key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApprovalEntityType {
    Pr,
    Po,
    Invoice,
}

impl ApprovalEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalEntityType::Pr => "PR",
            ApprovalEntityType::Po => "PO",
            ApprovalEntityType::Invoice => "INVOICE",
        }
    }
}

impl FromStr for ApprovalEntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PR" => Ok(ApprovalEntityType::Pr),
            "PO" => Ok(ApprovalEntityType::Po),
            "INVOICE" => Ok(ApprovalEntityType::Invoice),
            other => Err(format!("unknown approval entity type {other}")),
        }
    }
}

impl From<ApprovalEntityType> for String {
    fn from(kind: ApprovalEntityType) -> Self {
        kind.as_str().to_string()
    }
}

pg_text_enum!(ApprovalEntityType);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Approval {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub entity_type: ApprovalEntityType,
    pub entity_id: Uuid,
    pub approver_id: Uuid,
    pub approval_level: i32,
    pub status: ApprovalStatus,
    pub comments: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub changed_fields: Option<Vec<String>>,
    pub request_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            Role::Admin,
            Role::Cfo,
            Role::FinanceHead,
            Role::Finance,
            Role::ProcurementLead,
            Role::Procurement,
            Role::Manager,
            Role::Vendor,
        ] {
            assert_eq!(role.as_str().parse::<Role>().unwrap().as_str(), role.as_str());
        }
    }

    #[test]
    fn po_status_is_terminal_only_for_closed_or_cancelled() {
        assert!(PoStatus::Closed.is_terminal());
        assert!(PoStatus::Cancelled.is_terminal());
        assert!(!PoStatus::Issued.is_terminal());
    }

    #[test]
    fn unknown_status_fails_to_parse() {
        assert!("not-a-status".parse::<PrStatus>().is_err());
    }
}
