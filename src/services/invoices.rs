//! Invoice lifecycle: upload (with OCR field extraction), three-way
//! match, payment approval chain, and payment confirmation via webhook.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

use crate::{
    domain::{
        fiscal::fiscal_period,
        models::{ApprovalEntityType, BudgetEntityType, Invoice, InvoiceStatus, OcrStatus},
    },
    infrastructure::{auth::AuthenticatedUser, integrations, state::AppState},
};

use super::{
    approvals::{ApprovalAction, ApprovalService},
    audit::AuditService,
    budget::BudgetService,
    errors::{map_sqlx_error, ServiceError},
    matching::MatchingService,
};

#[derive(Debug, Deserialize)]
pub struct UploadInvoiceRequest {
    pub vendor_id: Uuid,
    pub po_id: Option<Uuid>,
    pub document_key: String,
    pub currency: String,
}

pub struct InvoiceService {
    pub state: Arc<AppState>,
}

impl InvoiceService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Creates the invoice row, runs OCR extraction against the uploaded
    /// document, and stores the extracted total while it waits for the
    /// matching job to reconcile it against the PO.
    pub async fn upload(
        &self,
        actor: &AuthenticatedUser,
        payload: UploadInvoiceRequest,
    ) -> Result<Invoice, ServiceError> {
        let ocr_result = integrations::extract_invoice_fields(&payload.document_key)
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;

        let ocr_status = if ocr_result.confidence >= 0.8 {
            OcrStatus::Complete
        } else if ocr_result.confidence > 0.0 {
            OcrStatus::LowConfidence
        } else {
            OcrStatus::Pending
        };

        let invoice_number = ocr_result
            .invoice_number
            .unwrap_or_else(|| format!("INV-{}", Uuid::new_v4().simple()));
        let total_cents = ocr_result.total_cents.unwrap_or(0);
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO invoices
                (id, tenant_id, invoice_number, po_id, vendor_id, status, total_cents, currency,
                 document_key, ocr_status, match_status, match_exceptions, created_at, updated_at,
                 approved_payment_at, paid_at)
            VALUES ($1,$2,$3,$4,$5,'UPLOADED',$6,$7,$8,$9,NULL,NULL,$10,$10,NULL,NULL)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(&invoice_number)
        .bind(payload.po_id)
        .bind(payload.vendor_id)
        .bind(total_cents)
        .bind(&payload.currency)
        .bind(&payload.document_key)
        .bind(ocr_status)
        .bind(now)
        .map(map_invoice)
        .fetch_one(&self.state.pool)
        .await
        .map_err(map_sqlx_error)
    }

    /// Runs the three-way match and, on a clean pass, starts the payment
    /// approval chain gated by the invoice total.
    pub async fn run_match_and_route(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        department_id: Uuid,
    ) -> Result<Invoice, ServiceError> {
        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        let result = MatchingService::new(self.state.clone())
            .match_invoice(&mut tx, tenant_id, invoice_id)
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        let invoice = self.find(tenant_id, invoice_id).await?;
        let before = serde_json::json!({"status": invoice.status.as_str()});

        if result.passed {
            let approval_service = ApprovalService::new(self.state.clone());
            let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
            let chain = approval_service
                .build_chain(&mut tx, tenant_id, department_id, invoice.total_cents)
                .await?;
            approval_service
                .create_workflow(&mut tx, tenant_id, ApprovalEntityType::Invoice, invoice_id, &chain)
                .await?;
            sqlx::query("UPDATE invoices SET status = 'MATCHED', updated_at = $1 WHERE id = $2")
                .bind(Utc::now())
                .bind(invoice_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            AuditService::new(self.state.clone())
                .record(
                    &mut tx,
                    tenant_id,
                    None,
                    "MATCH_PASS",
                    "invoice",
                    invoice_id,
                    Some(before),
                    Some(serde_json::json!({"status": "MATCHED"})),
                )
                .await?;
            tx.commit().await.map_err(map_sqlx_error)?;
        } else {
            let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
            sqlx::query("UPDATE invoices SET status = 'EXCEPTION', updated_at = $1 WHERE id = $2")
                .bind(Utc::now())
                .bind(invoice_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            AuditService::new(self.state.clone())
                .record(
                    &mut tx,
                    tenant_id,
                    None,
                    "MATCH_FAIL",
                    "invoice",
                    invoice_id,
                    Some(before),
                    Some(serde_json::json!({"status": "EXCEPTION"})),
                )
                .await?;
            tx.commit().await.map_err(map_sqlx_error)?;
        }

        self.find(tenant_id, invoice_id).await
    }

    /// Finance transitions an EXCEPTION or DISPUTED invoice straight to
    /// MATCHED, recording the override in `match_status` and the reason
    /// in the audit trail.
    pub async fn override_match(
        &self,
        actor: &AuthenticatedUser,
        invoice_id: Uuid,
        reason: String,
    ) -> Result<Invoice, ServiceError> {
        let invoice = self.find(actor.tenant_id, invoice_id).await?;
        if !matches!(invoice.status, InvoiceStatus::Exception | InvoiceStatus::Disputed) {
            return Err(ServiceError::State(format!(
                "invoice must be EXCEPTION or DISPUTED to override, was {}",
                invoice.status.as_str()
            )));
        }

        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query(
            "UPDATE invoices SET status = 'MATCHED', match_status = 'OVERRIDE', updated_at = $1 WHERE id = $2 AND tenant_id = $3",
        )
        .bind(Utc::now())
        .bind(invoice_id)
        .bind(actor.tenant_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        AuditService::new(self.state.clone())
            .record(
                &mut tx,
                actor.tenant_id,
                Some(actor.user_id),
                "OVERRIDE",
                "invoice",
                invoice_id,
                Some(serde_json::json!({"status": invoice.status.as_str()})),
                Some(serde_json::json!({"status": "MATCHED", "match_status": "OVERRIDE", "reason": reason})),
            )
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        self.find(actor.tenant_id, invoice_id).await
    }

    /// Vendor-initiated dispute of an EXCEPTION invoice, with a reason
    /// recorded in the audit trail. Distinct from the finance payment
    /// decision in `decide_payment`.
    pub async fn dispute(
        &self,
        actor: &AuthenticatedUser,
        invoice_id: Uuid,
        reason: String,
    ) -> Result<Invoice, ServiceError> {
        let invoice = self.find(actor.tenant_id, invoice_id).await?;
        if invoice.status != InvoiceStatus::Exception {
            return Err(ServiceError::State(format!(
                "invoice must be EXCEPTION to dispute, was {}",
                invoice.status.as_str()
            )));
        }

        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("UPDATE invoices SET status = 'DISPUTED', updated_at = $1 WHERE id = $2 AND tenant_id = $3")
            .bind(Utc::now())
            .bind(invoice_id)
            .bind(actor.tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        AuditService::new(self.state.clone())
            .record(
                &mut tx,
                actor.tenant_id,
                Some(actor.user_id),
                "DISPUTE",
                "invoice",
                invoice_id,
                Some(serde_json::json!({"status": "EXCEPTION"})),
                Some(serde_json::json!({"status": "DISPUTED", "reason": reason})),
            )
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        self.find(actor.tenant_id, invoice_id).await
    }

    pub async fn decide_payment(
        &self,
        actor: &AuthenticatedUser,
        invoice_id: Uuid,
        department_id: Uuid,
        action: ApprovalAction,
        comments: Option<String>,
    ) -> Result<Invoice, ServiceError> {
        let approval_service = ApprovalService::new(self.state.clone());
        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        let outcome = approval_service
            .process_step(
                &mut tx,
                actor.tenant_id,
                ApprovalEntityType::Invoice,
                invoice_id,
                actor.user_id,
                action,
                comments,
            )
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        if outcome.is_rejected {
            let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
            sqlx::query("UPDATE invoices SET status = 'EXCEPTION', updated_at = $1 WHERE id = $2")
                .bind(Utc::now())
                .bind(invoice_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            AuditService::new(self.state.clone())
                .record(
                    &mut tx,
                    actor.tenant_id,
                    Some(actor.user_id),
                    "REJECT_PAYMENT",
                    "invoice",
                    invoice_id,
                    Some(serde_json::json!({"status": "MATCHED"})),
                    Some(serde_json::json!({"status": "EXCEPTION"})),
                )
                .await?;
            tx.commit().await.map_err(map_sqlx_error)?;
        } else if outcome.is_final {
            let invoice = self.find(actor.tenant_id, invoice_id).await?;
            let (fiscal_year, quarter) = fiscal_period(Utc::now().date_naive());
            BudgetService::new(self.state.clone())
                .reserve(
                    actor.tenant_id,
                    department_id,
                    fiscal_year,
                    quarter,
                    BudgetEntityType::Invoice,
                    invoice_id,
                    invoice.total_cents,
                )
                .await?;
            let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
            sqlx::query(
                "UPDATE invoices SET status = 'APPROVED', approved_payment_at = $1, updated_at = $1 WHERE id = $2",
            )
            .bind(Utc::now())
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            AuditService::new(self.state.clone())
                .record(
                    &mut tx,
                    actor.tenant_id,
                    Some(actor.user_id),
                    "APPROVE_PAYMENT",
                    "invoice",
                    invoice_id,
                    Some(serde_json::json!({"status": "MATCHED"})),
                    Some(serde_json::json!({"status": "APPROVED"})),
                )
                .await?;
            tx.commit().await.map_err(map_sqlx_error)?;
        }

        self.find(actor.tenant_id, invoice_id).await
    }

    /// Marks an approved invoice as paid from a verified payment-gateway
    /// webhook, and converts its budget reservation into posted spend.
    pub async fn confirm_payment(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Invoice, ServiceError> {
        let invoice = self.find(tenant_id, invoice_id).await?;
        if invoice.status != InvoiceStatus::Approved {
            return Err(ServiceError::State(format!(
                "invoice must be APPROVED to confirm payment, was {}",
                invoice.status.as_str()
            )));
        }

        let reservation_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM budget_reservations WHERE entity_type = 'INVOICE' AND entity_id = $1 AND status = 'COMMITTED'",
        )
        .bind(invoice_id)
        .fetch_optional(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?;
        if let Some(reservation_id) = reservation_id {
            BudgetService::new(self.state.clone())
                .commit_spent(tenant_id, reservation_id)
                .await?;
        }

        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("UPDATE invoices SET status = 'PAID', paid_at = $1, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        AuditService::new(self.state.clone())
            .record(
                &mut tx,
                tenant_id,
                None,
                "CONFIRM_PAYMENT",
                "invoice",
                invoice_id,
                Some(serde_json::json!({"status": "APPROVED"})),
                Some(serde_json::json!({"status": "PAID"})),
            )
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        self.find(tenant_id, invoice_id).await
    }

    pub async fn find(&self, tenant_id: Uuid, invoice_id: Uuid) -> Result<Invoice, ServiceError> {
        sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE id = $1 AND tenant_id = $2",
        )
        .bind(invoice_id)
        .bind(tenant_id)
        .fetch_optional(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)
    }
}

fn map_invoice(row: PgRow) -> Invoice {
    Invoice {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        invoice_number: row.get("invoice_number"),
        po_id: row.get("po_id"),
        vendor_id: row.get("vendor_id"),
        status: row.get("status"),
        total_cents: row.get("total_cents"),
        currency: row.get("currency"),
        document_key: row.get("document_key"),
        ocr_status: row.get("ocr_status"),
        match_status: row.get("match_status"),
        match_exceptions: row.get("match_exceptions"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        approved_payment_at: row.get("approved_payment_at"),
        paid_at: row.get("paid_at"),
    }
}
