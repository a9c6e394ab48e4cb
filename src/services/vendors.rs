//! Vendor lifecycle: onboarding (DRAFT -> PENDING_REVIEW), procurement
//! review (-> ACTIVE or BLOCKED), and lookup for vendor-role callers.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    domain::models::{Role, Vendor, VendorStatus},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::{
    audit::AuditService,
    errors::{map_sqlx_error, ServiceError},
};

#[derive(Debug, Deserialize)]
pub struct VendorOnboardingRequest {
    pub legal_name: String,
    pub tax_id: Option<String>,
    pub email: String,
}

pub struct VendorService {
    pub state: Arc<AppState>,
}

impl VendorService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn onboard(
        &self,
        tenant_id: Uuid,
        payload: VendorOnboardingRequest,
    ) -> Result<Vendor, ServiceError> {
        sqlx::query_as::<_, Vendor>(
            r#"
            INSERT INTO vendors
                (id, tenant_id, legal_name, tax_id, email, status, risk_score, created_at, updated_at, deleted_at)
            VALUES ($1,$2,$3,$4,$5,'PENDING_REVIEW',NULL,$6,$6,NULL)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(payload.legal_name)
        .bind(payload.tax_id)
        .bind(payload.email)
        .bind(Utc::now())
        .fetch_one(&self.state.pool)
        .await
        .map_err(map_sqlx_error)
    }

    /// Procurement-lead review decision: `ACTIVE` admits the vendor into
    /// PO issuance, `BLOCKED` excludes it without deleting history.
    pub async fn review(
        &self,
        actor: &AuthenticatedUser,
        tenant_id: Uuid,
        vendor_id: Uuid,
        approve: bool,
    ) -> Result<Vendor, ServiceError> {
        if !matches!(actor.role, Role::ProcurementLead | Role::Admin) {
            return Err(ServiceError::Forbidden);
        }

        let target_status = if approve {
            VendorStatus::Active
        } else {
            VendorStatus::Blocked
        };

        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        let vendor = sqlx::query_as::<_, Vendor>(
            r#"
            UPDATE vendors
            SET status = $1, updated_at = $2
            WHERE id = $3 AND tenant_id = $4 AND status = 'PENDING_REVIEW'
            RETURNING *
            "#,
        )
        .bind(target_status)
        .bind(Utc::now())
        .bind(vendor_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)?;

        AuditService::new(self.state.clone())
            .record(
                &mut tx,
                tenant_id,
                Some(actor.user_id),
                "REVIEW",
                "vendor",
                vendor_id,
                Some(serde_json::json!({"status": "PENDING_REVIEW"})),
                Some(serde_json::json!({"status": target_status.as_str()})),
            )
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(vendor)
    }

    pub async fn find(&self, tenant_id: Uuid, vendor_id: Uuid) -> Result<Vendor, ServiceError> {
        sqlx::query_as::<_, Vendor>(
            "SELECT * FROM vendors WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
        )
        .bind(vendor_id)
        .bind(tenant_id)
        .fetch_optional(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)
    }

    /// Resolves the vendor record for an authenticated vendor-role user,
    /// matching by tenant + email (vendors authenticate as users whose
    /// email matches their vendor record).
    pub async fn resolve_for_user(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Vendor, ServiceError> {
        sqlx::query_as::<_, Vendor>(
            r#"
            SELECT * FROM vendors
            WHERE tenant_id = $1 AND email = $2 AND deleted_at IS NULL
            ORDER BY (status = 'ACTIVE') DESC, created_at ASC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_optional(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)
    }

    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<Vendor>, ServiceError> {
        sqlx::query_as::<_, Vendor>(
            "SELECT * FROM vendors WHERE tenant_id = $1 AND deleted_at IS NULL ORDER BY legal_name ASC",
        )
        .bind(tenant_id)
        .fetch_all(&self.state.pool)
        .await
        .map_err(map_sqlx_error)
    }

    pub async fn list_active_ids(&self, tenant_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        sqlx::query_scalar(
            "SELECT id FROM vendors WHERE tenant_id = $1 AND status = 'ACTIVE' AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_all(&self.state.pool)
        .await
        .map_err(map_sqlx_error)
    }

    /// Recomputes a vendor's 0-100 risk score from invoice exception rate
    /// and on-time delivery performance (50/50 weight; document-compliance
    /// tracking is out of scope so that factor is dropped rather than
    /// estimated), and persists it.
    pub async fn refresh_risk_score(
        &self,
        tenant_id: Uuid,
        vendor_id: Uuid,
    ) -> Result<i32, ServiceError> {
        let (total_invoices, exception_invoices): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                count(*) FILTER (WHERE status IN ('MATCHED','EXCEPTION','DISPUTED','APPROVED','PAID')),
                count(*) FILTER (WHERE status IN ('EXCEPTION','DISPUTED'))
            FROM invoices
            WHERE vendor_id = $1
            "#,
        )
        .bind(vendor_id)
        .fetch_one(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?;

        let invoice_score = if total_invoices > 0 {
            exception_invoices as f64 / total_invoices as f64 * 100.0
        } else {
            0.0
        };

        let po_rows: Vec<(Uuid, chrono::NaiveDate)> = sqlx::query_as(
            r#"
            SELECT id, expected_delivery_date FROM purchase_orders
            WHERE vendor_id = $1 AND expected_delivery_date IS NOT NULL
              AND status IN ('ISSUED','FULFILLED','PARTIALLY_FULFILLED','CLOSED')
            "#,
        )
        .bind(vendor_id)
        .fetch_all(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?;

        let today = Utc::now().date_naive();
        let mut late_count = 0i64;
        for (po_id, deadline) in &po_rows {
            let earliest_receipt: Option<chrono::NaiveDate> = sqlx::query_scalar(
                "SELECT min(receipt_date) FROM receipts WHERE po_id = $1 AND status = 'CONFIRMED'",
            )
            .bind(po_id)
            .fetch_one(&self.state.pool)
            .await
            .map_err(map_sqlx_error)?;

            match earliest_receipt {
                Some(received) if received > *deadline => late_count += 1,
                None if *deadline < today => late_count += 1,
                _ => {}
            }
        }
        let delivery_score = if !po_rows.is_empty() {
            late_count as f64 / po_rows.len() as f64 * 100.0
        } else {
            0.0
        };

        let risk_score = ((invoice_score * 0.5 + delivery_score * 0.5).round() as i32).clamp(0, 100);

        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        self.update_risk_score(&mut tx, tenant_id, vendor_id, risk_score)
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(risk_score)
    }

    /// Updates the vendor's risk score within an existing transaction,
    /// as called by the scheduled risk-score refresh job.
    pub async fn update_risk_score(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        vendor_id: Uuid,
        risk_score: i32,
    ) -> Result<(), ServiceError> {
        sqlx::query("UPDATE vendors SET risk_score = $1 WHERE id = $2 AND tenant_id = $3")
            .bind(risk_score)
            .bind(vendor_id)
            .bind(tenant_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
