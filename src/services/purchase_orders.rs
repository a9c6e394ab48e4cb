//! Purchase order issuance against an approved purchase request, and the
//! fulfillment status rollup driven by confirmed receipts.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

use crate::{
    domain::models::{PoLineItem, PoStatus, PrStatus, PurchaseOrder, VendorStatus},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::{
    audit::AuditService,
    errors::{map_sqlx_error, ServiceError},
};

#[derive(Debug, Deserialize)]
pub struct IssuePoRequest {
    pub pr_id: Uuid,
    pub vendor_id: Uuid,
    pub expected_delivery_date: Option<NaiveDate>,
}

pub struct PurchaseOrderService {
    pub state: Arc<AppState>,
}

impl PurchaseOrderService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Issues a PO against an already-approved PR, copying its line
    /// items and total, and binding it to an ACTIVE vendor.
    pub async fn issue(
        &self,
        actor: &AuthenticatedUser,
        payload: IssuePoRequest,
    ) -> Result<PurchaseOrder, ServiceError> {
        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;

        let pr_status: Option<(PrStatus, i64)> = sqlx::query_as(
            "SELECT status, total_cents FROM purchase_requests WHERE id = $1 AND tenant_id = $2",
        )
        .bind(payload.pr_id)
        .bind(actor.tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        let Some((pr_status, total_cents)) = pr_status else {
            return Err(ServiceError::NotFound);
        };
        if pr_status != PrStatus::Approved {
            return Err(ServiceError::State(
                "purchase request must be APPROVED to issue a purchase order".to_string(),
            ));
        }

        let vendor_status: Option<VendorStatus> = sqlx::query_scalar(
            "SELECT status FROM vendors WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
        )
        .bind(payload.vendor_id)
        .bind(actor.tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        if vendor_status != Some(VendorStatus::Active) {
            return Err(ServiceError::Validation(
                "vendor must be ACTIVE to receive a purchase order".to_string(),
            ));
        }

        let po_number = format!("PO-{}", Uuid::new_v4().simple());
        let now = Utc::now();

        let po = sqlx::query(
            r#"
            INSERT INTO purchase_orders
                (id, tenant_id, po_number, pr_id, vendor_id, status, total_cents, currency, expected_delivery_date, issued_at, created_at, updated_at, deleted_at)
            VALUES ($1,$2,$3,$4,$5,'ISSUED',$6,'USD',$7,$8,$8,$8,NULL)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(&po_number)
        .bind(payload.pr_id)
        .bind(payload.vendor_id)
        .bind(total_cents)
        .bind(payload.expected_delivery_date)
        .bind(now)
        .map(map_po)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO po_line_items (id, po_id, line_number, description, quantity, unit_price_cents, received_quantity)
            SELECT gen_random_uuid(), $1, line_number, description, quantity, unit_price_cents, 0
            FROM pr_line_items WHERE pr_id = $2
            "#,
        )
        .bind(po.id)
        .bind(payload.pr_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        AuditService::new(self.state.clone())
            .record(
                &mut tx,
                actor.tenant_id,
                Some(actor.user_id),
                "ISSUE",
                "purchase_order",
                po.id,
                None,
                Some(serde_json::json!({"status": "ISSUED"})),
            )
            .await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(po)
    }

    /// Vendor acknowledgement of an issued PO.
    pub async fn acknowledge(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        po_id: Uuid,
    ) -> Result<PurchaseOrder, ServiceError> {
        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        let po = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders
            SET status = 'ACKNOWLEDGED', updated_at = $1
            WHERE id = $2 AND tenant_id = $3 AND status = 'ISSUED'
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(po_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| {
            ServiceError::State("purchase order must be ISSUED to acknowledge".to_string())
        })?;

        AuditService::new(self.state.clone())
            .record(
                &mut tx,
                tenant_id,
                Some(actor_id),
                "ACKNOWLEDGE",
                "purchase_order",
                po_id,
                Some(serde_json::json!({"status": "ISSUED"})),
                Some(serde_json::json!({"status": "ACKNOWLEDGED"})),
            )
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(po)
    }

    /// Cancels a non-terminal PO and releases its parent PR's budget
    /// reservation.
    pub async fn cancel(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        po_id: Uuid,
    ) -> Result<PurchaseOrder, ServiceError> {
        let po = self.find(tenant_id, po_id).await?;
        if matches!(po.status, PoStatus::Fulfilled | PoStatus::Closed | PoStatus::Cancelled) {
            return Err(ServiceError::State(format!(
                "purchase order must be non-terminal to cancel, was {}",
                po.status.as_str()
            )));
        }

        let reservation_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM budget_reservations WHERE entity_type = 'PR' AND entity_id = $1 AND status = 'COMMITTED'",
        )
        .bind(po.pr_id)
        .fetch_optional(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?;
        if let Some(reservation_id) = reservation_id {
            super::budget::BudgetService::new(self.state.clone())
                .release(tenant_id, reservation_id)
                .await?;
        }

        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        let cancelled = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders
            SET status = 'CANCELLED', updated_at = $1
            WHERE id = $2 AND tenant_id = $3
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(po_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)?;

        AuditService::new(self.state.clone())
            .record(
                &mut tx,
                tenant_id,
                Some(actor_id),
                "CANCEL",
                "purchase_order",
                po_id,
                Some(serde_json::json!({"status": po.status.as_str()})),
                Some(serde_json::json!({"status": "CANCELLED"})),
            )
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(cancelled)
    }

    /// Recomputes a PO's fulfillment status from its line items'
    /// received quantities: FULFILLED once every line is fully received,
    /// PARTIALLY_FULFILLED once any quantity has arrived.
    pub async fn recompute_fulfillment(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        po_id: Uuid,
    ) -> Result<PurchaseOrder, ServiceError> {
        let current = self.find(tenant_id, po_id).await?;
        let lines: Vec<PoLineItem> = sqlx::query_as(
            "SELECT * FROM po_line_items WHERE po_id = $1 ORDER BY line_number ASC",
        )
        .bind(po_id)
        .fetch_all(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?;

        let fully_received = !lines.is_empty()
            && lines.iter().all(|line| line.received_quantity >= line.quantity);
        let any_received = lines.iter().any(|line| line.received_quantity > 0);

        let new_status = if fully_received {
            PoStatus::Fulfilled
        } else if any_received {
            PoStatus::PartiallyFulfilled
        } else {
            PoStatus::Issued
        };

        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        let po = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders
            SET status = $1, updated_at = $2
            WHERE id = $3 AND tenant_id = $4 AND status NOT IN ('CLOSED', 'CANCELLED')
            RETURNING *
            "#,
        )
        .bind(new_status)
        .bind(Utc::now())
        .bind(po_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)?;

        if po.status != current.status {
            AuditService::new(self.state.clone())
                .record(
                    &mut tx,
                    tenant_id,
                    Some(actor_id),
                    "RECOMPUTE_FULFILLMENT",
                    "purchase_order",
                    po_id,
                    Some(serde_json::json!({"status": current.status.as_str()})),
                    Some(serde_json::json!({"status": po.status.as_str()})),
                )
                .await?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(po)
    }

    pub async fn find(&self, tenant_id: Uuid, po_id: Uuid) -> Result<PurchaseOrder, ServiceError> {
        sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
        )
        .bind(po_id)
        .bind(tenant_id)
        .fetch_optional(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)
    }

    pub async fn line_items(&self, po_id: Uuid) -> Result<Vec<PoLineItem>, ServiceError> {
        sqlx::query_as::<_, PoLineItem>(
            "SELECT * FROM po_line_items WHERE po_id = $1 ORDER BY line_number ASC",
        )
        .bind(po_id)
        .fetch_all(&self.state.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

fn map_po(row: PgRow) -> PurchaseOrder {
    PurchaseOrder {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        po_number: row.get("po_number"),
        pr_id: row.get("pr_id"),
        vendor_id: row.get("vendor_id"),
        status: row.get("status"),
        total_cents: row.get("total_cents"),
        currency: row.get("currency"),
        expected_delivery_date: row.get("expected_delivery_date"),
        issued_at: row.get("issued_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn po_status_progression_is_total_order() {
        assert_ne!(PoStatus::Issued.as_str(), PoStatus::Fulfilled.as_str());
    }
}
