//! Goods receipt confirmation against an issued PO's line items.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

use crate::{
    domain::models::{PoStatus, Receipt, ReceiptCondition, ReceiptLineItem},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::{
    errors::{map_sqlx_error, ServiceError},
    purchase_orders::PurchaseOrderService,
};

#[derive(Debug, Deserialize)]
pub struct ReceiptLineItemRequest {
    pub po_line_item_id: Uuid,
    pub quantity_received: i32,
    pub condition: ReceiptCondition,
}

#[derive(Debug, Deserialize)]
pub struct RecordReceiptRequest {
    pub po_id: Uuid,
    pub receipt_date: NaiveDate,
    pub line_items: Vec<ReceiptLineItemRequest>,
}

pub struct ReceiptService {
    pub state: Arc<AppState>,
}

impl ReceiptService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Records a confirmed receipt, increments each referenced PO line's
    /// `received_quantity`, then asks `PurchaseOrderService` to roll the
    /// PO's fulfillment status forward.
    pub async fn record(
        &self,
        actor: &AuthenticatedUser,
        payload: RecordReceiptRequest,
    ) -> Result<Receipt, ServiceError> {
        if payload.line_items.is_empty() {
            return Err(ServiceError::Validation(
                "a receipt needs at least one line item".to_string(),
            ));
        }

        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;

        let po_status: Option<PoStatus> = sqlx::query_scalar(
            "SELECT status FROM purchase_orders WHERE id = $1 AND tenant_id = $2",
        )
        .bind(payload.po_id)
        .bind(actor.tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        match po_status {
            Some(status) if status.is_terminal() => {
                return Err(ServiceError::State(format!(
                    "purchase order must be non-terminal to record a receipt, was {}",
                    status.as_str()
                )));
            }
            None => return Err(ServiceError::NotFound),
            _ => {}
        }

        let receipt_number = format!("RCPT-{}", Uuid::new_v4().simple());
        let now = Utc::now();

        let receipt = sqlx::query(
            r#"
            INSERT INTO receipts (id, tenant_id, receipt_number, po_id, received_by, receipt_date, status, created_at)
            VALUES ($1,$2,$3,$4,$5,$6,'CONFIRMED',$7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(&receipt_number)
        .bind(payload.po_id)
        .bind(actor.user_id)
        .bind(payload.receipt_date)
        .bind(now)
        .map(map_receipt)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        for item in &payload.line_items {
            sqlx::query(
                r#"
                INSERT INTO receipt_line_items (id, receipt_id, po_line_item_id, quantity_received, condition)
                VALUES ($1,$2,$3,$4,$5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(receipt.id)
            .bind(item.po_line_item_id)
            .bind(item.quantity_received)
            .bind(item.condition)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            let (quantity, received_quantity): (i32, i32) = sqlx::query_as(
                "SELECT quantity, received_quantity FROM po_line_items WHERE id = $1 AND po_id = $2 FOR UPDATE",
            )
            .bind(item.po_line_item_id)
            .bind(payload.po_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(ServiceError::NotFound)?;

            if received_quantity + item.quantity_received > quantity {
                return Err(ServiceError::Validation(format!(
                    "receipt over-receipt: line {} has {quantity} ordered, {received_quantity} already received, cannot receive {} more",
                    item.po_line_item_id, item.quantity_received
                )));
            }

            sqlx::query(
                "UPDATE po_line_items SET received_quantity = received_quantity + $1 WHERE id = $2 AND po_id = $3",
            )
            .bind(item.quantity_received)
            .bind(item.po_line_item_id)
            .bind(payload.po_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        PurchaseOrderService::new(self.state.clone())
            .recompute_fulfillment(actor.tenant_id, actor.user_id, payload.po_id)
            .await?;

        Ok(receipt)
    }

    pub async fn find(&self, tenant_id: Uuid, receipt_id: Uuid) -> Result<Receipt, ServiceError> {
        sqlx::query_as::<_, Receipt>(
            "SELECT * FROM receipts WHERE id = $1 AND tenant_id = $2",
        )
        .bind(receipt_id)
        .bind(tenant_id)
        .fetch_optional(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)
    }

    pub async fn line_items(&self, receipt_id: Uuid) -> Result<Vec<ReceiptLineItem>, ServiceError> {
        sqlx::query_as::<_, ReceiptLineItem>(
            "SELECT * FROM receipt_line_items WHERE receipt_id = $1",
        )
        .bind(receipt_id)
        .fetch_all(&self.state.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

fn map_receipt(row: PgRow) -> Receipt {
    Receipt {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        receipt_number: row.get("receipt_number"),
        po_id: row.get("po_id"),
        received_by: row.get("received_by"),
        receipt_date: row.get("receipt_date"),
        status: row.get("status"),
        created_at: row.get("created_at"),
    }
}
