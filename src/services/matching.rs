//! Loads PO/receipt/invoice line items and runs the pure three-way
//! matcher against them, persisting the resulting match status and
//! exceptions onto the invoice.

use std::sync::Arc;

use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    domain::{
        matching::{self, InvoiceLine, MatchOutcome, MatchResult, MatchTolerance, PoLine, ReceivedLine},
        models::MatchStatus,
    },
    infrastructure::{config::MatchingConfig, state::AppState},
};

use super::errors::{map_sqlx_error, ServiceError};

pub struct MatchingService {
    pub state: Arc<AppState>,
}

impl MatchingService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    fn tolerance(config: &MatchingConfig) -> MatchTolerance {
        MatchTolerance {
            price_variance_percent: config.price_variance_percent,
            min_variance_cents: config.min_variance_cents,
        }
    }

    /// Runs the three-way match for `invoice_id` and writes the outcome
    /// back onto the invoice row within the caller's transaction.
    pub async fn match_invoice(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<MatchResult, ServiceError> {
        let po_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT po_id FROM invoices WHERE id = $1 AND tenant_id = $2",
        )
        .bind(invoice_id)
        .bind(tenant_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)?;

        let Some(po_id) = po_id else {
            let result = MatchResult {
                passed: false,
                exceptions: vec![matching::MatchException::NoPoLines],
            };
            self.persist_outcome(tx, tenant_id, invoice_id, &result).await?;
            return Ok(result);
        };

        let po_lines: Vec<PoLine> = sqlx::query(
            "SELECT description, quantity, unit_price_cents FROM po_line_items WHERE po_id = $1",
        )
        .bind(po_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(|row| PoLine {
            description: row.get("description"),
            quantity: row.get("quantity"),
            unit_price_cents: row.get("unit_price_cents"),
        })
        .collect();

        let received_lines: Vec<ReceivedLine> = sqlx::query(
            r#"
            SELECT pli.description AS description, rli.quantity_received AS quantity_received
            FROM receipt_line_items rli
            JOIN po_line_items pli ON pli.id = rli.po_line_item_id
            JOIN receipts r ON r.id = rli.receipt_id
            WHERE r.po_id = $1 AND r.status = 'CONFIRMED'
            "#,
        )
        .bind(po_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(|row| ReceivedLine {
            description: row.get("description"),
            quantity_received: row.get("quantity_received"),
        })
        .collect();

        let invoice_lines: Vec<InvoiceLine> = sqlx::query(
            "SELECT description, quantity, unit_price_cents FROM invoice_line_items WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(|row| InvoiceLine {
            description: row.get("description"),
            quantity: row.get("quantity"),
            unit_price_cents: row.get("unit_price_cents"),
        })
        .collect();

        let result = matching::three_way_match_invoice(
            &po_lines,
            &received_lines,
            &invoice_lines,
            Self::tolerance(&self.state.config.matching),
        );

        self.persist_outcome(tx, tenant_id, invoice_id, &result).await?;
        Ok(result)
    }

    async fn persist_outcome(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        invoice_id: Uuid,
        result: &MatchResult,
    ) -> Result<(), ServiceError> {
        let status = match matching::outcome_for(result) {
            MatchOutcome::Matched => MatchStatus::Pass,
            MatchOutcome::Exception => MatchStatus::Fail,
        };
        let exceptions_json =
            serde_json::to_value(&result.exceptions).map_err(|err| ServiceError::Internal(err.to_string()))?;

        sqlx::query(
            "UPDATE invoices SET match_status = $1, match_exceptions = $2, updated_at = now() WHERE id = $3 AND tenant_id = $4",
        )
        .bind(status)
        .bind(exceptions_json)
        .bind(invoice_id)
        .bind(tenant_id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
