//! Budget availability checks and reservation lifecycle.
//!
//! Every spend commitment (a submitted PR, an issued PO, an approved
//! invoice) reserves against a department's quarterly budget before the
//! triggering entity is allowed to proceed, and the reservation is
//! either released (entity rejected/cancelled) or converted to spend
//! (entity fully executed).

use std::sync::Arc;

use chrono::Utc;
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

use crate::{
    domain::models::{Budget, BudgetEntityType, BudgetReservation, ReservationStatus},
    infrastructure::{state::AppState, tenant::begin_scoped},
};

use super::errors::{map_sqlx_error, ServiceError};

#[derive(Debug, Clone, Copy)]
pub struct BudgetAvailability {
    pub budget_id: Uuid,
    pub total_cents: i64,
    pub spent_cents: i64,
    pub reserved_cents: i64,
    pub available_cents: i64,
}

pub struct BudgetService {
    pub state: Arc<AppState>,
}

impl BudgetService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Locks the target budget row and reports how much of it remains
    /// unreserved. Callers that only need a read should stay inside the
    /// same transaction they intend to reserve in, since the lock is
    /// released as soon as the transaction ends.
    async fn lock_and_check(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tenant_id: Uuid,
        department_id: Uuid,
        fiscal_year: i32,
        quarter: i32,
    ) -> Result<BudgetAvailability, ServiceError> {
        let budget_row = sqlx::query(
            r#"
            SELECT id, total_cents, spent_cents
            FROM budgets
            WHERE tenant_id = $1 AND department_id = $2 AND fiscal_year = $3 AND quarter = $4
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(department_id)
        .bind(fiscal_year)
        .bind(quarter)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        let Some(budget_row) = budget_row else {
            return Err(ServiceError::BudgetNotFound);
        };

        let budget_id: Uuid = budget_row.try_get("id").map_err(map_sqlx_error)?;
        let total_cents: i64 = budget_row.try_get("total_cents").map_err(map_sqlx_error)?;
        let spent_cents: i64 = budget_row.try_get("spent_cents").map_err(map_sqlx_error)?;

        let reserved_cents: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0)
            FROM budget_reservations
            WHERE budget_id = $1 AND status = 'COMMITTED'
            "#,
        )
        .bind(budget_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(BudgetAvailability {
            budget_id,
            total_cents,
            spent_cents,
            reserved_cents,
            available_cents: total_cents - spent_cents - reserved_cents,
        })
    }

    /// Returns current availability without taking a reservation.
    pub async fn check_availability(
        &self,
        tenant_id: Uuid,
        department_id: Uuid,
        fiscal_year: i32,
        quarter: i32,
    ) -> Result<BudgetAvailability, ServiceError> {
        let mut tx = begin_scoped(&self.state.pool, tenant_id)
            .await
            .map_err(map_sqlx_error)?;
        let availability =
            Self::lock_and_check(&mut tx, tenant_id, department_id, fiscal_year, quarter).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(availability)
    }

    /// Atomically checks availability and reserves `amount_cents` against
    /// the budget under row lock, so two concurrent requests against the
    /// same budget can never both succeed past its limit.
    pub async fn reserve(
        &self,
        tenant_id: Uuid,
        department_id: Uuid,
        fiscal_year: i32,
        quarter: i32,
        entity_type: BudgetEntityType,
        entity_id: Uuid,
        amount_cents: i64,
    ) -> Result<BudgetReservation, ServiceError> {
        let mut tx = begin_scoped(&self.state.pool, tenant_id)
            .await
            .map_err(map_sqlx_error)?;

        let availability =
            Self::lock_and_check(&mut tx, tenant_id, department_id, fiscal_year, quarter).await?;

        if amount_cents > availability.available_cents {
            return Err(ServiceError::BudgetExceeded {
                requested_cents: amount_cents,
                available_cents: availability.available_cents,
            });
        }

        let now = Utc::now();
        let reservation = sqlx::query(
            r#"
            INSERT INTO budget_reservations
                (id, tenant_id, budget_id, entity_type, entity_id, amount_cents, status, created_at, updated_at, released_at)
            VALUES ($1,$2,$3,$4,$5,$6,'COMMITTED',$7,$7,NULL)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(availability.budget_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(amount_cents)
        .bind(now)
        .map(map_reservation)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(reservation)
    }

    /// Releases a committed reservation without posting spend, e.g. when
    /// the reserving entity is rejected or cancelled.
    pub async fn release(
        &self,
        tenant_id: Uuid,
        reservation_id: Uuid,
    ) -> Result<BudgetReservation, ServiceError> {
        let mut tx = begin_scoped(&self.state.pool, tenant_id)
            .await
            .map_err(map_sqlx_error)?;

        let reservation = sqlx::query(
            r#"
            UPDATE budget_reservations
            SET status = 'RELEASED', released_at = $1, updated_at = $1
            WHERE id = $2 AND tenant_id = $3 AND status = 'COMMITTED'
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(reservation_id)
        .bind(tenant_id)
        .map(map_reservation)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(reservation)
    }

    /// Converts a committed reservation into posted spend: the budget's
    /// `spent_cents` is incremented and the reservation is marked SPENT,
    /// both under the same row lock so the two stay consistent.
    pub async fn commit_spent(
        &self,
        tenant_id: Uuid,
        reservation_id: Uuid,
    ) -> Result<BudgetReservation, ServiceError> {
        let mut tx = begin_scoped(&self.state.pool, tenant_id)
            .await
            .map_err(map_sqlx_error)?;

        let reservation_row = sqlx::query(
            r#"
            SELECT * FROM budget_reservations
            WHERE id = $1 AND tenant_id = $2
            FOR UPDATE
            "#,
        )
        .bind(reservation_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)?;

        let reservation = map_reservation(reservation_row);
        if reservation.status != ReservationStatus::Committed {
            return Err(ServiceError::State(format!(
                "reservation must be COMMITTED to post spend, was {}",
                reservation.status.as_str()
            )));
        }

        sqlx::query(
            r#"UPDATE budgets SET spent_cents = spent_cents + $1, updated_at = $2 WHERE id = $3"#,
        )
        .bind(reservation.amount_cents)
        .bind(Utc::now())
        .bind(reservation.budget_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE budget_reservations
            SET status = 'SPENT', updated_at = $1
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(reservation_id)
        .map(map_reservation)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(updated)
    }

    pub async fn find_budget(
        &self,
        tenant_id: Uuid,
        budget_id: Uuid,
    ) -> Result<Budget, ServiceError> {
        sqlx::query_as::<_, Budget>(
            "SELECT * FROM budgets WHERE id = $1 AND tenant_id = $2",
        )
        .bind(budget_id)
        .bind(tenant_id)
        .fetch_optional(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)
    }
}

fn map_reservation(row: PgRow) -> BudgetReservation {
    BudgetReservation {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        budget_id: row.get("budget_id"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        amount_cents: row.get("amount_cents"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        released_at: row.get("released_at"),
    }
}
