//! Purchase request lifecycle: draft creation, submission (which starts
//! a budget reservation and approval chain), and the terminal approve/
//! reject outcome.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

use crate::{
    domain::{
        fiscal::fiscal_period,
        models::{ApprovalEntityType, BudgetEntityType, PrLineItem, PrStatus, PurchaseRequest},
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::{
    approvals::{ApprovalAction, ApprovalService},
    audit::AuditService,
    budget::BudgetService,
    errors::{map_sqlx_error, ServiceError},
};

#[derive(Debug, Deserialize)]
pub struct PrLineItemRequest {
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePrRequest {
    pub department_id: Uuid,
    pub description: Option<String>,
    pub currency: String,
    pub line_items: Vec<PrLineItemRequest>,
}

pub struct PurchaseRequestService {
    pub state: Arc<AppState>,
}

impl PurchaseRequestService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    fn total_cents(line_items: &[PrLineItemRequest]) -> i64 {
        line_items
            .iter()
            .map(|item| item.unit_price_cents * item.quantity as i64)
            .sum()
    }

    pub async fn create_draft(
        &self,
        actor: &AuthenticatedUser,
        payload: CreatePrRequest,
    ) -> Result<PurchaseRequest, ServiceError> {
        if payload.line_items.is_empty() {
            return Err(ServiceError::Validation(
                "a purchase request needs at least one line item".to_string(),
            ));
        }

        let total_cents = Self::total_cents(&payload.line_items);
        let now = Utc::now();
        let pr_number = format!("PR-{}", Uuid::new_v4().simple());

        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(map_sqlx_error)?;

        let pr = sqlx::query(
            r#"
            INSERT INTO purchase_requests
                (id, tenant_id, pr_number, requester_id, department_id, status, total_cents, currency, description, created_at, updated_at, submitted_at, approved_at, deleted_at)
            VALUES ($1,$2,$3,$4,$5,'DRAFT',$6,$7,$8,$9,$9,NULL,NULL,NULL)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(&pr_number)
        .bind(actor.user_id)
        .bind(payload.department_id)
        .bind(total_cents)
        .bind(&payload.currency)
        .bind(&payload.description)
        .bind(now)
        .map(map_pr)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        for (idx, item) in payload.line_items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO pr_line_items (id, pr_id, line_number, description, quantity, unit_price_cents)
                VALUES ($1,$2,$3,$4,$5,$6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(pr.id)
            .bind((idx + 1) as i32)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(pr)
    }

    /// Submits a draft PR: reserves budget for its total, builds the
    /// approval chain, and moves status to PENDING. Budget reservation
    /// and approval-row creation happen in the same transaction so a
    /// failure in either rolls back both.
    pub async fn submit(
        &self,
        actor: &AuthenticatedUser,
        pr_id: Uuid,
    ) -> Result<PurchaseRequest, ServiceError> {
        let pr = self.find(actor.tenant_id, pr_id).await?;
        if pr.status != PrStatus::Draft {
            return Err(ServiceError::State(format!(
                "purchase request must be DRAFT to submit, was {}",
                pr.status.as_str()
            )));
        }

        let (fiscal_year, quarter) = fiscal_period(Utc::now().date_naive());
        let budget_service = BudgetService::new(self.state.clone());
        let approval_service = ApprovalService::new(self.state.clone());

        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(map_sqlx_error)?;

        let chain = approval_service
            .build_chain(&mut tx, actor.tenant_id, pr.department_id, pr.total_cents)
            .await?;
        approval_service
            .create_workflow(&mut tx, actor.tenant_id, ApprovalEntityType::Pr, pr.id, &chain)
            .await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        budget_service
            .reserve(
                actor.tenant_id,
                pr.department_id,
                fiscal_year,
                quarter,
                BudgetEntityType::Pr,
                pr.id,
                pr.total_cents,
            )
            .await?;

        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("UPDATE purchase_requests SET status = 'PENDING', updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(pr.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        AuditService::new(self.state.clone())
            .record(
                &mut tx,
                actor.tenant_id,
                Some(actor.user_id),
                "SUBMIT",
                "purchase_request",
                pr.id,
                Some(serde_json::json!({"status": "DRAFT"})),
                Some(serde_json::json!({"status": "PENDING"})),
            )
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        self.find(actor.tenant_id, pr.id).await
    }

    /// Retracts a pending PR before it is approved: releases the budget
    /// reservation it made at submission and cancels its remaining
    /// approval steps.
    pub async fn cancel(
        &self,
        actor: &AuthenticatedUser,
        pr_id: Uuid,
    ) -> Result<PurchaseRequest, ServiceError> {
        let pr = self.find(actor.tenant_id, pr_id).await?;
        if pr.status != PrStatus::Pending {
            return Err(ServiceError::State(format!(
                "purchase request must be PENDING to cancel, was {}",
                pr.status.as_str()
            )));
        }
        if pr.requester_id != actor.user_id {
            return Err(ServiceError::Forbidden);
        }

        let reservation_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM budget_reservations WHERE entity_type = 'PR' AND entity_id = $1 AND status = 'COMMITTED'",
        )
        .bind(pr_id)
        .fetch_optional(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?;
        if let Some(reservation_id) = reservation_id {
            BudgetService::new(self.state.clone())
                .release(actor.tenant_id, reservation_id)
                .await?;
        }

        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query(
            "UPDATE approvals SET status = 'CANCELLED' WHERE tenant_id = $1 AND entity_type = 'PR' AND entity_id = $2 AND status = 'PENDING'",
        )
        .bind(actor.tenant_id)
        .bind(pr_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("UPDATE purchase_requests SET status = 'CANCELLED', updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(pr_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        AuditService::new(self.state.clone())
            .record(
                &mut tx,
                actor.tenant_id,
                Some(actor.user_id),
                "CANCEL",
                "purchase_request",
                pr_id,
                Some(serde_json::json!({"status": "PENDING"})),
                Some(serde_json::json!({"status": "CANCELLED"})),
            )
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        self.find(actor.tenant_id, pr_id).await
    }

    /// Applies an approve/reject decision from the current approver. A
    /// final approval moves the PR to APPROVED; a rejection releases the
    /// budget reservation and moves it to REJECTED.
    pub async fn decide(
        &self,
        actor: &AuthenticatedUser,
        pr_id: Uuid,
        action: ApprovalAction,
        comments: Option<String>,
    ) -> Result<PurchaseRequest, ServiceError> {
        let pr = self.find(actor.tenant_id, pr_id).await?;
        if pr.status != PrStatus::Pending {
            return Err(ServiceError::State(format!(
                "purchase request must be PENDING to decide, was {}",
                pr.status.as_str()
            )));
        }

        let approval_service = ApprovalService::new(self.state.clone());
        let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
        let outcome = approval_service
            .process_step(
                &mut tx,
                actor.tenant_id,
                ApprovalEntityType::Pr,
                pr_id,
                actor.user_id,
                Some(pr.requester_id),
                action,
                comments,
            )
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        let audit = AuditService::new(self.state.clone());

        if outcome.is_rejected {
            let reservation_id: Option<Uuid> = sqlx::query_scalar(
                "SELECT id FROM budget_reservations WHERE entity_type = 'PR' AND entity_id = $1 AND status = 'COMMITTED'",
            )
            .bind(pr_id)
            .fetch_optional(&self.state.pool)
            .await
            .map_err(map_sqlx_error)?;
            if let Some(reservation_id) = reservation_id {
                BudgetService::new(self.state.clone())
                    .release(actor.tenant_id, reservation_id)
                    .await?;
            }
            let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
            sqlx::query("UPDATE purchase_requests SET status = 'REJECTED', updated_at = $1 WHERE id = $2")
                .bind(Utc::now())
                .bind(pr_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            audit
                .record(
                    &mut tx,
                    actor.tenant_id,
                    Some(actor.user_id),
                    "REJECT",
                    "purchase_request",
                    pr_id,
                    Some(serde_json::json!({"status": "PENDING"})),
                    Some(serde_json::json!({"status": "REJECTED"})),
                )
                .await?;
            tx.commit().await.map_err(map_sqlx_error)?;
        } else if outcome.is_final {
            let mut tx = self.state.pool.begin().await.map_err(map_sqlx_error)?;
            sqlx::query(
                "UPDATE purchase_requests SET status = 'APPROVED', approved_at = $1, updated_at = $1 WHERE id = $2",
            )
            .bind(Utc::now())
            .bind(pr_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            audit
                .record(
                    &mut tx,
                    actor.tenant_id,
                    Some(actor.user_id),
                    "APPROVE",
                    "purchase_request",
                    pr_id,
                    Some(serde_json::json!({"status": "PENDING"})),
                    Some(serde_json::json!({"status": "APPROVED"})),
                )
                .await?;
            tx.commit().await.map_err(map_sqlx_error)?;
        }

        self.find(actor.tenant_id, pr_id).await
    }

    pub async fn find(&self, tenant_id: Uuid, pr_id: Uuid) -> Result<PurchaseRequest, ServiceError> {
        sqlx::query_as::<_, PurchaseRequest>(
            "SELECT * FROM purchase_requests WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
        )
        .bind(pr_id)
        .bind(tenant_id)
        .fetch_optional(&self.state.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(ServiceError::NotFound)
    }

    pub async fn line_items(&self, pr_id: Uuid) -> Result<Vec<PrLineItem>, ServiceError> {
        sqlx::query_as::<_, PrLineItem>(
            "SELECT * FROM pr_line_items WHERE pr_id = $1 ORDER BY line_number ASC",
        )
        .bind(pr_id)
        .fetch_all(&self.state.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

fn map_pr(row: PgRow) -> PurchaseRequest {
    PurchaseRequest {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        pr_number: row.get("pr_number"),
        requester_id: row.get("requester_id"),
        department_id: row.get("department_id"),
        status: row.get("status"),
        total_cents: row.get("total_cents"),
        currency: row.get("currency"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        submitted_at: row.get("submitted_at"),
        approved_at: row.get("approved_at"),
        deleted_at: row.get("deleted_at"),
    }
}
