//! Sequential multi-level approval chains gated by amount thresholds.
//!
//! ```text
//! < 5,000,000 cents    -> department manager only
//! 5,000,000..19,999,999 -> + finance_head
//! >= 20,000,000 cents  -> + finance_head + cfo
//! ```
//!
//! Approvals step through levels in order; the current step is always
//! the lowest-level `PENDING` row for the entity. Rejecting a step
//! cancels every other still-pending step for that entity.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{postgres::PgRow, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    domain::models::{Approval, ApprovalEntityType, ApprovalStatus, Role},
    infrastructure::state::AppState,
};

use super::{
    audit::AuditService,
    errors::{map_sqlx_error, ServiceError},
};

const THRESHOLD_FINANCE_HEAD: i64 = 5_000_000;
const THRESHOLD_CFO: i64 = 20_000_000;

#[derive(Debug, Clone, Copy)]
pub struct ApprovalStep {
    pub role: Role,
    pub approver_id: Uuid,
    pub approval_level: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub is_final: bool,
    pub is_rejected: bool,
    pub next_approval: Option<Approval>,
}

pub struct ApprovalService {
    pub state: Arc<AppState>,
}

impl ApprovalService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Builds the ordered approval chain for `amount_cents` against
    /// `department_id`, looking up the department's manager and, above
    /// threshold, the tenant's finance_head/cfo.
    pub async fn build_chain(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        department_id: Uuid,
        amount_cents: i64,
    ) -> Result<Vec<ApprovalStep>, ServiceError> {
        let mut chain = Vec::new();
        let mut level = 1;

        let manager_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT u.id
            FROM departments d
            JOIN users u ON u.id = d.manager_id
            WHERE d.id = $1 AND d.tenant_id = $2 AND u.is_active = true
            "#,
        )
        .bind(department_id)
        .bind(tenant_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        let Some(manager_id) = manager_id else {
            return Err(ServiceError::Validation(
                "no active manager found for department".to_string(),
            ));
        };
        chain.push(ApprovalStep {
            role: Role::Manager,
            approver_id: manager_id,
            approval_level: level,
        });
        level += 1;

        if amount_cents >= THRESHOLD_FINANCE_HEAD {
            let finance_head_id = self
                .find_role_user(tx, tenant_id, Role::FinanceHead)
                .await?
                .ok_or_else(|| {
                    ServiceError::Validation("no active finance_head user found in tenant".to_string())
                })?;
            chain.push(ApprovalStep {
                role: Role::FinanceHead,
                approver_id: finance_head_id,
                approval_level: level,
            });
            level += 1;
        }

        if amount_cents >= THRESHOLD_CFO {
            let cfo_id = self
                .find_role_user(tx, tenant_id, Role::Cfo)
                .await?
                .ok_or_else(|| {
                    ServiceError::Validation("no active cfo user found in tenant".to_string())
                })?;
            chain.push(ApprovalStep {
                role: Role::Cfo,
                approver_id: cfo_id,
                approval_level: level,
            });
        }

        Ok(chain)
    }

    async fn find_role_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        role: Role,
    ) -> Result<Option<Uuid>, ServiceError> {
        sqlx::query_scalar(
            "SELECT id FROM users WHERE tenant_id = $1 AND role = $2 AND is_active = true LIMIT 1",
        )
        .bind(tenant_id)
        .bind(role)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)
    }

    /// Creates PENDING approval rows for every step in the chain.
    pub async fn create_workflow(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        entity_type: ApprovalEntityType,
        entity_id: Uuid,
        chain: &[ApprovalStep],
    ) -> Result<Vec<Approval>, ServiceError> {
        let now = Utc::now();
        let mut approvals = Vec::with_capacity(chain.len());
        for step in chain {
            let approval = sqlx::query(
                r#"
                INSERT INTO approvals
                    (id, tenant_id, entity_type, entity_id, approver_id, approval_level, status, comments, approved_at, created_at)
                VALUES ($1,$2,$3,$4,$5,$6,'PENDING',NULL,NULL,$7)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(entity_type)
            .bind(entity_id)
            .bind(step.approver_id)
            .bind(step.approval_level)
            .bind(now)
            .map(map_approval)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
            approvals.push(approval);
        }
        Ok(approvals)
    }

    /// Processes an approve/reject action against the current pending
    /// step. Fails with `ApprovalSelfApprove` if `approver_id` is the
    /// entity's own requester, or `ApprovalNotYourTurn` if `approver_id`
    /// is not the approver on the lowest pending level.
    pub async fn process_step(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        entity_type: ApprovalEntityType,
        entity_id: Uuid,
        approver_id: Uuid,
        requester_id: Option<Uuid>,
        action: ApprovalAction,
        comments: Option<String>,
    ) -> Result<ApprovalOutcome, ServiceError> {
        if requester_id == Some(approver_id) {
            return Err(ServiceError::ApprovalSelfApprove);
        }

        let rows = sqlx::query(
            r#"
            SELECT * FROM approvals
            WHERE tenant_id = $1 AND entity_type = $2 AND entity_id = $3
            ORDER BY approval_level
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(entity_type)
        .bind(entity_id)
        .map(map_approval)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        if rows.is_empty() {
            return Err(ServiceError::NotFound);
        }

        let current = rows
            .iter()
            .find(|approval| approval.status == ApprovalStatus::Pending)
            .cloned()
            .ok_or_else(|| ServiceError::State("no pending approval step for this entity".to_string()))?;

        if current.approver_id != approver_id {
            return Err(ServiceError::ApprovalNotYourTurn);
        }

        let now = Utc::now();
        let audit = AuditService::new(self.state.clone());

        if action == ApprovalAction::Reject {
            sqlx::query(
                "UPDATE approvals SET status = 'REJECTED', comments = $1, approved_at = $2 WHERE id = $3",
            )
            .bind(&comments)
            .bind(now)
            .bind(current.id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
            audit
                .record(
                    tx,
                    tenant_id,
                    Some(approver_id),
                    "REJECT",
                    "approval",
                    current.id,
                    Some(serde_json::json!({"status": "PENDING"})),
                    Some(serde_json::json!({"status": "REJECTED"})),
                )
                .await?;

            let still_pending: Vec<Uuid> = rows
                .iter()
                .filter(|approval| approval.status == ApprovalStatus::Pending && approval.id != current.id)
                .map(|approval| approval.id)
                .collect();

            sqlx::query(
                "UPDATE approvals SET status = 'CANCELLED' WHERE tenant_id = $1 AND entity_type = $2 AND entity_id = $3 AND status = 'PENDING' AND id != $4",
            )
            .bind(tenant_id)
            .bind(entity_type)
            .bind(entity_id)
            .bind(current.id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

            for pending_id in still_pending {
                audit
                    .record(
                        tx,
                        tenant_id,
                        Some(approver_id),
                        "CANCEL",
                        "approval",
                        pending_id,
                        Some(serde_json::json!({"status": "PENDING"})),
                        Some(serde_json::json!({"status": "CANCELLED"})),
                    )
                    .await?;
            }

            return Ok(ApprovalOutcome {
                is_final: false,
                is_rejected: true,
                next_approval: None,
            });
        }

        sqlx::query(
            "UPDATE approvals SET status = 'APPROVED', comments = $1, approved_at = $2 WHERE id = $3",
        )
        .bind(&comments)
        .bind(now)
        .bind(current.id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
        audit
            .record(
                tx,
                tenant_id,
                Some(approver_id),
                "APPROVE",
                "approval",
                current.id,
                Some(serde_json::json!({"status": "PENDING"})),
                Some(serde_json::json!({"status": "APPROVED"})),
            )
            .await?;

        let next_approval = rows
            .into_iter()
            .find(|approval| approval.status == ApprovalStatus::Pending && approval.id != current.id);

        match next_approval {
            Some(next) => Ok(ApprovalOutcome {
                is_final: false,
                is_rejected: false,
                next_approval: Some(next),
            }),
            None => Ok(ApprovalOutcome {
                is_final: true,
                is_rejected: false,
                next_approval: None,
            }),
        }
    }
}

fn map_approval(row: PgRow) -> Approval {
    Approval {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        approver_id: row.get("approver_id"),
        approval_level: row.get("approval_level"),
        status: row.get("status"),
        comments: row.get("comments"),
        approved_at: row.get("approved_at"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_thresholds_match_documented_boundaries() {
        assert!(THRESHOLD_FINANCE_HEAD < THRESHOLD_CFO);
        assert_eq!(THRESHOLD_FINANCE_HEAD, 5_000_000);
        assert_eq!(THRESHOLD_CFO, 20_000_000);
    }
}
