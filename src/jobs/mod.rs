//! Scheduled sweeps, run as long-lived tokio tasks rather than an
//! external scheduler hitting internal endpoints: approval-timeout
//! reminders every 4 hours, budget-utilization alerts weekly, and a
//! daily vendor risk-score refresh. OCR extraction and the three-way
//! match run inline as part of the invoice upload/match request path,
//! not as background sweeps.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    infrastructure::{integrations, state::AppState},
    services::vendors::VendorService,
};

const APPROVAL_TIMEOUT_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);
const APPROVAL_TIMEOUT_THRESHOLD_HOURS: i64 = 48;
const BUDGET_ALERT_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const BUDGET_WARNING_UTILIZATION: f64 = 0.80;
const BUDGET_CRITICAL_UTILIZATION: f64 = 0.95;
const RISK_SCORE_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub fn spawn_workers(state: Arc<AppState>) -> Vec<JoinHandle<()>> {
    vec![
        spawn_approval_timeout_sweep(Arc::clone(&state)),
        spawn_budget_alert_sweep(Arc::clone(&state)),
        spawn_risk_score_refresh(state),
    ]
}

fn spawn_approval_timeout_sweep(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(err) = check_approval_timeouts(&state).await {
                warn!(error = ?err, "approval timeout sweep failed");
            }
            tokio::time::sleep(APPROVAL_TIMEOUT_INTERVAL).await;
        }
    })
}

fn spawn_budget_alert_sweep(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(err) = check_budget_utilization(&state).await {
                warn!(error = ?err, "budget utilization sweep failed");
            }
            tokio::time::sleep(BUDGET_ALERT_INTERVAL).await;
        }
    })
}

fn spawn_risk_score_refresh(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(err) = refresh_vendor_risk_scores(&state).await {
                warn!(error = ?err, "vendor risk score refresh failed");
            }
            tokio::time::sleep(RISK_SCORE_REFRESH_INTERVAL).await;
        }
    })
}

pub async fn check_approval_timeouts(state: &Arc<AppState>) -> anyhow::Result<()> {
    let cutoff = Utc::now() - chrono::Duration::hours(APPROVAL_TIMEOUT_THRESHOLD_HOURS);
    let rows: Vec<(Uuid, String, i32, Uuid, String, Uuid)> = sqlx::query_as(
        r#"
        SELECT a.id, a.entity_type, a.approval_level, a.entity_id, u.email, a.tenant_id
        FROM approvals a
        JOIN users u ON u.id = a.approver_id
        WHERE a.status = 'PENDING' AND a.created_at < $1
        "#,
    )
    .bind(cutoff)
    .fetch_all(&state.pool)
    .await?;

    let mut escalated = 0usize;
    for (approval_id, entity_type, approval_level, entity_id, approver_email, tenant_id) in rows {
        let outcome = integrations::send_email(
            &approver_email,
            &format!("Approval pending {APPROVAL_TIMEOUT_THRESHOLD_HOURS}h: {entity_type} {entity_id}"),
        )
        .await?;
        warn!(
            %approval_id, %tenant_id, entity_type, %entity_id, approval_level,
            delivered = outcome.delivered,
            "escalated approval pending past timeout threshold"
        );
        escalated += 1;
    }
    info!(escalated, "approval timeout sweep complete");
    Ok(())
}

pub async fn check_budget_utilization(state: &Arc<AppState>) -> anyhow::Result<()> {
    let rows: Vec<(Uuid, Uuid, i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT b.id, b.tenant_id, b.total_cents, b.spent_cents,
               COALESCE((SELECT SUM(amount_cents) FROM budget_reservations
                         WHERE budget_id = b.id AND status = 'COMMITTED'), 0)
        FROM budgets b
        WHERE b.total_cents > 0
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let (mut warning_count, mut critical_count) = (0usize, 0usize);
    for (budget_id, tenant_id, total_cents, spent_cents, reserved_cents) in rows {
        let utilization = (spent_cents + reserved_cents) as f64 / total_cents as f64;
        if utilization >= BUDGET_CRITICAL_UTILIZATION {
            critical_count += 1;
            warn!(%budget_id, %tenant_id, utilization_pct = utilization * 100.0, "budget near exhaustion");
        } else if utilization >= BUDGET_WARNING_UTILIZATION {
            warning_count += 1;
            info!(%budget_id, %tenant_id, utilization_pct = utilization * 100.0, "budget utilization warning");
        }
    }
    info!(warning_count, critical_count, "budget utilization sweep complete");
    Ok(())
}

pub async fn refresh_vendor_risk_scores(state: &Arc<AppState>) -> anyhow::Result<()> {
    let tenants: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM tenants")
        .fetch_all(&state.pool)
        .await?;

    let vendor_service = VendorService::new(Arc::clone(state));
    let mut refreshed = 0usize;
    for tenant_id in tenants {
        let vendor_ids = vendor_service.list_active_ids(tenant_id).await.map_err(|err| {
            anyhow::anyhow!("failed to list vendors for tenant {tenant_id}: {err}")
        })?;
        for vendor_id in vendor_ids {
            match vendor_service.refresh_risk_score(tenant_id, vendor_id).await {
                Ok(score) => {
                    refreshed += 1;
                    info!(%vendor_id, score, "refreshed vendor risk score");
                }
                Err(err) => warn!(%vendor_id, error = %err, "failed to refresh vendor risk score"),
            }
        }
    }
    info!(refreshed, "vendor risk score refresh complete");
    Ok(())
}
