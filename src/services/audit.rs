//! Audit log recorder — captures before/after state for entity mutations.

use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;
use serde_json::Value;
use sqlx::{postgres::PgRow, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{domain::models::AuditLog, infrastructure::state::AppState};

use super::errors::{map_sqlx_error, ServiceError};

pub struct AuditService {
    pub state: Arc<AppState>,
}

impl AuditService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Records an audit entry within the caller's transaction, so the
    /// audit row commits or rolls back atomically with the mutation it
    /// describes.
    pub async fn record(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        actor_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Uuid,
        before_state: Option<Value>,
        after_state: Option<Value>,
    ) -> Result<AuditLog, ServiceError> {
        let changed_fields = compute_changed_fields(before_state.as_ref(), after_state.as_ref());

        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (id, tenant_id, actor_id, action, entity_type, entity_id,
                 before_state, after_state, changed_fields, request_id, created_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(actor_id)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(before_state)
        .bind(after_state)
        .bind(changed_fields)
        .bind(Option::<Uuid>::None)
        .bind(Utc::now())
        .map(map_audit_log)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx_error)
    }
}

fn compute_changed_fields(before: Option<&Value>, after: Option<&Value>) -> Option<Vec<String>> {
    let (Value::Object(before), Value::Object(after)) = (before?, after?) else {
        return None;
    };
    let mut keys: BTreeSet<&String> = before.keys().collect();
    keys.extend(after.keys());
    let changed: Vec<String> = keys
        .into_iter()
        .filter(|key| before.get(*key) != after.get(*key))
        .cloned()
        .collect();
    if changed.is_empty() {
        None
    } else {
        Some(changed)
    }
}

fn map_audit_log(row: PgRow) -> AuditLog {
    AuditLog {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        actor_id: row.get("actor_id"),
        action: row.get("action"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        before_state: row.get("before_state"),
        after_state: row.get("after_state"),
        changed_fields: row.get("changed_fields"),
        request_id: row.get("request_id"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn changed_fields_ignores_unchanged_keys() {
        let before = json!({"status": "DRAFT", "total_cents": 100});
        let after = json!({"status": "PENDING", "total_cents": 100});
        let changed = compute_changed_fields(Some(&before), Some(&after)).unwrap();
        assert_eq!(changed, vec!["status".to_string()]);
    }

    #[test]
    fn changed_fields_is_none_when_either_side_missing() {
        assert!(compute_changed_fields(None, Some(&json!({"a": 1}))).is_none());
    }

    #[test]
    fn changed_fields_is_none_when_nothing_changed() {
        let before = json!({"a": 1});
        let after = json!({"a": 1});
        assert!(compute_changed_fields(Some(&before), Some(&after)).is_none());
    }
}
