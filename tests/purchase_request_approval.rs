use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Extension,
};
use chrono::Utc;
use s2p_backend::{
    api,
    domain::{fiscal::fiscal_period, models::Role},
    infrastructure::{
        auth::issue_token,
        cache::InMemoryCache,
        config::{
            AppConfig, AuthConfig, CacheConfig, Config, DatabaseConfig, DocumentRules,
            IntegrationsConfig, MatchingConfig, SecurityConfig, StorageConfig,
        },
        state::AppState,
        storage,
    },
};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

#[path = "test_harness.rs"]
mod test_harness;

use test_harness::run_test;

#[tokio::test]
async fn manager_approval_moves_pr_to_approved() -> Result<()> {
    run_test(run_happy_path).await
}

#[tokio::test]
async fn decide_rejects_when_caller_is_not_the_current_approver() -> Result<()> {
    run_test(run_wrong_approver).await
}

async fn run_happy_path(pool: PgPool) -> Result<()> {
    let (_config, state) = build_state(pool.clone()).await?;
    let app = api::build_router().layer(Extension(Arc::clone(&state)));

    let fixture = seed_tenant(&pool).await?;

    let create_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/purchase-requests")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", fixture.requester_token))
                .body(Body::from(
                    serde_json::json!({
                        "department_id": fixture.department_id,
                        "description": "laptops for the design team",
                        "currency": "USD",
                        "line_items": [
                            { "description": "laptop", "quantity": 3, "unit_price_cents": 150_000 }
                        ]
                    })
                    .to_string(),
                ))
                .expect("failed to build create request"),
        )
        .await
        .expect("service error");
    assert_eq!(create_response.status(), StatusCode::OK);

    let create_body = to_bytes(create_response.into_body(), 1024 * 1024).await?;
    let pr_id = pr_id_from(&create_body)?;

    let submit_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/purchase-requests/{pr_id}/submit"))
                .header(header::AUTHORIZATION, format!("Bearer {}", fixture.requester_token))
                .body(Body::empty())
                .expect("failed to build submit request"),
        )
        .await
        .expect("service error");
    assert_eq!(submit_response.status(), StatusCode::OK);

    let decide_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/purchase-requests/{pr_id}/decide"))
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", fixture.manager_token))
                .body(Body::from(
                    serde_json::json!({ "approve": true, "comments": "approved" }).to_string(),
                ))
                .expect("failed to build decide request"),
        )
        .await
        .expect("service error");
    assert_eq!(decide_response.status(), StatusCode::OK);

    let decide_body = to_bytes(decide_response.into_body(), 1024 * 1024).await?;
    let payload: Value = serde_json::from_slice(&decide_body)?;
    assert_eq!(
        payload["purchase_request"]["status"].as_str(),
        Some("APPROVED")
    );

    fixture.cleanup(&pool).await?;
    Ok(())
}

async fn run_wrong_approver(pool: PgPool) -> Result<()> {
    let (_config, state) = build_state(pool.clone()).await?;
    let app = api::build_router().layer(Extension(Arc::clone(&state)));

    let fixture = seed_tenant(&pool).await?;

    let create_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/purchase-requests")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", fixture.requester_token))
                .body(Body::from(
                    serde_json::json!({
                        "department_id": fixture.department_id,
                        "description": "office chairs",
                        "currency": "USD",
                        "line_items": [
                            { "description": "chair", "quantity": 2, "unit_price_cents": 40_000 }
                        ]
                    })
                    .to_string(),
                ))
                .expect("failed to build create request"),
        )
        .await
        .expect("service error");
    assert_eq!(create_response.status(), StatusCode::OK);
    let create_body = to_bytes(create_response.into_body(), 1024 * 1024).await?;
    let pr_id = pr_id_from(&create_body)?;

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/purchase-requests/{pr_id}/submit"))
                .header(header::AUTHORIZATION, format!("Bearer {}", fixture.requester_token))
                .body(Body::empty())
                .expect("failed to build submit request"),
        )
        .await
        .expect("service error");

    let decide_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/purchase-requests/{pr_id}/decide"))
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", fixture.requester_token))
                .body(Body::from(serde_json::json!({ "approve": true }).to_string()))
                .expect("failed to build decide request"),
        )
        .await
        .expect("service error");
    assert_eq!(decide_response.status(), StatusCode::FORBIDDEN);

    fixture.cleanup(&pool).await?;
    Ok(())
}

fn pr_id_from(body: &[u8]) -> Result<Uuid> {
    let payload: Value = serde_json::from_slice(body)?;
    let id = payload["purchase_request"]["id"]
        .as_str()
        .expect("purchase_request.id present")
        .parse()?;
    Ok(id)
}

struct TenantFixture {
    tenant_id: Uuid,
    department_id: Uuid,
    requester_id: Uuid,
    manager_id: Uuid,
    requester_token: String,
    manager_token: String,
}

impl TenantFixture {
    async fn cleanup(&self, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM budget_reservations WHERE tenant_id = $1")
            .bind(self.tenant_id)
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM approvals WHERE tenant_id = $1")
            .bind(self.tenant_id)
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM pr_line_items WHERE pr_id IN (SELECT id FROM purchase_requests WHERE tenant_id = $1)")
            .bind(self.tenant_id)
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM purchase_requests WHERE tenant_id = $1")
            .bind(self.tenant_id)
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM budgets WHERE tenant_id = $1")
            .bind(self.tenant_id)
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ANY($1)")
            .bind(vec![self.requester_id, self.manager_id])
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(self.department_id)
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(self.tenant_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

async fn seed_tenant(pool: &PgPool) -> Result<TenantFixture> {
    let now = Utc::now();
    let tenant_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO tenants (id, name, slug, status, settings, created_at, updated_at)
         VALUES ($1,$2,$3,'ACTIVE','{}'::jsonb,$4,$4)",
    )
    .bind(tenant_id)
    .bind(format!("tenant-{}", tenant_id.simple()))
    .bind(format!("tenant-{}", tenant_id.simple()))
    .bind(now)
    .execute(pool)
    .await?;

    let manager_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users
             (id, tenant_id, email, password_hash, first_name, last_name, role,
              department_id, is_active, fcm_token, created_at, last_login_at, deleted_at)
         VALUES ($1,$2,$3,NULL,NULL,NULL,$4,NULL,true,NULL,$5,NULL,NULL)",
    )
    .bind(manager_id)
    .bind(tenant_id)
    .bind(format!("manager-{}@example.test", manager_id.simple()))
    .bind(Role::Manager)
    .bind(now)
    .execute(pool)
    .await?;

    let department_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO departments (id, tenant_id, name, code, manager_id, parent_department_id, created_at)
         VALUES ($1,$2,'Design','DSGN',$3,NULL,$4)",
    )
    .bind(department_id)
    .bind(tenant_id)
    .bind(manager_id)
    .bind(now)
    .execute(pool)
    .await?;

    let requester_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users
             (id, tenant_id, email, password_hash, first_name, last_name, role,
              department_id, is_active, fcm_token, created_at, last_login_at, deleted_at)
         VALUES ($1,$2,$3,NULL,NULL,NULL,$4,$5,true,NULL,$6,NULL,NULL)",
    )
    .bind(requester_id)
    .bind(tenant_id)
    .bind(format!("requester-{}@example.test", requester_id.simple()))
    .bind(Role::Manager)
    .bind(department_id)
    .bind(now)
    .execute(pool)
    .await?;

    let (fiscal_year, quarter) = fiscal_period(now.date_naive());
    sqlx::query(
        "INSERT INTO budgets
             (id, tenant_id, department_id, fiscal_year, quarter, total_cents, spent_cents, currency, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6,0,'USD',$7,$7)",
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(department_id)
    .bind(fiscal_year)
    .bind(quarter)
    .bind(10_000_000_i64)
    .bind(now)
    .execute(pool)
    .await?;

    let (_config, state) = build_state(pool.clone()).await?;
    let requester_token = issue_token(
        &state,
        &fetch_user(pool, requester_id).await?,
    )?;
    let manager_token = issue_token(&state, &fetch_user(pool, manager_id).await?)?;

    Ok(TenantFixture {
        tenant_id,
        department_id,
        requester_id,
        manager_id,
        requester_token,
        manager_token,
    })
}

async fn fetch_user(pool: &PgPool, id: Uuid) -> Result<s2p_backend::domain::models::User> {
    let user = sqlx::query_as::<_, s2p_backend::domain::models::User>(
        "SELECT * FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

async fn build_state(pool: PgPool) -> Result<(Arc<Config>, Arc<AppState>)> {
    let mut storage_config = StorageConfig::default();
    storage_config.provider = "memory".to_string();

    let config = Arc::new(Config {
        app: AppConfig::default(),
        database: DatabaseConfig {
            url: "postgres://integration".to_string(),
            max_connections: 5,
        },
        auth: AuthConfig {
            jwt_secret: "integration-secret".to_string(),
            jwt_ttl_seconds: 3_600,
            developer_credential: "dev-pass".to_string(),
            bypass_auth: false,
            bypass_user_email: None,
        },
        storage: storage_config,
        cache: CacheConfig::default(),
        security: SecurityConfig::default(),
        integrations: IntegrationsConfig::default(),
        documents: DocumentRules::default(),
        matching: MatchingConfig::default(),
    });

    let storage = storage::build_storage(&config.storage)?;
    let cache = Arc::new(InMemoryCache::new());
    let state = Arc::new(AppState::new(Arc::clone(&config), pool, storage, cache)?);

    Ok((config, state))
}
