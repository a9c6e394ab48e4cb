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
    domain::models::Role,
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
async fn a_vendor_from_one_tenant_is_invisible_to_another() -> Result<()> {
    run_test(run_scenario).await
}

async fn run_scenario(pool: PgPool) -> Result<()> {
    let (_config, state) = build_state(pool.clone()).await?;
    let app = api::build_router().layer(Extension(Arc::clone(&state)));

    let now = Utc::now();
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();
    for tenant_id in [tenant_a, tenant_b] {
        sqlx::query(
            "INSERT INTO tenants (id, name, slug, status, settings, created_at, updated_at)
             VALUES ($1,$2,$3,'ACTIVE','{}'::jsonb,$4,$4)",
        )
        .bind(tenant_id)
        .bind(format!("tenant-{}", tenant_id.simple()))
        .bind(format!("tenant-{}", tenant_id.simple()))
        .bind(now)
        .execute(&pool)
        .await?;
    }

    let user_b = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users
             (id, tenant_id, email, password_hash, first_name, last_name, role,
              department_id, is_active, fcm_token, created_at, last_login_at, deleted_at)
         VALUES ($1,$2,$3,NULL,NULL,NULL,$4,NULL,true,NULL,$5,NULL,NULL)",
    )
    .bind(user_b)
    .bind(tenant_b)
    .bind(format!("lead-{}@example.test", user_b.simple()))
    .bind(Role::ProcurementLead)
    .bind(now)
    .execute(&pool)
    .await?;

    let vendor_a = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO vendors
             (id, tenant_id, legal_name, tax_id, email, status, risk_score, created_at, updated_at, deleted_at)
         VALUES ($1,$2,'Acme Supply','TAX-1','acme@example.test','ACTIVE',NULL,$3,$3,NULL)",
    )
    .bind(vendor_a)
    .bind(tenant_a)
    .bind(now)
    .execute(&pool)
    .await?;

    let token_b = issue_token(&state, &fetch_user(&pool, user_b).await?)?;

    let find_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/vendors/{vendor_a}"))
                .header(header::AUTHORIZATION, format!("Bearer {token_b}"))
                .body(Body::empty())
                .expect("failed to build find request"),
        )
        .await
        .expect("service error");
    assert_eq!(find_response.status(), StatusCode::NOT_FOUND);

    let list_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/vendors")
                .header(header::AUTHORIZATION, format!("Bearer {token_b}"))
                .body(Body::empty())
                .expect("failed to build list request"),
        )
        .await
        .expect("service error");
    assert_eq!(list_response.status(), StatusCode::OK);

    let list_body = to_bytes(list_response.into_body(), 1024 * 1024).await?;
    let payload: Value = serde_json::from_slice(&list_body)?;
    let vendors = payload["vendors"].as_array().expect("vendors array");
    assert!(vendors.is_empty(), "tenant B must not see tenant A's vendor");

    sqlx::query("DELETE FROM vendors WHERE id = $1").bind(vendor_a).execute(&pool).await?;
    sqlx::query("DELETE FROM users WHERE id = $1").bind(user_b).execute(&pool).await?;
    sqlx::query("DELETE FROM tenants WHERE id = ANY($1)")
        .bind(vec![tenant_a, tenant_b])
        .execute(&pool)
        .await?;

    Ok(())
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
