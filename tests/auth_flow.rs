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
async fn vendor_listing_requires_a_bearer_token_then_accepts_one() -> Result<()> {
    run_test(run_scenario).await
}

async fn run_scenario(pool: PgPool) -> Result<()> {
    let (config, state) = build_state(pool.clone()).await?;
    let app = api::build_router().layer(Extension(Arc::clone(&state)));

    let unauthenticated = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/vendors")
                .body(Body::empty())
                .expect("failed to build unauthenticated request"),
        )
        .await
        .expect("service error");
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    let tenant_id = Uuid::new_v4();
    let now = Utc::now();
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

    let user_id = Uuid::new_v4();
    let email = format!("procurement-{}@example.test", user_id.simple());
    sqlx::query(
        "INSERT INTO users
             (id, tenant_id, email, password_hash, first_name, last_name, role,
              department_id, is_active, fcm_token, created_at, last_login_at, deleted_at)
         VALUES ($1,$2,$3,NULL,NULL,NULL,$4,NULL,true,NULL,$5,NULL,NULL)",
    )
    .bind(user_id)
    .bind(tenant_id)
    .bind(&email)
    .bind(Role::ProcurementLead)
    .bind(now)
    .execute(&pool)
    .await?;

    let login_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({ "email": email, "credential": "dev-pass" }).to_string(),
                ))
                .expect("failed to build login request"),
        )
        .await
        .expect("service error");
    assert_eq!(login_response.status(), StatusCode::OK);

    let login_body = to_bytes(login_response.into_body(), 1024 * 1024).await?;
    let token = serde_json::from_slice::<Value>(&login_body)?
        .get("token")
        .and_then(Value::as_str)
        .expect("token field")
        .to_string();

    let authorized = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/vendors")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .expect("failed to build authorized request"),
        )
        .await
        .expect("service error");
    assert_eq!(authorized.status(), StatusCode::OK);

    sqlx::query("DELETE FROM users WHERE id = $1").bind(user_id).execute(&pool).await?;
    sqlx::query("DELETE FROM tenants WHERE id = $1").bind(tenant_id).execute(&pool).await?;

    Ok(())
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
