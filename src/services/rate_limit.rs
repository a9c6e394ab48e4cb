//! Role-tiered sliding-window rate limiting.
//!
//! Privileged roles (admin, finance_head, cfo, procurement_lead) get the
//! highest ceiling, `manager`/`finance`/`procurement` a middle tier, and
//! everyone else (vendor, unauthenticated) the lowest. Limits differ by
//! path category: auth endpoints and file uploads are tighter than the
//! general default.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::{
    domain::models::Role,
    infrastructure::{cache::CacheBackend, state::AppState},
};

use super::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTier {
    Privileged,
    Internal,
    Vendor,
}

impl RoleTier {
    pub fn for_role(role: Option<Role>) -> Self {
        match role {
            Some(Role::Admin | Role::FinanceHead | Role::Cfo | Role::ProcurementLead) => {
                RoleTier::Privileged
            }
            Some(Role::Procurement | Role::Manager | Role::Finance) => RoleTier::Internal,
            Some(Role::Vendor) | None => RoleTier::Vendor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCategory {
    Auth,
    Upload,
    Default,
}

impl PathCategory {
    pub fn for_path(path: &str) -> Self {
        if path.starts_with("/auth") {
            PathCategory::Auth
        } else if path.contains("/files/upload") || path.contains("/documents/upload") {
            PathCategory::Upload
        } else {
            PathCategory::Default
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Limit {
    requests: i64,
    window_seconds: u64,
}

fn limit_for(tier: RoleTier, category: PathCategory) -> Limit {
    match (tier, category) {
        (RoleTier::Privileged, PathCategory::Auth) => Limit { requests: 20, window_seconds: 60 },
        (RoleTier::Privileged, PathCategory::Upload) => Limit { requests: 20, window_seconds: 60 },
        (RoleTier::Privileged, PathCategory::Default) => Limit { requests: 500, window_seconds: 60 },
        (RoleTier::Internal, PathCategory::Auth) => Limit { requests: 15, window_seconds: 60 },
        (RoleTier::Internal, PathCategory::Upload) => Limit { requests: 10, window_seconds: 60 },
        (RoleTier::Internal, PathCategory::Default) => Limit { requests: 200, window_seconds: 60 },
        (RoleTier::Vendor, PathCategory::Auth) => Limit { requests: 10, window_seconds: 60 },
        (RoleTier::Vendor, PathCategory::Upload) => Limit { requests: 5, window_seconds: 60 },
        (RoleTier::Vendor, PathCategory::Default) => Limit { requests: 60, window_seconds: 60 },
    }
}

pub struct RateLimiter {
    cache: Arc<dyn CacheBackend>,
}

impl RateLimiter {
    pub fn new(state: &AppState) -> Self {
        Self {
            cache: state.cache.clone(),
        }
    }

    /// Increments the counter for `identity` (a user id or, when
    /// unauthenticated, a client IP) scoped to `tier`/`path`, and rejects
    /// once the tier's limit for the path category is exceeded.
    pub async fn check(
        &self,
        tier: RoleTier,
        path: &str,
        identity: &str,
    ) -> Result<(), ServiceError> {
        let category = PathCategory::for_path(path);
        let limit = limit_for(tier, category);
        let key = format!("rl:{:?}:{identity}:{path}", tier);

        let current = match self.cache.incr_with_expiry(&key, limit.window_seconds).await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, key, "rate limiter cache unreachable, failing open");
                return Ok(());
            }
        };

        if current > limit.requests {
            return Err(ServiceError::RateLimited {
                retry_after_seconds: limit.window_seconds,
            });
        }
        Ok(())
    }

    pub fn identity_for(user_id: Option<Uuid>, client_ip: &str) -> String {
        user_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| client_ip.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::InMemoryCache;

    #[test]
    fn privileged_roles_map_to_privileged_tier() {
        assert_eq!(RoleTier::for_role(Some(Role::Cfo)), RoleTier::Privileged);
        assert_eq!(RoleTier::for_role(Some(Role::Manager)), RoleTier::Internal);
        assert_eq!(RoleTier::for_role(Some(Role::Vendor)), RoleTier::Vendor);
        assert_eq!(RoleTier::for_role(None), RoleTier::Vendor);
    }

    #[test]
    fn upload_path_is_categorized_correctly() {
        assert_eq!(PathCategory::for_path("/documents/upload"), PathCategory::Upload);
        assert_eq!(PathCategory::for_path("/auth/login"), PathCategory::Auth);
        assert_eq!(PathCategory::for_path("/purchase-orders"), PathCategory::Default);
    }

    #[tokio::test]
    async fn vendor_tier_rejects_after_limit() {
        let limiter = RateLimiter {
            cache: Arc::new(InMemoryCache::new()),
        };
        for _ in 0..5 {
            limiter
                .check(RoleTier::Vendor, "/files/upload", "vendor-1")
                .await
                .unwrap();
        }
        let result = limiter.check(RoleTier::Vendor, "/files/upload", "vendor-1").await;
        assert!(matches!(result, Err(ServiceError::RateLimited { .. })));
    }
}
