//! Per-tenant credential assumption with session caching.
//!
//! Role ARNs are validated before any broker call. Cached sessions are keyed
//! by `(tenant_id, role_arn)` and refreshed ahead of expiry; the fast path
//! takes only the read lock. An entry's expiry never moves earlier.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use finops_core::domain::validate_role_arn;
use finops_core::errors::ApplicationError;
use finops_core::ratelimit::{SERVICE_STS, ServiceLimiter};
use finops_core::triage::FetchResult;

/// A per-tenant client configuration derived from an assumed-role session.
/// The credential material itself stays inside the broker; callers only see
/// an opaque session id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub tenant_id: String,
    pub region: String,
    pub role_session_name: String,
    pub session_id: String,
}

/// The STS boundary. Real deployments back this with the cloud SDK; tests
/// use [`StaticSessionBroker`].
#[async_trait]
pub trait SessionBroker: Send + Sync {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        region: &str,
        duration: Duration,
    ) -> FetchResult<String>;
}

struct CachedSession {
    config: SessionConfig,
    expires_at: DateTime<Utc>,
}

/// Caches assumed-role sessions per tenant, refreshing five minutes before
/// expiry. Safe to share across tasks.
pub struct TenantSessionProvider<B> {
    base_region: String,
    broker: B,
    limiter: Option<Arc<ServiceLimiter>>,
    cache: RwLock<HashMap<String, CachedSession>>,
    session_duration: Duration,
    refresh_before: Duration,
}

fn cache_key(tenant_id: &str, role_arn: &str) -> String {
    format!("{tenant_id}|{role_arn}")
}

impl<B> TenantSessionProvider<B>
where
    B: SessionBroker,
{
    pub fn new(base_region: impl Into<String>, broker: B) -> Self {
        Self {
            base_region: base_region.into(),
            broker,
            limiter: None,
            cache: RwLock::new(HashMap::new()),
            session_duration: Duration::from_secs(60 * 60),
            refresh_before: Duration::from_secs(5 * 60),
        }
    }

    pub fn with_limiter(mut self, limiter: Arc<ServiceLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Overrides session timing. Used by deployments with shorter STS
    /// policies and by tests that need immediate refresh.
    pub fn with_timing(mut self, session_duration: Duration, refresh_before: Duration) -> Self {
        self.session_duration = session_duration;
        self.refresh_before = refresh_before;
        self
    }

    /// Returns a session-scoped config for the tenant. A cached session is
    /// reused while it has more than `refresh_before` left; otherwise the
    /// role is re-assumed. A caller-supplied region overrides the returned
    /// config without touching the cache.
    pub async fn for_tenant(
        &self,
        tenant_id: &str,
        role_arn: &str,
        region: &str,
    ) -> Result<SessionConfig, ApplicationError> {
        validate_role_arn(role_arn)
            .map_err(|failure| ApplicationError::Domain(failure.into()))?;

        let key = cache_key(tenant_id, role_arn);
        let refresh_horizon = chrono::TimeDelta::from_std(self.refresh_before)
            .unwrap_or_else(|_| chrono::TimeDelta::minutes(5));

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&key) {
                if Utc::now() + refresh_horizon < cached.expires_at {
                    let mut config = cached.config.clone();
                    if !region.is_empty() {
                        config.region = region.to_string();
                    }
                    return Ok(config);
                }
            }
        }

        let assume_region = if region.is_empty() { &self.base_region } else { region };
        let session_name = format!("finops-{tenant_id}");

        if let Some(limiter) = &self.limiter {
            limiter.wait(SERVICE_STS).await;
        }
        let session_id = self
            .broker
            .assume_role(role_arn, &session_name, assume_region, self.session_duration)
            .await
            .map_err(|err| {
                ApplicationError::Integration(format!("assume role for tenant {tenant_id}: {err}"))
            })?;

        let config = SessionConfig {
            tenant_id: tenant_id.to_string(),
            region: assume_region.to_string(),
            role_session_name: session_name,
            session_id,
        };
        let expires_at = Utc::now()
            + chrono::TimeDelta::from_std(self.session_duration)
                .unwrap_or_else(|_| chrono::TimeDelta::hours(1));

        let mut cache = self.cache.write().await;
        match cache.get_mut(&key) {
            // Never move an entry's expiry earlier.
            Some(existing) if existing.expires_at >= expires_at => {
                existing.config = config.clone();
            }
            _ => {
                cache.insert(key, CachedSession { config: config.clone(), expires_at });
            }
        }

        Ok(config)
    }
}

/// Deterministic in-memory broker: hands out sequentially numbered session
/// ids and records every assumption.
#[derive(Debug, Default)]
pub struct StaticSessionBroker {
    calls: std::sync::Mutex<Vec<String>>,
}

impl StaticSessionBroker {
    pub fn assume_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn sessions(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl SessionBroker for StaticSessionBroker {
    async fn assume_role(
        &self,
        _role_arn: &str,
        session_name: &str,
        _region: &str,
        _duration: Duration,
    ) -> FetchResult<String> {
        let mut calls = self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        calls.push(session_name.to_string());
        Ok(format!("session-{}", calls.len()))
    }
}
