//! Provider manager (health-based selection and fallback)
//!
//! Consumes the registry plus a per-provider health record. A provider is a
//! candidate only while its last health check succeeded within the freshness
//! window; candidates are ordered preferred first, then by descending
//! priority, ties broken by registration order.

use crate::{
    metrics, CallContext, ErrorCode, PixProvider, ProviderError, ProviderRegistry, Result,
    DEFAULT_HEALTH_FRESHNESS_SECONDS,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Outcome of the last health check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Last check succeeded
    Healthy,
    /// Last check (or a retryable call) failed
    Unhealthy,
    /// Never checked
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Wire token
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known health of one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Status
    pub status: HealthStatus,
    /// When the status was observed
    pub checked_at: DateTime<Utc>,
    /// Error text of the failure, if any
    pub last_error: Option<String>,
}

impl HealthRecord {
    /// Successful check at `checked_at`
    pub fn healthy(checked_at: DateTime<Utc>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            checked_at,
            last_error: None,
        }
    }

    /// Failed check at `checked_at`
    pub fn unhealthy(checked_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            checked_at,
            last_error: Some(error.into()),
        }
    }
}

/// Health row for persistence and reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Provider code
    pub code: String,
    /// Display name
    pub name: String,
    /// Selection priority
    pub priority: i32,
    /// Recorded status (`unknown` when never checked)
    pub status: HealthStatus,
    /// Last check
    pub checked_at: Option<DateTime<Utc>>,
    /// Last failure
    pub last_error: Option<String>,
    /// Eligible for selection right now
    pub eligible: bool,
}

/// Which providers a call may use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSelection {
    /// Tried first when healthy
    pub preferred: Option<String>,
    /// Restrict candidates to these codes (`None` = any registered)
    pub allowed: Option<Vec<String>>,
}

impl ProviderSelection {
    /// Any registered provider
    pub fn any() -> Self {
        Self::default()
    }

    /// Any provider, `code` first
    pub fn prefer(code: impl Into<String>) -> Self {
        Self {
            preferred: Some(code.into()),
            allowed: None,
        }
    }

    /// Only these codes
    pub fn restrict_to<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    fn allows(&self, code: &str) -> bool {
        self.allowed
            .as_ref()
            .map_or(true, |allowed| allowed.iter().any(|c| c == code))
    }
}

/// Provider manager
pub struct ProviderManager {
    registry: Arc<ProviderRegistry>,
    /// Priority by code (missing = 0)
    priorities: DashMap<String, i32>,
    /// Last health record by code
    health: DashMap<String, HealthRecord>,
    freshness: Duration,
}

impl ProviderManager {
    /// Manager over `registry` with the default freshness window
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            priorities: DashMap::new(),
            health: DashMap::new(),
            freshness: Duration::from_secs(DEFAULT_HEALTH_FRESHNESS_SECONDS),
        }
    }

    /// How long a successful check keeps a provider eligible
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Underlying registry
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Set selection priority (higher wins)
    pub fn set_priority(&self, code: &str, priority: i32) {
        self.priorities.insert(code.to_string(), priority);
    }

    /// Selection priority of `code`
    pub fn priority(&self, code: &str) -> i32 {
        self.priorities.get(code).map(|p| *p).unwrap_or_default()
    }

    /// Store a health observation (from a check or a persisted row)
    pub fn record_health(&self, code: &str, record: HealthRecord) {
        metrics::set_healthy(code, record.status == HealthStatus::Healthy);
        self.health.insert(code.to_string(), record);
    }

    /// Last health record of `code`
    pub fn health_of(&self, code: &str) -> Option<HealthRecord> {
        self.health.get(code).map(|record| record.clone())
    }

    /// Healthy and checked within the freshness window
    pub fn is_healthy(&self, code: &str) -> bool {
        self.is_eligible(code, Utc::now())
    }

    fn is_eligible(&self, code: &str, now: DateTime<Utc>) -> bool {
        self.health.get(code).map_or(false, |record| {
            // Clock skew can put checked_at slightly in the future
            let fresh = (now - record.checked_at)
                .to_std()
                .map_or(true, |age| age <= self.freshness);
            record.status == HealthStatus::Healthy && fresh
        })
    }

    /// Run the health check of one provider and record the outcome
    pub async fn check_health(&self, ctx: &CallContext, code: &str) -> Result<HealthRecord> {
        let provider = self.registry.get(code).ok_or_else(|| {
            ProviderError::new(
                ErrorCode::ProviderUnavailable,
                format!("provider {} is not registered", code),
            )
        })?;

        let outcome = provider.health_check(ctx).await;
        Ok(self.record_check(code, outcome))
    }

    /// Check every registered provider concurrently
    pub async fn check_all(&self, ctx: &CallContext) -> Vec<ProviderHealth> {
        let mut checks = JoinSet::new();

        for provider in self.registry.get_all() {
            let ctx = ctx.clone();
            checks.spawn(async move {
                let outcome = provider.health_check(&ctx).await;
                (provider.code().to_string(), outcome)
            });
        }

        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok((code, outcome)) => {
                    self.record_check(&code, outcome);
                }
                Err(e) => warn!(error = %e, "Health check task failed"),
            }
        }

        self.health_snapshot()
    }

    fn record_check(&self, code: &str, outcome: Result<()>) -> HealthRecord {
        let now = Utc::now();
        let record = match outcome {
            Ok(()) => {
                debug!(provider = code, "Health check passed");
                HealthRecord::healthy(now)
            }
            Err(e) => {
                warn!(provider = code, error = %e, "Health check failed");
                HealthRecord::unhealthy(now, e.to_string())
            }
        };

        self.record_health(code, record.clone());
        record
    }

    /// Health rows for every registered provider, in registration order
    pub fn health_snapshot(&self) -> Vec<ProviderHealth> {
        let now = Utc::now();

        self.registry
            .get_all()
            .into_iter()
            .map(|provider| {
                let code = provider.code();
                let record = self.health_of(code);
                ProviderHealth {
                    code: code.to_string(),
                    name: provider.name().to_string(),
                    priority: self.priority(code),
                    status: record.as_ref().map_or(HealthStatus::Unknown, |r| r.status),
                    checked_at: record.as_ref().map(|r| r.checked_at),
                    last_error: record.and_then(|r| r.last_error),
                    eligible: self.is_eligible(code, now),
                }
            })
            .collect()
    }

    /// Eligible providers in try order
    pub fn candidates(&self, selection: &ProviderSelection) -> Vec<Arc<dyn PixProvider>> {
        let now = Utc::now();

        let mut candidates: Vec<_> = self
            .registry
            .get_all()
            .into_iter()
            .filter(|provider| selection.allows(provider.code()))
            .filter(|provider| self.is_eligible(provider.code(), now))
            .collect();

        // Stable sort keeps registration order on equal priority
        candidates.sort_by_key(|provider| std::cmp::Reverse(self.priority(provider.code())));

        if let Some(preferred) = selection.preferred.as_deref() {
            if let Some(position) = candidates.iter().position(|p| p.code() == preferred) {
                let provider = candidates.remove(position);
                candidates.insert(0, provider);
            }
        }

        candidates
    }

    /// First candidate, `PROVIDER_UNAVAILABLE` when none is eligible
    pub fn get_healthy_provider(
        &self,
        selection: &ProviderSelection,
    ) -> Result<Arc<dyn PixProvider>> {
        self.candidates(selection)
            .into_iter()
            .next()
            .ok_or_else(no_candidates)
    }

    /// Run `operation` against successive candidates until one succeeds.
    ///
    /// Returns the last error when every candidate fails. A retryable failure
    /// marks that provider unhealthy so later selections skip it until its
    /// next successful check.
    pub async fn execute_with_fallback<T, F, Fut>(
        &self,
        selection: &ProviderSelection,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut(Arc<dyn PixProvider>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let candidates = self.candidates(selection);
        if candidates.is_empty() {
            return Err(no_candidates());
        }

        let mut last_error = None;
        for provider in candidates {
            let code = provider.code().to_string();

            match operation(provider).await {
                Ok(value) => {
                    if last_error.is_some() {
                        info!(provider = %code, "Fallback succeeded");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(provider = %code, error = %e, retryable = e.retryable, "Provider call failed, trying next");
                    if e.retryable {
                        self.record_health(&code, HealthRecord::unhealthy(Utc::now(), e.to_string()));
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(no_candidates))
    }
}

fn no_candidates() -> ProviderError {
    ProviderError::new(ErrorCode::ProviderUnavailable, "no healthy provider available").retryable()
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManager")
            .field("registry", &self.registry)
            .field("freshness", &self.freshness)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BancoDoBrasilProvider, BradescoProvider, InterProvider, ItauProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> ProviderManager {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(Arc::new(InterProvider::new()));
        registry.register(Arc::new(ItauProvider::new()));
        registry.register(Arc::new(BancoDoBrasilProvider::new()));
        ProviderManager::new(registry)
    }

    fn mark(manager: &ProviderManager, code: &str, healthy: bool) {
        let record = if healthy {
            HealthRecord::healthy(Utc::now())
        } else {
            HealthRecord::unhealthy(Utc::now(), "down")
        };
        manager.record_health(code, record);
    }

    fn codes(providers: &[Arc<dyn PixProvider>]) -> Vec<&str> {
        providers.iter().map(|p| p.code()).collect()
    }

    #[test]
    fn test_unhealthy_high_priority_is_skipped() {
        let manager = manager();
        manager.set_priority("inter", 10);
        manager.set_priority("itau", 5);
        mark(&manager, "inter", false);
        mark(&manager, "itau", true);

        let provider = manager.get_healthy_provider(&ProviderSelection::any()).unwrap();
        assert_eq!(provider.code(), "itau");
    }

    #[test]
    fn test_order_by_priority_then_registration() {
        let manager = manager();
        manager.set_priority("banco_do_brasil", 7);
        for code in ["inter", "itau", "banco_do_brasil"] {
            mark(&manager, code, true);
        }

        let candidates = manager.candidates(&ProviderSelection::any());
        assert_eq!(codes(&candidates), vec!["banco_do_brasil", "inter", "itau"]);
    }

    #[test]
    fn test_preferred_goes_first_only_when_healthy() {
        let manager = manager();
        manager.set_priority("inter", 10);
        mark(&manager, "inter", true);
        mark(&manager, "itau", true);

        let candidates = manager.candidates(&ProviderSelection::prefer("itau"));
        assert_eq!(codes(&candidates), vec!["itau", "inter"]);

        mark(&manager, "itau", false);
        let candidates = manager.candidates(&ProviderSelection::prefer("itau"));
        assert_eq!(codes(&candidates), vec!["inter"]);
    }

    #[test]
    fn test_restrict_to() {
        let manager = manager();
        for code in ["inter", "itau", "banco_do_brasil"] {
            mark(&manager, code, true);
        }

        let selection = ProviderSelection::any().restrict_to(["itau", "bradesco"]);
        assert_eq!(codes(&manager.candidates(&selection)), vec!["itau"]);
    }

    #[test]
    fn test_unknown_and_stale_are_not_eligible() {
        let manager = manager().with_freshness(Duration::from_secs(60));
        manager.record_health(
            "inter",
            HealthRecord::healthy(Utc::now() - chrono::Duration::seconds(120)),
        );

        assert!(!manager.is_healthy("inter"));
        assert!(!manager.is_healthy("itau"));

        let err = manager
            .get_healthy_provider(&ProviderSelection::any())
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::ProviderUnavailable);
        assert!(err.retryable);
    }

    #[test]
    fn test_snapshot_rows() {
        let manager = manager();
        manager.set_priority("itau", 3);
        mark(&manager, "itau", false);

        let snapshot = manager.health_snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].status, HealthStatus::Unknown);
        assert!(snapshot[0].checked_at.is_none());
        assert_eq!(snapshot[1].priority, 3);
        assert_eq!(snapshot[1].status, HealthStatus::Unhealthy);
        assert_eq!(snapshot[1].last_error.as_deref(), Some("down"));
        assert!(!snapshot[1].eligible);
    }

    #[tokio::test]
    async fn test_fallback_moves_on_and_marks_retryable_failures() {
        let manager = manager();
        manager.set_priority("inter", 10);
        manager.set_priority("itau", 5);
        for code in ["inter", "itau", "banco_do_brasil"] {
            mark(&manager, code, true);
        }

        let calls = AtomicUsize::new(0);
        let result = manager
            .execute_with_fallback(&ProviderSelection::any(), |provider| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match provider.code() {
                        "inter" => Err(ProviderError::new(ErrorCode::TransferError, "reset").retryable()),
                        code => Ok(code.to_string()),
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "itau");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!manager.is_healthy("inter"));
        assert!(manager.is_healthy("itau"));
    }

    #[tokio::test]
    async fn test_fallback_returns_last_error() {
        let manager = manager();
        mark(&manager, "inter", true);
        mark(&manager, "itau", true);

        let err = manager
            .execute_with_fallback(&ProviderSelection::any(), |provider| async move {
                Err::<(), _>(ProviderError::new(ErrorCode::TransferFailed, provider.code()).with_status(422))
            })
            .await
            .unwrap_err();

        assert_eq!(err.message, "itau");
        // Non-retryable rejections leave health untouched
        assert!(manager.is_healthy("inter"));
    }

    #[tokio::test]
    async fn test_check_all_records_uninitialized_as_unhealthy() {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(Arc::new(BradescoProvider::new()));
        let manager = ProviderManager::new(registry);

        let snapshot = manager.check_all(&CallContext::new()).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, HealthStatus::Unhealthy);
        assert!(snapshot[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("NOT_INITIALIZED"));
    }

    #[tokio::test]
    async fn test_check_health_unregistered() {
        let manager = manager();
        let err = manager
            .check_health(&CallContext::new(), "santander")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProviderUnavailable);
    }
}
