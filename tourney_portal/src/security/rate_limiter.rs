//! In-memory rate limiting with exponential backoff for login endpoints.

use super::errors::{RateLimitError, RateLimiterResult};
use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Endpoint name for admin password logins
pub const ADMIN_LOGIN: &str = "admin_login";

/// Endpoint name for participant login links
pub const PORTAL_LOGIN: &str = "portal_login";

/// Largest backoff exponent: lockouts grow to at most 32x the base
const MAX_BACKOFF_EXPONENT: u32 = 5;

/// Rate limit configuration for an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum failures allowed in window
    pub max_attempts: u32,

    /// Time window in seconds
    pub window_secs: u64,

    /// Lockout duration in seconds after exceeding limit
    pub lockout_secs: u64,

    /// Whether to double the lockout for each consecutive violation
    pub exponential_backoff: bool,
}

impl RateLimitConfig {
    /// Configuration for admin email/password login
    ///
    /// `RATE_LIMIT_ADMIN_LOGIN_{ATTEMPTS,WINDOW_SECS,LOCKOUT_SECS}`,
    /// defaults 5 / 300 / 900.
    pub fn admin_login() -> Self {
        Self {
            max_attempts: env_or("RATE_LIMIT_ADMIN_LOGIN_ATTEMPTS", 5),
            window_secs: env_or("RATE_LIMIT_ADMIN_LOGIN_WINDOW_SECS", 300),
            lockout_secs: env_or("RATE_LIMIT_ADMIN_LOGIN_LOCKOUT_SECS", 900),
            exponential_backoff: true,
        }
    }

    /// Configuration for participant login links
    ///
    /// Identifiers are unguessable, so this mostly stops enumeration.
    /// `RATE_LIMIT_PORTAL_LOGIN_{ATTEMPTS,WINDOW_SECS,LOCKOUT_SECS}`,
    /// defaults 10 / 300 / 300.
    pub fn portal_login() -> Self {
        Self {
            max_attempts: env_or("RATE_LIMIT_PORTAL_LOGIN_ATTEMPTS", 10),
            window_secs: env_or("RATE_LIMIT_PORTAL_LOGIN_WINDOW_SECS", 300),
            lockout_secs: env_or("RATE_LIMIT_PORTAL_LOGIN_LOCKOUT_SECS", 300),
            exponential_backoff: true,
        }
    }

    /// Lockout after `violations` earlier lockouts
    fn lockout_for(&self, violations: u32) -> Duration {
        let multiplier = if self.exponential_backoff {
            2u64.pow(violations.min(MAX_BACKOFF_EXPONENT))
        } else {
            1
        };
        Duration::seconds((self.lockout_secs * multiplier) as i64)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Failure record for one `endpoint:key`
#[derive(Debug, Clone)]
struct FailureRecord {
    failures: u32,
    window_start: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
    consecutive_violations: u32,
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Action is allowed
    Allowed { remaining: u32 },

    /// Action is blocked until `until`
    Locked { until: DateTime<Utc> },
}

impl RateLimitResult {
    /// Check if action is allowed
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Get remaining attempts (if allowed)
    pub fn remaining(&self) -> Option<u32> {
        match self {
            RateLimitResult::Allowed { remaining } => Some(*remaining),
            _ => None,
        }
    }

    /// Seconds until the lock lifts (if locked), rounded up
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<u64> {
        match self {
            RateLimitResult::Locked { until } => {
                let millis = (*until - now).num_milliseconds().max(0) as u64;
                Some(millis.div_ceil(1000))
            }
            _ => None,
        }
    }
}

/// Failure-counting rate limiter keyed by `endpoint:key` (usually the client IP)
///
/// Only failures count; a successful login should call [`RateLimiter::reset`].
#[derive(Clone)]
pub struct RateLimiter {
    records: Arc<RwLock<HashMap<String, FailureRecord>>>,
    configs: Arc<HashMap<String, RateLimitConfig>>,
}

impl RateLimiter {
    /// Create a rate limiter with the login presets
    pub fn new() -> Self {
        Self::with_configs([
            (ADMIN_LOGIN.to_string(), RateLimitConfig::admin_login()),
            (PORTAL_LOGIN.to_string(), RateLimitConfig::portal_login()),
        ])
    }

    pub fn with_configs(configs: impl IntoIterator<Item = (String, RateLimitConfig)>) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            configs: Arc::new(configs.into_iter().collect()),
        }
    }

    /// Whether `key` may attempt `endpoint` now
    pub async fn check(&self, endpoint: &str, key: &str) -> RateLimiterResult<RateLimitResult> {
        self.check_at(endpoint, key, Utc::now()).await
    }

    pub(crate) async fn check_at(
        &self,
        endpoint: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> RateLimiterResult<RateLimitResult> {
        let config = self.config(endpoint)?;
        let records = self.records.read().await;

        let Some(record) = records.get(&record_key(endpoint, key)) else {
            return Ok(RateLimitResult::Allowed {
                remaining: config.max_attempts,
            });
        };

        if let Some(until) = record.locked_until
            && now < until
        {
            return Ok(RateLimitResult::Locked { until });
        }

        let window = Duration::seconds(config.window_secs as i64);
        let failures = if now - record.window_start > window {
            0
        } else {
            record.failures
        };

        Ok(RateLimitResult::Allowed {
            remaining: config.max_attempts.saturating_sub(failures),
        })
    }

    /// Count a failed attempt, locking the key once the limit is reached
    ///
    /// Returns the state after recording.
    pub async fn record_failure(
        &self,
        endpoint: &str,
        key: &str,
    ) -> RateLimiterResult<RateLimitResult> {
        self.record_failure_at(endpoint, key, Utc::now()).await
    }

    pub(crate) async fn record_failure_at(
        &self,
        endpoint: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> RateLimiterResult<RateLimitResult> {
        let config = self.config(endpoint)?;
        let window = Duration::seconds(config.window_secs as i64);
        let mut records = self.records.write().await;

        let record = records
            .entry(record_key(endpoint, key))
            .or_insert_with(|| FailureRecord {
                failures: 0,
                window_start: now,
                locked_until: None,
                consecutive_violations: 0,
            });

        if let Some(until) = record.locked_until {
            if now < until {
                return Ok(RateLimitResult::Locked { until });
            }
            record.locked_until = None;
        }

        if now - record.window_start > window {
            record.failures = 0;
            record.window_start = now;
        }

        record.failures += 1;
        if record.failures >= config.max_attempts {
            let until = now + config.lockout_for(record.consecutive_violations);
            record.locked_until = Some(until);
            record.consecutive_violations += 1;
            record.failures = 0;
            record.window_start = now;
            return Ok(RateLimitResult::Locked { until });
        }

        Ok(RateLimitResult::Allowed {
            remaining: config.max_attempts - record.failures,
        })
    }

    /// Forget all failures for `key`, e.g. after a successful login
    pub async fn reset(&self, endpoint: &str, key: &str) {
        self.records
            .write()
            .await
            .remove(&record_key(endpoint, key));
    }

    /// Drop records that are neither locked nor inside their window
    pub async fn prune(&self) -> usize {
        self.prune_at(Utc::now()).await
    }

    pub(crate) async fn prune_at(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|key, record| {
            let window_secs = key
                .split_once(':')
                .and_then(|(endpoint, _)| self.configs.get(endpoint))
                .map_or(0, |config| config.window_secs);
            let locked = record.locked_until.is_some_and(|until| now < until);
            let in_window = now - record.window_start <= Duration::seconds(window_secs as i64);
            locked || in_window
        });
        before - records.len()
    }

    fn config(&self, endpoint: &str) -> RateLimiterResult<&RateLimitConfig> {
        self.configs
            .get(endpoint)
            .ok_or_else(|| RateLimitError::InvalidEndpoint(endpoint.to_string()))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn record_key(endpoint: &str, key: &str) -> String {
    format!("{}:{}", endpoint, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "test_endpoint";

    fn create_test_limiter(exponential_backoff: bool) -> RateLimiter {
        RateLimiter::with_configs([(
            ENDPOINT.to_string(),
            RateLimitConfig {
                max_attempts: 3,
                window_secs: 60,
                lockout_secs: 300,
                exponential_backoff,
            },
        )])
    }

    #[tokio::test]
    async fn test_failures_count_down_then_lock() {
        let limiter = create_test_limiter(false);
        let now = Utc::now();

        assert_eq!(
            limiter.check_at(ENDPOINT, "1.2.3.4", now).await.unwrap(),
            RateLimitResult::Allowed { remaining: 3 }
        );
        for expected in [2, 1] {
            let result = limiter
                .record_failure_at(ENDPOINT, "1.2.3.4", now)
                .await
                .unwrap();
            assert_eq!(result.remaining(), Some(expected));
        }

        let locked = limiter
            .record_failure_at(ENDPOINT, "1.2.3.4", now)
            .await
            .unwrap();
        assert_eq!(
            locked,
            RateLimitResult::Locked {
                until: now + Duration::seconds(300)
            }
        );
        assert_eq!(locked.retry_after(now), Some(300));

        let later = now + Duration::seconds(299);
        assert!(!limiter.check_at(ENDPOINT, "1.2.3.4", later).await.unwrap().is_allowed());

        let after = now + Duration::seconds(301);
        assert!(limiter.check_at(ENDPOINT, "1.2.3.4", after).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_exponential_backoff_is_capped() {
        let limiter = create_test_limiter(true);
        let mut now = Utc::now();
        let mut lockouts = Vec::new();

        for _ in 0..8 {
            let mut result = RateLimitResult::Allowed { remaining: 0 };
            for _ in 0..3 {
                result = limiter
                    .record_failure_at(ENDPOINT, "ip", now)
                    .await
                    .unwrap();
            }
            let RateLimitResult::Locked { until } = result else {
                panic!("expected lock, got {result:?}");
            };
            lockouts.push((until - now).num_seconds());
            now = until + Duration::seconds(1);
        }

        assert_eq!(
            lockouts,
            vec![300, 600, 1200, 2400, 4800, 9600, 9600, 9600]
        );
    }

    #[tokio::test]
    async fn test_window_expiry_forgets_failures() {
        let limiter = create_test_limiter(false);
        let now = Utc::now();

        limiter.record_failure_at(ENDPOINT, "ip", now).await.unwrap();
        limiter.record_failure_at(ENDPOINT, "ip", now).await.unwrap();

        let later = now + Duration::seconds(61);
        assert_eq!(
            limiter.check_at(ENDPOINT, "ip", later).await.unwrap(),
            RateLimitResult::Allowed { remaining: 3 }
        );
        let result = limiter.record_failure_at(ENDPOINT, "ip", later).await.unwrap();
        assert_eq!(result.remaining(), Some(2));
    }

    #[tokio::test]
    async fn test_reset_and_independent_keys() {
        let limiter = create_test_limiter(false);
        let now = Utc::now();

        for _ in 0..3 {
            limiter.record_failure_at(ENDPOINT, "a", now).await.unwrap();
        }
        assert!(!limiter.check_at(ENDPOINT, "a", now).await.unwrap().is_allowed());
        assert!(limiter.check_at(ENDPOINT, "b", now).await.unwrap().is_allowed());

        limiter.reset(ENDPOINT, "a").await;
        assert!(limiter.check_at(ENDPOINT, "a", now).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_prune_keeps_locked_and_recent() {
        let limiter = create_test_limiter(false);
        let now = Utc::now();

        limiter.record_failure_at(ENDPOINT, "recent", now).await.unwrap();
        for _ in 0..3 {
            limiter.record_failure_at(ENDPOINT, "locked", now).await.unwrap();
        }
        let old = now - Duration::seconds(120);
        limiter.record_failure_at(ENDPOINT, "stale", old).await.unwrap();

        assert_eq!(limiter.prune_at(now).await, 1);
        assert_eq!(limiter.prune_at(now).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let limiter = create_test_limiter(false);
        assert!(matches!(
            limiter.check("nope", "ip").await,
            Err(RateLimitError::InvalidEndpoint(_))
        ));
    }
}
