//! Fluent builder for [`EngineConfig`] with validation at build time.

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::types::EngineConfig;
use crate::engine::retry::RetryPolicy;
use crate::events::EventBus;

/// Builder returned by [`EngineConfig::builder`].
///
/// Every field has a sensible default; `build()` rejects degenerate values
/// instead of letting them reach the engine.
#[derive(Default)]
pub struct EngineConfigBuilder {
    freshness_ttl: Option<Duration>,
    default_timeout: Option<Duration>,
    analyzer_timeouts: HashMap<String, Duration>,
    retry: RetryPolicy,
    cache_purge_interval: Option<Duration>,
    event_bus: Option<Arc<EventBus>>,
}

impl EngineConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

impl EngineConfigBuilder {
    /// How long completed reports stay fresh in the dedup cache.
    #[must_use]
    pub fn freshness_ttl(mut self, ttl: Duration) -> Self {
        self.freshness_ttl = Some(ttl);
        self
    }

    /// Default time budget for analyzer calls.
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Override the time budget for one analyzer.
    #[must_use]
    pub fn analyzer_timeout(mut self, analyzer: impl Into<String>, timeout: Duration) -> Self {
        self.analyzer_timeouts.insert(analyzer.into(), timeout);
        self
    }

    /// Replace the whole retry policy.
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Maximum attempts per analyzer task, including the first.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.retry.max_attempts = attempts;
        self
    }

    /// Delay before the first retry.
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.retry.base_delay = delay;
        self
    }

    /// Exponential growth factor between retries.
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.retry.multiplier = multiplier;
        self
    }

    /// Random jitter range as a fraction of the delay (0.0-1.0).
    #[must_use]
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.retry.jitter_factor = factor;
        self
    }

    /// Sweep interval for expired dedup-cache entries.
    #[must_use]
    pub fn cache_purge_interval(mut self, interval: Duration) -> Self {
        self.cache_purge_interval = Some(interval);
        self
    }

    /// Attach an event bus for lifecycle events.
    #[must_use]
    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Fails on zero durations, a zero attempt limit, a shrinking backoff
    /// multiplier, or a jitter factor outside [0, 1).
    pub fn build(self) -> Result<EngineConfig> {
        let defaults = EngineConfig::default();
        let freshness_ttl = self.freshness_ttl.unwrap_or(defaults.freshness_ttl);
        let default_timeout = self.default_timeout.unwrap_or(defaults.default_timeout);
        let cache_purge_interval = self
            .cache_purge_interval
            .unwrap_or(defaults.cache_purge_interval);

        if freshness_ttl.is_zero() {
            bail!("freshness TTL must be greater than zero");
        }
        if default_timeout.is_zero() {
            bail!("default analyzer timeout must be greater than zero");
        }
        if let Some((name, _)) = self.analyzer_timeouts.iter().find(|(_, t)| t.is_zero()) {
            bail!("analyzer timeout for '{name}' must be greater than zero");
        }
        if cache_purge_interval.is_zero() {
            bail!("cache purge interval must be greater than zero");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry max_attempts must be at least 1");
        }
        if self.retry.multiplier < 1.0 {
            bail!("backoff multiplier must be at least 1.0");
        }
        if !(0.0..1.0).contains(&self.retry.jitter_factor) {
            bail!("jitter factor must be in [0, 1)");
        }

        Ok(EngineConfig {
            freshness_ttl,
            default_timeout,
            analyzer_timeouts: self.analyzer_timeouts,
            retry: self.retry,
            cache_purge_interval,
            event_bus: self.event_bus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build() {
        let config = EngineConfig::builder()
            .build()
            .expect("default configuration must validate");
        assert_eq!(config.retry().max_attempts, 3);
    }

    #[test]
    fn test_fluent_overrides() {
        let config = EngineConfig::builder()
            .freshness_ttl(Duration::from_secs(300))
            .analyzer_timeout("rendering", Duration::from_secs(90))
            .max_attempts(5)
            .build()
            .expect("valid overrides must build");

        assert_eq!(config.freshness_ttl(), Duration::from_secs(300));
        assert_eq!(config.timeout_for("rendering"), Duration::from_secs(90));
        assert_eq!(config.retry().max_attempts, 5);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        assert!(
            EngineConfig::builder()
                .freshness_ttl(Duration::ZERO)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(EngineConfig::builder().max_attempts(0).build().is_err());
    }

    #[test]
    fn test_bad_jitter_rejected() {
        assert!(EngineConfig::builder().jitter_factor(1.5).build().is_err());
        assert!(EngineConfig::builder().jitter_factor(-0.1).build().is_err());
    }

    #[test]
    fn test_shrinking_multiplier_rejected() {
        assert!(
            EngineConfig::builder()
                .backoff_multiplier(0.5)
                .build()
                .is_err()
        );
    }
}
