//! Engine configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::retry::RetryPolicy;
use crate::events::EventBus;

/// Default freshness window for completed reports: one hour.
pub const DEFAULT_FRESHNESS_TTL: Duration = Duration::from_secs(3600);

/// Default per-analyzer time budget.
pub const DEFAULT_ANALYZER_TIMEOUT: Duration = Duration::from_secs(30);

/// Default sweep interval for expired cache entries.
pub const DEFAULT_CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the analysis engine.
///
/// Built once at startup via [`EngineConfig::builder`]; the engine reads it,
/// never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a completed report is served from the dedup cache without
    /// re-analysis
    pub(crate) freshness_ttl: Duration,

    /// Time budget for an analyzer call without a per-analyzer override
    pub(crate) default_timeout: Duration,

    /// Per-analyzer timeout overrides; slower checks (full rendering) get
    /// longer budgets than header inspection
    pub(crate) analyzer_timeouts: HashMap<String, Duration>,

    /// Backoff policy for failed analyzer tasks
    pub(crate) retry: RetryPolicy,

    /// Interval for the dedup cache's expired-entry sweep
    pub(crate) cache_purge_interval: Duration,

    /// Optional bus for lifecycle events
    #[serde(skip)]
    pub(crate) event_bus: Option<Arc<EventBus>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            freshness_ttl: DEFAULT_FRESHNESS_TTL,
            default_timeout: DEFAULT_ANALYZER_TIMEOUT,
            analyzer_timeouts: HashMap::new(),
            retry: RetryPolicy::default(),
            cache_purge_interval: DEFAULT_CACHE_PURGE_INTERVAL,
            event_bus: None,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn freshness_ttl(&self) -> Duration {
        self.freshness_ttl
    }

    /// The time budget for the named analyzer.
    #[must_use]
    pub fn timeout_for(&self, analyzer: &str) -> Duration {
        self.analyzer_timeouts
            .get(analyzer)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    #[must_use]
    pub fn cache_purge_interval(&self) -> Duration {
        self.cache_purge_interval
    }

    /// Attach an event bus for lifecycle events.
    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    #[must_use]
    pub fn event_bus(&self) -> Option<&Arc<EventBus>> {
        self.event_bus.as_ref()
    }
}
