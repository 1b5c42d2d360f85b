//! Engine Configuration
//!
//! Freshness window, per-analyzer time budgets, retry parameters, and the
//! optional event bus, assembled once at startup through a validating
//! builder.

pub mod builder;
pub mod types;

pub use builder::EngineConfigBuilder;
pub use types::{
    DEFAULT_ANALYZER_TIMEOUT, DEFAULT_CACHE_PURGE_INTERVAL, DEFAULT_FRESHNESS_TTL, EngineConfig,
};
