pub mod analyzer;
pub mod cache;
pub mod config;
pub mod engine;
pub mod events;
pub mod store;
pub mod urlnorm;

pub use analyzer::{
    Analyzer, AnalyzerError, AnalyzerPayload, AnalyzerRegistry, HeaderCheck, Metric, MetricRating,
    SecurityHeaders, SeoAudit, ViewportAudit, WebVitals,
};
pub use cache::{CacheError, CacheLookup, DedupCache, MemoryDedupCache};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::{
    CompositeReport, JobCoordinator, JobHandle, JobSnapshot, JobStatus, ReportSlot, RetryDecision,
    RetryPolicy, SubmitError, TaskState,
};
pub use events::{AuditEvent, EventBus};
pub use store::{MemoryReportStore, ReportStore, StoreError};
pub use urlnorm::{NormalizedUrl, UrlError};
