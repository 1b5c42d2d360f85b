//! Analyzer Module
//!
//! The capability contract, the typed partial results each capability
//! produces, and the fixed registry the coordinator iterates when fanning
//! out a job's tasks.

pub mod capability;
pub mod payload;
pub mod registry;

pub use capability::{
    ACCESSIBILITY, Analyzer, AnalyzerError, LOAD_SPEED, MOBILE_RESPONSIVENESS, RENDERING,
    SECURITY_HEADERS, SEO,
};
pub use payload::{
    AccessibilityAudit, AccessibilityIssue, AnalyzerPayload, HeaderCheck, Metric, MetricRating,
    RenderAudit, SecurityHeaders, SeoAudit, VIEWPORT_SIZES, ViewportAudit, ViewportCheck,
    WebVitals,
};
pub use registry::AnalyzerRegistry;
