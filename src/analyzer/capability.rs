//! The analyzer capability contract.
//!
//! An analyzer is a pluggable capability that produces one named partial
//! result for a URL (load-speed metrics, SEO fields, ...). Implementations
//! are the only place network I/O happens; the engine treats them as opaque
//! async calls bounded by a per-analyzer timeout.

use async_trait::async_trait;

use super::payload::AnalyzerPayload;
use crate::urlnorm::NormalizedUrl;

/// Stable names of the built-in analyzer capabilities.
pub const LOAD_SPEED: &str = "load-speed";
pub const SEO: &str = "seo";
pub const ACCESSIBILITY: &str = "accessibility";
pub const SECURITY_HEADERS: &str = "security-headers";
pub const MOBILE_RESPONSIVENESS: &str = "mobile-responsiveness";
pub const RENDERING: &str = "rendering";

/// Error produced by a single analyzer invocation.
///
/// `Timeout` is synthesized by the engine when the call exceeds its budget;
/// implementations report their own failures as `Failed`. Both are retried
/// by the coordinator and only reach the final report as an "unavailable"
/// slot once retries are exhausted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalyzerError {
    /// Analyzer call exceeded its configured time budget
    #[error("analyzer timed out")]
    Timeout,

    /// Analyzer reported a failure
    #[error("analyzer failed: {0}")]
    Failed(String),
}

impl AnalyzerError {
    /// Short form for report slots and log lines.
    #[must_use]
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

/// A single analysis capability, registered under a stable name.
///
/// Contract: one invocation produces one immutable partial result or one
/// error. Failure of one analyzer never aborts the others; the engine
/// isolates every call in its own task.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Stable registry name, e.g. `"seo"`.
    fn name(&self) -> &str;

    /// Analyze the URL and produce this capability's partial result.
    ///
    /// Implementations should honor cancellation by being droppable at any
    /// await point; the engine enforces the time budget externally.
    async fn analyze(&self, url: &NormalizedUrl) -> Result<AnalyzerPayload, AnalyzerError>;
}
