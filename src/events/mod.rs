//! Engine Event Stream
//!
//! Best-effort lifecycle events for jobs and tasks, published to an optional
//! broadcast bus that external layers (an HTTP status endpoint, a progress
//! UI) can subscribe to.

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventMetrics, MetricsSnapshot};
pub use types::AuditEvent;
