//! Event type definitions for the engine event stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::job::JobStatus;

/// Events emitted over a job's lifecycle.
///
/// Publishing is best-effort observability; no engine decision ever depends
/// on an event being delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuditEvent {
    /// A new job was created for a URL
    JobSubmitted {
        url: String,
        job_id: uuid::Uuid,
        analyzers: usize,
        timestamp: DateTime<Utc>,
    },
    /// A submission was answered from the dedup cache without a new job
    CacheHit {
        url: String,
        timestamp: DateTime<Utc>,
    },
    /// A submission joined an already-running job for the same URL
    JobJoined {
        url: String,
        job_id: uuid::Uuid,
        timestamp: DateTime<Utc>,
    },
    /// One analyzer task was dispatched
    TaskStarted {
        url: String,
        analyzer: String,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    /// One analyzer task produced its result
    TaskSucceeded {
        url: String,
        analyzer: String,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    /// A failed task was re-queued with a backoff delay
    TaskRetrying {
        url: String,
        analyzer: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A task exhausted its attempts and was abandoned
    TaskAbandoned {
        url: String,
        analyzer: String,
        attempts: u32,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// The job reached a terminal state
    JobCompleted {
        url: String,
        job_id: uuid::Uuid,
        status: JobStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// Saving the finished report to the persistence collaborator failed
    PersistenceFailed {
        url: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl AuditEvent {
    #[must_use]
    pub fn job_submitted(url: String, job_id: uuid::Uuid, analyzers: usize) -> Self {
        Self::JobSubmitted {
            url,
            job_id,
            analyzers,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn cache_hit(url: String) -> Self {
        Self::CacheHit {
            url,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn job_joined(url: String, job_id: uuid::Uuid) -> Self {
        Self::JobJoined {
            url,
            job_id,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn task_started(url: String, analyzer: String, attempt: u32) -> Self {
        Self::TaskStarted {
            url,
            analyzer,
            attempt,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn task_succeeded(url: String, analyzer: String, attempt: u32) -> Self {
        Self::TaskSucceeded {
            url,
            analyzer,
            attempt,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn task_retrying(
        url: String,
        analyzer: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    ) -> Self {
        Self::TaskRetrying {
            url,
            analyzer,
            attempt,
            delay_ms,
            error,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn task_abandoned(url: String, analyzer: String, attempts: u32, error: String) -> Self {
        Self::TaskAbandoned {
            url,
            analyzer,
            attempts,
            error,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn job_completed(
        url: String,
        job_id: uuid::Uuid,
        status: JobStatus,
        duration_ms: u64,
    ) -> Self {
        Self::JobCompleted {
            url,
            job_id,
            status,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn persistence_failed(url: String, error: String) -> Self {
        Self::PersistenceFailed {
            url,
            error,
            timestamp: Utc::now(),
        }
    }

    /// The URL the event concerns.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::JobSubmitted { url, .. }
            | Self::CacheHit { url, .. }
            | Self::JobJoined { url, .. }
            | Self::TaskStarted { url, .. }
            | Self::TaskSucceeded { url, .. }
            | Self::TaskRetrying { url, .. }
            | Self::TaskAbandoned { url, .. }
            | Self::JobCompleted { url, .. }
            | Self::PersistenceFailed { url, .. } => url,
        }
    }
}
