//! Job and task state model.
//!
//! A job is one end-to-end analysis request for a single normalized URL; a
//! task is one analyzer's unit of work within it. The task set is fixed at
//! job creation (one task per registered analyzer) and never grows. All
//! mutation happens on the owning coordinator's single update path, so the
//! types here are plain data with transition helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use super::aggregator::CompositeReport;
use crate::urlnorm::NormalizedUrl;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Created, tasks not yet dispatched
    Pending,
    /// Tasks dispatched, results still arriving
    Running,
    /// Terminal: at least one analyzer succeeded and at least one was abandoned
    PartiallyComplete,
    /// Terminal: every analyzer succeeded
    Complete,
    /// Terminal: every analyzer was abandoned
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete | Self::PartiallyComplete | Self::Failed
        )
    }
}

/// Lifecycle state of one analyzer task.
///
/// Legal transitions: Queued -> Running -> Succeeded | Failed, and
/// Failed -> Queued on retry (up to the attempt limit) or -> Abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Abandoned,
}

impl TaskState {
    /// Terminal task states never change again; late result deliveries for
    /// them are dropped by the aggregator.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Abandoned)
    }
}

/// Mutable per-task bookkeeping, owned by the job's coordinator.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub analyzer: String,
    pub state: TaskState,
    /// Dispatches so far, including the one currently in flight
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    fn new(analyzer: String) -> Self {
        Self {
            analyzer,
            state: TaskState::Queued,
            attempts: 0,
            last_error: None,
            next_retry_at: None,
        }
    }
}

/// One crawl-and-analysis job, exclusively owned by its driver for its
/// lifetime. Identity is the normalized URL plus the submission instant.
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub url: NormalizedUrl,
    pub status: JobStatus,
    pub tasks: BTreeMap<String, TaskRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a job with one queued task per analyzer name.
    #[must_use]
    pub fn new(url: NormalizedUrl, analyzer_names: &[String]) -> Self {
        let now = Utc::now();
        let tasks = analyzer_names
            .iter()
            .map(|name| (name.clone(), TaskRecord::new(name.clone())))
            .collect();
        Self {
            id: Uuid::new_v4(),
            url,
            status: JobStatus::Pending,
            tasks,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn task_mut(&mut self, analyzer: &str) -> Option<&mut TaskRecord> {
        self.updated_at = Utc::now();
        self.tasks.get_mut(analyzer)
    }

    /// Evaluate the terminal state, if any, from the current task states.
    ///
    /// Complete iff every task succeeded; Failed iff every task was
    /// abandoned; PartiallyComplete for any other all-terminal mix. `None`
    /// while at least one task is still live.
    #[must_use]
    pub fn evaluate_terminal(&self) -> Option<JobStatus> {
        if !self.tasks.values().all(|t| t.state.is_terminal()) {
            return None;
        }
        let succeeded = self
            .tasks
            .values()
            .filter(|t| t.state == TaskState::Succeeded)
            .count();
        Some(if succeeded == self.tasks.len() {
            JobStatus::Complete
        } else if succeeded == 0 {
            JobStatus::Failed
        } else {
            JobStatus::PartiallyComplete
        })
    }

    /// Snapshot for non-blocking status reads.
    #[must_use]
    pub fn snapshot(&self, report: Option<Arc<CompositeReport>>) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            url: self.url.key().to_string(),
            status: self.status,
            tasks: self
                .tasks
                .iter()
                .map(|(name, task)| {
                    (
                        name.clone(),
                        TaskSnapshot {
                            state: task.state,
                            attempts: task.attempts,
                            last_error: task.last_error.clone(),
                        },
                    )
                })
                .collect(),
            report,
            updated_at: self.updated_at,
        }
    }
}

/// Point-in-time view of one task, carried in [`JobSnapshot`].
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub state: TaskState,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Point-in-time view of a job. Reading one never blocks on outstanding
/// tasks; the `report` field is populated once the job is terminal.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub url: String,
    pub status: JobStatus,
    pub tasks: BTreeMap<String, TaskSnapshot>,
    pub report: Option<Arc<CompositeReport>>,
    pub updated_at: DateTime<Utc>,
}
