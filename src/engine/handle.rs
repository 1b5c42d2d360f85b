//! Caller-facing handle to a submitted job.
//!
//! A handle is cheap to clone; every submission for the same in-flight URL
//! receives a handle joined to the same job, and all of them observe the
//! same terminal report. Status reads never block on outstanding tasks.

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::aggregator::CompositeReport;
use super::job::{JobSnapshot, JobStatus, TaskSnapshot, TaskState};
use crate::urlnorm::NormalizedUrl;

/// Control messages a handle can send to its job driver.
#[derive(Debug, Clone, Copy)]
pub(crate) enum JobControl {
    Cancel,
}

/// Handle to one job (or to a cache-served report).
///
/// Obtained from `JobCoordinator::submit`; joined submissions share the
/// underlying job state.
#[derive(Debug, Clone)]
pub struct JobHandle {
    job_id: Uuid,
    url: NormalizedUrl,
    snapshot_rx: watch::Receiver<JobSnapshot>,
    control_tx: mpsc::UnboundedSender<JobControl>,
}

impl JobHandle {
    pub(crate) fn new(
        job_id: Uuid,
        url: NormalizedUrl,
        snapshot_rx: watch::Receiver<JobSnapshot>,
        control_tx: mpsc::UnboundedSender<JobControl>,
    ) -> Self {
        Self {
            job_id,
            url,
            snapshot_rx,
            control_tx,
        }
    }

    /// Build an already-terminal handle around a cached fresh report.
    ///
    /// No job exists behind such a handle; its id is synthetic and `cancel`
    /// is a no-op.
    pub(crate) fn from_cached(url: NormalizedUrl, report: Arc<CompositeReport>) -> Self {
        let tasks: BTreeMap<String, TaskSnapshot> = report
            .slots
            .iter()
            .map(|(name, slot)| {
                (
                    name.clone(),
                    TaskSnapshot {
                        state: if slot.is_available() {
                            TaskState::Succeeded
                        } else {
                            TaskState::Abandoned
                        },
                        attempts: 0,
                        last_error: None,
                    },
                )
            })
            .collect();
        let snapshot = JobSnapshot {
            job_id: Uuid::new_v4(),
            url: url.key().to_string(),
            status: report.status,
            tasks,
            report: Some(report),
            updated_at: chrono::Utc::now(),
        };
        let job_id = snapshot.job_id;
        // A watch receiver keeps serving the last value after the sender is
        // dropped, so no driver side is needed for an already-terminal handle.
        let (_, rx) = watch::channel(snapshot);
        let (control_tx, _) = mpsc::unbounded_channel();
        Self {
            job_id,
            url,
            snapshot_rx: rx,
            control_tx,
        }
    }

    /// The job's identifier. Synthetic for cache-served handles.
    #[must_use]
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// The normalized URL this job analyzes.
    #[must_use]
    pub fn url(&self) -> &NormalizedUrl {
        &self.url
    }

    /// Non-blocking snapshot of current job state.
    #[must_use]
    pub fn status(&self) -> JobSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// True once the job has reached Complete, PartiallyComplete or Failed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.snapshot_rx.borrow().status.is_terminal()
    }

    /// Wait for the terminal composite report.
    ///
    /// Every joined caller resolves to the same `Arc`'d report. Returns an
    /// error only if the job driver disappeared without producing a report,
    /// which indicates a bug rather than an analysis failure: analyzer
    /// failures surface inside the report, never here.
    pub async fn wait(&self) -> Result<Arc<CompositeReport>> {
        let mut rx = self.snapshot_rx.clone();
        loop {
            if let Some(report) = rx.borrow().report.clone() {
                return Ok(report);
            }
            if rx.changed().await.is_err() {
                // Sender dropped; the last value may already be terminal.
                return rx
                    .borrow()
                    .report
                    .clone()
                    .ok_or_else(|| anyhow!("job driver exited without a report"));
            }
        }
    }

    /// Request cancellation of the job.
    ///
    /// All still-queued or running tasks are abandoned and the job settles
    /// into a terminal state immediately; analyzer calls already in flight
    /// are left to time out on their own. No-op for terminal jobs and
    /// cache-served handles.
    pub fn cancel(&self) {
        let _ = self.control_tx.send(JobControl::Cancel);
    }

    /// Current status without the full snapshot.
    #[must_use]
    pub fn job_status(&self) -> JobStatus {
        self.snapshot_rx.borrow().status
    }
}
