//! Job coordination: fan-out, fan-in, retries, dedup, write-back.
//!
//! The coordinator owns the lifecycle of every job. A submission is
//! normalized, checked against the dedup cache (fresh report short-circuits,
//! in-flight job is joined), and otherwise becomes a new job with one task
//! per registered analyzer, all dispatched concurrently.
//!
//! Each job runs a driver task that exclusively owns the job's state and the
//! report under construction. Task completions stream back into the driver
//! over a `FuturesUnordered`, so simultaneous completions are serialized onto
//! one update path per job and never race on the composite report. Failed
//! tasks are re-queued per the retry policy; exhausted tasks are abandoned.
//! There are no cross-job or cross-task dependencies, which is what rules
//! out deadlock here.

use futures::stream::FuturesUnordered;
use futures::{Future, StreamExt};
use log::{debug, info, warn};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::aggregator::{Aggregator, ReportSlot};
use super::handle::{JobControl, JobHandle};
use super::job::{Job, JobSnapshot, JobStatus, TaskState};
use crate::analyzer::{Analyzer, AnalyzerError, AnalyzerRegistry};
use crate::cache::{CacheError, CacheLookup, DedupCache, MemoryDedupCache};
use crate::config::EngineConfig;
use crate::events::AuditEvent;
use crate::store::ReportStore;
use crate::urlnorm::{NormalizedUrl, UrlError};

/// Errors a submitter can observe.
///
/// Everything else (analyzer failures, cache races, persistence faults)
/// is recovered internally; a submission either returns a handle or this.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The input was not a valid http/https URL. No job and no cache entry
    /// were created.
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),
}

/// Outcome of one analyzer attempt, delivered back to the job driver.
struct TaskCompletion {
    analyzer: String,
    attempt: u32,
    outcome: Result<crate::analyzer::AnalyzerPayload, AnalyzerError>,
}

type AttemptFuture = Pin<Box<dyn Future<Output = TaskCompletion> + Send>>;

/// Entry point of the orchestration engine.
///
/// Cheap to clone; all clones share the same cache, store, and registry.
#[derive(Clone)]
pub struct JobCoordinator {
    registry: AnalyzerRegistry,
    cache: Arc<dyn DedupCache>,
    store: Arc<dyn ReportStore>,
    config: Arc<EngineConfig>,
}

impl JobCoordinator {
    #[must_use]
    pub fn new(
        registry: AnalyzerRegistry,
        cache: Arc<dyn DedupCache>,
        store: Arc<dyn ReportStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            store,
            config: Arc::new(config),
        }
    }

    /// Build a coordinator over the in-memory cache and store.
    ///
    /// Starts the cache's expired-entry sweep at the configured interval,
    /// so this must be called from within a tokio runtime. Embeddings with
    /// their own cache or store wire them up through [`JobCoordinator::new`].
    #[must_use]
    pub fn with_in_memory(registry: AnalyzerRegistry, config: EngineConfig) -> Self {
        let cache = Arc::new(MemoryDedupCache::new());
        Arc::clone(&cache).spawn_purge_task(config.cache_purge_interval());
        Self::new(
            registry,
            cache,
            Arc::new(crate::store::MemoryReportStore::new()),
            config,
        )
    }

    #[must_use]
    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Submit a URL for analysis.
    ///
    /// Returns immediately with a handle. A fresh cached report
    /// short-circuits without creating a job; a submission racing an
    /// in-flight job for the same normalized URL joins it, so at most one
    /// job per URL is ever live. When the dedup cache itself is unavailable
    /// the submission degrades to an un-deduplicated job instead of failing.
    ///
    /// # Errors
    ///
    /// [`SubmitError::InvalidUrl`] for input that does not normalize to an
    /// absolute http/https URL.
    pub async fn submit(&self, raw_url: &str) -> Result<JobHandle, SubmitError> {
        let url = NormalizedUrl::parse(raw_url)?;
        let key = url.key().to_string();

        loop {
            match self.cache.lookup(&key).await {
                Ok(CacheLookup::Fresh(report)) => {
                    debug!("cache hit for {key}, serving stored report");
                    self.publish(AuditEvent::cache_hit(key.clone()));
                    return Ok(JobHandle::from_cached(url, report));
                }
                Ok(CacheLookup::InFlight(handle)) => {
                    debug!("joining in-flight job {} for {key}", handle.job_id());
                    self.publish(AuditEvent::job_joined(key.clone(), handle.job_id()));
                    return Ok(handle);
                }
                Ok(CacheLookup::Absent) => {
                    let (handle, driver) = self.prepare_job(url.clone(), true);
                    match self.cache.reserve(&key, handle.clone()).await {
                        Ok(()) => {
                            info!(
                                "starting job {} for {key} with {} analyzers",
                                handle.job_id(),
                                self.registry.len()
                            );
                            self.publish(AuditEvent::job_submitted(
                                key.clone(),
                                handle.job_id(),
                                self.registry.len(),
                            ));
                            tokio::spawn(driver.run());
                            return Ok(handle);
                        }
                        Err(CacheError::AlreadyReserved) => {
                            // Lost the race; the next lookup joins the winner.
                            debug!("reservation race lost for {key}, joining existing job");
                            continue;
                        }
                        Err(CacheError::Unavailable(e)) => {
                            warn!("dedup cache unavailable ({e}), running {key} un-deduplicated");
                            return Ok(self.start_undeduplicated(url, &key));
                        }
                    }
                }
                Err(CacheError::Unavailable(e)) => {
                    warn!("dedup cache unavailable ({e}), running {key} un-deduplicated");
                    return Ok(self.start_undeduplicated(url, &key));
                }
                Err(CacheError::AlreadyReserved) => {
                    // Not a lookup outcome; retry defensively.
                    continue;
                }
            }
        }
    }

    /// Non-blocking read of a job's current state.
    #[must_use]
    pub fn status(&self, handle: &JobHandle) -> JobSnapshot {
        handle.status()
    }

    /// Degraded path: the dedup cache is unusable, so run a fresh job
    /// without reservation or write-back rather than failing the submitter.
    fn start_undeduplicated(&self, url: NormalizedUrl, key: &str) -> JobHandle {
        let (handle, driver) = self.prepare_job(url, false);
        self.publish(AuditEvent::job_submitted(
            key.to_string(),
            handle.job_id(),
            self.registry.len(),
        ));
        tokio::spawn(driver.run());
        handle
    }

    fn prepare_job(&self, url: NormalizedUrl, write_back: bool) -> (JobHandle, JobDriver) {
        let names = self.registry.names();
        let job = Job::new(url.clone(), &names);
        let aggregator = Aggregator::new(url.clone(), &names);

        let (snapshot_tx, snapshot_rx) = watch::channel(job.snapshot(None));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let handle = JobHandle::new(job.id, url, snapshot_rx, control_tx);

        let driver = JobDriver {
            job,
            aggregator,
            registry: self.registry.clone(),
            cache: Arc::clone(&self.cache),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            snapshot_tx,
            control_rx,
            write_back,
            cancelled: false,
        };
        (handle, driver)
    }

    fn publish(&self, event: AuditEvent) {
        if let Some(bus) = self.config.event_bus() {
            bus.publish(event);
        }
    }
}

/// Exclusive owner of one job's state for its lifetime.
struct JobDriver {
    job: Job,
    aggregator: Aggregator,
    registry: AnalyzerRegistry,
    cache: Arc<dyn DedupCache>,
    store: Arc<dyn ReportStore>,
    config: Arc<EngineConfig>,
    snapshot_tx: watch::Sender<JobSnapshot>,
    control_rx: mpsc::UnboundedReceiver<JobControl>,
    write_back: bool,
    cancelled: bool,
}

impl JobDriver {
    async fn run(mut self) {
        let started = Instant::now();
        let mut active: FuturesUnordered<AttemptFuture> = FuturesUnordered::new();

        // Fan out: every task dispatched concurrently, first attempt each.
        for analyzer in self.registry.iter() {
            let name = analyzer.name().to_string();
            if let Some(task) = self.job.task_mut(&name) {
                task.attempts = 1;
                task.state = TaskState::Running;
            }
            active.push(self.attempt(Arc::clone(analyzer), 1, Duration::ZERO));
        }
        self.job.status = JobStatus::Running;
        self.push_snapshot();

        let terminal = loop {
            tokio::select! {
                Some(control) = self.control_rx.recv() => match control {
                    JobControl::Cancel => {
                        info!("job {} cancelled, abandoning live tasks", self.job.id);
                        self.cancelled = true;
                        break self.abandon_live_tasks("job cancelled");
                    }
                },
                Some(completion) = active.next() => {
                    if let Some(terminal) = self.handle_completion(completion, &mut active) {
                        break terminal;
                    }
                }
                else => {
                    // Control senders and attempt futures both exhausted; a
                    // live task would still have a future queued, so settle
                    // whatever state remains.
                    break self.abandon_live_tasks("driver starved of completions");
                }
            }
        };

        // Dropping `active` detaches in-flight analyzer calls; they run to
        // their own timeouts without anyone waiting on them.
        drop(active);
        self.finish(terminal, started).await;
    }

    /// Build the future for one dispatch of one analyzer.
    ///
    /// The analyzer call itself runs in its own spawned task so that it
    /// keeps executing (until its timeout) even if the driver exits early.
    fn attempt(&self, analyzer: Arc<dyn Analyzer>, attempt: u32, delay: Duration) -> AttemptFuture {
        let url = self.job.url.clone();
        let name = analyzer.name().to_string();
        let budget = self.config.timeout_for(&name);
        let bus = self.config.event_bus().cloned();

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(bus) = &bus {
                bus.publish(AuditEvent::task_started(
                    url.key().to_string(),
                    name.clone(),
                    attempt,
                ));
            }

            let worker = tokio::spawn(async move {
                match tokio::time::timeout(budget, analyzer.analyze(&url)).await {
                    Ok(result) => result,
                    Err(_) => Err(AnalyzerError::Timeout),
                }
            });
            let outcome = match worker.await {
                Ok(result) => result,
                Err(e) => Err(AnalyzerError::Failed(format!("analyzer task aborted: {e}"))),
            };

            TaskCompletion {
                analyzer: name,
                attempt,
                outcome,
            }
        })
    }

    /// Apply one completion to the job. Returns the terminal status once
    /// every task has settled.
    fn handle_completion(
        &mut self,
        completion: TaskCompletion,
        active: &mut FuturesUnordered<AttemptFuture>,
    ) -> Option<JobStatus> {
        let key = self.job.url.key().to_string();
        let Some(task) = self.job.tasks.get_mut(&completion.analyzer) else {
            debug!("completion for unknown analyzer {}", completion.analyzer);
            return None;
        };
        if task.state.is_terminal() {
            // Duplicate or late delivery for a settled task; merging is
            // idempotent but we don't even get that far.
            debug!(
                "ignoring late completion for settled task {}",
                completion.analyzer
            );
            return None;
        }

        match completion.outcome {
            Ok(payload) => {
                task.state = TaskState::Succeeded;
                task.next_retry_at = None;
                debug!(
                    "analyzer {} succeeded for {key} on attempt {}",
                    completion.analyzer, completion.attempt
                );
                self.aggregator
                    .merge(&completion.analyzer, ReportSlot::Available { payload });
                self.publish(AuditEvent::task_succeeded(
                    key,
                    completion.analyzer,
                    completion.attempt,
                ));
            }
            Err(error) => {
                let detail = error.detail();
                task.state = TaskState::Failed;
                task.last_error = Some(detail.clone());

                match self.config.retry().next_attempt(task.attempts) {
                    super::retry::RetryDecision::RetryAfter(delay) => {
                        task.state = TaskState::Queued;
                        task.attempts += 1;
                        let next_attempt = task.attempts;
                        task.next_retry_at =
                            Some(chrono::Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default());
                        info!(
                            "analyzer {} failed for {key} ({detail}), retry {next_attempt} in {delay:?}",
                            completion.analyzer
                        );
                        self.publish(AuditEvent::task_retrying(
                            key,
                            completion.analyzer.clone(),
                            next_attempt,
                            delay.as_millis() as u64,
                            detail,
                        ));
                        if let Some(analyzer) = self.registry.get(&completion.analyzer) {
                            active.push(self.attempt(Arc::clone(analyzer), next_attempt, delay));
                        }
                    }
                    super::retry::RetryDecision::GiveUp => {
                        task.state = TaskState::Abandoned;
                        let attempts = task.attempts;
                        warn!(
                            "analyzer {} abandoned for {key} after {attempts} attempts: {detail}",
                            completion.analyzer
                        );
                        self.aggregator.merge(
                            &completion.analyzer,
                            ReportSlot::Unavailable {
                                error: detail.clone(),
                            },
                        );
                        self.publish(AuditEvent::task_abandoned(
                            key,
                            completion.analyzer,
                            attempts,
                            detail,
                        ));
                    }
                }
            }
        }

        self.push_snapshot();
        self.job.evaluate_terminal()
    }

    /// Abandon every non-terminal task and settle the job.
    fn abandon_live_tasks(&mut self, reason: &str) -> JobStatus {
        for task in self.job.tasks.values_mut() {
            if !task.state.is_terminal() {
                let name = task.analyzer.clone();
                task.state = TaskState::Abandoned;
                task.last_error.get_or_insert_with(|| reason.to_string());
                self.aggregator.merge(
                    &name,
                    ReportSlot::Unavailable {
                        error: reason.to_string(),
                    },
                );
            }
        }
        self.job
            .evaluate_terminal()
            .unwrap_or(JobStatus::Failed)
    }

    /// Seal the report, write it through the cache, hand it to persistence,
    /// and notify every joined caller.
    async fn finish(mut self, terminal: JobStatus, started: Instant) {
        self.job.status = terminal;
        let key = self.job.url.key().to_string();
        let mut report = std::mem::replace(
            &mut self.aggregator,
            Aggregator::new(self.job.url.clone(), &[]),
        )
        .finalize(terminal);

        // Persist before freezing so a failure still lands in the report's
        // warnings. A cancelled job's artificial partial report is neither
        // persisted nor cached.
        if self.cancelled {
            if self.write_back {
                self.cache.evict(&key).await;
            }
        } else if let Err(e) = self.store.save(&key, &report).await {
            warn!("failed to persist report for {key}: {e}");
            report
                .warnings
                .push(format!("report persistence failed: {e}"));
            self.publish(AuditEvent::persistence_failed(key.clone(), e.to_string()));
        }

        let report = Arc::new(report);

        if self.write_back && !self.cancelled {
            if let Err(e) = self
                .cache
                .complete(&key, Arc::clone(&report), self.config.freshness_ttl())
                .await
            {
                warn!("failed to write report for {key} back to dedup cache: {e}");
            }
        }

        info!(
            "job {} for {key} finished as {terminal:?} in {:?} ({} unavailable sections)",
            self.job.id,
            started.elapsed(),
            report.unavailable_sections().len()
        );
        self.publish(AuditEvent::job_completed(
            key,
            self.job.id,
            terminal,
            started.elapsed().as_millis() as u64,
        ));

        let snapshot = self.job.snapshot(Some(report));
        self.snapshot_tx.send_replace(snapshot);
    }

    fn push_snapshot(&self) {
        self.snapshot_tx.send_replace(self.job.snapshot(None));
    }

    fn publish(&self, event: AuditEvent) {
        if let Some(bus) = self.config.event_bus() {
            bus.publish(event);
        }
    }
}
