//! Shared fixtures for engine integration tests: scripted analyzers and
//! fault-injecting cache/store implementations.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use webaudit::analyzer::{Analyzer, AnalyzerError, AnalyzerPayload, AnalyzerRegistry, SeoAudit};
use webaudit::cache::{CacheError, CacheLookup, DedupCache, MemoryDedupCache};
use webaudit::config::EngineConfig;
use webaudit::engine::{CompositeReport, JobCoordinator};
use webaudit::store::{MemoryReportStore, ReportStore, StoreError};
use webaudit::urlnorm::NormalizedUrl;

/// A payload for stub analyzers; the engine carries it opaquely.
pub fn sample_payload() -> AnalyzerPayload {
    AnalyzerPayload::Seo(SeoAudit::from_checks(true, true, true))
}

/// How a [`StubAnalyzer`] behaves per attempt.
pub enum Script {
    /// Succeed after an optional delay
    Succeed(Duration),
    /// Fail every attempt
    AlwaysFail,
    /// Fail the first `n` attempts, then succeed
    FailFirst(u32),
    /// Never return; exercises the per-analyzer timeout
    Hang,
}

/// Scripted analyzer for driving the coordinator in tests.
pub struct StubAnalyzer {
    name: &'static str,
    script: Script,
    calls: AtomicU32,
}

impl StubAnalyzer {
    pub fn new(name: &'static str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name,
            script,
            calls: AtomicU32::new(0),
        })
    }

    /// Number of times `analyze` was invoked.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    fn name(&self) -> &str {
        self.name
    }

    async fn analyze(&self, _url: &NormalizedUrl) -> Result<AnalyzerPayload, AnalyzerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.script {
            Script::Succeed(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(sample_payload())
            }
            Script::AlwaysFail => Err(AnalyzerError::Failed(format!(
                "scripted failure on attempt {call}"
            ))),
            Script::FailFirst(n) => {
                if call <= *n {
                    Err(AnalyzerError::Failed(format!(
                        "scripted failure on attempt {call}"
                    )))
                } else {
                    Ok(sample_payload())
                }
            }
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AnalyzerError::Failed("hung analyzer woke up".to_string()))
            }
        }
    }
}

/// Dedup cache whose every operation reports an infrastructure fault.
pub struct BrokenCache;

#[async_trait]
impl DedupCache for BrokenCache {
    async fn lookup(&self, _key: &str) -> Result<CacheLookup, CacheError> {
        Err(CacheError::Unavailable("cache backend down".to_string()))
    }

    async fn reserve(
        &self,
        _key: &str,
        _handle: webaudit::engine::JobHandle,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("cache backend down".to_string()))
    }

    async fn complete(
        &self,
        _key: &str,
        _report: Arc<CompositeReport>,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("cache backend down".to_string()))
    }

    async fn evict(&self, _key: &str) {}
}

/// Report store whose saves always fail.
pub struct BrokenStore;

#[async_trait]
impl ReportStore for BrokenStore {
    async fn save(&self, _key: &str, _report: &CompositeReport) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    async fn load(&self, key: &str) -> Result<Arc<CompositeReport>, StoreError> {
        Err(StoreError::NotFound(key.to_string()))
    }
}

/// Fast retry timings so failure tests finish in milliseconds.
pub fn quick_config() -> EngineConfig {
    EngineConfig::builder()
        .base_delay(Duration::from_millis(10))
        .jitter_factor(0.0)
        .build()
        .expect("test configuration must validate")
}

/// Coordinator over in-memory cache and store.
pub fn engine(
    analyzers: Vec<Arc<dyn Analyzer>>,
    config: EngineConfig,
) -> (
    JobCoordinator,
    Arc<MemoryDedupCache>,
    Arc<MemoryReportStore>,
) {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = AnalyzerRegistry::new(analyzers).expect("test analyzers must register");
    let cache = Arc::new(MemoryDedupCache::new());
    let store = Arc::new(MemoryReportStore::new());
    let coordinator = JobCoordinator::new(
        registry,
        Arc::clone(&cache) as Arc<dyn DedupCache>,
        Arc::clone(&store) as Arc<dyn ReportStore>,
        config,
    );
    (coordinator, cache, store)
}
