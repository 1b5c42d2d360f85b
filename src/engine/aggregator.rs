//! Composite report assembly.
//!
//! The aggregator owns one slot per registered analyzer and fills them as
//! task results arrive. Slots are structurally independent, so merge order
//! is irrelevant; that independence is what makes partial failure safe.
//! Merging is idempotent: a result delivered for a slot that is already
//! sealed is dropped, which guards against duplicate callbacks from
//! retried-but-late responses.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analyzer::AnalyzerPayload;
use crate::engine::job::JobStatus;
use crate::urlnorm::NormalizedUrl;

/// One analyzer's slot in the composite report: its result, or an explicit
/// unavailable marker. Sections are never silently omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportSlot {
    Available { payload: AnalyzerPayload },
    Unavailable { error: String },
}

impl ReportSlot {
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

/// The merged, per-analyzer-slot result of a job. Immutable once the job
/// reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeReport {
    /// Normalized URL this report is keyed by
    pub url: String,
    /// URL used for the actual fetches
    pub fetch_url: String,
    pub status: JobStatus,
    /// True only when every analyzer produced a result
    pub complete: bool,
    pub slots: BTreeMap<String, ReportSlot>,
    pub generated_at: DateTime<Utc>,
    /// Non-fatal problems observed while finishing the job, e.g. a
    /// persistence failure after the result was already final
    pub warnings: Vec<String>,
}

impl CompositeReport {
    /// Slot accessor by analyzer name.
    #[must_use]
    pub fn slot(&self, analyzer: &str) -> Option<&ReportSlot> {
        self.slots.get(analyzer)
    }

    /// Names of analyzers whose slots are unavailable.
    #[must_use]
    pub fn unavailable_sections(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|(_, slot)| !slot.is_available())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Serialize the report as JSON for the persistence boundary.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Incrementally merges task results into the report under construction.
///
/// Owned by the job driver; never shared, so no locking is needed. The
/// coordinator serializes all completions onto one update path per job.
#[derive(Debug)]
pub struct Aggregator {
    url: NormalizedUrl,
    slots: BTreeMap<String, Option<ReportSlot>>,
}

impl Aggregator {
    /// Seed one empty slot per analyzer name.
    #[must_use]
    pub fn new(url: NormalizedUrl, analyzer_names: &[String]) -> Self {
        let slots = analyzer_names
            .iter()
            .map(|name| (name.clone(), None))
            .collect();
        Self { url, slots }
    }

    /// Write a terminal result into the analyzer's slot.
    ///
    /// Returns false (and leaves the report untouched) when the slot is
    /// already sealed or the analyzer name is unknown.
    pub fn merge(&mut self, analyzer: &str, slot: ReportSlot) -> bool {
        match self.slots.get_mut(analyzer) {
            Some(existing) => {
                if existing.is_some() {
                    debug!("dropping duplicate result for already-sealed slot {analyzer}");
                    return false;
                }
                *existing = Some(slot);
                true
            }
            None => {
                debug!("dropping result for unknown analyzer {analyzer}");
                false
            }
        }
    }

    /// Whether the analyzer's slot has been written.
    #[must_use]
    pub fn is_sealed(&self, analyzer: &str) -> bool {
        matches!(self.slots.get(analyzer), Some(Some(_)))
    }

    /// Freeze the report at a terminal job status.
    ///
    /// Slots still unwritten (a cancelled job's never-dispatched tasks) are
    /// marked unavailable rather than omitted.
    #[must_use]
    pub fn finalize(self, status: JobStatus) -> CompositeReport {
        let slots: BTreeMap<String, ReportSlot> = self
            .slots
            .into_iter()
            .map(|(name, slot)| {
                (
                    name,
                    slot.unwrap_or(ReportSlot::Unavailable {
                        error: "analysis was not performed".to_string(),
                    }),
                )
            })
            .collect();
        let complete = slots.values().all(ReportSlot::is_available);
        CompositeReport {
            url: self.url.key().to_string(),
            fetch_url: self.url.fetch_url().to_string(),
            status,
            complete,
            slots,
            generated_at: Utc::now(),
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::SeoAudit;

    fn aggregator(names: &[&str]) -> Aggregator {
        let url = NormalizedUrl::parse("https://example.com").unwrap();
        let names: Vec<String> = names.iter().map(|s| (*s).to_string()).collect();
        Aggregator::new(url, &names)
    }

    fn seo_slot() -> ReportSlot {
        ReportSlot::Available {
            payload: AnalyzerPayload::Seo(SeoAudit::from_checks(true, true, true)),
        }
    }

    #[test]
    fn test_merge_fills_slot() {
        let mut agg = aggregator(&["seo", "rendering"]);
        assert!(agg.merge("seo", seo_slot()));
        assert!(agg.is_sealed("seo"));
        assert!(!agg.is_sealed("rendering"));
    }

    #[test]
    fn test_duplicate_merge_is_noop() {
        let mut agg = aggregator(&["seo"]);
        assert!(agg.merge("seo", seo_slot()));
        assert!(!agg.merge(
            "seo",
            ReportSlot::Unavailable {
                error: "late duplicate".to_string()
            }
        ));

        let report = agg.finalize(JobStatus::Complete);
        assert!(
            report.slot("seo").expect("seo slot must exist").is_available(),
            "first delivery must win over the late duplicate"
        );
    }

    #[test]
    fn test_unknown_analyzer_rejected() {
        let mut agg = aggregator(&["seo"]);
        assert!(!agg.merge("unknown", seo_slot()));
    }

    #[test]
    fn test_merge_order_irrelevant() {
        let mut forward = aggregator(&["a", "b"]);
        forward.merge("a", seo_slot());
        forward.merge("b", seo_slot());

        let mut reverse = aggregator(&["a", "b"]);
        reverse.merge("b", seo_slot());
        reverse.merge("a", seo_slot());

        let f = forward.finalize(JobStatus::Complete);
        let r = reverse.finalize(JobStatus::Complete);
        assert_eq!(f.slots, r.slots);
    }

    #[test]
    fn test_finalize_marks_missing_slots_unavailable() {
        let mut agg = aggregator(&["seo", "rendering"]);
        agg.merge("seo", seo_slot());

        let report = agg.finalize(JobStatus::PartiallyComplete);
        assert!(!report.complete);
        assert_eq!(report.unavailable_sections(), vec!["rendering"]);
    }

    #[test]
    fn test_complete_flag() {
        let mut agg = aggregator(&["seo"]);
        agg.merge("seo", seo_slot());
        let report = agg.finalize(JobStatus::Complete);
        assert!(report.complete);
        assert!(report.unavailable_sections().is_empty());
    }
}
