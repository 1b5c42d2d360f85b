//! Typed partial results produced by the analyzer capabilities.
//!
//! Each analyzer contributes one named, immutable record to the composite
//! report. The engine never inspects these beyond carrying them into report
//! slots; the types and rating thresholds live here so that every capability
//! implementation and every report consumer agree on the shape.

use serde::{Deserialize, Serialize};

/// Web-vitals rating buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricRating {
    Good,
    NeedsImprovement,
    Poor,
}

/// One measured web-vitals metric with its rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub value: f64,
    pub rating: MetricRating,
    /// `"ms"` for timing metrics, `"score"` for CLS
    pub unit: String,
}

impl Metric {
    fn rated(value: f64, good_below: f64, poor_at: f64, unit: &str) -> Self {
        let rating = if value < good_below {
            MetricRating::Good
        } else if value < poor_at {
            MetricRating::NeedsImprovement
        } else {
            MetricRating::Poor
        };
        Self {
            value,
            rating,
            unit: unit.to_string(),
        }
    }

    /// Time to First Byte, milliseconds. Good < 800, poor >= 1800.
    #[must_use]
    pub fn ttfb(ms: f64) -> Self {
        Self::rated(ms, 800.0, 1800.0, "ms")
    }

    /// First Contentful Paint, milliseconds. Good < 1800, poor >= 3000.
    #[must_use]
    pub fn fcp(ms: f64) -> Self {
        Self::rated(ms, 1800.0, 3000.0, "ms")
    }

    /// Largest Contentful Paint, milliseconds. Good < 2500, poor >= 4000.
    #[must_use]
    pub fn lcp(ms: f64) -> Self {
        Self::rated(ms, 2500.0, 4000.0, "ms")
    }

    /// Cumulative Layout Shift, unitless score. Good < 0.1, poor >= 0.25.
    #[must_use]
    pub fn cls(score: f64) -> Self {
        Self::rated(score, 0.1, 0.25, "score")
    }

    /// First Input Delay, milliseconds. Good < 100, poor >= 300.
    #[must_use]
    pub fn fid(ms: f64) -> Self {
        Self::rated(ms, 100.0, 300.0, "ms")
    }
}

/// Page-load measurement payload (`load-speed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebVitals {
    pub ttfb: Metric,
    pub fcp: Metric,
    pub lcp: Metric,
    pub cls: Metric,
    pub fid: Metric,
}

/// SEO metadata audit payload (`seo`).
///
/// The score starts at 100 and loses 10 for a missing title, 15 for a
/// missing meta description, and 10 when no h1/h2 is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoAudit {
    pub has_title: bool,
    pub has_meta_description: bool,
    pub has_headings: bool,
    pub score: f64,
}

impl SeoAudit {
    /// Build an audit from the three checks, computing the deduction score.
    #[must_use]
    pub fn from_checks(has_title: bool, has_meta_description: bool, has_headings: bool) -> Self {
        let mut score: f64 = 100.0;
        if !has_title {
            score -= 10.0;
        }
        if !has_meta_description {
            score -= 15.0;
        }
        if !has_headings {
            score -= 10.0;
        }
        Self {
            has_title,
            has_meta_description,
            has_headings,
            score: score.max(0.0),
        }
    }
}

/// One accessibility finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilityIssue {
    /// Element the issue was found on, e.g. `"img"`, `"h3"`, `"input"`
    pub element: String,
    /// Human-readable description, e.g. `"missing alt text"`
    pub detail: String,
}

/// Accessibility audit payload (`accessibility`).
///
/// Issues cover missing alt text, skipped heading levels, unlabeled form
/// inputs, inline color styling, and ARIA attribute problems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityAudit {
    pub issues: Vec<AccessibilityIssue>,
    pub score: f64,
}

/// Presence check for one security-relevant response header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderCheck {
    Present(String),
    Missing,
}

impl HeaderCheck {
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// Security-header inspection payload (`security-headers`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityHeaders {
    pub x_frame_options: HeaderCheck,
    pub x_xss_protection: HeaderCheck,
    pub content_security_policy: HeaderCheck,
    pub strict_transport_security: HeaderCheck,
}

/// Layout behavior at one viewport size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportCheck {
    pub width: u32,
    pub height: u32,
    pub has_horizontal_scroll: bool,
    pub elements_overflow: bool,
}

/// The viewport sizes exercised by the responsiveness capability:
/// mobile, tablet, landscape tablet, desktop.
pub const VIEWPORT_SIZES: [(u32, u32); 4] = [(320, 568), (768, 1024), (1024, 768), (1920, 1080)];

/// Responsiveness audit payload (`mobile-responsiveness`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportAudit {
    pub checks: Vec<ViewportCheck>,
}

impl ViewportAudit {
    /// True when no tested viewport shows horizontal scroll or overflow.
    #[must_use]
    pub fn is_responsive(&self) -> bool {
        self.checks
            .iter()
            .all(|c| !c.has_horizontal_scroll && !c.elements_overflow)
    }
}

/// Page rendering payload (`rendering`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderAudit {
    pub load_time_ms: f64,
    pub mobile_friendly: bool,
}

/// The named, typed partial record produced by exactly one analyzer
/// invocation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AnalyzerPayload {
    LoadSpeed(WebVitals),
    Seo(SeoAudit),
    Accessibility(AccessibilityAudit),
    SecurityHeaders(SecurityHeaders),
    MobileResponsiveness(ViewportAudit),
    Rendering(RenderAudit),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_rating_thresholds() {
        assert_eq!(Metric::ttfb(500.0).rating, MetricRating::Good);
        assert_eq!(Metric::ttfb(1000.0).rating, MetricRating::NeedsImprovement);
        assert_eq!(Metric::ttfb(1800.0).rating, MetricRating::Poor);

        assert_eq!(Metric::fcp(1700.0).rating, MetricRating::Good);
        assert_eq!(Metric::lcp(2500.0).rating, MetricRating::NeedsImprovement);
        assert_eq!(Metric::cls(0.05).rating, MetricRating::Good);
        assert_eq!(Metric::cls(0.25).rating, MetricRating::Poor);
        assert_eq!(Metric::fid(99.9).rating, MetricRating::Good);
    }

    #[test]
    fn test_cls_unit_is_score() {
        assert_eq!(Metric::cls(0.2).unit, "score");
        assert_eq!(Metric::lcp(100.0).unit, "ms");
    }

    #[test]
    fn test_seo_deductions() {
        assert_eq!(SeoAudit::from_checks(true, true, true).score, 100.0);
        assert_eq!(SeoAudit::from_checks(false, true, true).score, 90.0);
        assert_eq!(SeoAudit::from_checks(true, false, true).score, 85.0);
        assert_eq!(SeoAudit::from_checks(false, false, false).score, 65.0);
    }

    #[test]
    fn test_viewport_responsive() {
        let ok = ViewportAudit {
            checks: VIEWPORT_SIZES
                .iter()
                .map(|&(width, height)| ViewportCheck {
                    width,
                    height,
                    has_horizontal_scroll: false,
                    elements_overflow: false,
                })
                .collect(),
        };
        assert!(ok.is_responsive());

        let mut bad = ok.clone();
        bad.checks[0].has_horizontal_scroll = true;
        assert!(!bad.is_responsive());
    }

    #[test]
    fn test_payload_serde_tagging() {
        let payload = AnalyzerPayload::Seo(SeoAudit::from_checks(true, true, false));
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"kind\":\"seo\""));
        let back: AnalyzerPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload, back);
    }
}
