//! Snapshot comparison.
//!
//! [`ChangeDetector::diff`] turns a pre/post [`Snapshot`] pair into a
//! [`ChangeReport`]. Each rule is applied independently:
//!
//! | Rule | Report field | Anomalous |
//! |------|--------------|-----------|
//! | URL string differs | `url_changed` | if navigation was not expected |
//! | DOM markup differs | `dom` | no |
//! | post carries console entries | `new_console_entries` | no |
//! | post carries script errors | `new_js_errors` | yes |
//! | error marker text appears | `error_indicators` | no |
//!
//! The report depends on the two snapshots and the caller's navigation
//! expectation only.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DEFAULT_ERROR_INDICATORS;
use crate::error::{Error, Result};
use crate::session::{ConsoleEntry, JsErrorEntry};

use super::snapshot::Snapshot;

// ============================================================================
// Constants
// ============================================================================

/// Segment lines kept per direction in a [`DomDelta`].
pub const MAX_DELTA_LINES: usize = 50;

/// Boundary between adjacent tags.
static TAG_BOUNDARY: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r">\s*<").ok());

// ============================================================================
// DomDelta
// ============================================================================

/// Markup difference between two snapshots.
///
/// Markup is split at tag boundaries and compared as a multiset of
/// segments, which is enough to show what appeared and disappeared without
/// computing a minimal edit script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomDelta {
    /// Markup differs.
    pub changed: bool,
    /// Segments only in the post markup (capped at [`MAX_DELTA_LINES`]).
    pub added: Vec<String>,
    /// Segments only in the pre markup (capped at [`MAX_DELTA_LINES`]).
    pub removed: Vec<String>,
    /// One-line description, present when `changed`.
    pub summary: Option<String>,
}

impl DomDelta {
    /// Compares two serialised documents.
    #[must_use]
    pub fn compute(pre: &str, post: &str) -> Self {
        if pre == post {
            return Self::default();
        }

        let pre_split = segments(pre);
        let post_split = segments(post);

        let mut balance: FxHashMap<&str, i64> = FxHashMap::default();
        for &segment in &pre_split {
            *balance.entry(segment).or_default() -= 1;
        }
        for &segment in &post_split {
            *balance.entry(segment).or_default() += 1;
        }

        let added = surplus(&post_split, &balance, 1);
        let removed = surplus(&pre_split, &balance, -1);

        let summary = if added.total == 0 && removed.total == 0 {
            "markup reordered or whitespace changed".to_string()
        } else {
            format!(
                "+{} -{} segments ({} -> {} bytes)",
                added.total,
                removed.total,
                pre.len(),
                post.len()
            )
        };

        Self {
            changed: true,
            added: added.lines,
            removed: removed.lines,
            summary: Some(summary),
        }
    }
}

struct Surplus {
    lines: Vec<String>,
    total: usize,
}

/// Segments of `side` in document order whose count exceeds the other side.
fn surplus(side: &[&str], balance: &FxHashMap<&str, i64>, sign: i64) -> Surplus {
    let mut remaining: FxHashMap<&str, i64> = balance
        .iter()
        .filter(|&(_, &n)| n * sign > 0)
        .map(|(&s, &n)| (s, n * sign))
        .collect();

    let mut lines = Vec::new();
    let mut total = 0;
    for &segment in side {
        if let Some(n) = remaining.get_mut(segment)
            && *n > 0
        {
            *n -= 1;
            total += 1;
            if lines.len() < MAX_DELTA_LINES {
                lines.push(segment.to_string());
            }
        }
    }
    Surplus { lines, total }
}

fn segments(markup: &str) -> Vec<&str> {
    let Some(boundary_re) = TAG_BOUNDARY.as_ref() else {
        return markup.lines().map(str::trim).filter(|s| !s.is_empty()).collect();
    };

    let mut out = Vec::new();
    let mut start = 0;
    for boundary in boundary_re.find_iter(markup) {
        // keep '>' with the left segment and '<' with the right one
        out.push(&markup[start..=boundary.start()]);
        start = boundary.end() - 1;
    }
    out.push(&markup[start..]);
    out.into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

// ============================================================================
// ChangeReport
// ============================================================================

/// Why a report was classified anomalous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AnomalyReason {
    /// Script errors were logged during the interval.
    JavascriptError {
        /// Number of errors.
        count: usize,
    },
    /// The top-level URL changed although no navigation was expected.
    UnexpectedNavigation {
        /// URL before.
        from: String,
        /// URL after.
        to: String,
    },
}

/// Classified difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeReport {
    /// Top-level URL changed.
    pub url_changed: bool,
    /// URL of the pre snapshot.
    pub old_url: String,
    /// URL of the post snapshot.
    pub new_url: String,
    /// Navigation expectation supplied by the caller.
    pub expected_navigation: bool,
    /// Markup difference.
    pub dom: DomDelta,
    /// Console entries logged during the interval.
    pub new_console_entries: Vec<ConsoleEntry>,
    /// Script errors logged during the interval.
    pub new_js_errors: Vec<JsErrorEntry>,
    /// Error marker phrases that became more frequent in the markup.
    pub error_indicators: Vec<String>,
    /// Script error present, or unexpected navigation.
    pub is_anomalous: bool,
    /// Causes of `is_anomalous`.
    pub anomaly_reasons: Vec<AnomalyReason>,
}

impl ChangeReport {
    /// Returns `true` if any rule detected a difference.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.url_changed
            || self.dom.changed
            || !self.new_console_entries.is_empty()
            || !self.new_js_errors.is_empty()
            || !self.error_indicators.is_empty()
    }
}

// ============================================================================
// ChangeDetector
// ============================================================================

/// Compares snapshots.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    indicators: Vec<String>,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_INDICATORS.iter().copied())
    }
}

impl ChangeDetector {
    /// Creates a detector scanning for the given error marker phrases.
    ///
    /// Matching is case-insensitive.
    #[must_use]
    pub fn new(indicators: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            indicators: indicators
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Classifies the change from `pre` to `post`.
    ///
    /// Comparing a snapshot with itself yields an empty, non-anomalous report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncomparableSnapshots`] if the snapshots come from
    /// different sessions.
    pub fn diff(
        &self,
        pre: &Snapshot,
        post: &Snapshot,
        expected_navigation: bool,
    ) -> Result<ChangeReport> {
        if pre.session_id != post.session_id {
            return Err(Error::IncomparableSnapshots {
                pre: pre.session_id,
                post: post.session_id,
            });
        }

        // a snapshot's own entries precede it, not the interval
        let same = pre.id == post.id;
        let (new_console_entries, new_js_errors) = if same {
            (Vec::new(), Vec::new())
        } else {
            (post.console.clone(), post.js_errors.clone())
        };

        let url_changed = pre.url != post.url;
        let dom = DomDelta::compute(&pre.dom, &post.dom);
        let error_indicators = self.new_indicators(&pre.dom, &post.dom);

        let mut anomaly_reasons = Vec::new();
        if !new_js_errors.is_empty() {
            anomaly_reasons.push(AnomalyReason::JavascriptError {
                count: new_js_errors.len(),
            });
        }
        if url_changed && !expected_navigation {
            anomaly_reasons.push(AnomalyReason::UnexpectedNavigation {
                from: pre.url.clone(),
                to: post.url.clone(),
            });
        }

        let report = ChangeReport {
            url_changed,
            old_url: pre.url.clone(),
            new_url: post.url.clone(),
            expected_navigation,
            dom,
            new_console_entries,
            new_js_errors,
            error_indicators,
            is_anomalous: !anomaly_reasons.is_empty(),
            anomaly_reasons,
        };

        debug!(
            pre = %pre.id,
            post = %post.id,
            url_changed = report.url_changed,
            dom_changed = report.dom.changed,
            console = report.new_console_entries.len(),
            js_errors = report.new_js_errors.len(),
            anomalous = report.is_anomalous,
            "Snapshots compared"
        );
        Ok(report)
    }

    fn new_indicators(&self, pre: &str, post: &str) -> Vec<String> {
        if self.indicators.is_empty() || pre == post {
            return Vec::new();
        }
        let pre = pre.to_lowercase();
        let post = post.to_lowercase();
        self.indicators
            .iter()
            .filter(|needle| {
                post.matches(needle.as_str()).count() > pre.matches(needle.as_str()).count()
            })
            .cloned()
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
