//! Ordered payload lists.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// PayloadList
// ============================================================================

/// Fixed, ordered list of payload strings.
///
/// Payloads are opaque and applied in list order; a run can resume from any
/// index with [`iter_from`](Self::iter_from).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadList(Vec<String>);

impl PayloadList {
    /// Creates a list from the given payloads.
    #[must_use]
    pub fn new(payloads: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(payloads.into_iter().map(Into::into).collect())
    }

    /// Email, numeric, script-injection and SQL-injection payloads.
    #[must_use]
    pub fn default_set() -> Self {
        Self::new([
            "test@example.com",
            "1234567890",
            "<script>alert('XSS')</script>",
            "' OR 1=1 --",
        ])
    }

    /// Parses one payload per line.
    ///
    /// Blank lines and lines starting with `#` are skipped. Other lines are
    /// kept verbatim apart from the line terminator.
    #[must_use]
    pub fn from_lines(text: &str) -> Self {
        Self(
            text.lines()
                .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect(),
        )
    }

    /// Payload at `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Number of payloads.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the list is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(index, payload)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.iter_from(0)
    }

    /// `(index, payload)` pairs starting at `start`.
    ///
    /// A `start` past the end yields nothing.
    pub fn iter_from(&self, start: usize) -> impl Iterator<Item = (usize, &str)> {
        self.0
            .iter()
            .enumerate()
            .skip(start)
            .map(|(i, p)| (i, p.as_str()))
    }
}

impl Default for PayloadList {
    fn default() -> Self {
        Self::default_set()
    }
}

impl<S: Into<String>> FromIterator<S> for PayloadList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

// ============================================================================
// Tests
// ============================================================================
