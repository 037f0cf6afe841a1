//! Page state snapshots.
//!
//! A [`Snapshot`] is an immutable capture of one instant: top-level URL,
//! document markup, and the console/error entries logged since the previous
//! capture. The [`SnapshotEngine`] keeps one read cursor per log and only
//! advances them once a capture has fully succeeded, so every entry is
//! returned by exactly one snapshot.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, SnapshotId};
use crate::session::{ConsoleEntry, JsErrorEntry, Session, now_millis};

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable page state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Unique identity.
    pub id: SnapshotId,
    /// Session that captured it.
    pub session_id: SessionId,
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp: f64,
    /// Top-level URL.
    pub url: String,
    /// Serialised markup of the top document.
    pub dom: String,
    /// Console entries logged since the previous capture.
    pub console: Vec<ConsoleEntry>,
    /// JavaScript errors logged since the previous capture.
    pub js_errors: Vec<JsErrorEntry>,
}

// ============================================================================
// SnapshotEngine
// ============================================================================

/// Captures snapshots with consume-once log semantics.
#[derive(Debug, Default)]
pub struct SnapshotEngine {
    console_cursor: usize,
    error_cursor: usize,
}

impl SnapshotEngine {
    /// Creates an engine whose first capture returns every logged entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the current page state.
    ///
    /// Never waits for new entries. The session should be at the top
    /// document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureFailed`] naming the stage that failed. The
    /// log cursors are left untouched, so the entries are returned by the
    /// next successful capture.
    pub async fn capture<S>(&mut self, session: &mut S) -> Result<Snapshot>
    where
        S: Session + ?Sized,
    {
        let url = session
            .current_url()
            .await
            .map_err(|e| Error::capture_failed("url", e))?;
        let dom = session
            .page_source()
            .await
            .map_err(|e| Error::capture_failed("dom", e))?;
        let console = session
            .console_entries(self.console_cursor)
            .await
            .map_err(|e| Error::capture_failed("console", e))?;
        let js_errors = session
            .js_errors(self.error_cursor)
            .await
            .map_err(|e| Error::capture_failed("errors", e))?;

        self.console_cursor += console.len();
        self.error_cursor += js_errors.len();

        let snapshot = Snapshot {
            id: SnapshotId::generate(),
            session_id: session.id(),
            timestamp: now_millis(),
            url,
            dom,
            console,
            js_errors,
        };

        trace!(
            snapshot_id = %snapshot.id,
            dom_len = snapshot.dom.len(),
            console = snapshot.console.len(),
            js_errors = snapshot.js_errors.len(),
            "Snapshot captured"
        );
        Ok(snapshot)
    }
}

// ============================================================================
// Tests
// ============================================================================
