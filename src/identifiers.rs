//! Type-safe identifiers for sessions, frames, requests and snapshots.
//!
//! Newtype wrappers keep incompatible IDs from being mixed at compile time.
//!
//! | Type | Backing | Source |
//! |------|---------|--------|
//! | [`SessionId`] | `u32` | Process-wide counter |
//! | [`RequestId`] | `u64` | Process-wide counter (DevTools message id) |
//! | [`FrameId`] | `String` | Backend-defined frame identifier |
//! | [`SnapshotId`] | `Uuid` | Random v4 |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Counters
// ============================================================================

static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// SessionId
// ============================================================================

/// Identifies one automation session.
///
/// Snapshots carry the ID of the session that produced them; two snapshots
/// are only comparable when their session IDs match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u32);

impl SessionId {
    /// Allocates the next session ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// DevTools message ID used for request/response correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Allocates the next request ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw ID (used when parsing responses).
    #[inline]
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// FrameId
// ============================================================================

/// Identifies a nested browsing context within its parent.
///
/// The value is opaque and defined by the session backend: a DevTools frame
/// ID for [`CdpSession`](crate::session::CdpSession), the iframe element ID
/// for [`MemoryPage`](crate::session::memory::MemoryPage).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(String);

impl FrameId {
    /// Creates a frame ID.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FrameId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// SnapshotId
// ============================================================================

/// Unique identity of a captured snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    /// Generates a random snapshot ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
        assert!(b.as_u32() > a.as_u32());
    }

    #[test]
    fn test_request_id_roundtrip() {
        let id = RequestId::from_raw(42);
        assert_eq!(id.as_u64(), 42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    }

    #[test]
    fn test_frame_id_display() {
        let id = FrameId::from("iframe-1");
        assert_eq!(id.to_string(), "iframe-1");
        assert_eq!(id.as_str(), "iframe-1");
    }

    #[test]
    fn test_snapshot_ids_differ() {
        assert_ne!(SnapshotId::generate(), SnapshotId::generate());
    }
}
