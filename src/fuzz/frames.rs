//! Frame paths and the frame navigator.
//!
//! The navigator owns the only knowledge of where the session's frame cursor
//! points. Components enter a [`FramePath`] through it and it returns the
//! session to the top document afterwards.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::identifiers::FrameId;
use crate::session::Session;

// ============================================================================
// FramePath
// ============================================================================

/// Frame identifiers from the top document to a nested frame.
///
/// The empty path is the top document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FramePath(Vec<FrameId>);

impl FramePath {
    /// The top document.
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns `true` for the top document.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Nesting depth (0 for the top document).
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Path of a direct child frame.
    #[must_use]
    pub fn child(&self, frame: FrameId) -> Self {
        let mut segments = self.0.clone();
        segments.push(frame);
        Self(segments)
    }

    /// Segments from the top document down.
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[FrameId] {
        &self.0
    }
}

impl<T: Into<FrameId>> FromIterator<T> for FramePath {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FramePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{segment}")?;
        }
        f.write_str("]")
    }
}

// ============================================================================
// FrameNavigator
// ============================================================================

/// Tracks and moves a session's frame context.
#[derive(Debug, Default)]
pub struct FrameNavigator {
    current: FramePath,
}

impl FrameNavigator {
    /// Creates a navigator positioned at the top document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path the session is believed to be in.
    #[inline]
    #[must_use]
    pub fn current(&self) -> &FramePath {
        &self.current
    }

    /// Switches the session into `path`, starting from the top document.
    ///
    /// No retries happen here. On failure the session is left at the top
    /// document.
    ///
    /// # Errors
    ///
    /// - [`Error::FrameNotFound`](crate::Error::FrameNotFound) if a segment no longer resolves
    /// - [`Error::FrameInaccessible`](crate::Error::FrameInaccessible) if a segment cannot be entered
    pub async fn enter<S>(&mut self, session: &mut S, path: &FramePath) -> Result<()>
    where
        S: Session + ?Sized,
    {
        session.switch_to_root().await?;
        self.current = FramePath::root();

        for segment in path.segments() {
            if let Err(e) = session.switch_to_child_frame(segment).await {
                debug!(frame_path = %path, frame_id = %segment, error = %e, "Frame enter failed");
                self.reset_to_root(session).await;
                return Err(e);
            }
            self.current = self.current.child(segment.clone());
        }

        debug!(frame_path = %path, "Entered frame");
        Ok(())
    }

    /// Returns the session to the top document.
    ///
    /// Idempotent and infallible: a session that cannot switch is already
    /// unusable and the next operation reports it.
    pub async fn reset_to_root<S>(&mut self, session: &mut S)
    where
        S: Session + ?Sized,
    {
        if let Err(e) = session.switch_to_root().await {
            warn!(error = %e, "Failed to reset frame context");
        }
        self.current = FramePath::root();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::session::{MemoryElement, MemoryFrame, MemoryPage};

    fn nested_page() -> MemoryPage {
        MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root().frame(
                MemoryFrame::new("outer")
                    .frame(MemoryFrame::new("inner").element(MemoryElement::text_input("q"))),
            ),
        )
    }

    #[test]
    fn test_frame_path_display() {
        assert_eq!(FramePath::root().to_string(), "[]");
        let path: FramePath = ["a", "b"].into_iter().collect();
        assert_eq!(path.to_string(), "[a, b]");
        assert_eq!(path.depth(), 2);
    }

    #[test]
    fn test_child_does_not_mutate_parent() {
        let parent: FramePath = ["a"].into_iter().collect();
        let child = parent.child("b".into());
        assert_eq!(parent.depth(), 1);
        assert_eq!(child.segments().last(), Some(&FrameId::from("b")));
    }

    #[tokio::test]
    async fn test_enter_nested_path() {
        let mut page = nested_page();
        let mut nav = FrameNavigator::new();
        let path: FramePath = ["outer", "inner"].into_iter().collect();

        nav.enter(&mut page, &path).await.unwrap();
        assert_eq!(nav.current(), &path);
        assert_eq!(page.current_frame_path(), path.segments());
    }

    #[tokio::test]
    async fn test_enter_missing_segment_resets() {
        let mut page = nested_page();
        let mut nav = FrameNavigator::new();
        let path: FramePath = ["outer", "gone"].into_iter().collect();

        let err = nav.enter(&mut page, &path).await.unwrap_err();
        assert!(matches!(err, Error::FrameNotFound { .. }));
        assert!(nav.current().is_root());
        assert!(page.current_frame_path().is_empty());
    }

    #[tokio::test]
    async fn test_reset_to_root_is_idempotent() {
        let mut page = nested_page();
        let mut nav = FrameNavigator::new();
        nav.enter(&mut page, &["outer"].into_iter().collect())
            .await
            .unwrap();

        nav.reset_to_root(&mut page).await;
        nav.reset_to_root(&mut page).await;
        nav.reset_to_root(&mut page).await;

        assert!(nav.current().is_root());
        assert!(page.current_frame_path().is_empty());
    }
}
