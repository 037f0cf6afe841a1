//! Resilient element interaction.
//!
//! Every attempt re-enters the element's frame path, resolves the locator
//! fresh and applies the action. Transient element failures (missing,
//! stale, not yet interactable) are retried on a fixed schedule:
//!
//! ```text
//! attempt 1 ──fail──► sleep(delay) ──► attempt 2 ──fail──► … ──► attempt N ──fail──► InteractionFailed { attempts: N }
//! ```
//!
//! Frame failures and session failures are returned unwrapped and never
//! retried: the first means the inventory is stale, the second that the
//! session is gone.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use crate::session::{Action, Locator, RevealMethod, Session};

use super::frames::FrameNavigator;
use super::inventory::ElementRecord;

// ============================================================================
// InteractionOutcome
// ============================================================================

/// Result of a successful interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionOutcome {
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// The top-level URL changed across the interaction.
    pub navigated: bool,
    /// Top-level URL before the interaction.
    pub url_before: String,
    /// Top-level URL after the interaction.
    pub url_after: String,
}

// ============================================================================
// InteractionDriver
// ============================================================================

/// Applies actions to inventory records under a retry policy.
#[derive(Debug, Clone, Default)]
pub struct InteractionDriver {
    policy: RetryPolicy,
}

impl InteractionDriver {
    /// Creates a driver with the given policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The retry policy in use.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Applies `action` to the element described by `record`.
    ///
    /// Returns once the browser acknowledged the action. A navigation caused
    /// by the action is reported in the outcome, not as a failure.
    ///
    /// # Errors
    ///
    /// - [`Error::InteractionFailed`] after the retry bound is exhausted, or
    ///   on the first non-transient element error
    /// - [`Error::FrameNotFound`] / [`Error::FrameInaccessible`] if the frame path no longer resolves
    /// - Session errors as-is
    pub async fn interact<S>(
        &self,
        nav: &mut FrameNavigator,
        session: &mut S,
        record: &ElementRecord,
        action: &Action,
    ) -> Result<InteractionOutcome>
    where
        S: Session + ?Sized,
    {
        let url_before = session.current_url().await?;

        let (_, attempts) = self
            .with_retries(nav, session, record, "interact", |session, locator| {
                let action = action.clone();
                Box::pin(async move { session.apply(locator, &action).await })
            })
            .await?;

        let url_after = session.current_url().await?;
        let navigated = url_before != url_after;
        if navigated {
            debug!(from = %url_before, to = %url_after, "Interaction navigated");
        }

        Ok(InteractionOutcome {
            attempts,
            navigated,
            url_before,
            url_after,
        })
    }

    /// Makes a hidden element visible under the same retry policy.
    ///
    /// # Errors
    ///
    /// Same as [`interact`](Self::interact).
    pub async fn reveal<S>(
        &self,
        nav: &mut FrameNavigator,
        session: &mut S,
        record: &ElementRecord,
    ) -> Result<RevealMethod>
    where
        S: Session + ?Sized,
    {
        let (method, _) = self
            .with_retries(nav, session, record, "reveal", |session, locator| {
                Box::pin(async move { session.reveal(locator).await })
            })
            .await?;

        debug!(element = %record.locator, ?method, "Element revealed");
        Ok(method)
    }

    /// Lists dropdown options of `record` under the same retry policy.
    ///
    /// # Errors
    ///
    /// Same as [`interact`](Self::interact).
    pub async fn dropdown_options<S>(
        &self,
        nav: &mut FrameNavigator,
        session: &mut S,
        record: &ElementRecord,
    ) -> Result<Vec<String>>
    where
        S: Session + ?Sized,
    {
        let (options, _) = self
            .with_retries(nav, session, record, "options", |session, locator| {
                Box::pin(async move { session.dropdown_options(locator).await })
            })
            .await?;
        Ok(options)
    }

    /// Bounded attempt loop; the session is back at the top document afterwards.
    async fn with_retries<S, T, F>(
        &self,
        nav: &mut FrameNavigator,
        session: &mut S,
        record: &ElementRecord,
        operation: &'static str,
        mut op: F,
    ) -> Result<(T, u32)>
    where
        S: Session + ?Sized,
        F: for<'a> FnMut(&'a mut S, &'a Locator) -> BoxFuture<'a, Result<T>>,
    {
        let mut attempt = 0;

        let result = loop {
            attempt += 1;

            if let Err(e) = nav.enter(session, &record.frame_path).await {
                break Err(e);
            }

            match op(&mut *session, &record.locator).await {
                Ok(value) => break Ok((value, attempt)),
                Err(e) if e.is_retryable() && attempt < self.policy.attempts => {
                    debug!(
                        operation,
                        element = %record.locator,
                        frame_path = %record.frame_path,
                        attempt,
                        error = %e,
                        "Retrying"
                    );
                    nav.reset_to_root(session).await;
                    sleep(self.policy.delay).await;
                }
                Err(e) if e.is_session_fatal() || e.is_frame_error() => break Err(e),
                Err(e) => {
                    warn!(
                        operation,
                        element = %record.locator,
                        frame_path = %record.frame_path,
                        attempts = attempt,
                        error = %e,
                        "Giving up"
                    );
                    break Err(Error::interaction_failed(attempt, e));
                }
            }
        };

        nav.reset_to_root(session).await;
        result
    }
}

/// Boxed future borrowed from the session for one attempt.
type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::fuzz::frames::FramePath;
    use crate::fuzz::inventory::ElementRole;
    use crate::session::memory::{Effect, FailureKind};
    use crate::session::{MemoryElement, MemoryFrame, MemoryPage};

    fn record(id: &str, path: FramePath, role: ElementRole) -> ElementRecord {
        ElementRecord {
            locator: Locator::id(id),
            frame_path: path,
            role,
            display_name: None,
            visible: true,
        }
    }

    fn driver(attempts: u32) -> InteractionDriver {
        InteractionDriver::new(RetryPolicy::new(attempts, Duration::from_millis(10)))
    }

    fn page() -> MemoryPage {
        MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root()
                .element(MemoryElement::button("go"))
                .frame(MemoryFrame::new("inner").element(MemoryElement::text_input("q"))),
        )
        .on_click("go", Effect::navigate("https://example.test/next"))
    }

    #[tokio::test]
    async fn test_interact_in_frame_restores_root() {
        let mut page = page();
        let mut nav = FrameNavigator::new();
        let target = record("q", ["inner"].into_iter().collect(), ElementRole::TextInput);

        let outcome = driver(3)
            .interact(&mut nav, &mut page, &target, &Action::SetValue("hi".into()))
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.navigated);
        assert_eq!(page.value_of("q"), Some("hi"));
        assert!(page.current_frame_path().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let mut page = page();
        page.fail_interactions("q", 2, FailureKind::Stale);
        let target = record("q", ["inner"].into_iter().collect(), ElementRole::TextInput);

        let outcome = driver(3)
            .interact(
                &mut FrameNavigator::new(),
                &mut page,
                &target,
                &Action::SetValue("x".into()),
            )
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(page.apply_attempts("q"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_is_exact() {
        let mut page = page();
        let target = record("ghost", FramePath::root(), ElementRole::Button);

        let err = driver(4)
            .interact(&mut FrameNavigator::new(), &mut page, &target, &Action::Click)
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), Some(4));
        assert_eq!(page.apply_attempts("ghost"), 4);
        match err {
            Error::InteractionFailed { source, .. } => {
                assert!(matches!(*source, Error::ElementNotFound { .. }));
            }
            other => panic!("expected InteractionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_click_navigation_is_flagged() {
        let mut page = page();
        let target = record("go", FramePath::root(), ElementRole::Button);

        let outcome = driver(1)
            .interact(&mut FrameNavigator::new(), &mut page, &target, &Action::Click)
            .await
            .unwrap();

        assert!(outcome.navigated);
        assert_eq!(outcome.url_after, "https://example.test/next");
    }

    #[tokio::test]
    async fn test_missing_frame_is_not_retried() {
        let mut page = page();
        let target = record("q", ["gone"].into_iter().collect(), ElementRole::TextInput);

        let err = driver(3)
            .interact(
                &mut FrameNavigator::new(),
                &mut page,
                &target,
                &Action::SetValue("x".into()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FrameNotFound { .. }));
        assert_eq!(page.apply_attempts("q"), 0);
    }

    #[tokio::test]
    async fn test_non_transient_error_fails_immediately() {
        let mut page = MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root().element(MemoryElement::dropdown("c", ["a"])),
        );
        let target = record("c", FramePath::root(), ElementRole::Dropdown);

        let err = driver(3)
            .interact(
                &mut FrameNavigator::new(),
                &mut page,
                &target,
                &Action::SelectOption("zz".into()),
            )
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), Some(1));
    }

    #[tokio::test]
    async fn test_reveal_then_interact() {
        let mut page = MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root().element(MemoryElement::text_input("s").behind_trigger()),
        );
        let mut nav = FrameNavigator::new();
        let target = record("s", FramePath::root(), ElementRole::TextInput);

        let method = driver(1).reveal(&mut nav, &mut page, &target).await.unwrap();
        assert_eq!(method, RevealMethod::Trigger);

        driver(1)
            .interact(&mut nav, &mut page, &target, &Action::SetValue("v".into()))
            .await
            .unwrap();
        assert_eq!(page.value_of("s"), Some("v"));
    }
}
