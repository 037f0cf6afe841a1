//! The fuzzing control loop.
//!
//! Each (element, payload) pair is one attempt, driven through a fixed state
//! machine:
//!
//! ```text
//! Pending ──► SnapshotPre ──► Interacting ──► SnapshotPost ──► Diffing ──► Recorded
//!                  │               │                │              │
//!                  └───────────────┴────────────────┴──────────────┴──► Failed
//! ```
//!
//! Every attempt ends in exactly one [`OutcomeRecord`], whatever its terminal
//! state. Payloads for one element run sequentially so each diff belongs to
//! one payload. A failed attempt does not stop the remaining payloads; a
//! failure that leaves the session unusable ends the run after its outcome
//! has been recorded.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::config::FuzzConfig;
use crate::error::Result;
use crate::session::{Action, RevealMethod, Session, now_millis};

use super::detector::{ChangeDetector, ChangeReport};
use super::frames::FrameNavigator;
use super::interaction::InteractionDriver;
use super::inventory::{ElementRecord, Inventory, InventoryBuilder};
use super::payload::PayloadList;
use super::snapshot::{Snapshot, SnapshotEngine};

// ============================================================================
// AttemptState
// ============================================================================

/// Position of an attempt in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptState {
    /// Not started.
    Pending,
    /// Capturing the pre-interaction snapshot.
    SnapshotPre,
    /// Revealing and interacting with the element.
    Interacting,
    /// Capturing the post-interaction snapshot.
    SnapshotPost,
    /// Comparing the snapshots.
    Diffing,
    /// Finished with a change report.
    Recorded,
    /// Finished without a change report.
    Failed,
}

impl AttemptState {
    /// Returns `true` for `Recorded` and `Failed`.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Recorded | Self::Failed)
    }
}

// ============================================================================
// OutcomeRecord
// ============================================================================

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TerminalStatus {
    /// Both snapshots captured and compared.
    Recorded,
    /// The attempt stopped early.
    #[serde(rename_all = "camelCase")]
    Failed {
        /// State in which the failure happened.
        stage: AttemptState,
        /// Error text.
        error: String,
        /// Action being applied, e.g. `setValue "<script>" on Email`.
        last_action: String,
    },
}

/// Result of one fuzz attempt against one element with one payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    /// The element fuzzed.
    pub element: ElementRecord,
    /// Payload used.
    pub payload: String,
    /// Index of the payload in its list.
    pub payload_index: usize,
    /// Action applied.
    pub action: Action,
    /// Snapshot before the interaction.
    pub pre: Option<Arc<Snapshot>>,
    /// Snapshot after the interaction.
    pub post: Option<Arc<Snapshot>>,
    /// Comparison of `pre` and `post`; absent for failed attempts.
    pub report: Option<ChangeReport>,
    /// Interaction attempts beyond the first.
    pub retry_count: u32,
    /// The interaction changed the top-level URL.
    pub navigated: bool,
    /// How a hidden element was revealed first, if it was.
    pub revealed: Option<RevealMethod>,
    /// Terminal state.
    pub status: TerminalStatus,
    /// PNG screenshot taken after an anomalous interaction.
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
}

impl OutcomeRecord {
    /// Returns `true` if the attempt reached `Recorded`.
    #[inline]
    #[must_use]
    pub fn is_recorded(&self) -> bool {
        self.status == TerminalStatus::Recorded
    }

    /// Returns `true` if the change report is anomalous.
    #[inline]
    #[must_use]
    pub fn is_anomalous(&self) -> bool {
        self.report.as_ref().is_some_and(|r| r.is_anomalous)
    }
}

// ============================================================================
// FuzzTarget
// ============================================================================

/// An element selected for fuzzing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuzzTarget {
    /// Inventory record.
    pub element: ElementRecord,
    /// The caller expects interactions with this element to navigate.
    pub expect_navigation: bool,
    /// Reveal the element first if it was hidden at discovery.
    pub reveal_hidden: bool,
}

impl FuzzTarget {
    /// Target that is not expected to navigate.
    #[must_use]
    pub fn new(element: ElementRecord) -> Self {
        Self {
            element,
            expect_navigation: false,
            reveal_hidden: false,
        }
    }

    /// Sets the navigation expectation.
    #[must_use]
    pub fn expect_navigation(mut self, expected: bool) -> Self {
        self.expect_navigation = expected;
        self
    }

    /// Reveals the element before each interaction if it was hidden.
    #[must_use]
    pub fn reveal_hidden(mut self, reveal: bool) -> Self {
        self.reveal_hidden = reveal;
        self
    }
}

// ============================================================================
// FuzzRun
// ============================================================================

/// Outcomes of one run, keyed by the caller's run identifier and scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuzzRun {
    /// Caller-supplied run identifier.
    pub run_id: String,
    /// Caller-supplied scenario name.
    pub scenario: String,
    /// Milliseconds since the Unix epoch.
    pub started_at: f64,
    /// Milliseconds since the Unix epoch.
    pub finished_at: f64,
    /// Outcomes in attempt order.
    pub outcomes: Vec<OutcomeRecord>,
    /// Session failure that ended the run early.
    pub aborted: Option<String>,
}

impl FuzzRun {
    /// Returns `true` if the run ended early.
    #[inline]
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Outcome counts.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.outcomes.len(),
            ..RunSummary::default()
        };
        for outcome in &self.outcomes {
            if outcome.is_recorded() {
                summary.recorded += 1;
            } else {
                summary.failed += 1;
            }
            if outcome.is_anomalous() {
                summary.anomalous += 1;
            }
            if outcome.navigated {
                summary.navigations += 1;
            }
        }
        summary
    }
}

/// Outcome counts of a [`FuzzRun`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// All outcomes.
    pub total: usize,
    /// Outcomes with a change report.
    pub recorded: usize,
    /// Failed outcomes.
    pub failed: usize,
    /// Anomalous outcomes.
    pub anomalous: usize,
    /// Outcomes whose interaction navigated.
    pub navigations: usize,
}

// ============================================================================
// Attempt
// ============================================================================

/// In-flight attempt.
struct Attempt<'a> {
    target: &'a FuzzTarget,
    payload_index: usize,
    payload: String,
    action: Action,
    state: AttemptState,
    pre: Option<Arc<Snapshot>>,
    post: Option<Arc<Snapshot>>,
    report: Option<ChangeReport>,
    retry_count: u32,
    navigated: bool,
    revealed: Option<RevealMethod>,
    screenshot: Option<Vec<u8>>,
}

impl<'a> Attempt<'a> {
    fn new(target: &'a FuzzTarget, payload_index: usize, payload: &str, action: Action) -> Self {
        Self {
            target,
            payload_index,
            payload: payload.to_string(),
            action,
            state: AttemptState::Pending,
            pre: None,
            post: None,
            report: None,
            retry_count: 0,
            navigated: false,
            revealed: None,
            screenshot: None,
        }
    }

    fn advance(&mut self, next: AttemptState) {
        trace!(
            element = %self.target.element.locator,
            payload_index = self.payload_index,
            from = ?self.state,
            to = ?next,
            "Attempt state"
        );
        self.state = next;
    }

    fn describe_action(&self) -> String {
        let element = self.target.element.label();
        match self.action.value() {
            Some(value) => format!("{} {value:?} on {element}", self.action.kind()),
            None => format!("{} on {element}", self.action.kind()),
        }
    }

    fn finish(self, status: TerminalStatus) -> OutcomeRecord {
        OutcomeRecord {
            element: self.target.element.clone(),
            payload: self.payload,
            payload_index: self.payload_index,
            action: self.action,
            pre: self.pre,
            post: self.post,
            report: self.report,
            retry_count: self.retry_count,
            navigated: self.navigated,
            revealed: self.revealed,
            status,
            screenshot: self.screenshot,
        }
    }
}

// ============================================================================
// FuzzOrchestrator
// ============================================================================

/// Drives fuzz attempts against one exclusively owned session.
///
/// Independent sessions get independent orchestrators and may run
/// concurrently.
#[derive(Debug)]
pub struct FuzzOrchestrator<S: Session> {
    session: S,
    config: FuzzConfig,
    nav: FrameNavigator,
    builder: InventoryBuilder,
    snapshots: SnapshotEngine,
    driver: InteractionDriver,
    detector: ChangeDetector,
    outcomes: Vec<OutcomeRecord>,
}

impl<S: Session> FuzzOrchestrator<S> {
    /// Creates an orchestrator owning `session`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if `config` does not validate.
    pub fn new(session: S, config: FuzzConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            session,
            nav: FrameNavigator::new(),
            builder: InventoryBuilder::new(),
            snapshots: SnapshotEngine::new(),
            driver: InteractionDriver::new(config.retry_policy()),
            detector: ChangeDetector::new(config.error_indicators.iter().cloned()),
            config,
            outcomes: Vec::new(),
        })
    }

    /// Replaces the inventory builder.
    #[must_use]
    pub fn with_inventory_builder(mut self, builder: InventoryBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Configuration in use.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    /// Outcomes recorded by direct calls since the last [`run`](Self::run).
    #[inline]
    #[must_use]
    pub fn outcomes(&self) -> &[OutcomeRecord] {
        &self.outcomes
    }

    /// Removes and returns the recorded outcomes.
    pub fn take_outcomes(&mut self) -> Vec<OutcomeRecord> {
        std::mem::take(&mut self.outcomes)
    }

    /// The owned session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &S {
        &self.session
    }

    /// The owned session, mutably.
    ///
    /// The session should be left at the top document.
    #[inline]
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Consumes the orchestrator, returning the session.
    #[must_use]
    pub fn into_session(self) -> S {
        self.session
    }

    /// Builds a fresh inventory of the page.
    ///
    /// # Errors
    ///
    /// Returns session errors only; unreachable frames make the inventory
    /// partial instead.
    pub async fn build_inventory(&mut self) -> Result<Inventory> {
        self.builder.build(&mut self.nav, &mut self.session).await
    }

    /// Applies every payload from `start` on to `target`, in order.
    ///
    /// Returns the number of outcomes recorded.
    ///
    /// # Errors
    ///
    /// Returns the session error that ended fuzzing early. The outcome of
    /// the attempt it interrupted is recorded first.
    pub async fn fuzz_target(
        &mut self,
        target: &FuzzTarget,
        payloads: &PayloadList,
        start: usize,
    ) -> Result<usize> {
        info!(
            element = %target.element.label(),
            role = %target.element.role,
            frame_path = %target.element.frame_path,
            payloads = payloads.len().saturating_sub(start),
            "Fuzzing element"
        );

        let mut count = 0;
        for (index, payload) in payloads.iter_from(start) {
            let action = target.element.role.action_for(payload);
            self.attempt(target, index, payload, action).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Selects every option of a dropdown in turn, one outcome per option.
    ///
    /// # Errors
    ///
    /// Returns the error from listing the options, or the session error that
    /// ended the sweep early.
    pub async fn fuzz_dropdown_options(&mut self, target: &FuzzTarget) -> Result<usize> {
        let options = self
            .driver
            .dropdown_options(&mut self.nav, &mut self.session, &target.element)
            .await?;

        debug!(element = %target.element.label(), options = options.len(), "Dropdown options");

        for (index, option) in options.iter().enumerate() {
            self.attempt(target, index, option, Action::SelectOption(option.clone()))
                .await?;
        }
        Ok(options.len())
    }

    /// Clicks every clickable inventory record once.
    ///
    /// # Errors
    ///
    /// Returns the session error that ended the sweep early.
    pub async fn click_sweep(
        &mut self,
        inventory: &Inventory,
        expect_navigation: bool,
    ) -> Result<usize> {
        let mut count = 0;
        for record in inventory.elements().iter().filter(|e| e.role.is_clickable()) {
            let target = FuzzTarget::new(record.clone()).expect_navigation(expect_navigation);
            self.attempt(&target, 0, Action::Click.kind(), Action::Click)
                .await?;
            count += 1;
        }
        Ok(count)
    }

    /// Fuzzes every target with every payload.
    ///
    /// Never fails: a session failure ends the run early and is reported in
    /// [`FuzzRun::aborted`] next to the outcomes produced so far. Outcomes of
    /// the run are moved out of [`outcomes`](Self::outcomes).
    pub async fn run(
        &mut self,
        run_id: impl Into<String>,
        scenario: impl Into<String>,
        targets: &[FuzzTarget],
        payloads: &PayloadList,
    ) -> FuzzRun {
        let run_id = run_id.into();
        let scenario = scenario.into();
        let started_at = now_millis();
        let first = self.outcomes.len();

        info!(
            run_id = %run_id,
            scenario = %scenario,
            targets = targets.len(),
            payloads = payloads.len(),
            "Run started"
        );

        let mut aborted = None;
        for target in targets {
            if let Err(e) = self.fuzz_target(target, payloads, 0).await {
                error!(run_id = %run_id, error = %e, "Run aborted");
                aborted = Some(e.to_string());
                break;
            }
        }

        let run = FuzzRun {
            run_id,
            scenario,
            started_at,
            finished_at: now_millis(),
            outcomes: self.outcomes.drain(first..).collect(),
            aborted,
        };

        let summary = run.summary();
        info!(
            run_id = %run.run_id,
            total = summary.total,
            recorded = summary.recorded,
            failed = summary.failed,
            anomalous = summary.anomalous,
            "Run finished"
        );
        run
    }

    // ------------------------------------------------------------------------
    // Attempts
    // ------------------------------------------------------------------------

    /// Runs one attempt and records its outcome.
    ///
    /// Only session failures are returned.
    async fn attempt(
        &mut self,
        target: &FuzzTarget,
        payload_index: usize,
        payload: &str,
        action: Action,
    ) -> Result<()> {
        let mut attempt = Attempt::new(target, payload_index, payload, action);

        let result = self.drive(&mut attempt).await;
        self.nav.reset_to_root(&mut self.session).await;

        match result {
            Ok(()) => {
                attempt.advance(AttemptState::Recorded);
                let outcome = attempt.finish(TerminalStatus::Recorded);
                if outcome.is_anomalous() {
                    warn!(
                        element = %outcome.element.label(),
                        payload_index,
                        reasons = ?outcome.report.as_ref().map(|r| &r.anomaly_reasons),
                        "Anomaly detected"
                    );
                } else {
                    debug!(element = %outcome.element.label(), payload_index, "Outcome recorded");
                }
                self.outcomes.push(outcome);
                Ok(())
            }
            Err(e) => {
                let stage = attempt.state;
                if let Some(attempts) = e.attempts() {
                    attempt.retry_count = attempts.saturating_sub(1);
                }
                let last_action = attempt.describe_action();
                attempt.advance(AttemptState::Failed);

                warn!(
                    stage = ?stage,
                    action = %last_action,
                    payload_index,
                    error = %e,
                    "Attempt failed"
                );

                let fatal = e.is_session_fatal();
                self.outcomes.push(attempt.finish(TerminalStatus::Failed {
                    stage,
                    error: e.to_string(),
                    last_action,
                }));

                if fatal {
                    Err(e)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Walks the attempt through its non-terminal states.
    ///
    /// On error `attempt.state` is the state that failed.
    async fn drive(&mut self, attempt: &mut Attempt<'_>) -> Result<()> {
        let target = attempt.target;

        attempt.advance(AttemptState::SnapshotPre);
        self.nav.reset_to_root(&mut self.session).await;
        let pre = Arc::new(self.snapshots.capture(&mut self.session).await?);
        attempt.pre = Some(Arc::clone(&pre));

        attempt.advance(AttemptState::Interacting);
        if target.reveal_hidden && !target.element.visible {
            let method = self
                .driver
                .reveal(&mut self.nav, &mut self.session, &target.element)
                .await?;
            attempt.revealed = Some(method);
        }
        let outcome = self
            .driver
            .interact(&mut self.nav, &mut self.session, &target.element, &attempt.action)
            .await?;
        attempt.retry_count = outcome.attempts.saturating_sub(1);
        attempt.navigated = outcome.navigated;

        sleep(self.config.interaction_delay()).await;

        attempt.advance(AttemptState::SnapshotPost);
        let post = Arc::new(self.snapshots.capture(&mut self.session).await?);
        attempt.post = Some(Arc::clone(&post));

        attempt.advance(AttemptState::Diffing);
        let report = self
            .detector
            .diff(&pre, &post, target.expect_navigation)?;

        if report.is_anomalous && self.config.capture_screenshots {
            match self.session.screenshot().await {
                Ok(png) => attempt.screenshot = Some(png),
                Err(e) => warn!(error = %e, "Screenshot failed"),
            }
        }

        attempt.report = Some(report);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::error::Error;
    use crate::fuzz::frames::FramePath;
    use crate::fuzz::inventory::ElementRole;
    use crate::session::memory::{Effect, FailureKind};
    use crate::session::{Locator, MemoryElement, MemoryFrame, MemoryPage};

    fn config() -> FuzzConfig {
        FuzzConfig::new()
            .with_interaction_delay(Duration::ZERO)
            .with_retry_bound(2)
    }

    fn record(id: &str, role: ElementRole) -> ElementRecord {
        ElementRecord {
            locator: Locator::id(id),
            frame_path: FramePath::root(),
            role,
            display_name: Some(id.to_string()),
            visible: true,
        }
    }

    fn page() -> MemoryPage {
        MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root()
                .element(MemoryElement::text_input("q"))
                .element(MemoryElement::button("go")),
        )
        .on_value("q", "<script>", Effect::script_error("Unexpected token '<'"))
        .on_click("go", Effect::navigate("https://example.test/next"))
    }

    #[tokio::test]
    async fn test_one_outcome_per_payload() {
        let mut orchestrator = FuzzOrchestrator::new(page(), config()).unwrap();
        let target = FuzzTarget::new(record("q", ElementRole::TextInput));

        let count = orchestrator
            .fuzz_target(&target, &PayloadList::default_set(), 0)
            .await
            .unwrap();

        assert_eq!(count, 4);
        let outcomes = orchestrator.outcomes();
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(OutcomeRecord::is_recorded));
        let indices: Vec<_> = outcomes.iter().map(|o| o.payload_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);

        let anomalous: Vec<_> = outcomes.iter().filter(|o| o.is_anomalous()).collect();
        assert_eq!(anomalous.len(), 1);
        assert_eq!(anomalous[0].payload, "<script>alert('XSS')</script>");
        assert!(anomalous[0].screenshot.is_some());
    }

    #[tokio::test]
    async fn test_restart_from_index() {
        let mut orchestrator = FuzzOrchestrator::new(page(), config()).unwrap();
        let target = FuzzTarget::new(record("q", ElementRole::TextInput));

        orchestrator
            .fuzz_target(&target, &PayloadList::default_set(), 3)
            .await
            .unwrap();

        assert_eq!(orchestrator.outcomes().len(), 1);
        assert_eq!(orchestrator.outcomes()[0].payload, "' OR 1=1 --");
    }

    #[tokio::test]
    async fn test_report_uses_own_snapshots() {
        let mut orchestrator = FuzzOrchestrator::new(page(), config()).unwrap();
        let target = FuzzTarget::new(record("q", ElementRole::TextInput));
        orchestrator
            .fuzz_target(&target, &PayloadList::default_set(), 0)
            .await
            .unwrap();

        let detector = ChangeDetector::default();
        for outcome in orchestrator.outcomes() {
            let (Some(pre), Some(post)) = (&outcome.pre, &outcome.post) else {
                panic!("recorded outcome without snapshots");
            };
            let again = detector.diff(pre, post, false).unwrap();
            assert_eq!(Some(&again), outcome.report.as_ref());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempt_continues_with_next_payload() {
        let mut page = page();
        page.fail_interactions("q", 2, FailureKind::Stale);
        let mut orchestrator = FuzzOrchestrator::new(page, config()).unwrap();
        let target = FuzzTarget::new(record("q", ElementRole::TextInput));

        orchestrator
            .fuzz_target(&target, &PayloadList::new(["a", "b"]), 0)
            .await
            .unwrap();

        let outcomes = orchestrator.outcomes();
        assert_eq!(outcomes.len(), 2);
        match &outcomes[0].status {
            TerminalStatus::Failed { stage, last_action, .. } => {
                assert_eq!(*stage, AttemptState::Interacting);
                assert_eq!(last_action, "setValue \"a\" on q");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(outcomes[0].retry_count, 1);
        assert!(outcomes[0].pre.is_some());
        assert!(outcomes[0].report.is_none());
        assert!(outcomes[1].is_recorded());
    }

    #[tokio::test]
    async fn test_click_navigation_expectation() {
        let mut orchestrator = FuzzOrchestrator::new(page(), config()).unwrap();
        let target = FuzzTarget::new(record("go", ElementRole::Button)).expect_navigation(true);

        orchestrator
            .fuzz_target(&target, &PayloadList::new(["ignored"]), 0)
            .await
            .unwrap();

        let outcome = &orchestrator.outcomes()[0];
        assert_eq!(outcome.action, Action::Click);
        assert!(outcome.navigated);
        assert!(!outcome.is_anomalous());
    }

    #[tokio::test]
    async fn test_disconnect_records_then_aborts() {
        // the session drops while the second payload is being applied
        let page = page().on_value("q", "1234", Effect::Disconnect);
        let mut orchestrator = FuzzOrchestrator::new(page, config()).unwrap();
        let targets = [FuzzTarget::new(record("q", ElementRole::TextInput))];

        let run = orchestrator
            .run("run-1", "signup", &targets, &PayloadList::default_set())
            .await;

        assert!(run.is_aborted());
        assert_eq!(run.outcomes.len(), 2);
        assert!(matches!(
            run.outcomes[1].status,
            TerminalStatus::Failed { stage: AttemptState::Interacting, .. }
        ));
        assert_eq!(run.summary().failed, 1);
        assert!(orchestrator.outcomes().is_empty());
    }

    #[tokio::test]
    async fn test_pre_capture_failure_fails_attempt_only() {
        let mut orchestrator = FuzzOrchestrator::new(page(), config()).unwrap();
        orchestrator.session_mut().fail_next_capture();
        let targets = [FuzzTarget::new(record("q", ElementRole::TextInput))];

        let run = orchestrator
            .run("run-1", "signup", &targets, &PayloadList::new(["a", "b"]))
            .await;

        assert!(!run.is_aborted());
        assert_eq!(run.outcomes.len(), 2);
        assert!(matches!(
            run.outcomes[0].status,
            TerminalStatus::Failed { stage: AttemptState::SnapshotPre, .. }
        ));
        assert!(run.outcomes[0].pre.is_none());
        assert!(run.outcomes[0].report.is_none());
        assert!(run.outcomes[1].is_recorded());
        assert_eq!(run.summary().failed, 1);
    }

    #[tokio::test]
    async fn test_post_capture_failure_fails_attempt_only() {
        let mut orchestrator = FuzzOrchestrator::new(page(), config()).unwrap();
        orchestrator.session_mut().fail_capture_after(1);
        let targets = [FuzzTarget::new(record("q", ElementRole::TextInput))];

        let run = orchestrator
            .run("run-1", "signup", &targets, &PayloadList::new(["a", "b"]))
            .await;

        assert!(!run.is_aborted());
        assert_eq!(run.outcomes.len(), 2);
        match &run.outcomes[0].status {
            TerminalStatus::Failed { stage, error, .. } => {
                assert_eq!(*stage, AttemptState::SnapshotPost);
                assert!(error.contains("document is unavailable"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(run.outcomes[0].pre.is_some());
        assert!(run.outcomes[0].post.is_none());
        assert!(run.outcomes[1].is_recorded());
    }

    #[test]
    fn test_rejects_overflowing_delay() {
        let config = FuzzConfig {
            interaction_delay_seconds: 1e20,
            ..config()
        };
        let err = FuzzOrchestrator::new(page(), config).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_dropdown_sweep() {
        let page = MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root().element(MemoryElement::dropdown("c", ["de", "fr", "it"])),
        );
        let mut orchestrator = FuzzOrchestrator::new(page, config()).unwrap();
        let target = FuzzTarget::new(record("c", ElementRole::Dropdown));

        let count = orchestrator.fuzz_dropdown_options(&target).await.unwrap();

        assert_eq!(count, 3);
        let payloads: Vec<_> = orchestrator.outcomes().iter().map(|o| o.payload.as_str()).collect();
        assert_eq!(payloads, vec!["de", "fr", "it"]);
        assert_eq!(orchestrator.session().value_of("c"), Some("it"));
    }

    #[tokio::test]
    async fn test_reveal_hidden_target() {
        let page = MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root().element(MemoryElement::text_input("s").behind_trigger()),
        );
        let mut orchestrator = FuzzOrchestrator::new(page, config()).unwrap();
        let mut element = record("s", ElementRole::TextInput);
        element.visible = false;
        let target = FuzzTarget::new(element).reveal_hidden(true);

        orchestrator
            .fuzz_target(&target, &PayloadList::new(["x"]), 0)
            .await
            .unwrap();

        let outcome = &orchestrator.outcomes()[0];
        assert!(outcome.is_recorded());
        assert_eq!(outcome.revealed, Some(RevealMethod::Trigger));
        assert!(outcome.report.as_ref().is_some_and(|r| r.dom.changed));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let err = FuzzOrchestrator::new(page(), FuzzConfig::new().with_retry_bound(0)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_outcome_serialization_skips_screenshot() {
        let target = FuzzTarget::new(record("q", ElementRole::TextInput));
        let outcome = Attempt::new(&target, 0, "x", Action::SetValue("x".into()))
            .finish(TerminalStatus::Recorded);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"]["status"], "recorded");
        assert!(json.get("screenshot").is_none());
        assert_eq!(json["action"]["kind"], "setValue");
        assert!(AttemptState::Recorded.is_terminal());
        assert!(!AttemptState::Diffing.is_terminal());
    }
}
