//! Discovery, interaction and change detection engine.
//!
//! Components, leaves first:
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frames` | [`FramePath`] and the [`FrameNavigator`] |
//! | `inventory` | Breadth-first element discovery across frames |
//! | `interaction` | Bounded-retry element interaction |
//! | `snapshot` | Page state capture with consume-once logs |
//! | `detector` | Snapshot comparison and anomaly classification |
//! | `payload` | Ordered payload lists |
//! | `orchestrator` | Per-attempt state machine and run bookkeeping |
//!
//! Data flows downward only: the orchestrator calls the interaction driver
//! (which uses the frame navigator), the snapshot engine and the change
//! detector; the detector never touches the session.
//!
//! # Example
//!
//! ```no_run
//! use page_fuzzer::fuzz::{FuzzOrchestrator, FuzzTarget, PayloadList};
//! use page_fuzzer::{CdpSession, FuzzConfig, Result};
//!
//! # async fn example() -> Result<()> {
//! let config = FuzzConfig::new();
//! let mut session = CdpSession::connect("ws://127.0.0.1:9222/devtools/page/ABC", &config).await?;
//! session.navigate("https://shop.test/signup").await?;
//!
//! let mut orchestrator = FuzzOrchestrator::new(session, config)?;
//! let inventory = orchestrator.build_inventory().await?;
//! if inventory.is_partial() {
//!     eprintln!("some frames could not be inspected");
//! }
//!
//! let targets: Vec<_> = inventory
//!     .elements()
//!     .iter()
//!     .filter(|e| e.role.is_text_entry())
//!     .cloned()
//!     .map(FuzzTarget::new)
//!     .collect();
//!
//! let run = orchestrator
//!     .run("run-1", "signup", &targets, &PayloadList::default_set())
//!     .await;
//! println!("{:?}", run.summary());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Snapshot comparison.
pub mod detector;

/// Frame paths and navigation.
pub mod frames;

/// Element interaction with retries.
pub mod interaction;

/// Element inventory.
pub mod inventory;

/// Fuzzing control loop.
pub mod orchestrator;

/// Payload lists.
pub mod payload;

/// Page state snapshots.
pub mod snapshot;

// ============================================================================
// Re-exports
// ============================================================================

pub use detector::{AnomalyReason, ChangeDetector, ChangeReport, DomDelta};
pub use frames::{FrameNavigator, FramePath};
pub use interaction::{InteractionDriver, InteractionOutcome};
pub use inventory::{ElementRecord, ElementRole, Inventory, InventoryBuilder};
pub use orchestrator::{
    AttemptState, FuzzOrchestrator, FuzzRun, FuzzTarget, OutcomeRecord, RunSummary,
    TerminalStatus,
};
pub use payload::PayloadList;
pub use snapshot::{Snapshot, SnapshotEngine};
