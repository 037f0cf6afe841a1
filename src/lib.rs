//! Page Fuzzer - Frame-aware discovery, interaction and change detection.
//!
//! This library explores the interactive surface of a web page: it finds
//! input controls across the page and its nested iframes (hidden ones
//! included), drives each with an ordered list of payloads, and flags
//! anomalous page behaviour by comparing page state captured before and
//! after every interaction.
//!
//! # Architecture
//!
//! The engine talks to the browser through one trait:
//!
//! - **Session** ([`Session`]): one page with a single frame cursor and
//!   append-only console/error logs. [`CdpSession`] drives Chromium over the
//!   DevTools protocol; [`MemoryPage`] is a scripted in-memory page.
//! - **Engine** ([`fuzz`]): frame navigator, inventory builder, interaction
//!   driver, snapshot engine and change detector, composed by the
//!   [`FuzzOrchestrator`].
//!
//! Key design principles:
//!
//! - Elements are descriptors (locator + frame path), re-resolved before each use
//! - One session is exclusively borrowed by one operation at a time
//! - Every (element, payload) attempt yields exactly one [`OutcomeRecord`]
//! - Console and error logs are drained once per snapshot
//!
//! # Quick Start
//!
//! ```no_run
//! use page_fuzzer::{CdpSession, FuzzConfig, FuzzOrchestrator, FuzzTarget, PayloadList, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = FuzzConfig::new().with_retry_bound(3);
//!
//!     // Attach to a page target of an already running browser
//!     let mut session =
//!         CdpSession::connect("ws://127.0.0.1:9222/devtools/page/ABC", &config).await?;
//!     session.navigate("https://shop.test/signup").await?;
//!
//!     let mut orchestrator = FuzzOrchestrator::new(session, config)?;
//!     let inventory = orchestrator.build_inventory().await?;
//!     for line in inventory.describe() {
//!         println!("{line}");
//!     }
//!
//!     let targets: Vec<_> = inventory
//!         .select(&[0, 1])
//!         .into_iter()
//!         .map(FuzzTarget::new)
//!         .collect();
//!     let run = orchestrator
//!         .run("run-1", "signup", &targets, &PayloadList::default_set())
//!         .await;
//!
//!     println!("{:?}", run.summary());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Engine configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`fuzz`] | Discovery, interaction and change detection |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | DevTools message types (internal) |
//! | [`session`] | Session trait and backends |
//! | [`transport`] | WebSocket transport layer (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Engine configuration.
///
/// Use [`FuzzConfig::new()`] or deserialise a JSON record.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Discovery, interaction and change detection engine.
///
/// - [`FuzzOrchestrator`] - Control loop over elements and payloads
/// - [`Inventory`] - Frame-aware element inventory
/// - [`ChangeReport`] - Classified snapshot difference
pub mod fuzz;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// DevTools protocol message types.
///
/// Internal module defining command/response/event structures.
pub mod protocol;

/// Automation sessions.
///
/// The [`Session`] trait and its DevTools and in-memory backends.
pub mod session;

/// WebSocket transport layer.
///
/// Internal module handling the DevTools connection.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{FuzzConfig, RetryPolicy};

// Error types
pub use error::{Error, Result};

// Engine types
pub use fuzz::{
    AnomalyReason, AttemptState, ChangeDetector, ChangeReport, DomDelta, ElementRecord,
    ElementRole, FrameNavigator, FramePath, FuzzOrchestrator, FuzzRun, FuzzTarget,
    InteractionDriver, InteractionOutcome, Inventory, InventoryBuilder, OutcomeRecord,
    PayloadList, RunSummary, Snapshot, SnapshotEngine, TerminalStatus,
};

// Identifier types
pub use identifiers::{FrameId, RequestId, SessionId, SnapshotId};

// Session types
pub use session::{
    Action, CdpSession, ConsoleEntry, DiscoveredElement, JsErrorEntry, Locator, LogLevel,
    MemoryPage, RevealMethod, Session,
};
