//! Automation session abstraction.
//!
//! The engine talks to a browser only through the [`Session`] trait. A session
//! is a single stateful resource with one "current frame" cursor and
//! append-only console and error logs, so every operation takes `&mut self`:
//! the borrow checker serialises frame switches, interactions and captures
//! against one session, while separate sessions run independently.
//!
//! # Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | [`CdpSession`] | Chromium page target over the DevTools protocol |
//! | [`MemoryPage`] | Scripted in-memory page for tests and dry runs |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `cdp` | DevTools backend |
//! | `locator` | Element locators |
//! | `memory` | In-memory backend |
//! | `scripts` | Page scripts used by the DevTools backend |

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifiers::{FrameId, SessionId};

// ============================================================================
// Submodules
// ============================================================================

/// DevTools protocol backend.
pub mod cdp;

/// Element locator strategies.
pub mod locator;

/// In-memory page backend.
pub mod memory;

/// Page scripts.
mod scripts;

// ============================================================================
// Re-exports
// ============================================================================

pub use cdp::CdpSession;
pub use locator::Locator;
pub use memory::{MemoryElement, MemoryFrame, MemoryPage};

// ============================================================================
// Session Trait
// ============================================================================

/// A live browser automation session.
///
/// Element and frame operations act on the current frame context, which
/// starts at the top document and is moved with
/// [`switch_to_root`](Self::switch_to_root) and
/// [`switch_to_child_frame`](Self::switch_to_child_frame).
#[async_trait]
pub trait Session: Send {
    /// Identity carried by every snapshot taken from this session.
    fn id(&self) -> SessionId;

    /// Returns the frame context to the top document.
    async fn switch_to_root(&mut self) -> Result<()>;

    /// Enters a direct child frame of the current context.
    ///
    /// # Errors
    ///
    /// - [`Error::FrameNotFound`](crate::Error::FrameNotFound) if no such child exists
    /// - [`Error::FrameInaccessible`](crate::Error::FrameInaccessible) if it exists but
    ///   its document cannot be scripted
    async fn switch_to_child_frame(&mut self, frame: &FrameId) -> Result<()>;

    /// Direct child frames of the current context, in document order.
    async fn child_frames(&mut self) -> Result<Vec<FrameId>>;

    /// Candidate controls of the current document, in document order.
    async fn discover(&mut self) -> Result<Vec<DiscoveredElement>>;

    /// Resolves `locator` in the current document and applies `action`.
    async fn apply(&mut self, locator: &Locator, action: &Action) -> Result<()>;

    /// Option values of a dropdown in the current document.
    async fn dropdown_options(&mut self, locator: &Locator) -> Result<Vec<String>>;

    /// Makes a hidden element visible.
    async fn reveal(&mut self, locator: &Locator) -> Result<RevealMethod>;

    /// URL of the top-level document, regardless of frame context.
    async fn current_url(&mut self) -> Result<String>;

    /// Serialised markup of the current document.
    async fn page_source(&mut self) -> Result<String>;

    /// Console entries with log index `from` and later.
    ///
    /// Indices are absolute and stable. A backend may discard entries below
    /// `from`, so callers read with a non-decreasing index.
    async fn console_entries(&mut self, from: usize) -> Result<Vec<ConsoleEntry>>;

    /// JavaScript errors with log index `from` and later; same indexing as
    /// [`console_entries`](Self::console_entries).
    async fn js_errors(&mut self, from: usize) -> Result<Vec<JsErrorEntry>>;

    /// PNG screenshot of the viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>>;
}

// ============================================================================
// DiscoveredElement
// ============================================================================

/// A candidate control as reported by [`Session::discover`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredElement {
    /// Re-resolvable locator within the owning document.
    pub locator: Locator,
    /// Lowercase tag name.
    pub tag: String,
    /// Lowercase `type` attribute of `<input>` elements.
    #[serde(default)]
    pub input_type: Option<String>,
    /// `id` attribute.
    #[serde(default)]
    pub id: Option<String>,
    /// `name` attribute.
    #[serde(default)]
    pub name: Option<String>,
    /// `placeholder` attribute.
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Label, `aria-label` or visible text.
    #[serde(default)]
    pub label: Option<String>,
    /// Editable non-form element.
    #[serde(default)]
    pub content_editable: bool,
    /// Rendered at discovery time.
    pub visible: bool,
}

impl DiscoveredElement {
    /// Best-effort human-readable name.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        [&self.label, &self.name, &self.placeholder, &self.id]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

// ============================================================================
// Action
// ============================================================================

/// An operation applied to one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Action {
    /// Clear the field, type the value, fire `input`/`change`, press Tab and Enter.
    SetValue(String),
    /// Select the dropdown option whose value or text matches.
    SelectOption(String),
    /// Scroll into view and click.
    Click,
}

impl Action {
    /// Short name for logs and failure context; same as the serialised `kind`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetValue(_) => "setValue",
            Self::SelectOption(_) => "selectOption",
            Self::Click => "click",
        }
    }

    /// Text carried by the action, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::SetValue(v) | Self::SelectOption(v) => Some(v),
            Self::Click => None,
        }
    }
}

// ============================================================================
// RevealMethod
// ============================================================================

/// How a hidden element was made visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevealMethod {
    /// Nothing to do.
    AlreadyVisible,
    /// A visible control in the surrounding form field was clicked.
    Trigger,
    /// Display styles were forced.
    Style,
}

// ============================================================================
// Log Entries
// ============================================================================

/// Console message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// `console.debug`, verbose browser logs.
    Debug,
    /// `console.log`.
    Log,
    /// `console.info`.
    Info,
    /// `console.warn`.
    #[serde(alias = "warn")]
    Warning,
    /// `console.error`, `console.assert`.
    Error,
}

impl LogLevel {
    /// Maps a DevTools console type or log level.
    #[must_use]
    pub fn from_cdp(level: &str) -> Self {
        match level {
            "debug" | "verbose" | "trace" => Self::Debug,
            "info" => Self::Info,
            "warning" | "warn" => Self::Warning,
            "error" | "assert" => Self::Error,
            _ => Self::Log,
        }
    }
}

/// One console or browser log message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: f64,
}

impl ConsoleEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: now_millis(),
        }
    }
}

/// One uncaught JavaScript error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsErrorEntry {
    /// Error message.
    pub message: String,
    /// Script URL, if known.
    #[serde(default)]
    pub source: Option<String>,
    /// Line number, if known.
    #[serde(default)]
    pub line: Option<u32>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: f64,
}

impl JsErrorEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            line: None,
            timestamp: now_millis(),
        }
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================
