//! Error types for the fuzzing engine.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use page_fuzzer::{Error, Result};
//!
//! async fn example(orchestrator: &mut FuzzOrchestrator<CdpSession>) -> Result<()> {
//!     let inventory = orchestrator.build_inventory().await?;
//!     if inventory.is_partial() {
//!         tracing::warn!("some frames could not be inspected");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Session | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::RequestTimeout`], [`Error::Cdp`], [`Error::Protocol`] |
//! | Frames | [`Error::FrameNotFound`], [`Error::FrameInaccessible`] |
//! | Elements | [`Error::ElementNotFound`], [`Error::StaleElement`], [`Error::ElementNotInteractable`] |
//! | Engine | [`Error::InteractionFailed`], [`Error::CaptureFailed`], [`Error::IncomparableSnapshots`] |
//! | Execution | [`Error::ScriptError`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`], [`Error::Base64`] |
//!
//! A partial inventory is not an error: see
//! [`Inventory::is_partial`](crate::fuzz::Inventory::is_partial).

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{FrameId, RequestId, SessionId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a [`FuzzConfig`](crate::FuzzConfig) fails validation.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Connection to the automation endpoint failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed; the session is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Command request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The DevTools endpoint answered with an error object.
    #[error("DevTools error {code}: {message}")]
    Cdp {
        /// Protocol error code.
        code: i64,
        /// Protocol error message.
        message: String,
    },

    /// Protocol violation or unexpected response shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Frame Errors
    // ========================================================================
    /// A frame in a path no longer resolves.
    ///
    /// Recoverable by rebuilding the inventory.
    #[error("Frame not found: {frame_id}")]
    FrameNotFound {
        /// The missing frame ID.
        frame_id: FrameId,
    },

    /// A frame exists but its document cannot be accessed.
    ///
    /// Typically a cross-origin frame or one that has not finished loading.
    #[error("Frame inaccessible: {frame_id} ({reason})")]
    FrameInaccessible {
        /// The frame that could not be entered.
        frame_id: FrameId,
        /// Why access was refused.
        reason: String,
    },

    // ========================================================================
    // Element Errors
    // ========================================================================
    /// Locator matched nothing in the current frame.
    #[error("Element not found: {locator}")]
    ElementNotFound {
        /// Locator that failed to resolve.
        locator: String,
    },

    /// Element resolved but is detached from the document.
    #[error("Stale element: {locator}")]
    StaleElement {
        /// Locator of the stale element.
        locator: String,
    },

    /// Element resolved but cannot receive the action yet.
    #[error("Element not interactable: {locator} ({reason})")]
    ElementNotInteractable {
        /// Locator of the element.
        locator: String,
        /// Why the element refused the action.
        reason: String,
    },

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// Interaction retries exhausted.
    #[error("Interaction failed after {attempts} attempt(s): {source}")]
    InteractionFailed {
        /// Attempts made, including the last one.
        attempts: u32,
        /// Last underlying cause.
        source: Box<Error>,
    },

    /// Snapshot capture failed.
    #[error("Capture failed while reading {stage}: {source}")]
    CaptureFailed {
        /// Part of the page state that could not be read.
        stage: &'static str,
        /// Underlying cause.
        source: Box<Error>,
    },

    /// Snapshots from different sessions were compared.
    #[error("Snapshots are not comparable: session {pre} vs session {post}")]
    IncomparableSnapshots {
        /// Session of the pre-snapshot.
        pre: SessionId,
        /// Session of the post-snapshot.
        post: SessionId,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// JavaScript evaluation threw or returned an unusable value.
    #[error("Script error: {message}")]
    ScriptError {
        /// Error message from script execution.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Endpoint URL could not be parsed.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Base64 payload could not be decoded.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a DevTools error.
    #[inline]
    pub fn cdp(code: i64, message: impl Into<String>) -> Self {
        Self::Cdp {
            code,
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a frame not found error.
    #[inline]
    pub fn frame_not_found(frame_id: FrameId) -> Self {
        Self::FrameNotFound { frame_id }
    }

    /// Creates a frame inaccessible error.
    #[inline]
    pub fn frame_inaccessible(frame_id: FrameId, reason: impl Into<String>) -> Self {
        Self::FrameInaccessible {
            frame_id,
            reason: reason.into(),
        }
    }

    /// Creates an element not found error.
    #[inline]
    pub fn element_not_found(locator: impl ToString) -> Self {
        Self::ElementNotFound {
            locator: locator.to_string(),
        }
    }

    /// Creates a stale element error.
    #[inline]
    pub fn stale_element(locator: impl ToString) -> Self {
        Self::StaleElement {
            locator: locator.to_string(),
        }
    }

    /// Creates an element not interactable error.
    #[inline]
    pub fn not_interactable(locator: impl ToString, reason: impl Into<String>) -> Self {
        Self::ElementNotInteractable {
            locator: locator.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an interaction failed error wrapping the last cause.
    #[inline]
    pub fn interaction_failed(attempts: u32, source: Error) -> Self {
        Self::InteractionFailed {
            attempts,
            source: Box::new(source),
        }
    }

    /// Creates a capture failed error for one part of the page state.
    #[inline]
    pub fn capture_failed(stage: &'static str, source: Error) -> Self {
        Self::CaptureFailed {
            stage,
            source: Box::new(source),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is an element resolution error.
    #[inline]
    #[must_use]
    pub fn is_element_error(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. }
                | Self::StaleElement { .. }
                | Self::ElementNotInteractable { .. }
        )
    }

    /// Returns `true` if this is a frame resolution error.
    #[inline]
    #[must_use]
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            Self::FrameNotFound { .. } | Self::FrameInaccessible { .. }
        )
    }

    /// Returns `true` if this error may clear up on a later attempt.
    ///
    /// Covers elements that are missing, detached or not yet interactable.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_element_error()
    }

    /// Returns `true` if the automation session itself is unusable.
    ///
    /// Wrapped errors are inspected through to their cause.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::Connection { .. }
            | Self::ConnectionClosed
            | Self::WebSocket(_)
            | Self::ChannelClosed(_) => true,
            Self::InteractionFailed { source, .. } | Self::CaptureFailed { source, .. } => {
                source.is_session_fatal()
            }
            _ => false,
        }
    }

    /// Number of interaction attempts recorded in this error, if any.
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::InteractionFailed { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
