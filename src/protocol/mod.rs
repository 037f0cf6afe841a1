//! DevTools protocol message types.
//!
//! This module defines the JSON messages exchanged with a Chromium page target
//! over its DevTools WebSocket.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Browser | Command request |
//! | `Response` | Browser → Local | Command result or error |
//! | `Event` | Browser → Local | Domain notification |
//!
//! # Command Naming
//!
//! Commands follow `Domain.methodName` format:
//!
//! - `Page.getFrameTree`
//! - `Runtime.evaluate`
//! - `Page.captureScreenshot`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions |
//! | `event` | Event types and typed parsing |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::Command;
pub use event::{Event, ParsedEvent};
pub use request::{Request, Response, ResponseError};
