//! WebSocket transport layer.
//!
//! This module handles communication between the engine and a Chromium page
//! target over the DevTools WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  CdpSession     │                              │  Chromium       │
//! │                 │         WebSocket            │  page target    │
//! │  Connection     │◄────────────────────────────►│                 │
//! │  (event loop)   │   ws://host/devtools/page/…  │  DevTools       │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::connect` - WebSocket handshake with the target
//! 2. `Connection::set_event_handler` - Route events into session state
//! 3. `Connection::send` - Send commands, receive correlated responses
//! 4. `Connection::shutdown` - Close the socket and fail pending requests
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, DEFAULT_COMMAND_TIMEOUT, EventHandler};
