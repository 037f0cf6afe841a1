//! Request and Response message types.
//!
//! DevTools uses JSON-RPC style messages correlated by an integer `id`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::Command;

// ============================================================================
// Request
// ============================================================================

/// A command request sent to the browser.
///
/// # Format
///
/// ```json
/// {
///   "id": 12,
///   "method": "Domain.methodName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a new request with an auto-allocated ID.
    #[inline]
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            id: RequestId::next(),
            command,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// Error object of a failed command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseError {
    /// Protocol error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional extra detail.
    #[serde(default)]
    pub data: Option<String>,
}

/// A response from the browser.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 12, "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 12, "error": { "code": -32000, "message": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object (if failure).
    #[serde(default)]
    pub error: Option<ResponseError>,
}

impl Response {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Extracts the result value, returning an error if the command failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cdp`] carrying the browser's error code and message.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            None => Ok(self.result.unwrap_or(Value::Null)),
            Some(err) => {
                let message = match err.data {
                    Some(data) => format!("{} ({data})", err.message),
                    None => err.message,
                };
                Err(Error::cdp(err.code, message))
            }
        }
    }

    /// Gets a string value from the result.
    ///
    /// Returns empty string if key not found or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
