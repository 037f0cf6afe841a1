//! Command definitions.
//!
//! Only the handful of DevTools commands the session backend needs are
//! modelled. Each variant serialises to `{"method": ..., "params": {...}}`.
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Page` | enable, navigate, frame tree, screenshot, init scripts |
//! | `Runtime` | enable, evaluate |
//! | `Log` | enable |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// Command
// ============================================================================

/// DevTools commands issued by the session backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Command {
    /// Enable Page domain events.
    #[serde(rename = "Page.enable")]
    PageEnable,

    /// Navigate the top-level frame.
    #[serde(rename = "Page.navigate")]
    Navigate {
        /// URL to navigate to.
        url: String,
    },

    /// Get the frame tree of the page.
    #[serde(rename = "Page.getFrameTree")]
    GetFrameTree,

    /// Capture a screenshot of the viewport.
    #[serde(rename = "Page.captureScreenshot")]
    CaptureScreenshot {
        /// Image format (`png` or `jpeg`).
        format: String,
    },

    /// Run a script in every new document before page scripts.
    #[serde(rename = "Page.addScriptToEvaluateOnNewDocument")]
    AddScriptOnNewDocument {
        /// Script source.
        source: String,
    },

    /// Enable Runtime domain events.
    #[serde(rename = "Runtime.enable")]
    RuntimeEnable,

    /// Evaluate an expression.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// JavaScript expression.
        expression: String,

        /// Execution context (frame) to evaluate in; `None` for the top frame.
        #[serde(rename = "contextId", skip_serializing_if = "Option::is_none")]
        context_id: Option<i64>,

        /// Return the result serialised by value.
        #[serde(rename = "returnByValue")]
        return_by_value: bool,

        /// Await a returned promise.
        #[serde(rename = "awaitPromise")]
        await_promise: bool,
    },

    /// Enable Log domain events.
    #[serde(rename = "Log.enable")]
    LogEnable,
}

impl Command {
    /// Builds a by-value `Runtime.evaluate` command.
    #[inline]
    #[must_use]
    pub fn evaluate(expression: impl Into<String>, context_id: Option<i64>) -> Self {
        Self::Evaluate {
            expression: expression.into(),
            context_id,
            return_by_value: true,
            await_promise: true,
        }
    }

    /// Returns the `Domain.method` name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::PageEnable => "Page.enable",
            Self::Navigate { .. } => "Page.navigate",
            Self::GetFrameTree => "Page.getFrameTree",
            Self::CaptureScreenshot { .. } => "Page.captureScreenshot",
            Self::AddScriptOnNewDocument { .. } => "Page.addScriptToEvaluateOnNewDocument",
            Self::RuntimeEnable => "Runtime.enable",
            Self::Evaluate { .. } => "Runtime.evaluate",
            Self::LogEnable => "Log.enable",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_unit_command_serialization() {
        let value = serde_json::to_value(Command::PageEnable).unwrap();
        assert_eq!(value, json!({"method": "Page.enable"}));
    }

    #[test]
    fn test_evaluate_serialization_top_frame() {
        let value = serde_json::to_value(Command::evaluate("1 + 1", None)).unwrap();
        assert_eq!(value["method"], "Runtime.evaluate");
        assert_eq!(value["params"]["expression"], "1 + 1");
        assert_eq!(value["params"]["returnByValue"], true);
        assert!(value["params"].get("contextId").is_none());
    }

    #[test]
    fn test_evaluate_serialization_with_context() {
        let value = serde_json::to_value(Command::evaluate("document.title", Some(7))).unwrap();
        assert_eq!(value["params"]["contextId"], 7);
    }

    #[test]
    fn test_method_matches_serialized_tag() {
        for command in [
            Command::PageEnable,
            Command::GetFrameTree,
            Command::RuntimeEnable,
            Command::LogEnable,
            Command::CaptureScreenshot {
                format: "png".into(),
            },
        ] {
            let value = serde_json::to_value(&command).unwrap();
            assert_eq!(value["method"], command.method());
        }
    }
}
