//! Event message types.
//!
//! Events are notifications pushed by the browser without a request `id`.
//!
//! # Event Types
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Runtime` | `consoleAPICalled`, `exceptionThrown`, `executionContextCreated`, `executionContextDestroyed`, `executionContextsCleared` |
//! | `Log` | `entryAdded` |
//! | `Page` | `frameStartedLoading`, `frameNavigated`, `frameStoppedLoading` |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Event
// ============================================================================

/// An event notification from the browser.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Returns the domain name from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = Event { method: "Runtime.exceptionThrown".into(), .. };
    /// assert_eq!(event.domain(), "Runtime");
    /// ```
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        self.parse_internal()
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// `console.*` call in some frame.
    ConsoleApiCalled {
        /// Console method (`log`, `warning`, `error`, ...).
        level: String,
        /// Stringified arguments joined with a space.
        text: String,
        /// Milliseconds since the epoch.
        timestamp: f64,
    },

    /// Browser-level log entry (network failures, violations, ...).
    LogEntryAdded {
        /// Entry level (`verbose`, `info`, `warning`, `error`).
        level: String,
        /// Entry text.
        text: String,
        /// Milliseconds since the epoch.
        timestamp: f64,
    },

    /// Uncaught exception or unhandled rejection.
    ExceptionThrown {
        /// Exception description.
        message: String,
        /// Script URL, if known.
        url: Option<String>,
        /// Zero-based line number, if known.
        line: Option<u32>,
        /// Milliseconds since the epoch.
        timestamp: f64,
    },

    /// A new JavaScript execution context.
    ExecutionContextCreated {
        /// Context ID used with `Runtime.evaluate`.
        context_id: i64,
        /// Owning frame.
        frame_id: String,
        /// `true` for the frame's main world.
        is_default: bool,
    },

    /// An execution context went away.
    ExecutionContextDestroyed {
        /// Context ID.
        context_id: i64,
    },

    /// Every execution context was discarded (top-level navigation).
    ExecutionContextsCleared,

    /// A frame started loading a new document.
    FrameStartedLoading {
        /// Loading frame.
        frame_id: String,
    },

    /// A frame finished loading.
    FrameStoppedLoading {
        /// Loaded frame.
        frame_id: String,
    },

    /// A frame committed a navigation.
    FrameNavigated {
        /// Navigated frame.
        frame_id: String,
        /// Parent frame; `None` for the main frame.
        parent_id: Option<String>,
        /// New document URL.
        url: String,
    },

    /// Unknown event type.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Event Parsing Implementation
// ============================================================================

impl Event {
    /// Internal parsing implementation.
    fn parse_internal(&self) -> ParsedEvent {
        let params = &self.params;

        match self.method.as_str() {
            "Runtime.consoleAPICalled" => ParsedEvent::ConsoleApiCalled {
                level: str_or(&params["type"], "log"),
                text: params["args"]
                    .as_array()
                    .map(|args| {
                        args.iter()
                            .map(remote_object_text)
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .unwrap_or_default(),
                timestamp: params["timestamp"].as_f64().unwrap_or_default(),
            },

            "Log.entryAdded" => {
                let entry = &params["entry"];
                ParsedEvent::LogEntryAdded {
                    level: str_or(&entry["level"], "info"),
                    text: str_or(&entry["text"], ""),
                    timestamp: entry["timestamp"].as_f64().unwrap_or_default(),
                }
            }

            "Runtime.exceptionThrown" => {
                let details = &params["exceptionDetails"];
                let message = details["exception"]["description"]
                    .as_str()
                    .or_else(|| details["text"].as_str())
                    .unwrap_or("Uncaught exception")
                    .to_string();

                ParsedEvent::ExceptionThrown {
                    message,
                    url: details["url"]
                        .as_str()
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                    line: details["lineNumber"]
                        .as_u64()
                        .and_then(|n| u32::try_from(n).ok()),
                    timestamp: params["timestamp"].as_f64().unwrap_or_default(),
                }
            }

            "Runtime.executionContextCreated" => {
                let context = &params["context"];
                ParsedEvent::ExecutionContextCreated {
                    context_id: context["id"].as_i64().unwrap_or_default(),
                    frame_id: str_or(&context["auxData"]["frameId"], ""),
                    is_default: context["auxData"]["isDefault"]
                        .as_bool()
                        .unwrap_or_default(),
                }
            }

            "Runtime.executionContextDestroyed" => ParsedEvent::ExecutionContextDestroyed {
                context_id: params["executionContextId"].as_i64().unwrap_or_default(),
            },

            "Runtime.executionContextsCleared" => ParsedEvent::ExecutionContextsCleared,

            "Page.frameStartedLoading" => ParsedEvent::FrameStartedLoading {
                frame_id: str_or(&params["frameId"], ""),
            },

            "Page.frameStoppedLoading" => ParsedEvent::FrameStoppedLoading {
                frame_id: str_or(&params["frameId"], ""),
            },

            "Page.frameNavigated" => {
                let frame = &params["frame"];
                ParsedEvent::FrameNavigated {
                    frame_id: str_or(&frame["id"], ""),
                    parent_id: frame["parentId"].as_str().map(str::to_string),
                    url: str_or(&frame["url"], ""),
                }
            }

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }
}

/// Gets a string or falls back to a default.
#[inline]
fn str_or(value: &Value, default: &str) -> String {
    value.as_str().unwrap_or(default).to_string()
}

/// Renders a `Runtime.RemoteObject` argument as text.
fn remote_object_text(arg: &Value) -> String {
    match arg.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => str_or(&arg["description"], ""),
    }
}

// ============================================================================
// Tests
// ============================================================================
