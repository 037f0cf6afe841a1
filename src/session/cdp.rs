//! Chromium DevTools protocol backend.
//!
//! [`CdpSession`] drives one page target over its DevTools WebSocket.
//! Launching the browser and discovering the target URL are left to the
//! caller; any `ws://…/devtools/page/<id>` endpoint works.
//!
//! # Frame Contexts
//!
//! Every frame's main-world execution context is tracked from
//! `Runtime.executionContextCreated` / `Destroyed` / `Cleared` events.
//! Scripts run in the context of the active frame; a frame that appears in
//! the frame tree without a context (cross-origin, not yet loaded) is
//! reported as inaccessible.
//!
//! # Log Capture
//!
//! | Mode | Console source | Error source |
//! |------|----------------|--------------|
//! | `enableDevtoolsCapture` | `Runtime.consoleAPICalled`, `Log.entryAdded` | `Runtime.exceptionThrown` |
//! | default | in-page hook buffer | in-page hook buffer |
//!
//! Either way entries land in logs read by absolute index; entries below
//! the last index read are dropped.
//!
//! # Navigation
//!
//! A click or an Enter key press can start a top-level navigation that
//! commits after the action script has already returned. After every
//! [`Session::apply`] the backend watches main-frame `Page` events for a
//! short grace period and, if a load started, waits for it to finish, so
//! the next URL read sees the new document.
//!
//! # Example
//!
//! ```ignore
//! use page_fuzzer::{CdpSession, FuzzConfig};
//!
//! let config = FuzzConfig::new().with_devtools_capture(true);
//! let mut session = CdpSession::connect("ws://127.0.0.1:9222/devtools/page/ABC", &config).await?;
//! session.navigate("https://example.com/signup").await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::FuzzConfig;
use crate::error::{Error, Result};
use crate::identifiers::{FrameId, SessionId};
use crate::protocol::{Command, ParsedEvent, Request};
use crate::transport::Connection;

use super::{
    Action, ConsoleEntry, DiscoveredElement, JsErrorEntry, Locator, LogLevel, RevealMethod,
    Session, scripts,
};

// ============================================================================
// Constants
// ============================================================================

/// Poll interval while waiting for a document to finish loading.
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to watch for a navigation started by an action.
const NAVIGATION_GRACE: Duration = Duration::from_millis(250);

/// Poll interval while watching for navigation events.
const NAVIGATION_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Error messages that mean the page navigated away mid-evaluation.
const NAVIGATION_TEARDOWN: &[&str] = &[
    "Execution context was destroyed",
    "Inspected target navigated or closed",
    "Cannot find context with specified id",
];

// ============================================================================
// PageState
// ============================================================================

/// State fed by DevTools events, shared with the connection event loop.
#[derive(Debug, Default)]
struct PageState {
    /// Frame ID → main-world execution context ID.
    contexts: FxHashMap<FrameId, i64>,
    /// Console log.
    console: EntryLog<ConsoleEntry>,
    /// JavaScript error log.
    errors: EntryLog<JsErrorEntry>,
    /// Top-level frame of the page target.
    main_frame: Option<FrameId>,
    /// Main-frame load and commit events seen so far.
    navigation_events: u64,
    /// Main frame is loading a document.
    main_loading: bool,
}

impl PageState {
    fn on_event(&mut self, event: ParsedEvent, devtools_capture: bool) {
        match event {
            ParsedEvent::ExecutionContextCreated {
                context_id,
                frame_id,
                is_default: true,
            } => {
                self.contexts.insert(FrameId::new(frame_id), context_id);
            }

            ParsedEvent::ExecutionContextDestroyed { context_id } => {
                self.contexts.retain(|_, id| *id != context_id);
            }

            ParsedEvent::ExecutionContextsCleared => self.contexts.clear(),

            ParsedEvent::ConsoleApiCalled {
                level,
                text,
                timestamp,
            }
            | ParsedEvent::LogEntryAdded {
                level,
                text,
                timestamp,
            } if devtools_capture => {
                self.console.push(ConsoleEntry {
                    level: LogLevel::from_cdp(&level),
                    message: text,
                    timestamp,
                });
            }

            ParsedEvent::ExceptionThrown {
                message,
                url,
                line,
                timestamp,
            } if devtools_capture => {
                self.errors.push(JsErrorEntry {
                    message,
                    source: url,
                    line,
                    timestamp,
                });
            }

            ParsedEvent::FrameStartedLoading { frame_id } if self.is_main(&frame_id) => {
                self.navigation_events += 1;
                self.main_loading = true;
            }

            ParsedEvent::FrameStoppedLoading { frame_id } if self.is_main(&frame_id) => {
                self.main_loading = false;
            }

            ParsedEvent::FrameNavigated {
                frame_id,
                parent_id: None,
                ..
            } => {
                self.main_frame = Some(FrameId::new(frame_id));
                self.navigation_events += 1;
            }

            _ => {}
        }
    }

    fn is_main(&self, frame_id: &str) -> bool {
        self.main_frame
            .as_ref()
            .is_some_and(|main| main.as_str() == frame_id)
    }
}

// ============================================================================
// EntryLog
// ============================================================================

/// Log addressed by absolute index.
///
/// Reading from index `n` drops every entry below `n`; indices stay stable.
#[derive(Debug)]
struct EntryLog<T> {
    /// Absolute index of `entries[0]`.
    base: usize,
    entries: Vec<T>,
}

impl<T> Default for EntryLog<T> {
    fn default() -> Self {
        Self {
            base: 0,
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> EntryLog<T> {
    fn push(&mut self, entry: T) {
        self.entries.push(entry);
    }

    fn extend(&mut self, entries: impl IntoIterator<Item = T>) {
        self.entries.extend(entries);
    }

    /// Entries at absolute index `from` and later.
    fn read_from(&mut self, from: usize) -> Vec<T> {
        let consumed = from.saturating_sub(self.base).min(self.entries.len());
        self.entries.drain(..consumed);
        self.base += consumed;

        let offset = from.saturating_sub(self.base);
        self.entries.get(offset..).map(<[T]>::to_vec).unwrap_or_default()
    }
}

/// Buffers returned by the in-page hook.
#[derive(Debug, Default, Deserialize)]
struct HookBuffers {
    #[serde(default)]
    console: Vec<ConsoleEntry>,
    #[serde(default)]
    errors: Vec<JsErrorEntry>,
}

// ============================================================================
// CdpSession
// ============================================================================

/// A [`Session`] backed by a Chromium page target.
pub struct CdpSession {
    id: SessionId,
    connection: Connection,
    state: Arc<Mutex<PageState>>,
    /// `None` is the top document.
    active_frame: Option<FrameId>,
    devtools_capture: bool,
    command_timeout: Duration,
}

impl std::fmt::Debug for CdpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpSession")
            .field("id", &self.id)
            .field("active_frame", &self.active_frame)
            .field("devtools_capture", &self.devtools_capture)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// CdpSession - Construction
// ============================================================================

impl CdpSession {
    /// Connects to a page target's DevTools WebSocket URL.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] / [`Error::Config`] if the URL is not a `ws`/`wss` URL
    /// - [`Error::WebSocket`] if the handshake fails
    /// - [`Error::Cdp`] if a domain cannot be enabled
    pub async fn connect(ws_url: &str, config: &FuzzConfig) -> Result<Self> {
        let url = Url::parse(ws_url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "DevTools endpoint must be a ws:// or wss:// URL, got {}",
                url.scheme()
            )));
        }

        let connection = Connection::connect(url.as_str()).await?;
        Self::with_connection(connection, config).await
    }

    /// Builds a session on an established connection.
    ///
    /// Enables the `Page` and `Runtime` domains and sets up log capture.
    ///
    /// # Errors
    ///
    /// Returns an error if a setup command fails.
    pub async fn with_connection(connection: Connection, config: &FuzzConfig) -> Result<Self> {
        let state = Arc::new(Mutex::new(PageState::default()));
        let devtools_capture = config.enable_devtools_capture;

        // Handler first so no context event is missed while enabling Runtime
        let handler_state = Arc::clone(&state);
        connection.set_event_handler(Box::new(move |event| {
            handler_state.lock().on_event(event.parse(), devtools_capture);
        }));

        let session = Self {
            id: SessionId::next(),
            connection,
            state,
            active_frame: None,
            devtools_capture,
            command_timeout: config.command_timeout(),
        };

        session.execute(Command::PageEnable).await?;
        session.execute(Command::RuntimeEnable).await?;

        let tree = session.execute(Command::GetFrameTree).await?;
        if let Some(main) = tree["frameTree"]["frame"]["id"].as_str() {
            session.state.lock().main_frame = Some(FrameId::new(main));
        }

        if devtools_capture {
            session.execute(Command::LogEnable).await?;
        } else {
            session
                .execute(Command::AddScriptOnNewDocument {
                    source: scripts::HOOK.to_string(),
                })
                .await?;
            session.install_hook().await?;
        }

        info!(session_id = %session.id, devtools_capture, "DevTools session ready");
        Ok(session)
    }
}

// ============================================================================
// CdpSession - Page Control
// ============================================================================

impl CdpSession {
    /// Navigates the top-level document and waits for it to load.
    ///
    /// Resets the frame context to the top document.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `url` does not parse
    /// - [`Error::Protocol`] if the browser reports a navigation error
    pub async fn navigate(&mut self, url: &str) -> Result<()> {
        let url = Url::parse(url)?;
        debug!(session_id = %self.id, url = %url, "Navigating");

        self.active_frame = None;
        let result = self
            .execute(Command::Navigate {
                url: url.to_string(),
            })
            .await?;

        if let Some(error_text) = result
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            return Err(Error::protocol(format!(
                "Navigation to {url} failed: {error_text}"
            )));
        }

        self.wait_for_load().await
    }

    /// Polls `document.readyState` until the top document is complete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if loading takes longer than the command timeout.
    pub async fn wait_for_load(&self) -> Result<()> {
        let deadline = Instant::now() + self.command_timeout;

        loop {
            match self.evaluate_in(None, "document.readyState").await {
                Ok(Value::String(state)) if state == "complete" => return Ok(()),
                Err(e) if e.is_session_fatal() => return Err(e),
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(Error::protocol("Timed out waiting for page load"));
            }
            sleep(LOAD_POLL_INTERVAL).await;
        }
    }

    /// Waits for a navigation started after `seen` events to finish.
    ///
    /// Returns at once if no main-frame navigation starts within the grace
    /// period. A load that never completes is logged, not reported.
    async fn settle_navigation(&self, seen: u64) -> Result<()> {
        let grace = Instant::now() + NAVIGATION_GRACE;
        while self.navigation_events() == seen {
            if Instant::now() >= grace {
                return Ok(());
            }
            sleep(NAVIGATION_POLL_INTERVAL).await;
        }

        debug!(session_id = %self.id, "Action started a navigation");
        let deadline = Instant::now() + self.command_timeout;
        while self.main_loading() && Instant::now() < deadline {
            sleep(NAVIGATION_POLL_INTERVAL).await;
        }

        match self.wait_for_load().await {
            Err(e) if !e.is_session_fatal() => {
                warn!(session_id = %self.id, error = %e, "Navigated document did not finish loading");
                Ok(())
            }
            other => other,
        }
    }

    fn navigation_events(&self) -> u64 {
        self.state.lock().navigation_events
    }

    fn main_loading(&self) -> bool {
        self.state.lock().main_loading
    }

    /// Closes the DevTools connection.
    pub fn close(&self) {
        debug!(session_id = %self.id, "Closing DevTools session");
        self.connection.shutdown();
    }
}

// ============================================================================
// CdpSession - Internals
// ============================================================================

impl CdpSession {
    /// Sends a command and returns its result.
    async fn execute(&self, command: Command) -> Result<Value> {
        trace!(session_id = %self.id, method = command.method(), "Executing command");
        self.connection
            .send_with_timeout(Request::new(command), self.command_timeout)
            .await?
            .into_result()
    }

    /// Context of the active frame; `None` for the top document.
    fn active_context(&self) -> Result<Option<i64>> {
        match &self.active_frame {
            None => Ok(None),
            Some(frame) => self
                .state
                .lock()
                .contexts
                .get(frame)
                .copied()
                .map(Some)
                .ok_or_else(|| Error::frame_not_found(frame.clone())),
        }
    }

    /// Evaluates in the active frame.
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let context = self.active_context()?;
        match self.evaluate_in(context, expression).await {
            Err(Error::Cdp { message, .. })
                if context.is_some() && message.contains("Cannot find context") =>
            {
                let frame = self.active_frame.clone().unwrap_or_default();
                Err(Error::frame_not_found(frame))
            }
            other => other,
        }
    }

    /// Evaluates in an explicit context and returns the value.
    async fn evaluate_in(&self, context_id: Option<i64>, expression: &str) -> Result<Value> {
        let result = self
            .execute(Command::evaluate(expression, context_id))
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .or_else(|| exception.get("text").and_then(Value::as_str))
                .unwrap_or("unknown exception");
            return Err(Error::script_error(message));
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Context IDs to visit when touching every document; top document if none known.
    fn known_contexts(&self) -> Vec<Option<i64>> {
        let mut ids: Vec<i64> = self.state.lock().contexts.values().copied().collect();
        if ids.is_empty() {
            return vec![None];
        }
        ids.sort_unstable();
        ids.into_iter().map(Some).collect()
    }

    /// Installs the log hook in documents that already exist.
    async fn install_hook(&self) -> Result<()> {
        for context in self.known_contexts() {
            if let Err(e) = self.evaluate_in(context, scripts::HOOK).await {
                if e.is_session_fatal() {
                    return Err(e);
                }
                debug!(session_id = %self.id, ?context, error = %e, "Hook install skipped");
            }
        }
        Ok(())
    }

    /// Moves hook-buffered entries of every document into the logs.
    async fn pull_hook_buffers(&self) -> Result<()> {
        for context in self.known_contexts() {
            let value = match self.evaluate_in(context, scripts::DRAIN_HOOK).await {
                Ok(value) => value,
                Err(e) if e.is_session_fatal() => return Err(e),
                Err(e) => {
                    trace!(session_id = %self.id, ?context, error = %e, "Hook drain skipped");
                    continue;
                }
            };

            match serde_json::from_value::<HookBuffers>(value) {
                Ok(buffers) => {
                    let mut state = self.state.lock();
                    state.console.extend(buffers.console);
                    state.errors.extend(buffers.errors);
                }
                Err(e) => warn!(session_id = %self.id, error = %e, "Malformed hook buffer"),
            }
        }
        Ok(())
    }

    /// Evaluates an element script and checks its status.
    async fn element_script(&self, locator: &Locator, script: &str) -> Result<Value> {
        let value = self.evaluate(script).await?;
        element_status(locator, &value)?;
        Ok(value)
    }
}

// ============================================================================
// Session Implementation
// ============================================================================

#[async_trait]
impl Session for CdpSession {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn switch_to_root(&mut self) -> Result<()> {
        self.active_frame = None;
        Ok(())
    }

    async fn switch_to_child_frame(&mut self, frame: &FrameId) -> Result<()> {
        let children = self.child_frames().await?;
        if !children.contains(frame) {
            return Err(Error::frame_not_found(frame.clone()));
        }

        if !self.state.lock().contexts.contains_key(frame) {
            return Err(Error::frame_inaccessible(
                frame.clone(),
                "no script context (cross-origin or not loaded)",
            ));
        }

        debug!(session_id = %self.id, frame_id = %frame, "Switched to child frame");
        self.active_frame = Some(frame.clone());
        Ok(())
    }

    async fn child_frames(&mut self) -> Result<Vec<FrameId>> {
        let result = self.execute(Command::GetFrameTree).await?;
        let tree = result
            .get("frameTree")
            .ok_or_else(|| Error::protocol("No frameTree in response"))?;

        let node = match &self.active_frame {
            None => Some(tree),
            Some(frame) => find_frame_node(tree, frame.as_str()),
        }
        .ok_or_else(|| Error::frame_not_found(self.active_frame.clone().unwrap_or_default()))?;

        Ok(node
            .get("childFrames")
            .and_then(Value::as_array)
            .map(|children| {
                children
                    .iter()
                    .filter_map(|child| child["frame"]["id"].as_str())
                    .map(FrameId::new)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn discover(&mut self) -> Result<Vec<DiscoveredElement>> {
        let value = self.evaluate(&scripts::discover()).await?;
        let elements: Vec<DiscoveredElement> = serde_json::from_value(value)?;
        trace!(session_id = %self.id, count = elements.len(), "Discovered elements");
        Ok(elements)
    }

    async fn apply(&mut self, locator: &Locator, action: &Action) -> Result<()> {
        let seen = self.navigation_events();
        match self
            .element_script(locator, &scripts::apply(locator, action))
            .await
        {
            Ok(_) => {}
            // A click that navigates tears down the context before the reply
            Err(e) if *action == Action::Click && is_navigation_teardown(&e) => {
                debug!(session_id = %self.id, %locator, "Click navigated away");
            }
            Err(e) => return Err(e),
        }
        self.settle_navigation(seen).await
    }

    async fn dropdown_options(&mut self, locator: &Locator) -> Result<Vec<String>> {
        let value = self
            .element_script(locator, &scripts::options(locator))
            .await?;

        Ok(value
            .get("options")
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn reveal(&mut self, locator: &Locator) -> Result<RevealMethod> {
        let value = self
            .element_script(locator, &scripts::reveal(locator))
            .await?;
        Ok(serde_json::from_value(value["method"].clone())?)
    }

    async fn current_url(&mut self) -> Result<String> {
        let value = self.evaluate_in(None, scripts::CURRENT_URL).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::protocol("location.href is not a string"))
    }

    async fn page_source(&mut self) -> Result<String> {
        let value = self.evaluate(scripts::PAGE_SOURCE).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn console_entries(&mut self, from: usize) -> Result<Vec<ConsoleEntry>> {
        if !self.devtools_capture {
            self.pull_hook_buffers().await?;
        }
        Ok(self.state.lock().console.read_from(from))
    }

    async fn js_errors(&mut self, from: usize) -> Result<Vec<JsErrorEntry>> {
        if !self.devtools_capture {
            self.pull_hook_buffers().await?;
        }
        Ok(self.state.lock().errors.read_from(from))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        let result = self
            .execute(Command::CaptureScreenshot {
                format: "png".to_string(),
            })
            .await?;

        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("No data in screenshot response"))?;

        Ok(B64.decode(data)?)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Depth-first search of a `Page.FrameTree` for the node of `frame_id`.
fn find_frame_node<'a>(node: &'a Value, frame_id: &str) -> Option<&'a Value> {
    if node["frame"]["id"].as_str() == Some(frame_id) {
        return Some(node);
    }
    node.get("childFrames")?
        .as_array()?
        .iter()
        .find_map(|child| find_frame_node(child, frame_id))
}

/// Maps an element script status to the error taxonomy.
fn element_status(locator: &Locator, value: &Value) -> Result<()> {
    let reason = || {
        value
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    match value.get("status").and_then(Value::as_str) {
        Some("ok") => Ok(()),
        Some("missing") => Err(Error::element_not_found(locator)),
        Some("detached") => Err(Error::stale_element(locator)),
        Some("hidden" | "disabled") => Err(Error::not_interactable(locator, reason())),
        Some("invalid" | "no-option") => Err(Error::script_error(reason())),
        other => Err(Error::protocol(format!(
            "Unexpected element status {other:?} for {locator}"
        ))),
    }
}

/// Returns `true` if the error means the document went away mid-call.
fn is_navigation_teardown(err: &Error) -> bool {
    matches!(err, Error::Cdp { message, .. }
        if NAVIGATION_TEARDOWN.iter().any(|m| message.contains(m)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{accept_async, client_async};

    /// Evaluate requests seen by the fake target.
    type Seen = Arc<Mutex<Vec<Value>>>;

    fn context_created(id: i64, frame: &str) -> Value {
        json!({
            "method": "Runtime.executionContextCreated",
            "params": {"context": {"id": id, "auxData": {"frameId": frame, "isDefault": true}}}
        })
    }

    fn page_event(method: &str, params: Value) -> Value {
        json!({"method": method, "params": params})
    }

    /// Scripted page target state.
    #[derive(Default)]
    struct FakeTarget {
        devtools: bool,
        drained: bool,
        navigated: bool,
    }

    /// Frames a scripted page target sends back for one request.
    fn respond(request: &Value, target: &mut FakeTarget) -> Vec<Value> {
        let id = request["id"].clone();
        let method = request["method"].as_str().unwrap_or_default();
        let expression = request["params"]["expression"].as_str().unwrap_or_default();

        let mut frames = Vec::new();
        let mut after = Vec::new();
        let result = match method {
            "Runtime.enable" => {
                frames.push(context_created(1, "MAIN"));
                frames.push(context_created(2, "CHILD"));
                if target.devtools {
                    frames.push(json!({
                        "method": "Runtime.consoleAPICalled",
                        "params": {"type": "warning", "args": [{"type": "string", "value": "careful"}], "timestamp": 1.0}
                    }));
                    frames.push(json!({
                        "method": "Runtime.exceptionThrown",
                        "params": {"timestamp": 2.0, "exceptionDetails": {"text": "Uncaught", "lineNumber": 7,
                            "exception": {"description": "TypeError: boom"}}}
                    }));
                }
                json!({})
            }
            "Page.getFrameTree" => json!({"frameTree": {
                "frame": {"id": "MAIN", "url": "https://example.com/"},
                "childFrames": [
                    {"frame": {"id": "CHILD", "parentId": "MAIN"}},
                    {"frame": {"id": "XORIGIN", "parentId": "MAIN"}}
                ]
            }}),
            "Page.captureScreenshot" => json!({"data": "iVBORw0KGgo="}),
            "Runtime.evaluate" if expression == "location.href" => {
                let href = if target.navigated {
                    "https://example.com/next"
                } else {
                    "https://example.com/"
                };
                json!({"result": {"type": "string", "value": href}})
            }
            "Runtime.evaluate" if expression == "document.readyState" => {
                json!({"result": {"type": "string", "value": "complete"}})
            }
            "Runtime.evaluate" if expression.contains("hook.console.splice") => {
                let value = if std::mem::replace(&mut target.drained, true) {
                    json!({"console": [], "errors": []})
                } else {
                    json!({
                        "console": [{"level": "error", "message": "hooked", "timestamp": 3.0}],
                        "errors": [{"message": "ReferenceError: x", "source": null, "line": 1, "timestamp": 3.0}]
                    })
                };
                json!({"result": {"type": "object", "value": value}})
            }
            // The click returns before the navigation it starts commits
            "Runtime.evaluate"
                if expression.starts_with("(async (strategy, value, action)")
                    && expression.contains("\"nav-link\"") =>
            {
                target.navigated = true;
                after.push(page_event("Page.frameStartedLoading", json!({"frameId": "MAIN"})));
                after.push(page_event(
                    "Page.frameNavigated",
                    json!({"frame": {"id": "MAIN", "url": "https://example.com/next"}}),
                ));
                after.push(page_event("Page.frameStoppedLoading", json!({"frameId": "MAIN"})));
                json!({"result": {"type": "object", "value": {"status": "ok"}}})
            }
            "Runtime.evaluate" if expression.starts_with("(async (strategy, value, action)") => {
                json!({"result": {"type": "object", "value": {"status": "missing"}}})
            }
            "Runtime.evaluate" if expression.contains("outerHTML") => {
                json!({"result": {"type": "string", "value": "<html></html>"}})
            }
            _ => json!({}),
        };
        frames.push(json!({"id": id, "result": result}));
        frames.extend(after);
        frames
    }

    async fn fake_session(devtools: bool) -> (CdpSession, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let mut target = FakeTarget {
                devtools,
                ..FakeTarget::default()
            };
            while let Some(Ok(message)) = ws.next().await {
                let Message::Text(text) = message else {
                    continue;
                };
                let request: Value = serde_json::from_str(&text).unwrap();
                if request["method"] == "Runtime.evaluate" {
                    log.lock().push(request["params"].clone());
                }
                for frame in respond(&request, &mut target) {
                    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
                }
            }
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (ws, _) = client_async(format!("ws://{addr}/devtools/page/1"), stream)
            .await
            .unwrap();

        let config = FuzzConfig::new().with_devtools_capture(devtools);
        let session = CdpSession::with_connection(Connection::new(ws), &config)
            .await
            .unwrap();
        (session, seen)
    }

    #[test]
    fn test_find_frame_node_nested() {
        let tree = json!({
            "frame": {"id": "A"},
            "childFrames": [{"frame": {"id": "B"}, "childFrames": [{"frame": {"id": "C"}}]}]
        });
        assert!(find_frame_node(&tree, "C").is_some());
        assert!(find_frame_node(&tree, "D").is_none());
    }

    #[test]
    fn test_element_status_mapping() {
        let locator = Locator::id("x");
        assert!(element_status(&locator, &json!({"status": "ok"})).is_ok());
        assert!(matches!(
            element_status(&locator, &json!({"status": "missing"})),
            Err(Error::ElementNotFound { .. })
        ));
        assert!(matches!(
            element_status(&locator, &json!({"status": "detached"})),
            Err(Error::StaleElement { .. })
        ));
        assert!(matches!(
            element_status(&locator, &json!({"status": "hidden", "reason": "r"})),
            Err(Error::ElementNotInteractable { .. })
        ));
        assert!(matches!(
            element_status(&locator, &json!({"status": "no-option", "reason": "r"})),
            Err(Error::ScriptError { .. })
        ));
        assert!(matches!(
            element_status(&locator, &json!(null)),
            Err(Error::Protocol { .. })
        ));
    }

    #[test]
    fn test_navigation_teardown_detection() {
        assert!(is_navigation_teardown(&Error::cdp(
            -32000,
            "Execution context was destroyed."
        )));
        assert!(!is_navigation_teardown(&Error::cdp(-32000, "Other")));
        assert!(!is_navigation_teardown(&Error::ConnectionClosed));
    }

    #[test]
    fn test_page_state_ignores_console_without_devtools_capture() {
        let mut state = PageState::default();
        state.on_event(
            ParsedEvent::ConsoleApiCalled {
                level: "log".into(),
                text: "hi".into(),
                timestamp: 0.0,
            },
            false,
        );
        assert!(state.console.read_from(0).is_empty());

        state.on_event(
            ParsedEvent::ExecutionContextCreated {
                context_id: 4,
                frame_id: "F".into(),
                is_default: false,
            },
            false,
        );
        assert!(state.contexts.is_empty());
    }

    #[tokio::test]
    async fn test_connect_rejects_http_endpoint() {
        let err = CdpSession::connect("http://127.0.0.1:9222/json", &FuzzConfig::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_frame_switching() {
        let (mut session, seen) = fake_session(true).await;

        let children = session.child_frames().await.unwrap();
        assert_eq!(children, vec![FrameId::from("CHILD"), FrameId::from("XORIGIN")]);

        session.switch_to_child_frame(&"CHILD".into()).await.unwrap();
        assert_eq!(session.page_source().await.unwrap(), "<html></html>");
        let last = seen.lock().last().cloned().unwrap();
        assert_eq!(last["contextId"], 2);

        session.switch_to_root().await.unwrap();
        let err = session
            .switch_to_child_frame(&"XORIGIN".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FrameInaccessible { .. }));

        let err = session
            .switch_to_child_frame(&"NOPE".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FrameNotFound { .. }));
    }

    #[tokio::test]
    async fn test_current_url_uses_top_document() {
        let (mut session, seen) = fake_session(true).await;
        session.switch_to_child_frame(&"CHILD".into()).await.unwrap();

        assert_eq!(session.current_url().await.unwrap(), "https://example.com/");
        let last = seen.lock().last().cloned().unwrap();
        assert!(last.get("contextId").is_none());
    }

    #[tokio::test]
    async fn test_missing_element_maps_to_element_not_found() {
        let (mut session, _) = fake_session(true).await;
        let err = session
            .apply(&Locator::id("ghost"), &Action::SetValue("x".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_click_waits_for_late_navigation() {
        let (mut session, _) = fake_session(true).await;
        let nav = Locator::id("nav-link");

        assert_eq!(session.current_url().await.unwrap(), "https://example.com/");
        session.apply(&nav, &Action::Click).await.unwrap();

        assert_eq!(session.current_url().await.unwrap(), "https://example.com/next");
        assert!(session.state.lock().navigation_events >= 2);
        assert!(!session.state.lock().main_loading);
    }

    #[tokio::test]
    async fn test_interaction_reports_late_navigation() {
        use crate::config::RetryPolicy;
        use crate::fuzz::{ElementRecord, ElementRole, FrameNavigator, FramePath, InteractionDriver};

        let (mut session, _) = fake_session(true).await;
        let record = ElementRecord {
            locator: Locator::id("nav-link"),
            frame_path: FramePath::root(),
            role: ElementRole::Link,
            display_name: None,
            visible: true,
        };

        let outcome = InteractionDriver::new(RetryPolicy::once())
            .interact(&mut FrameNavigator::new(), &mut session, &record, &Action::Click)
            .await
            .unwrap();

        assert!(outcome.navigated);
        assert_eq!(outcome.url_after, "https://example.com/next");
    }

    #[test]
    fn test_page_state_tracks_main_frame_loads() {
        let mut state = PageState {
            main_frame: Some(FrameId::new("MAIN")),
            ..PageState::default()
        };

        state.on_event(
            ParsedEvent::FrameStartedLoading {
                frame_id: "CHILD".into(),
            },
            false,
        );
        assert_eq!(state.navigation_events, 0);

        state.on_event(
            ParsedEvent::FrameStartedLoading {
                frame_id: "MAIN".into(),
            },
            false,
        );
        assert!(state.main_loading);
        assert_eq!(state.navigation_events, 1);

        state.on_event(
            ParsedEvent::FrameStoppedLoading {
                frame_id: "MAIN".into(),
            },
            false,
        );
        assert!(!state.main_loading);
    }

    #[test]
    fn test_entry_log_drops_consumed_entries() {
        let mut log = EntryLog::default();
        log.extend(["a", "b", "c"]);

        assert_eq!(log.read_from(0), vec!["a", "b", "c"]);
        assert_eq!(log.read_from(2), vec!["c"]);
        assert_eq!(log.entries.len(), 1);

        log.push("d");
        assert_eq!(log.read_from(3), vec!["d"]);
        assert_eq!(log.base, 3);
        assert_eq!(log.read_from(1), vec!["d"]);
        assert!(log.read_from(9).is_empty());
    }

    #[tokio::test]
    async fn test_screenshot_is_decoded() {
        let (mut session, _) = fake_session(true).await;
        let png = session.screenshot().await.unwrap();
        assert_eq!(png, b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn test_devtools_capture_logs() {
        let (mut session, _) = fake_session(true).await;

        let console = session.console_entries(0).await.unwrap();
        assert_eq!(console.len(), 1);
        assert_eq!(console[0].level, LogLevel::Warning);
        assert_eq!(console[0].message, "careful");

        let errors = session.js_errors(0).await.unwrap();
        assert_eq!(errors[0].message, "TypeError: boom");
        assert_eq!(errors[0].line, Some(7));

        assert!(session.console_entries(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hook_capture_pulls_page_buffers_once() {
        let (mut session, _) = fake_session(false).await;

        let console = session.console_entries(0).await.unwrap();
        assert_eq!(console.len(), 1);
        assert_eq!(console[0].message, "hooked");

        let errors = session.js_errors(0).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert!(session.js_errors(1).await.unwrap().is_empty());
    }
}
