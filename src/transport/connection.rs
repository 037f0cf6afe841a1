//! WebSocket connection and event loop.
//!
//! This module handles the WebSocket connection to a DevTools page target,
//! including request/response correlation and event routing.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming messages from the browser (responses, events)
//! - Outgoing commands from the session
//! - Request/response correlation by integer `id`
//! - Event handler callbacks

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{from_str, to_string};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Event, Request, Response};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for command execution.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending requests before rejecting new ones.
const MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Response>>>;

/// Event handler callback type.
///
/// Called on the event loop task for each event received from the browser.
/// Must not block.
pub type EventHandler = Box<dyn Fn(Event) + Send + Sync>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for response.
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(RequestId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to a DevTools target.
///
/// Handles request/response correlation and event routing.
/// The connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and can be shared across tasks.
/// All operations are non-blocking.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Event handler (shared with event loop).
    event_handler: Arc<Mutex<Option<EventHandler>>>,
}

impl Connection {
    /// Connects to a DevTools WebSocket endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] if the handshake fails.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url).await?;
        debug!(url = %ws_url, "DevTools WebSocket connected");
        Ok(Self::new(ws_stream))
    }

    /// Creates a new connection from a WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub fn new<S>(ws_stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let event_handler: Arc<Mutex<Option<EventHandler>>> = Arc::new(Mutex::new(None));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            Arc::clone(&event_handler),
        ));

        Self {
            command_tx,
            correlation,
            event_handler,
        }
    }

    /// Sets the event handler callback.
    pub fn set_event_handler(&self, handler: EventHandler) {
        let mut guard = self.event_handler.lock();
        *guard = Some(handler);
    }

    /// Clears the event handler.
    pub fn clear_event_handler(&self) {
        let mut guard = self.event_handler.lock();
        *guard = None;
    }

    /// Sends a request and waits for response with the default timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if connection is closed
    /// - [`Error::RequestTimeout`] if response not received within timeout
    /// - [`Error::Protocol`] if too many pending requests
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_with_timeout(request, DEFAULT_COMMAND_TIMEOUT)
            .await
    }

    /// Sends a request and waits for response with custom timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if connection is closed
    /// - [`Error::RequestTimeout`] if response not received within timeout
    /// - [`Error::Protocol`] if too many pending requests
    pub async fn send_with_timeout(
        &self,
        request: Request,
        request_timeout: Duration,
    ) -> Result<Response> {
        let request_id = request.id;

        {
            let correlation = self.correlation.lock();
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    MAX_PENDING_REQUESTS
                )));
            }
        }

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCorrelation(request_id));

                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Shuts down the connection gracefully.
    ///
    /// Clones share the event loop, so dropping one does not shut it down.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        event_handler: Arc<Mutex<Option<EventHandler>>>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation, &event_handler);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::RemoveCorrelation(request_id)) => {
                            correlation.lock().remove(&request_id);
                            debug!(%request_id, "Removed timed-out correlation");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        command_rx.close();
        Self::fail_pending_requests(&correlation);

        debug!("Event loop terminated");
    }

    /// Handles an incoming text message from the browser.
    fn handle_incoming_message(
        text: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        event_handler: &Arc<Mutex<Option<EventHandler>>>,
    ) {
        // Responses carry an `id`; events never do
        if let Ok(response) = from_str::<Response>(text) {
            let tx = correlation.lock().remove(&response.id);

            if let Some(tx) = tx {
                let _ = tx.send(Ok(response));
            } else {
                warn!(id = %response.id, "Response for unknown request");
            }
            return;
        }

        if let Ok(event) = from_str::<Event>(text) {
            trace!(method = %event.method, "Event received");
            let handler = event_handler.lock();
            if let Some(ref handler) = *handler {
                handler(event);
            }
            return;
        }

        warn!(text = %text, "Failed to parse incoming message");
    }

    /// Handles a send command from the session.
    async fn handle_send_command<S>(
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut SplitSink<WebSocketStream<S>, Message>,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request_id = request.id;

        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(request_id, response_tx);

        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            if let Some(tx) = correlation.lock().remove(&request_id) {
                let _ = tx.send(Err(Error::connection(e.to_string())));
            }
            return;
        }

        trace!(%request_id, method = request.command.method(), "Request sent");
    }

    /// Fails all pending requests with ConnectionClosed error.
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{accept_async, client_async};

    use crate::protocol::Command;

    /// Starts a one-connection DevTools stand-in and returns a connected client.
    ///
    /// `respond` maps each incoming request to the frames sent back.
    async fn serve<F>(respond: F) -> Connection
    where
        F: Fn(Value) -> Vec<Value> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                let Message::Text(text) = message else {
                    continue;
                };
                let request: Value = serde_json::from_str(&text).unwrap();
                for frame in respond(request) {
                    if frame.is_null() {
                        let _ = ws.close(None).await;
                        return;
                    }
                    ws.send(Message::Text(frame.to_string().into()))
                        .await
                        .unwrap();
                }
            }
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (ws, _) = client_async(format!("ws://{addr}/devtools/page/1"), stream)
            .await
            .unwrap();
        Connection::new(ws)
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_COMMAND_TIMEOUT.as_secs(), 30);
        assert_eq!(MAX_PENDING_REQUESTS, 100);
    }

    #[tokio::test]
    async fn test_response_is_correlated_by_id() {
        let connection = serve(|req| {
            vec![json!({"id": req["id"], "result": {"echo": req["method"]}})]
        })
        .await;

        let response = connection
            .send(Request::new(Command::GetFrameTree))
            .await
            .unwrap();

        assert_eq!(response.get_string("echo"), "Page.getFrameTree");
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_events_reach_handler_before_response() {
        let connection = serve(|req| {
            vec![
                json!({"method": "Runtime.consoleAPICalled", "params": {"type": "log", "args": []}}),
                json!({"id": req["id"], "result": {}}),
            ]
        })
        .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        connection.set_event_handler(Box::new(move |event| sink.lock().push(event.method)));

        connection
            .send(Request::new(Command::RuntimeEnable))
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec!["Runtime.consoleAPICalled".to_string()]);
    }

    #[tokio::test]
    async fn test_error_response_surfaces_as_cdp_error() {
        let connection = serve(|req| {
            vec![json!({"id": req["id"], "error": {"code": -32000, "message": "No frame"}})]
        })
        .await;

        let err = connection
            .send(Request::new(Command::GetFrameTree))
            .await
            .unwrap()
            .into_result()
            .unwrap_err();

        assert!(matches!(err, Error::Cdp { code: -32000, .. }));
    }

    #[tokio::test]
    async fn test_remote_close_fails_pending_request() {
        let connection = serve(|_| vec![Value::Null]).await;

        let err = connection
            .send(Request::new(Command::PageEnable))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_timeout_removes_correlation() {
        let connection = serve(|_| Vec::new()).await;

        let err = connection
            .send_with_timeout(
                Request::new(Command::PageEnable),
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RequestTimeout { .. }));

        // RemoveCorrelation is processed asynchronously by the loop
        for _ in 0..50 {
            if connection.pending_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_connection() {
        let connection = serve(|_| Vec::new()).await;
        connection.shutdown();

        for _ in 0..50 {
            if connection.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(connection.is_closed());

        let err = connection
            .send(Request::new(Command::PageEnable))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }
}
