//! WSJ1 binder over WebSocket.
//!
//! Maps the [`Binder`] seam onto WebSocket text frames carrying
//! [`Wsj1Frame`]s.
//!
//! # Event Loop
//!
//! Each session spawns a tokio task that handles:
//!
//! - Incoming frames from the peer (calls, replies, events)
//! - Outgoing calls queued by [`Session::call`]
//! - Call/reply correlation by UUID
//! - Hangup delivery when the socket closes
//!
//! # Connection Flow
//!
//! | Role | Socket | Handshake |
//! |------|--------|-----------|
//! | Client | `connect_async` to `ws://addr:port/path` | inside [`Binder::connect`] |
//! | Server | `TcpListener::bind` | `accept_async` inside [`Incoming::establish`] |

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CallId;
use crate::protocol::{InboundFrame, Wsj1Frame};

use super::{Binder, Endpoint, Incoming, Listener, ReplyCallback, Session, SessionHandler};

// ============================================================================
// Constants
// ============================================================================

/// Default maximum of calls awaiting a reply per session.
const DEFAULT_MAX_PENDING_CALLS: usize = 100;

/// Default WebSocket path requested by clients.
const DEFAULT_PATH: &str = "/api";

// ============================================================================
// Types
// ============================================================================

/// Map of outbound call IDs to reply callbacks.
type CorrelationMap = FxHashMap<CallId, ReplyCallback>;

// ============================================================================
// Wsj1Options
// ============================================================================

/// Tunables of the WSJ1 binder.
#[derive(Debug, Clone)]
pub struct Wsj1Options {
    /// Maximum calls awaiting a reply before new calls are rejected.
    max_pending_calls: usize,
    /// Path requested by client connections.
    path: String,
}

impl Default for Wsj1Options {
    fn default() -> Self {
        Self {
            max_pending_calls: DEFAULT_MAX_PENDING_CALLS,
            path: DEFAULT_PATH.to_owned(),
        }
    }
}

impl Wsj1Options {
    /// Creates options with defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pending call limit.
    #[inline]
    #[must_use]
    pub fn max_pending_calls(mut self, limit: usize) -> Self {
        self.max_pending_calls = limit;
        self
    }

    /// Sets the WebSocket path used by clients.
    #[inline]
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

// ============================================================================
// Wsj1Binder
// ============================================================================

/// [`Binder`] speaking WSJ1 over WebSocket.
#[derive(Debug, Clone, Default)]
pub struct Wsj1Binder {
    options: Wsj1Options,
}

impl Wsj1Binder {
    /// Creates a binder with the given options.
    #[inline]
    #[must_use]
    pub fn new(options: Wsj1Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Binder for Wsj1Binder {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Arc<dyn Session>> {
        let url = endpoint.ws_url(&self.options.path)?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket connect to {url} failed: {e}")))?;

        debug!(%url, "WSJ1 client session established");

        Ok(Arc::new(Wsj1Session::spawn(
            ws_stream,
            handler,
            self.options.max_pending_calls,
        )))
    }

    async fn listen(&self, endpoint: &Endpoint) -> Result<Box<dyn Listener>> {
        let listener = TcpListener::bind((endpoint.address(), endpoint.port())).await?;
        let actual_port = listener.local_addr()?.port();

        debug!(%endpoint, port = actual_port, "WSJ1 listener bound");

        Ok(Box::new(Wsj1Listener {
            listener,
            local: endpoint.with_port(actual_port),
            max_pending_calls: self.options.max_pending_calls,
        }))
    }
}

// ============================================================================
// Wsj1Listener
// ============================================================================

/// Listening TCP socket; WebSocket upgrade happens per accepted socket.
struct Wsj1Listener {
    listener: TcpListener,
    local: Endpoint,
    max_pending_calls: usize,
}

#[async_trait]
impl Listener for Wsj1Listener {
    fn local_endpoint(&self) -> Endpoint {
        self.local.clone()
    }

    async fn accept(&mut self) -> Result<Box<dyn Incoming>> {
        let (stream, addr) = self.listener.accept().await?;

        debug!(?addr, "TCP connection accepted");

        Ok(Box::new(Wsj1Incoming {
            stream,
            addr,
            max_pending_calls: self.max_pending_calls,
        }))
    }
}

/// Accepted TCP socket awaiting its WebSocket upgrade.
struct Wsj1Incoming {
    stream: TcpStream,
    addr: SocketAddr,
    max_pending_calls: usize,
}

#[async_trait]
impl Incoming for Wsj1Incoming {
    fn peer(&self) -> String {
        self.addr.to_string()
    }

    async fn establish(
        self: Box<Self>,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Arc<dyn Session>> {
        let ws_stream = tokio_tungstenite::accept_async(self.stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        debug!(addr = ?self.addr, "WSJ1 server session established");

        Ok(Arc::new(Wsj1Session::spawn(
            ws_stream,
            handler,
            self.max_pending_calls,
        )))
    }
}

// ============================================================================
// SessionCommand
// ============================================================================

/// Internal commands for the event loop.
enum SessionCommand {
    /// Send an encoded frame.
    Send(String),
    /// Close the socket.
    Hangup,
}

// ============================================================================
// Wsj1Session
// ============================================================================

/// A WSJ1 session driven by its own event loop task.
pub struct Wsj1Session {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Cleared by the event loop once the socket is gone.
    open: Arc<AtomicBool>,
    /// Maximum calls awaiting a reply.
    max_pending_calls: usize,
}

impl Wsj1Session {
    /// Creates a session from an upgraded stream.
    ///
    /// Spawns the event loop task internally.
    fn spawn<S>(
        ws_stream: WebSocketStream<S>,
        handler: Arc<dyn SessionHandler>,
        max_pending_calls: usize,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            handler,
            Arc::clone(&open),
        ));

        Self {
            command_tx,
            correlation,
            open,
            max_pending_calls,
        }
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        handler: Arc<dyn SessionHandler>,
        open: Arc<AtomicBool>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the peer
                message = ws_read.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(text))) => {
                            Self::handle_incoming_frame(&text, &correlation, handler.as_ref());
                        }

                        Some(Ok(WsMessage::Close(_))) => {
                            debug!("WebSocket closed by peer");
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
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

                // Commands from the session handle
                command = command_rx.recv() => {
                    match command {
                        Some(SessionCommand::Send(text)) => {
                            if let Err(e) = ws_write.send(WsMessage::Text(text.into())).await {
                                warn!(error = %e, "Failed to send frame");
                                break;
                            }
                        }

                        Some(SessionCommand::Hangup) | None => {
                            debug!("Session hangup requested");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }
            }
        }

        open.store(false, Ordering::SeqCst);

        // Calls still waiting will never be answered
        let dropped = correlation.lock().drain().count();
        if dropped > 0 {
            debug!(count = dropped, "Dropped pending calls on hangup");
        }

        handler.on_hangup();

        debug!("Session event loop terminated");
    }

    /// Routes one inbound text frame to the handler or a reply callback.
    fn handle_incoming_frame(
        text: &str,
        correlation: &Mutex<CorrelationMap>,
        handler: &dyn SessionHandler,
    ) {
        let frame = match Wsj1Frame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to decode frame");
                return;
            }
        };

        match frame {
            Wsj1Frame::Call {
                id,
                api,
                verb,
                object,
            } => {
                handler.on_call(&api, &verb, InboundFrame::with_id(id, object));
            }

            Wsj1Frame::Event { event, object } => {
                handler.on_event(&event, InboundFrame::new(object));
            }

            Wsj1Frame::Reply { id, ok, object } => {
                let callback = id
                    .parse::<CallId>()
                    .ok()
                    .and_then(|call_id| correlation.lock().remove(&call_id));

                let Some(callback) = callback else {
                    warn!(id = %id, "Reply for unknown call");
                    return;
                };

                if !ok {
                    debug!(id = %id, object = %object, "Call answered with error");
                }
                callback(InboundFrame::with_id(id, object));
            }
        }
    }
}

impl Session for Wsj1Session {
    fn call(&self, api: &str, verb: &str, object: &str, on_reply: ReplyCallback) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }

        // An empty object is sent as null
        let object = if object.is_empty() { "null" } else { object };

        let call_id = CallId::generate();
        let text = Wsj1Frame::Call {
            id: call_id.to_string(),
            api: api.to_owned(),
            verb: verb.to_owned(),
            object: object.to_owned(),
        }
        .encode()?;

        {
            let mut correlation = self.correlation.lock();
            if correlation.len() >= self.max_pending_calls {
                warn!(
                    pending = correlation.len(),
                    max = self.max_pending_calls,
                    "Too many pending calls"
                );
                return Err(Error::protocol(format!(
                    "Too many pending calls: {}/{}",
                    correlation.len(),
                    self.max_pending_calls
                )));
            }
            correlation.insert(call_id, on_reply);
        }

        if self.command_tx.send(SessionCommand::Send(text)).is_err() {
            self.correlation.lock().remove(&call_id);
            return Err(Error::ConnectionClosed);
        }

        trace!(%call_id, api, verb, "Call queued");
        Ok(())
    }

    fn hangup(&self) {
        let _ = self.command_tx.send(SessionCommand::Hangup);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = Wsj1Options::default();
        assert_eq!(options.max_pending_calls, DEFAULT_MAX_PENDING_CALLS);
        assert_eq!(options.path, DEFAULT_PATH);
    }

    #[test]
    fn test_options_builder() {
        let options = Wsj1Options::new().max_pending_calls(3).path("/ws");
        assert_eq!(options.max_pending_calls, 3);
        assert_eq!(options.path, "/ws");
    }

    #[tokio::test]
    async fn test_listen_resolves_port() {
        let binder = Wsj1Binder::default();
        let listener = binder
            .listen(&Endpoint::new("127.0.0.1", 0))
            .await
            .expect("bind should succeed");

        let local = listener.local_endpoint();
        assert_eq!(local.address(), "127.0.0.1");
        assert!(local.port() > 0);
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let binder = Wsj1Binder::default();

        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = binder
                .listen(&Endpoint::new("127.0.0.1", 0))
                .await
                .expect("bind should succeed");
            listener.local_endpoint().port()
        };

        struct Ignore;
        impl SessionHandler for Ignore {
            fn on_hangup(&self) {}
            fn on_call(&self, _: &str, _: &str, _: InboundFrame) {}
            fn on_event(&self, _: &str, _: InboundFrame) {}
            fn on_reply(&self, _: InboundFrame) {}
        }

        let result = binder
            .connect(&Endpoint::new("127.0.0.1", port), Arc::new(Ignore))
            .await;
        assert!(matches!(result, Err(Error::Connection { .. })));
    }
}
