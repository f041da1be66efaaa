//! Shared test harness: an in-memory binder and helpers.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

use websock_broker::{
    Binder, Endpoint, Error, InboundFrame, Incoming, Listener, ReplyCallback, Result, Session,
    SessionHandler,
};

// ============================================================================
// Tracing
// ============================================================================

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `condition` until it holds or five seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("condition not met within 5s"))
}

// ============================================================================
// MockSession
// ============================================================================

/// Call recorded by a [`MockSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub api: String,
    pub verb: String,
    pub object: String,
}

/// Hook run inside [`Session::hangup`].
type HangupHook = Box<dyn FnOnce() + Send>;

/// Session whose peer is driven by the test.
pub struct MockSession {
    handler: Arc<dyn SessionHandler>,
    calls: Mutex<Vec<RecordedCall>>,
    replies: Mutex<VecDeque<ReplyCallback>>,
    open: AtomicBool,
    hangup_hook: Mutex<Option<HangupHook>>,
}

impl MockSession {
    fn new(handler: Arc<dyn SessionHandler>) -> Arc<Self> {
        Arc::new(Self {
            handler,
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
            open: AtomicBool::new(true),
            hangup_hook: Mutex::new(None),
        })
    }

    /// Handler the broker attached; calling it simulates peer traffic.
    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }

    /// Calls issued through this session so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Answers the oldest unanswered call. Returns `false` if none is pending.
    pub fn reply(&self, object: &str) -> bool {
        let callback = self.replies.lock().pop_front();
        match callback {
            Some(callback) => {
                callback(InboundFrame::new(object));
                true
            }
            None => false,
        }
    }

    /// Runs `hook` when the broker hangs this session up.
    pub fn on_hangup(&self, hook: impl FnOnce() + Send + 'static) {
        *self.hangup_hook.lock() = Some(Box::new(hook));
    }

    /// Returns `true` once the broker hung up.
    pub fn is_hung_up(&self) -> bool {
        !self.open.load(Ordering::SeqCst)
    }
}

impl Session for MockSession {
    fn call(&self, api: &str, verb: &str, object: &str, on_reply: ReplyCallback) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        self.calls.lock().push(RecordedCall {
            api: api.to_owned(),
            verb: verb.to_owned(),
            object: object.to_owned(),
        });
        self.replies.lock().push_back(on_reply);
        Ok(())
    }

    fn hangup(&self) {
        self.open.store(false, Ordering::SeqCst);

        let hook = self.hangup_hook.lock().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// ============================================================================
// MockListener / MockIncoming
// ============================================================================

struct MockIncoming {
    peer: String,
    refuse: bool,
    session_tx: oneshot::Sender<Arc<MockSession>>,
}

#[async_trait]
impl Incoming for MockIncoming {
    fn peer(&self) -> String {
        self.peer.clone()
    }

    async fn establish(
        self: Box<Self>,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Arc<dyn Session>> {
        if self.refuse {
            return Err(Error::connection("handshake refused"));
        }
        let session = MockSession::new(handler);
        let _ = self.session_tx.send(Arc::clone(&session));
        Ok(session)
    }
}

struct MockListener {
    local: Endpoint,
    incoming_rx: mpsc::UnboundedReceiver<MockIncoming>,
}

#[async_trait]
impl Listener for MockListener {
    fn local_endpoint(&self) -> Endpoint {
        self.local.clone()
    }

    async fn accept(&mut self) -> Result<Box<dyn Incoming>> {
        match self.incoming_rx.recv().await {
            Some(incoming) => Ok(Box::new(incoming)),
            None => future::pending().await,
        }
    }
}

// ============================================================================
// MockBinder
// ============================================================================

/// In-memory binder. Ports are simulated; port 0 picks one from 40000 up.
pub struct MockBinder {
    next_port: AtomicU16,
    refuse_connect: AtomicBool,
    listeners: Mutex<FxHashMap<u16, mpsc::UnboundedSender<MockIncoming>>>,
    clients: Mutex<Vec<Arc<MockSession>>>,
}

impl Default for MockBinder {
    fn default() -> Self {
        Self {
            next_port: AtomicU16::new(40000),
            refuse_connect: AtomicBool::new(false),
            listeners: Mutex::new(FxHashMap::default()),
            clients: Mutex::new(Vec::new()),
        }
    }
}

impl MockBinder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next `connect` calls fail.
    pub fn refuse_connect(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    /// Sessions created by `connect`, in order.
    pub fn clients(&self) -> Vec<Arc<MockSession>> {
        self.clients.lock().clone()
    }

    /// Returns `true` while a listener is bound on `port`.
    pub fn is_listening(&self, port: u16) -> bool {
        self.listeners
            .lock()
            .get(&port)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Simulates a peer connecting to `port`; returns the peer's session
    /// once the handshake ran.
    pub async fn dial(&self, port: u16) -> anyhow::Result<Arc<MockSession>> {
        let session_rx = self.push_incoming(port, false)?;
        Ok(session_rx.await?)
    }

    /// Simulates a peer whose handshake fails.
    pub fn dial_refused(&self, port: u16) -> anyhow::Result<()> {
        self.push_incoming(port, true).map(drop)
    }

    fn push_incoming(
        &self,
        port: u16,
        refuse: bool,
    ) -> anyhow::Result<oneshot::Receiver<Arc<MockSession>>> {
        let (session_tx, session_rx) = oneshot::channel();
        let incoming = MockIncoming {
            peer: format!("mock-peer:{port}"),
            refuse,
            session_tx,
        };

        let listeners = self.listeners.lock();
        let tx = listeners
            .get(&port)
            .ok_or_else(|| anyhow::anyhow!("nothing listens on {port}"))?;
        tx.send(incoming)
            .map_err(|_| anyhow::anyhow!("listener on {port} is closed"))?;

        Ok(session_rx)
    }
}

#[async_trait]
impl Binder for MockBinder {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Arc<dyn Session>> {
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(Error::connection(format!("{endpoint} refused")));
        }
        let session = MockSession::new(handler);
        self.clients.lock().push(Arc::clone(&session));
        Ok(session)
    }

    async fn listen(&self, endpoint: &Endpoint) -> Result<Box<dyn Listener>> {
        let port = match endpoint.port() {
            0 => self.next_port.fetch_add(1, Ordering::SeqCst),
            port => port,
        };

        let mut listeners = self.listeners.lock();
        if listeners.get(&port).is_some_and(|tx| !tx.is_closed()) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("port {port} in use"),
            )));
        }

        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        listeners.insert(port, incoming_tx);

        Ok(Box::new(MockListener {
            local: endpoint.with_port(port),
            incoming_rx,
        }))
    }
}
