//! Binder transport layer.
//!
//! The broker core never touches the wire. It talks to a [`Binder`], which
//! turns endpoints and accepted sockets into [`Session`]s and reports
//! inbound frames through a [`SessionHandler`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  connect/listen   ┌──────────────┐   frames   ┌──────────┐
//! │    Device    │──────────────────►│    Binder    │◄──────────►│   Peer   │
//! │              │                   │              │            │          │
//! │  Inbox ◄─────┼── on_call/event ──│   Session    │            │          │
//! │              │   reply/hangup    │              │            │          │
//! └──────────────┘                   └──────────────┘            └──────────┘
//! ```
//!
//! # Session Contract
//!
//! - Every outbound [`Session::call`] eventually invokes its reply callback
//!   exactly once, unless the session hangs up first.
//! - [`SessionHandler::on_hangup`] is delivered at most once per session.
//! - Callbacks run on transport tasks and must not block.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `endpoint` | Address/port pair and URL building |
//! | `wsj1` | WSJ1-over-WebSocket binder |

// ============================================================================
// Submodules
// ============================================================================

/// Network endpoint type.
pub mod endpoint;

/// WSJ1 binder over WebSocket.
pub mod wsj1;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::InboundFrame;

// ============================================================================
// Re-exports
// ============================================================================

pub use endpoint::Endpoint;
pub use wsj1::{Wsj1Binder, Wsj1Options};

// ============================================================================
// Types
// ============================================================================

/// Callback bound to one outbound call, invoked with its reply frame.
pub type ReplyCallback = Box<dyn FnOnce(InboundFrame) + Send>;

// ============================================================================
// SessionHandler
// ============================================================================

/// Receives inbound frames of one session.
pub trait SessionHandler: Send + Sync {
    /// Peer closed the session.
    fn on_hangup(&self);

    /// Peer called `api/verb`.
    fn on_call(&self, api: &str, verb: &str, frame: InboundFrame);

    /// Peer emitted a named event.
    fn on_event(&self, event: &str, frame: InboundFrame);

    /// Reply to a call issued with this handler as the reply target.
    fn on_reply(&self, frame: InboundFrame);
}

// ============================================================================
// Session
// ============================================================================

/// A live protocol session over one socket.
pub trait Session: Send + Sync {
    /// Issues an outbound call without waiting for the reply.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::ConnectionClosed`] if the session is gone
    /// - [`crate::Error::Json`] if `object` is not valid serialized JSON
    /// - [`crate::Error::Protocol`] if too many calls are pending
    fn call(&self, api: &str, verb: &str, object: &str, on_reply: ReplyCallback) -> Result<()>;

    /// Closes the session and releases its socket.
    fn hangup(&self);

    /// Returns `true` while the session can carry calls.
    fn is_open(&self) -> bool;
}

// ============================================================================
// Binder
// ============================================================================

/// Factory for sessions and listeners.
#[async_trait]
pub trait Binder: Send + Sync {
    /// Connects to `endpoint` and completes the session handshake.
    async fn connect(
        &self,
        endpoint: &Endpoint,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Arc<dyn Session>>;

    /// Binds a listening socket on `endpoint`.
    async fn listen(&self, endpoint: &Endpoint) -> Result<Box<dyn Listener>>;
}

// ============================================================================
// Listener
// ============================================================================

/// A bound listening socket.
///
/// Dropping the listener closes the socket.
#[async_trait]
pub trait Listener: Send {
    /// Returns the endpoint actually bound (port 0 resolved).
    fn local_endpoint(&self) -> Endpoint;

    /// Waits for the next inbound socket.
    async fn accept(&mut self) -> Result<Box<dyn Incoming>>;
}

// ============================================================================
// Incoming
// ============================================================================

/// An accepted socket whose session handshake has not run yet.
#[async_trait]
pub trait Incoming: Send {
    /// Describes the remote peer for logging.
    fn peer(&self) -> String;

    /// Runs the handshake and starts delivering frames to `handler`.
    async fn establish(self: Box<Self>, handler: Arc<dyn SessionHandler>)
    -> Result<Arc<dyn Session>>;
}
