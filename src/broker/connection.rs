//! Connection endpoints and their lifecycle.
//!
//! # Roles
//!
//! | Role | Session | Children | Created by |
//! |------|---------|----------|------------|
//! | `Client` | yes | no | `Device::open` |
//! | `Server` | no | yes | `Device::open` |
//! | `AcceptedChild` | yes | no | acceptor loop |
//!
//! # Lifecycle
//!
//! ```text
//! Created ──► Active ──► Closing ──► Closed
//!               ▲
//!  AcceptedChild starts here once its handshake completed
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::identifiers::ConnectionId;
use crate::transport::{Endpoint, Session};

use super::acceptor::AcceptorHandle;
use super::inbox::Inbox;

// ============================================================================
// Role
// ============================================================================

/// What a connection does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Outbound session opened by the host.
    Client,
    /// Listening socket opened by the host.
    Server,
    /// Inbound session accepted by a server.
    AcceptedChild,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Client => "CLIENT",
            Self::Server => "SERVER",
            Self::AcceptedChild => "SRVACCEPT",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Constructed, not yet registered.
    Created,
    /// Registered and delivering messages.
    Active,
    /// Teardown in progress.
    Closing,
    /// Resources released.
    Closed,
}

// ============================================================================
// Connection
// ============================================================================

/// One broker endpoint.
///
/// Shared as `Arc<Connection>` between the registry, a server's child list
/// and the acceptor task.
pub struct Connection {
    /// Handle given to the host.
    id: ConnectionId,
    /// Role of the endpoint.
    role: Role,
    /// Endpoint requested at open (inherited by accepted children).
    endpoint: Endpoint,
    /// Endpoint actually bound; servers only.
    local_endpoint: Option<Endpoint>,
    /// Lifecycle state.
    state: Mutex<ConnectionState>,
    /// Live protocol session; absent for servers.
    session: Mutex<Option<Arc<dyn Session>>>,
    /// Server that accepted this connection.
    parent: Option<Weak<Connection>>,
    /// Pending inbound messages.
    inbox: Arc<Inbox>,
    /// Accepted children in registration order; servers only.
    children: Mutex<Vec<Arc<Connection>>>,
    /// Running acceptor loop; servers only.
    acceptor: Mutex<Option<AcceptorHandle>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Constructors
// ============================================================================

impl Connection {
    fn new(
        inbox: Arc<Inbox>,
        role: Role,
        endpoint: Endpoint,
        local_endpoint: Option<Endpoint>,
        session: Option<Arc<dyn Session>>,
        parent: Option<Weak<Connection>>,
    ) -> Self {
        Self {
            id: inbox.owner(),
            role,
            endpoint,
            local_endpoint,
            state: Mutex::new(ConnectionState::Created),
            session: Mutex::new(session),
            parent,
            inbox,
            children: Mutex::new(Vec::new()),
            acceptor: Mutex::new(None),
        }
    }

    /// Creates a client around an established session.
    ///
    /// `inbox` must be the handler the session was established with.
    #[must_use]
    pub fn client(inbox: Arc<Inbox>, endpoint: Endpoint, session: Arc<dyn Session>) -> Arc<Self> {
        Arc::new(Self::new(
            inbox,
            Role::Client,
            endpoint,
            None,
            Some(session),
            None,
        ))
    }

    /// Creates a server for a bound listener.
    #[must_use]
    pub fn server(endpoint: Endpoint, local_endpoint: Endpoint) -> Arc<Self> {
        let inbox = Arc::new(Inbox::new(ConnectionId::next(), Role::Server));
        Arc::new(Self::new(
            inbox,
            Role::Server,
            endpoint,
            Some(local_endpoint),
            None,
            None,
        ))
    }

    /// Creates the child for a socket accepted by `server`.
    ///
    /// Only the endpoint is inherited; id, inbox, state and children are
    /// fresh. The session is attached once the handshake completes.
    #[must_use]
    pub fn accepted(server: &Arc<Connection>) -> Arc<Self> {
        let inbox = Arc::new(Inbox::new(ConnectionId::next(), Role::AcceptedChild));
        Arc::new(Self::new(
            inbox,
            Role::AcceptedChild,
            server.endpoint.clone(),
            None,
            None,
            Some(Arc::downgrade(server)),
        ))
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Returns the host handle.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the role.
    #[inline]
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the endpoint requested at open.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the bound endpoint for servers, the requested one otherwise.
    #[inline]
    #[must_use]
    pub fn local_endpoint(&self) -> &Endpoint {
        self.local_endpoint.as_ref().unwrap_or(&self.endpoint)
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Returns the live session, if any.
    #[inline]
    #[must_use]
    pub fn session(&self) -> Option<Arc<dyn Session>> {
        self.session.lock().clone()
    }

    /// Returns the inbox.
    #[inline]
    #[must_use]
    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.inbox
    }

    /// Returns the accepting server, if it is still alive.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Connection>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Returns the accepted children in registration order.
    #[must_use]
    pub fn children(&self) -> Vec<Arc<Connection>> {
        self.children.lock().clone()
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Moves the connection to `state`.
    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Attaches the session established for an accepted child.
    pub(crate) fn attach_session(&self, session: Arc<dyn Session>) {
        *self.session.lock() = Some(session);
    }

    /// Stores the acceptor driving this server.
    pub(crate) fn set_acceptor(&self, acceptor: AcceptorHandle) {
        *self.acceptor.lock() = Some(acceptor);
    }

    /// Takes the acceptor so it can be stopped.
    pub(crate) fn take_acceptor(&self) -> Option<AcceptorHandle> {
        self.acceptor.lock().take()
    }

    /// Appends an accepted child and marks it active.
    pub(crate) fn add_child(&self, child: Arc<Connection>) {
        child.set_state(ConnectionState::Active);
        self.children.lock().push(child);
    }

    /// Removes a child by id.
    pub(crate) fn remove_child(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut children = self.children.lock();
        let index = children.iter().position(|child| child.id == id)?;
        Some(children.remove(index))
    }

    /// Returns the first child with a pending message.
    pub(crate) fn first_child_with_messages(&self) -> Option<Arc<Connection>> {
        self.children
            .lock()
            .iter()
            .find(|child| !child.inbox.is_empty())
            .cloned()
    }

    /// Releases inbox and session. Must run after unregistering.
    ///
    /// Callbacks stop being queued before the session is hung up.
    pub(crate) fn release(&self) {
        self.inbox.close();

        let session = self.session.lock().take();
        if let Some(session) = session {
            session.hangup();
        }

        self.set_state(ConnectionState::Closed);
        debug!(connection = %self.id, role = %self.role, "Connection released");
    }
}

// ============================================================================
// Tests
// ============================================================================
