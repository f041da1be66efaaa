//! Device facade exposed to the scripting host.
//!
//! The [`Device`] turns the queue/connection model into the host's flat
//! operations: `open`, `read`, `write`, `close` and `ioctl`.
//!
//! # Example
//!
//! ```no_run
//! use websock_broker::{Device, OpenOptions};
//!
//! # async fn example() -> websock_broker::Result<()> {
//! let device = Device::new();
//! let server = device.open(&OpenOptions::server("127.0.0.1", 8080)).await?;
//!
//! // Poll from the host's thread
//! while let Some(message) = device.read(server)? {
//!     println!("{message}");
//! }
//!
//! device.close(server).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::WriteCommand;
use crate::transport::{Binder, Endpoint, SessionHandler};

use super::acceptor::AcceptorHandle;
use super::builder::DeviceBuilder;
use super::connection::{Connection, ConnectionState, Role};
use super::inbox::Inbox;
use super::options::OpenOptions;
use super::registry::Registry;

// ============================================================================
// Device
// ============================================================================

/// Broker device owning a registry of connections.
///
/// `read`, `write` and `ioctl` never wait on the network and can be called
/// from any thread. `open` and `close` are async: a client open awaits the
/// session handshake and a server close awaits its acceptor.
///
/// Dropping the device drops every connection; acceptor loops observe the
/// dropped shutdown sender and exit.
pub struct Device {
    /// Binder producing sessions and listeners.
    binder: Arc<dyn Binder>,
    /// Active servers and clients.
    registry: Registry,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Device - Constructors
// ============================================================================

impl Device {
    /// Name the device registers under with the host.
    pub const NAME: &'static str = "websock";

    /// Creates a device using the default WSJ1 binder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        DeviceBuilder::new().build()
    }

    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::new()
    }

    /// Creates a device around a specific binder.
    #[inline]
    #[must_use]
    pub fn with_binder(binder: Arc<dyn Binder>) -> Self {
        Self {
            binder,
            registry: Registry::new(),
        }
    }
}

// ============================================================================
// Device - Open
// ============================================================================

impl Device {
    /// Opens a client session or a listening server.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the listening socket cannot be bound
    /// - [`Error::Connection`] if the client session cannot be established
    /// - [`Error::InvalidOptions`] if the endpoint is not a valid host
    pub async fn open(&self, options: &OpenOptions) -> Result<ConnectionId> {
        let endpoint = options.endpoint().clone();

        let opened = match options.role() {
            Role::Server => self.open_server(endpoint.clone()).await,
            _ => self.open_client(endpoint.clone()).await,
        };

        let connection = opened.inspect_err(|e| {
            warn!(
                role = %options.role(),
                %endpoint,
                error = %e,
                "create websock failed"
            );
        })?;

        info!(
            connection = %connection.id(),
            role = %connection.role(),
            endpoint = %connection.local_endpoint(),
            "websock online"
        );

        Ok(connection.id())
    }

    /// Decodes the host's option triple and opens it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOptions`] plus everything [`Device::open`] returns.
    pub async fn open_raw(&self, option: &[u8]) -> Result<ConnectionId> {
        let options = OpenOptions::parse(option)?;
        self.open(&options).await
    }

    async fn open_client(&self, endpoint: Endpoint) -> Result<Arc<Connection>> {
        let inbox = Arc::new(Inbox::new(ConnectionId::next(), Role::Client));
        let handler: Arc<dyn SessionHandler> = inbox.clone();

        let session = self.binder.connect(&endpoint, handler).await?;

        let connection = Connection::client(inbox, endpoint, session);
        connection.set_state(ConnectionState::Active);
        self.registry.register(Arc::clone(&connection));

        Ok(connection)
    }

    async fn open_server(&self, endpoint: Endpoint) -> Result<Arc<Connection>> {
        let listener = self.binder.listen(&endpoint).await?;

        let connection = Connection::server(endpoint, listener.local_endpoint());
        connection.set_state(ConnectionState::Active);
        self.registry.register(Arc::clone(&connection));

        connection.set_acceptor(AcceptorHandle::spawn(&connection, listener));

        Ok(connection)
    }
}

// ============================================================================
// Device - Read / Write
// ============================================================================

impl Device {
    /// Takes the next pending message and renders it.
    ///
    /// Clients and accepted children read their own queue. A server reads
    /// from the first child, in registration order, that has a message.
    /// Returns `Ok(None)` when nothing is pending.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionNotFound`] for an unknown handle
    /// - [`Error::Json`] if rendering fails
    pub fn read(&self, handle: ConnectionId) -> Result<Option<String>> {
        let connection = self.lookup(handle)?;

        let source = match connection.role() {
            Role::Server => match connection.first_child_with_messages() {
                Some(child) => child,
                None => return Ok(None),
            },
            Role::Client | Role::AcceptedChild => connection,
        };

        let Some(message) = source.inbox().dequeue() else {
            return Ok(None);
        };

        let kind = message.kind();
        let text = message.render(source.id()).inspect_err(|e| {
            warn!(connection = %source.id(), %kind, error = %e, "websock render failed");
        })?;

        trace!(connection = %handle, source = %source.id(), %kind, "websock read");
        Ok(Some(text))
    }

    /// Executes a host command.
    ///
    /// The only command is a call (`'c' api NUL verb NUL object`). Its reply
    /// is queued on this connection and returned by a later [`Device::read`].
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedSize`] if `data` is shorter than 4 bytes
    /// - [`Error::UnrecognizedCommand`] for a tag other than `'c'`
    /// - [`Error::MalformedCommand`] for missing or invalid fields
    /// - [`Error::CallOnListener`] if the handle names a server
    /// - [`Error::ConnectionNotFound`] for an unknown handle
    /// - whatever the session's `call` returns
    pub fn write(&self, handle: ConnectionId, data: &[u8]) -> Result<()> {
        let connection = self.lookup(handle)?;

        Self::issue(&connection, data).inspect_err(|e| {
            warn!(
                connection = %handle,
                role = %connection.role(),
                code = e.code(),
                error = %e,
                "websock write rejected"
            );
        })
    }

    fn issue(connection: &Connection, data: &[u8]) -> Result<()> {
        let WriteCommand::Call { api, verb, object } = WriteCommand::parse(data)?;

        let session = connection.session().ok_or(Error::CallOnListener {
            id: connection.id(),
        })?;

        let inbox = Arc::clone(connection.inbox());
        session.call(
            &api,
            &verb,
            &object,
            Box::new(move |frame| inbox.on_reply(frame)),
        )?;

        debug!(connection = %connection.id(), %api, %verb, "websock call issued");
        Ok(())
    }

    /// Reserved control operation. Always returns 0.
    pub fn ioctl(&self, handle: ConnectionId, kind: i32, data: &[u8]) -> i32 {
        trace!(connection = %handle, kind, size = data.len(), "websock ioctl ignored");
        0
    }
}

// ============================================================================
// Device - Close
// ============================================================================

impl Device {
    /// Closes a connection.
    ///
    /// - A server stops its acceptor, closes every child, then leaves the
    ///   registry.
    /// - A client leaves the registry.
    /// - An accepted child leaves its server's child list.
    ///
    /// In every case the inbox stops taking callbacks before the session is
    /// hung up and the storage released.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionNotFound`] if the handle is unknown or already
    /// closed.
    pub async fn close(&self, handle: ConnectionId) -> Result<()> {
        let connection = self.lookup(handle)?;

        info!(
            connection = %handle,
            role = %connection.role(),
            endpoint = %connection.local_endpoint(),
            "websock close"
        );

        match connection.role() {
            Role::Server => self.close_server(&connection).await,
            Role::Client => self.close_client(&connection),
            Role::AcceptedChild => Self::close_accepted(&connection),
        }

        Ok(())
    }

    /// Closes every server (with its children) and every client.
    pub async fn shutdown(&self) {
        info!(
            servers = self.registry.servers().len(),
            clients = self.registry.clients().len(),
            "websock device shutting down"
        );

        for id in self.registry.servers() {
            let _ = self.close(id).await;
        }
        for id in self.registry.clients() {
            let _ = self.close(id).await;
        }

        info!("websock device shutdown complete");
    }

    async fn close_server(&self, server: &Connection) {
        server.set_state(ConnectionState::Closing);

        if let Some(acceptor) = server.take_acceptor() {
            acceptor.stop().await;
        }

        for child in server.children() {
            Self::close_accepted(&child);
        }

        self.registry.unregister(server.id());
        server.release();
    }

    fn close_client(&self, client: &Connection) {
        client.set_state(ConnectionState::Closing);
        self.registry.unregister(client.id());
        client.release();
    }

    fn close_accepted(child: &Connection) {
        child.set_state(ConnectionState::Closing);

        if let Some(parent) = child.parent() {
            parent.remove_child(child.id());
        }

        child.release();
        debug!(connection = %child.id(), "websock SRVACCEPT closed");
    }
}

// ============================================================================
// Device - Diagnostics
// ============================================================================

impl Device {
    /// Returns open servers in registration order.
    #[must_use]
    pub fn servers(&self) -> Vec<ConnectionId> {
        self.registry.servers()
    }

    /// Returns open clients in registration order.
    #[must_use]
    pub fn clients(&self) -> Vec<ConnectionId> {
        self.registry.clients()
    }

    /// Returns a server's accepted children in registration order.
    ///
    /// Clients and children have none.
    pub fn children(&self, handle: ConnectionId) -> Result<Vec<ConnectionId>> {
        let connection = self.lookup(handle)?;
        Ok(connection.children().iter().map(|c| c.id()).collect())
    }

    /// Returns `true` if `handle` names an open connection.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: ConnectionId) -> bool {
        self.registry.contains(handle)
    }

    /// Returns the role of a connection.
    pub fn role(&self, handle: ConnectionId) -> Result<Role> {
        Ok(self.lookup(handle)?.role())
    }

    /// Returns the lifecycle state of a connection.
    pub fn state(&self, handle: ConnectionId) -> Result<ConnectionState> {
        Ok(self.lookup(handle)?.state())
    }

    /// Returns the bound endpoint of a server, or the endpoint of a session.
    pub fn local_endpoint(&self, handle: ConnectionId) -> Result<Endpoint> {
        Ok(self.lookup(handle)?.local_endpoint().clone())
    }

    /// Returns the number of messages pending on a connection.
    ///
    /// For a server, the sum over its children.
    pub fn pending(&self, handle: ConnectionId) -> Result<usize> {
        let connection = self.lookup(handle)?;
        Ok(match connection.role() {
            Role::Server => connection.children().iter().map(|c| c.inbox().len()).sum(),
            Role::Client | Role::AcceptedChild => connection.inbox().len(),
        })
    }

    fn lookup(&self, handle: ConnectionId) -> Result<Arc<Connection>> {
        self.registry
            .get(handle)
            .ok_or_else(|| Error::connection_not_found(handle))
    }
}
