//! Websock broker - socket message broker device for a scripting host.
//!
//! This library exposes client and server sockets to a polling host through
//! a flat device interface. Inbound traffic is queued per connection and
//! drained by `read`; outbound calls are issued by `write`.
//!
//! # Architecture
//!
//! The broker sits between the host and a binder transport:
//!
//! - **Host side**: `open`, `read`, `write`, `close`, `ioctl` on integer-like
//!   handles, never blocking on the network
//! - **Binder side**: sessions deliver calls, events, replies and hangups
//!   into per-connection queues from transport tasks
//!
//! Key design principles:
//!
//! - Each [`Connection`] owns its queue; a server owns its accepted children
//! - A server's `read` fans in over its children in registration order
//! - Each server runs one acceptor task, stopped before the server is torn down
//! - Callbacks never touch the registry
//!
//! # Quick Start
//!
//! ```no_run
//! use websock_broker::{Device, OpenOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let device = Device::new();
//!
//!     let client = device.open(&OpenOptions::client("127.0.0.1", 8080)).await?;
//!     device.write(client, b"cmonitor\0get-temperature\0{}")?;
//!
//!     loop {
//!         if let Some(message) = device.read(client)? {
//!             println!("{message}");
//!             break;
//!         }
//!         tokio::task::yield_now().await;
//!     }
//!
//!     device.close(client).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`broker`] | Device facade, connections, queues, registry |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Host commands, queued messages, WSJ1 frames |
//! | [`transport`] | Binder traits and the WSJ1 binder |
//!
//! # Read Renderings
//!
//! | Message | Rendering |
//! |---------|-----------|
//! | Call | `{"api":…,"verb":…,"obj":…,"param":<handle>}` |
//! | Event | `{"event":…,"obj":…}` |
//! | Reply | `{"reply":"?","obj":…}` |
//! | Hangup | `{"hangup":"?"}` |

// ============================================================================
// Modules
// ============================================================================

/// Broker core.
///
/// - [`Device`] - Host-facing facade
/// - [`Connection`] - Client, server or accepted child
/// - [`broker::Registry`] - Servers and clients of a device
pub mod broker;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for connections and calls.
pub mod identifiers;

/// Host command, queue and wire message types.
pub mod protocol;

/// Binder transport layer.
///
/// Defines the seams between the broker and the wire.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Broker types
pub use broker::{Connection, ConnectionState, Device, DeviceBuilder, OpenOptions, Role};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CallId, ConnectionId};

// Protocol types
pub use protocol::{InboundFrame, Message, MessageKind, RenderedMessage};

// Transport types
pub use transport::{
    Binder, Endpoint, Incoming, Listener, ReplyCallback, Session, SessionHandler, Wsj1Binder,
    Wsj1Options,
};
