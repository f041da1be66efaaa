//! Broker core: queues, connections, registry and the device facade.
//!
//! # Ownership
//!
//! ```text
//! Device
//!  └─ Registry ──► servers ──► Connection(Server) ──► children ──► Connection(AcceptedChild)
//!              └─► clients ──► Connection(Client)
//!
//! Connection ──► Inbox ──► MessageQueue
//!            └─► Session (binder)
//! ```
//!
//! A session holds only its [`Inbox`], never the connection, so dropping a
//! connection releases everything below it.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `acceptor` | Accept loop of a server |
//! | `builder` | Device configuration |
//! | `connection` | Roles, lifecycle, child list |
//! | `device` | Host-facing open/read/write/close/ioctl |
//! | `inbox` | Queue behind a lock, fed by session callbacks |
//! | `options` | Open option decoding |
//! | `queue` | FIFO of pending messages |
//! | `registry` | Servers and clients of one device |

// ============================================================================
// Submodules
// ============================================================================

/// Accept loop of a server connection.
pub(crate) mod acceptor;

/// Device builder.
pub mod builder;

/// Connection roles and lifecycle.
pub mod connection;

/// Device facade.
pub mod device;

/// Callback-fed message inbox.
pub mod inbox;

/// Open options.
pub mod options;

/// FIFO message queue.
pub mod queue;

/// Connection registry.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::DeviceBuilder;
pub use connection::{Connection, ConnectionState, Role};
pub use device::Device;
pub use inbox::Inbox;
pub use options::OpenOptions;
pub use queue::MessageQueue;
pub use registry::Registry;
