//! Message types crossing the device boundary and the wire.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `WriteCommand` | Host → Device | Outbound call request |
//! | `Message` | Transport → Queue | Pending inbound call/event/reply/hangup |
//! | `RenderedMessage` | Device → Host | Parsed form of a `read` rendering |
//! | `Wsj1Frame` | Device ↔ Peer | WSJ1 wire frame |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Host write buffer decoding |
//! | `frame` | WSJ1 frame codec |
//! | `message` | Queue elements and host rendering |

// ============================================================================
// Submodules
// ============================================================================

/// Host write commands.
pub mod command;

/// WSJ1 wire frames.
pub mod frame;

/// Queued messages and rendering.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::WriteCommand;
pub use frame::Wsj1Frame;
pub use message::{InboundFrame, Message, MessageKind, RenderedMessage};
