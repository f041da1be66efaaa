//! Error types for the websock broker.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use websock_broker::{Device, Result};
//!
//! fn poll(device: &Device, handle: ConnectionId) -> Result<()> {
//!     while let Some(message) = device.read(handle)? {
//!         println!("{message}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Resource | [`Error::InvalidOptions`], [`Error::Connection`], [`Error::Io`] |
//! | Protocol misuse | [`Error::MalformedSize`], [`Error::UnrecognizedCommand`], [`Error::MalformedCommand`], [`Error::CallOnListener`] |
//! | Lifecycle | [`Error::ConnectionNotFound`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::Json`] |
//!
//! # Host Codes
//!
//! The scripting host only sees integers. [`Error::code`] maps every error
//! to a negative code; protocol misuse keeps the device's historic values.
//!
//! | Variant | Code |
//! |---------|------|
//! | `MalformedSize` | -1 |
//! | `UnrecognizedCommand` | -2 |
//! | `CallOnListener` | -3 |
//! | `MalformedCommand` | -4 |
//! | `ConnectionNotFound` | -5 |
//! | anything else | -6 |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::ConnectionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// Open options could not be decoded.
    ///
    /// Returned when the `address\0port\0isServer` triple is malformed.
    #[error("Invalid open options: {message}")]
    InvalidOptions {
        /// Description of the problem.
        message: String,
    },

    /// Socket or session could not be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    // ========================================================================
    // Protocol Misuse
    // ========================================================================
    /// Write buffer too short to hold a command.
    #[error("Malformed write: {size} bytes is too short for a command")]
    MalformedSize {
        /// Length of the rejected buffer.
        size: usize,
    },

    /// Write buffer carries an unknown command tag.
    #[error("Unrecognized command tag: {tag:#04x}")]
    UnrecognizedCommand {
        /// The leading tag byte.
        tag: u8,
    },

    /// Call command with missing or invalid fields.
    #[error("Malformed command: {message}")]
    MalformedCommand {
        /// Description of the problem.
        message: String,
    },

    /// Calls need a session; listening endpoints have none.
    #[error("Call unsupported on listening endpoint {id}")]
    CallOnListener {
        /// The listening connection.
        id: ConnectionId,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Handle does not name an open connection.
    #[error("Connection not found: {id}")]
    ConnectionNotFound {
        /// The unknown handle.
        id: ConnectionId,
    },

    /// Session closed before or during the operation.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Peer sent a frame that violates the binder protocol.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid options error.
    #[inline]
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a malformed command error.
    #[inline]
    pub fn malformed_command(message: impl Into<String>) -> Self {
        Self::MalformedCommand {
            message: message.into(),
        }
    }

    /// Creates a connection not found error.
    #[inline]
    pub fn connection_not_found(id: ConnectionId) -> Self {
        Self::ConnectionNotFound { id }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the caller misused the write protocol.
    ///
    /// The connection is left open after these errors.
    #[inline]
    #[must_use]
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(
            self,
            Self::MalformedSize { .. }
                | Self::UnrecognizedCommand { .. }
                | Self::MalformedCommand { .. }
                | Self::CallOnListener { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::Io(_)
        )
    }

    /// Returns the negative integer code reported to the scripting host.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::MalformedSize { .. } => -1,
            Self::UnrecognizedCommand { .. } => -2,
            Self::CallOnListener { .. } => -3,
            Self::MalformedCommand { .. } => -4,
            Self::ConnectionNotFound { .. } => -5,
            _ => -6,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
