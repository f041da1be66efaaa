//! Network endpoint of a connection.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Endpoint
// ============================================================================

/// Address and port of a connection.
///
/// Immutable once a connection is created. Accepted children inherit their
/// server's endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or IP literal.
    address: String,
    /// TCP port (0 asks the OS to pick one when listening).
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    #[inline]
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Returns the address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the port.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns a copy of this endpoint with another port.
    #[inline]
    #[must_use]
    pub fn with_port(&self, port: u16) -> Self {
        Self::new(self.address.clone(), port)
    }

    /// Builds the WebSocket URL for this endpoint.
    ///
    /// Format: `ws://{address}:{port}{path}`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptions`] if the address is not a valid host.
    pub fn ws_url(&self, path: &str) -> Result<Url> {
        let host = if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]", self.address)
        } else {
            self.address.clone()
        };

        Url::parse(&format!("ws://{host}:{}{path}", self.port))
            .map_err(|e| Error::invalid_options(format!("bad endpoint {self}: {e}")))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

// ============================================================================
// Tests
// ============================================================================
