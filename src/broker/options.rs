//! Options for opening a connection.
//!
//! The scripting host passes options as a NUL-separated triple:
//!
//! ```text
//! address NUL port NUL isServer [NUL]
//! ```
//!
//! e.g. `"127.0.0.1\08080\01"` opens a server on port 8080.

// ============================================================================
// Imports
// ============================================================================

use std::str;

use crate::error::{Error, Result};
use crate::transport::Endpoint;

use super::connection::Role;

// ============================================================================
// OpenOptions
// ============================================================================

/// What `Device::open` should create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Where to connect or listen.
    endpoint: Endpoint,
    /// Listen instead of connect.
    server: bool,
}

impl OpenOptions {
    /// Options for an outbound client session.
    #[inline]
    #[must_use]
    pub fn client(address: impl Into<String>, port: u16) -> Self {
        Self {
            endpoint: Endpoint::new(address, port),
            server: false,
        }
    }

    /// Options for a listening server.
    ///
    /// Port 0 lets the OS pick a free port.
    #[inline]
    #[must_use]
    pub fn server(address: impl Into<String>, port: u16) -> Self {
        Self {
            endpoint: Endpoint::new(address, port),
            server: true,
        }
    }

    /// Decodes the host's `address\0port\0isServer` triple.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptions`] if a field is missing, the port is
    /// not a `u16`, or `isServer` is neither `0` nor `1`.
    pub fn parse(option: &[u8]) -> Result<Self> {
        let option = option.strip_suffix(&[0]).unwrap_or(option);
        let text = str::from_utf8(option)
            .map_err(|e| Error::invalid_options(format!("options are not UTF-8: {e}")))?;

        let fields: Vec<&str> = text.split('\0').collect();
        let [address, port, is_server] = fields.as_slice() else {
            return Err(Error::invalid_options(format!(
                "expected address, port and isServer, found {} field(s)",
                fields.len()
            )));
        };

        if address.is_empty() {
            return Err(Error::invalid_options("address must not be empty"));
        }

        let port: u16 = port
            .trim()
            .parse()
            .map_err(|e| Error::invalid_options(format!("bad port '{port}': {e}")))?;

        match is_server.trim() {
            "1" => Ok(Self::server(*address, port)),
            "0" => Ok(Self::client(*address, port)),
            other => Err(Error::invalid_options(format!(
                "isServer must be 0 or 1, found '{other}'"
            ))),
        }
    }

    /// Returns the endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns `true` for a server.
    #[inline]
    #[must_use]
    pub fn is_server(&self) -> bool {
        self.server
    }

    /// Returns the role the opened connection will have.
    #[inline]
    #[must_use]
    pub fn role(&self) -> Role {
        if self.server { Role::Server } else { Role::Client }
    }
}

// ============================================================================
// Tests
// ============================================================================
