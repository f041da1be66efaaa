//! Commands written by the host through `Device::write`.
//!
//! A command is a tag byte followed by NUL-separated fields. The only
//! command is the call:
//!
//! ```text
//! 'c' [NUL] api NUL verb NUL object [NUL]
//! ```
//!
//! The NUL right after the tag and the trailing NUL are both optional.
//! Because `api` can never be empty, a NUL directly after the tag is always
//! the separator.

// ============================================================================
// Imports
// ============================================================================

use std::str;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Tag byte of the call command.
pub const CALL_TAG: u8 = b'c';

/// Shortest buffer that can hold a command.
pub const MIN_COMMAND_LEN: usize = 4;

/// Field separator.
const NUL: u8 = 0;

// ============================================================================
// WriteCommand
// ============================================================================

/// A decoded host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCommand {
    /// Outbound call of `api/verb` with a serialized argument object.
    Call {
        /// API name.
        api: String,
        /// Verb within the API.
        verb: String,
        /// Serialized argument object.
        object: String,
    },
}

impl WriteCommand {
    /// Decodes a host buffer.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedSize`] if the buffer is shorter than 4 bytes
    /// - [`Error::UnrecognizedCommand`] if the tag is not `'c'`
    /// - [`Error::MalformedCommand`] if a field is missing, empty, or not UTF-8
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_COMMAND_LEN {
            return Err(Error::MalformedSize { size: data.len() });
        }

        match data[0] {
            CALL_TAG => Self::parse_call(&data[1..]),
            tag => Err(Error::UnrecognizedCommand { tag }),
        }
    }

    fn parse_call(body: &[u8]) -> Result<Self> {
        let body = body.strip_prefix(&[NUL]).unwrap_or(body);
        let body = body.strip_suffix(&[NUL]).unwrap_or(body);

        let fields: Vec<&[u8]> = body.split(|b| *b == NUL).collect();
        let [api, verb, object] = fields.as_slice() else {
            return Err(Error::malformed_command(format!(
                "call expects api, verb and object, found {} field(s)",
                fields.len()
            )));
        };

        let api = utf8_field("api", api)?;
        let verb = utf8_field("verb", verb)?;
        let object = utf8_field("object", object)?;

        if api.is_empty() || verb.is_empty() {
            return Err(Error::malformed_command("api and verb must not be empty"));
        }

        Ok(Self::Call {
            api: api.to_owned(),
            verb: verb.to_owned(),
            object: object.to_owned(),
        })
    }
}

fn utf8_field<'a>(name: &str, bytes: &'a [u8]) -> Result<&'a str> {
    str::from_utf8(bytes).map_err(|e| Error::malformed_command(format!("{name} is not UTF-8: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
