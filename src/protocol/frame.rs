//! WSJ1 wire frames.
//!
//! WSJ1 carries binder traffic as JSON arrays in WebSocket text frames.
//! The first element is the frame type.
//!
//! | Type | Shape | Meaning |
//! |------|-------|---------|
//! | 2 | `[2, id, "api/verb", obj]` | Call |
//! | 3 | `[3, id, obj]` | Successful reply |
//! | 4 | `[4, id, obj]` | Error reply |
//! | 5 | `[5, event, obj]` | Event |
//!
//! The object element is kept as its exact source text, never re-serialized.
//! It may be omitted, in which case it decodes as `null`.

// ============================================================================
// Imports
// ============================================================================

use serde_json::value::RawValue;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Frame type of a call.
pub const FRAME_CALL: u64 = 2;

/// Frame type of a successful reply.
pub const FRAME_RETOK: u64 = 3;

/// Frame type of an error reply.
pub const FRAME_RETERR: u64 = 4;

/// Frame type of an event.
pub const FRAME_EVENT: u64 = 5;

/// Object text used when a frame omits its object.
const NULL_OBJECT: &str = "null";

// ============================================================================
// Wsj1Frame
// ============================================================================

/// A decoded WSJ1 frame.
///
/// `object` holds serialized JSON text exactly as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wsj1Frame {
    /// Remote procedure call.
    Call {
        /// Caller-chosen correlation id.
        id: String,
        /// API name.
        api: String,
        /// Verb within the API.
        verb: String,
        /// Serialized argument object.
        object: String,
    },
    /// Reply to a call.
    Reply {
        /// Id of the call being answered.
        id: String,
        /// Whether the call succeeded.
        ok: bool,
        /// Serialized reply payload.
        object: String,
    },
    /// Event notification.
    Event {
        /// Event name.
        event: String,
        /// Serialized event payload.
        object: String,
    },
}

impl Wsj1Frame {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not a JSON array
    /// - [`Error::Protocol`] if the array does not match a known frame shape
    pub fn decode(text: &str) -> Result<Self> {
        let items: Vec<&RawValue> = serde_json::from_str(text)?;
        if items.len() < 2 {
            return Err(Error::protocol(format!(
                "frame needs at least 2 elements, found {}",
                items.len()
            )));
        }

        let frame_type: u64 = serde_json::from_str(items[0].get())
            .map_err(|_| Error::protocol("frame type must be an unsigned integer"))?;

        match frame_type {
            FRAME_CALL => {
                let id = string_at(&items, 1, "call id")?;
                let method = string_at(&items, 2, "call method")?;
                let (api, verb) = method
                    .split_once('/')
                    .filter(|(api, verb)| !api.is_empty() && !verb.is_empty())
                    .ok_or_else(|| Error::protocol(format!("call method '{method}' is not api/verb")))?;

                Ok(Self::Call {
                    id,
                    api: api.to_owned(),
                    verb: verb.to_owned(),
                    object: object_at(&items, 3),
                })
            }

            FRAME_RETOK | FRAME_RETERR => Ok(Self::Reply {
                id: string_at(&items, 1, "reply id")?,
                ok: frame_type == FRAME_RETOK,
                object: object_at(&items, 2),
            }),

            FRAME_EVENT => Ok(Self::Event {
                event: string_at(&items, 1, "event name")?,
                object: object_at(&items, 2),
            }),

            other => Err(Error::protocol(format!("unknown frame type {other}"))),
        }
    }

    /// Encodes the frame as text.
    ///
    /// The object text is validated and written through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the object is not valid JSON.
    pub fn encode(&self) -> Result<String> {
        let text = match self {
            Self::Call {
                id,
                api,
                verb,
                object,
            } => {
                let object: &RawValue = serde_json::from_str(object)?;
                serde_json::to_string(&(FRAME_CALL, id, format!("{api}/{verb}"), object))?
            }
            Self::Reply { id, ok, object } => {
                let frame_type = if *ok { FRAME_RETOK } else { FRAME_RETERR };
                let object: &RawValue = serde_json::from_str(object)?;
                serde_json::to_string(&(frame_type, id, object))?
            }
            Self::Event { event, object } => {
                let object: &RawValue = serde_json::from_str(object)?;
                serde_json::to_string(&(FRAME_EVENT, event, object))?
            }
        };

        Ok(text)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn string_at(items: &[&RawValue], index: usize, what: &str) -> Result<String> {
    items
        .get(index)
        .and_then(|raw| serde_json::from_str::<String>(raw.get()).ok())
        .ok_or_else(|| Error::protocol(format!("{what} must be a string")))
}

fn object_at(items: &[&RawValue], index: usize) -> String {
    items
        .get(index)
        .map_or(NULL_OBJECT, |raw| raw.get())
        .to_owned()
}

// ============================================================================
// Tests
// ============================================================================
