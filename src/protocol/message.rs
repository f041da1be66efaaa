//! Queued inbound messages and their host rendering.
//!
//! A [`Message`] is what a callback adapter pushes onto a connection's
//! queue. `Device::read` pops it and renders it into the flat JSON object
//! the scripting host consumes.
//!
//! # Rendering
//!
//! | Kind | Rendering |
//! |------|-----------|
//! | Call | `{"api":"..","verb":"..","obj":"..","param":"<connection id>"}` |
//! | Event | `{"event":"..","obj":".."}` |
//! | Reply | `{"reply":"?","obj":".."}` |
//! | Hangup | `{"hangup":"?"}` |
//!
//! Field text is JSON-escaped, so [`RenderedMessage::parse`] recovers every
//! field exactly.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifiers::ConnectionId;

// ============================================================================
// Constants
// ============================================================================

/// Placeholder rendered for fields the device has no value for.
const UNKNOWN_MARKER: &str = "?";

// ============================================================================
// InboundFrame
// ============================================================================

/// A decoded inbound frame handed over by the binder transport.
///
/// Owns the serialized object text. Ownership moves from the transport into
/// the queue on enqueue and out to the reader on dequeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Transport correlation id, if the frame kind carries one.
    id: Option<String>,
    /// Serialized object payload.
    object: String,
}

impl InboundFrame {
    /// Creates a frame without a correlation id.
    #[inline]
    #[must_use]
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            id: None,
            object: object.into(),
        }
    }

    /// Creates a frame carrying the transport's correlation id.
    #[inline]
    #[must_use]
    pub fn with_id(id: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            object: object.into(),
        }
    }

    /// Returns the transport correlation id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns the serialized object text.
    #[inline]
    #[must_use]
    pub fn object(&self) -> &str {
        &self.object
    }
}

// ============================================================================
// MessageKind
// ============================================================================

/// Discriminant of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Inbound remote call.
    Call,
    /// Reply to an outbound call.
    Reply,
    /// Peer hung up.
    Hangup,
    /// Unsolicited named event.
    Event,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Call => "call",
            Self::Reply => "reply",
            Self::Hangup => "hangup",
            Self::Event => "event",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Message
// ============================================================================

/// One pending inbound message on a connection's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Inbound call of `api/verb`.
    Call {
        /// API name.
        api: String,
        /// Verb within the API.
        verb: String,
        /// Decoded frame with the argument object.
        frame: InboundFrame,
    },
    /// Named event notification.
    Event {
        /// Event name.
        event: String,
        /// Decoded frame with the event payload.
        frame: InboundFrame,
    },
    /// Reply to a call issued through `Device::write`.
    Reply {
        /// Decoded frame with the reply payload.
        frame: InboundFrame,
    },
    /// Peer closed the session.
    Hangup,
}

impl Message {
    /// Returns the message kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Call { .. } => MessageKind::Call,
            Self::Event { .. } => MessageKind::Event,
            Self::Reply { .. } => MessageKind::Reply,
            Self::Hangup => MessageKind::Hangup,
        }
    }

    /// Consumes the message and renders it for the host.
    ///
    /// `receiver` is the connection the message was queued on; calls carry
    /// it as their `param` token so the host can address that peer.
    ///
    /// The frame is dropped as soon as the text is produced.
    pub fn render(self, receiver: ConnectionId) -> Result<String> {
        let rendering = match &self {
            Self::Call { api, verb, frame } => Rendering::Call {
                api,
                verb,
                obj: frame.object(),
                param: receiver.to_string(),
            },
            Self::Event { event, frame } => Rendering::Event {
                event,
                obj: frame.object(),
            },
            Self::Reply { frame } => Rendering::Reply {
                reply: UNKNOWN_MARKER,
                obj: frame.object(),
            },
            Self::Hangup => Rendering::Hangup {
                hangup: UNKNOWN_MARKER,
            },
        };

        Ok(serde_json::to_string(&rendering)?)
    }
}

/// Borrowed view serialized by [`Message::render`].
#[derive(Serialize)]
#[serde(untagged)]
enum Rendering<'a> {
    Call {
        api: &'a str,
        verb: &'a str,
        obj: &'a str,
        param: String,
    },
    Event {
        event: &'a str,
        obj: &'a str,
    },
    Reply {
        reply: &'static str,
        obj: &'a str,
    },
    Hangup {
        hangup: &'static str,
    },
}

// ============================================================================
// RenderedMessage
// ============================================================================

/// Host-side parse of a rendering produced by `Device::read`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RenderedMessage {
    /// Rendered call.
    Call {
        /// API name.
        api: String,
        /// Verb within the API.
        verb: String,
        /// Serialized argument object.
        obj: String,
        /// Connection the call arrived on.
        param: String,
    },
    /// Rendered event.
    Event {
        /// Event name.
        event: String,
        /// Serialized payload.
        obj: String,
    },
    /// Rendered reply.
    Reply {
        /// Always `"?"`.
        reply: String,
        /// Serialized payload.
        obj: String,
    },
    /// Rendered hangup.
    Hangup {
        /// Always `"?"`.
        hangup: String,
    },
}

impl RenderedMessage {
    /// Parses a rendering.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the text is not a rendering.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Returns the kind of the rendered message.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Call { .. } => MessageKind::Call,
            Self::Event { .. } => MessageKind::Event,
            Self::Reply { .. } => MessageKind::Reply,
            Self::Hangup { .. } => MessageKind::Hangup,
        }
    }

    /// Returns the serialized object, if the kind has one.
    #[inline]
    #[must_use]
    pub fn object(&self) -> Option<&str> {
        match self {
            Self::Call { obj, .. } | Self::Event { obj, .. } | Self::Reply { obj, .. } => {
                Some(obj)
            }
            Self::Hangup { .. } => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_render_call_shape() {
        let receiver = ConnectionId::from_u64(42).expect("non-zero");
        let message = Message::Call {
            api: "hello".into(),
            verb: "ping".into(),
            frame: InboundFrame::with_id("7", "true"),
        };

        let text = message.render(receiver).expect("render");
        assert_eq!(
            text,
            r#"{"api":"hello","verb":"ping","obj":"true","param":"42"}"#
        );
    }

    #[test]
    fn test_render_event_reply_hangup_shapes() {
        let receiver = ConnectionId::next();

        let event = Message::Event {
            event: "sensor/changed".into(),
            frame: InboundFrame::new("1"),
        };
        assert_eq!(
            event.render(receiver).expect("render"),
            r#"{"event":"sensor/changed","obj":"1"}"#
        );

        let reply = Message::Reply {
            frame: InboundFrame::new("null"),
        };
        assert_eq!(
            reply.render(receiver).expect("render"),
            r#"{"reply":"?","obj":"null"}"#
        );

        assert_eq!(
            Message::Hangup.render(receiver).expect("render"),
            r#"{"hangup":"?"}"#
        );
    }

    #[test]
    fn test_render_escapes_object_text() {
        let receiver = ConnectionId::next();
        let reply = Message::Reply {
            frame: InboundFrame::new(r#"{"temp":21.5}"#),
        };

        let text = reply.render(receiver).expect("render");
        assert_eq!(text, r#"{"reply":"?","obj":"{\"temp\":21.5}"}"#);

        let parsed = RenderedMessage::parse(&text).expect("parse");
        assert_eq!(parsed.object(), Some(r#"{"temp":21.5}"#));
    }

    #[test]
    fn test_kind_matches_rendering() {
        let receiver = ConnectionId::next();
        let messages = [
            Message::Call {
                api: "a".into(),
                verb: "v".into(),
                frame: InboundFrame::new("{}"),
            },
            Message::Event {
                event: "e".into(),
                frame: InboundFrame::new("{}"),
            },
            Message::Reply {
                frame: InboundFrame::new("{}"),
            },
            Message::Hangup,
        ];

        for message in messages {
            let kind = message.kind();
            let parsed = RenderedMessage::parse(&message.render(receiver).expect("render"))
                .expect("parse");
            assert_eq!(parsed.kind(), kind);
        }
    }

    #[test]
    fn test_frame_accessors() {
        let frame = InboundFrame::with_id("abc", "[1]");
        assert_eq!(frame.id(), Some("abc"));
        assert_eq!(frame.object(), "[1]");
        assert_eq!(InboundFrame::new("1").id(), None);
    }

    proptest! {
        #[test]
        fn prop_call_fields_survive_rendering(
            api in "\\PC*",
            verb in "\\PC*",
            obj in "\\PC*",
        ) {
            let receiver = ConnectionId::next();
            let message = Message::Call {
                api: api.clone(),
                verb: verb.clone(),
                frame: InboundFrame::new(obj.clone()),
            };

            let parsed = RenderedMessage::parse(&message.render(receiver).unwrap()).unwrap();
            prop_assert_eq!(
                parsed,
                RenderedMessage::Call { api, verb, obj, param: receiver.to_string() }
            );
        }

        #[test]
        fn prop_event_fields_survive_rendering(event in "\\PC*", obj in "\\PC*") {
            let message = Message::Event {
                event: event.clone(),
                frame: InboundFrame::new(obj.clone()),
            };

            let parsed = RenderedMessage::parse(&message.render(ConnectionId::next()).unwrap()).unwrap();
            prop_assert_eq!(parsed, RenderedMessage::Event { event, obj });
        }

        #[test]
        fn prop_reply_object_survives_rendering(obj in "\\PC*") {
            let message = Message::Reply { frame: InboundFrame::new(obj.clone()) };

            let parsed = RenderedMessage::parse(&message.render(ConnectionId::next()).unwrap()).unwrap();
            prop_assert_eq!(parsed, RenderedMessage::Reply { reply: "?".into(), obj });
        }
    }
}
