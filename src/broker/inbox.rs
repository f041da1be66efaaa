//! Callback adapters feeding a connection's queue.
//!
//! The [`Inbox`] is what the binder sees as a connection's
//! [`SessionHandler`]. Each callback turns a frame into a [`Message`] and
//! appends it under the queue lock; nothing else happens on the transport
//! task.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::identifiers::ConnectionId;
use crate::protocol::{InboundFrame, Message, MessageKind};
use crate::transport::SessionHandler;

use super::connection::Role;
use super::queue::MessageQueue;

// ============================================================================
// Inbox
// ============================================================================

/// Thread-safe queue endpoint of one connection.
///
/// Shared between the connection (consumer) and its session's transport
/// task (producer). Closing the inbox stops delivery before the queue's
/// storage goes away.
#[derive(Debug)]
pub struct Inbox {
    /// Connection owning this inbox.
    owner: ConnectionId,
    /// Role of the owner, for log context.
    role: Role,
    /// Pending messages.
    queue: Mutex<MessageQueue>,
}

impl Inbox {
    /// Creates an empty inbox for `owner`.
    #[inline]
    #[must_use]
    pub fn new(owner: ConnectionId, role: Role) -> Self {
        Self {
            owner,
            role,
            queue: Mutex::new(MessageQueue::new()),
        }
    }

    /// Returns the owning connection.
    #[inline]
    #[must_use]
    pub fn owner(&self) -> ConnectionId {
        self.owner
    }

    /// Appends a message at the tail.
    ///
    /// Messages arriving after [`Inbox::close`] are dropped.
    pub fn enqueue(&self, message: Message) {
        let kind = message.kind();
        let refused = self.queue.lock().push(message).is_err();

        if refused {
            trace!(connection = %self.owner, %kind, "Dropped message for closed connection");
        }
    }

    /// Removes the message at the head, if any.
    #[inline]
    pub fn dequeue(&self) -> Option<Message> {
        self.queue.lock().pop()
    }

    /// Returns the number of pending messages.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns `true` if no message is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Stops delivery and drops pending messages.
    pub fn close(&self) {
        let dropped = self.queue.lock().close();
        if dropped > 0 {
            debug!(connection = %self.owner, dropped, "Discarded unread messages");
        }
    }

    fn log_delivery(&self, kind: MessageKind, detail: &str, frame: Option<&InboundFrame>) {
        debug!(
            connection = %self.owner,
            role = %self.role,
            %kind,
            detail,
            obj = frame.map(InboundFrame::object).unwrap_or_default(),
            "Inbound message"
        );
    }
}

impl SessionHandler for Inbox {
    fn on_hangup(&self) {
        self.log_delivery(MessageKind::Hangup, "", None);
        self.enqueue(Message::Hangup);
    }

    fn on_call(&self, api: &str, verb: &str, frame: InboundFrame) {
        self.log_delivery(MessageKind::Call, &format!("{api}/{verb}"), Some(&frame));
        self.enqueue(Message::Call {
            api: api.to_owned(),
            verb: verb.to_owned(),
            frame,
        });
    }

    fn on_event(&self, event: &str, frame: InboundFrame) {
        self.log_delivery(MessageKind::Event, event, Some(&frame));
        self.enqueue(Message::Event {
            event: event.to_owned(),
            frame,
        });
    }

    fn on_reply(&self, frame: InboundFrame) {
        self.log_delivery(MessageKind::Reply, "", Some(&frame));
        self.enqueue(Message::Reply { frame });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_callbacks_enqueue_in_order() {
        let inbox = Inbox::new(ConnectionId::next(), Role::Client);

        inbox.on_call("hello", "ping", InboundFrame::with_id("1", "{}"));
        inbox.on_event("tick", InboundFrame::new("1"));
        inbox.on_reply(InboundFrame::new("true"));
        inbox.on_hangup();

        assert_eq!(inbox.len(), 4);
        let kinds: Vec<_> = std::iter::from_fn(|| inbox.dequeue())
            .map(|m| m.kind())
            .collect();
        assert_eq!(
            kinds,
            [
                MessageKind::Call,
                MessageKind::Event,
                MessageKind::Reply,
                MessageKind::Hangup
            ]
        );
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_closed_inbox_drops_callbacks() {
        let inbox = Inbox::new(ConnectionId::next(), Role::AcceptedChild);
        inbox.on_event("before", InboundFrame::new("1"));

        inbox.close();
        inbox.on_event("after", InboundFrame::new("2"));

        assert!(inbox.is_empty());
        assert_eq!(inbox.dequeue(), None);
    }

    #[test]
    fn test_concurrent_producers_keep_per_thread_order() {
        let inbox = Arc::new(Inbox::new(ConnectionId::next(), Role::Client));

        let producers: Vec<_> = (0..4)
            .map(|t| {
                let inbox = Arc::clone(&inbox);
                thread::spawn(move || {
                    for i in 0..50 {
                        inbox.on_event(&format!("t{t}"), InboundFrame::new(i.to_string()));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().expect("producer thread");
        }

        assert_eq!(inbox.len(), 200);

        let mut last_seen = [-1i64; 4];
        while let Some(Message::Event { event, frame }) = inbox.dequeue() {
            let t: usize = event[1..].parse().expect("thread index");
            let i: i64 = frame.object().parse().expect("sequence");
            assert!(i > last_seen[t], "per-producer order violated");
            last_seen[t] = i;
        }
        assert_eq!(last_seen, [49; 4]);
    }
}
