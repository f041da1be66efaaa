//! Per-connection FIFO of pending inbound messages.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use crate::protocol::Message;

// ============================================================================
// MessageQueue
// ============================================================================

/// Ordered queue of messages awaiting `Device::read`.
///
/// Insertion at the tail, removal at the head, bounded only by memory.
/// Once closed, the queue is empty and refuses new messages.
///
/// Not synchronized on its own; the owning [`super::Inbox`] wraps it in a
/// mutex.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: VecDeque<Message>,
    closed: bool,
}

impl MessageQueue {
    /// Creates an empty, open queue.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message at the tail.
    ///
    /// Returns the message back if the queue is closed.
    pub fn push(&mut self, message: Message) -> Result<(), Message> {
        if self.closed {
            return Err(message);
        }
        self.messages.push_back(message);
        Ok(())
    }

    /// Removes the message at the head.
    #[inline]
    pub fn pop(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    /// Returns the number of queued messages.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if no message is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Refuses further messages and drops the queued ones.
    ///
    /// Returns how many messages were dropped.
    pub fn close(&mut self) -> usize {
        self.closed = true;
        let dropped = self.messages.len();
        self.messages.clear();
        dropped
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::InboundFrame;

    fn reply(obj: &str) -> Message {
        Message::Reply {
            frame: InboundFrame::new(obj),
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = MessageQueue::new();
        queue.push(reply("1")).expect("open");
        queue.push(Message::Hangup).expect("open");
        queue.push(reply("3")).expect("open");

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(reply("1")));
        assert_eq!(queue.pop(), Some(Message::Hangup));
        assert_eq!(queue.pop(), Some(reply("3")));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_closed_queue_refuses_messages() {
        let mut queue = MessageQueue::new();
        queue.push(reply("1")).expect("open");
        queue.push(reply("2")).expect("open");

        assert_eq!(queue.close(), 2);
        assert!(queue.is_empty());

        let refused = queue.push(reply("3")).unwrap_err();
        assert_eq!(refused, reply("3"));
        assert_eq!(queue.pop(), None);
    }
}
