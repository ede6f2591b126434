//! Bounded FIFO mailbox (spec.md §4.1).
//!
//! Grounded on the teacher's `Mailbox` (snow-rt's `actor/mailbox.rs`): a
//! `VecDeque` with push/pop at the two ends. The teacher wraps it in a
//! `parking_lot::Mutex` because its M:N scheduler delivers cross-thread;
//! this kernel is single-threaded (spec.md §5), so the mutex is dropped and
//! a capacity bound is added — overflow is reported to the sender rather
//! than silently dropped (§4.1).

use std::collections::VecDeque;

use crate::message::Message;

/// A bounded, owning FIFO queue of messages for one actor.
#[derive(Debug)]
pub struct Mailbox {
    queue: VecDeque<Message>,
    capacity: usize,
}

impl Mailbox {
    pub fn new(capacity: usize) -> Self {
        Mailbox { queue: VecDeque::with_capacity(capacity.min(64)), capacity }
    }

    /// Append a message to the back. Returns `false` (without enqueuing) if
    /// the mailbox is at capacity.
    #[must_use]
    pub fn enqueue(&mut self, msg: Message) -> bool {
        if self.queue.len() >= self.capacity {
            return false;
        }
        self.queue.push_back(msg);
        true
    }

    /// Remove and return the front message, or `None` if empty.
    pub fn dequeue(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorId;

    fn msg(tag: u32) -> Message {
        Message::new(ActorId::INVALID, ActorId::INVALID, tag, vec![])
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut mb = Mailbox::new(4);
        assert!(mb.enqueue(msg(1)));
        assert!(mb.enqueue(msg(2)));
        assert!(mb.enqueue(msg(3)));

        assert_eq!(mb.dequeue().unwrap().type_tag, 1);
        assert_eq!(mb.dequeue().unwrap().type_tag, 2);
        assert_eq!(mb.dequeue().unwrap().type_tag, 3);
        assert!(mb.dequeue().is_none());
    }

    #[test]
    fn overflow_is_reported_not_dropped() {
        let mut mb = Mailbox::new(2);
        assert!(mb.enqueue(msg(1)));
        assert!(mb.enqueue(msg(2)));
        assert!(!mb.enqueue(msg(3)), "enqueue past capacity must fail, not silently drop");
        assert_eq!(mb.len(), 2);
    }

    #[test]
    fn is_empty_tracks_length() {
        let mut mb = Mailbox::new(2);
        assert!(mb.is_empty());
        mb.enqueue(msg(1));
        assert!(!mb.is_empty());
    }
}
