//! The actor table: a slot array indexed by local sequence number
//! (spec.md §3 "Actor table").

use super::behavior::Behavior;
use super::lifecycle::{ActorStatus, ExitReason};
use super::mailbox::Mailbox;
use super::ActorId;

/// One actor's runtime state. Owns its mailbox and its behavior (which in
/// turn owns whatever application state it was constructed with — see
/// `behavior.rs`).
pub struct ActorSlot {
    pub id: ActorId,
    pub mailbox: Mailbox,
    pub behavior: Box<dyn Behavior>,
    pub status: ActorStatus,
    pub parent: Option<ActorId>,
    pub exit_reason: Option<ExitReason>,
    /// Bidirectional links (spec.md SPEC_FULL §C): actors notified (or
    /// killed, if not trapping) when this actor exits, and vice versa.
    pub links: Vec<ActorId>,
    /// One-way monitors: actors to notify with `ProcessDown` on exit, never
    /// killed themselves.
    pub monitors: Vec<ActorId>,
    pub trap_exit: bool,
}

/// Slot array over actor sequence numbers. Slot 0 is never used (sequence 0
/// is the reserved invalid id); `slots[seq]` holds the actor with that
/// sequence once spawned, `None` once destroyed or never allocated.
pub struct ActorTable {
    slots: Vec<Option<ActorSlot>>,
    next_sequence: u32,
    capacity: usize,
}

impl ActorTable {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity + 1);
        slots.push(None); // index 0 reserved
        ActorTable { slots, next_sequence: 1, capacity }
    }

    /// Allocate a fresh sequence number and insert `slot`. Fails (returning
    /// `None` and not inserting) once the table has issued `capacity`
    /// sequences — spec.md §4.3 "Fails when the actor table is full".
    pub fn insert(&mut self, make_slot: impl FnOnce(ActorId) -> ActorSlot) -> Option<ActorId> {
        if self.len() >= self.capacity {
            return None;
        }
        let seq = self.next_sequence;
        self.next_sequence += 1;
        let id = ActorId::new(0, seq);
        let slot = make_slot(id);
        if self.slots.len() <= seq as usize {
            self.slots.resize_with(seq as usize + 1, || None);
        }
        self.slots[seq as usize] = Some(slot);
        Some(id)
    }

    pub fn get(&self, id: ActorId) -> Option<&ActorSlot> {
        self.slots.get(id.sequence() as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut ActorSlot> {
        self.slots.get_mut(id.sequence() as usize).and_then(|s| s.as_mut())
    }

    /// Temporarily remove a slot so its behavior can be invoked without
    /// holding a live borrow of the table (avoids the aliasing problem of
    /// a behavior re-entering the kernel for its own actor id).
    pub fn take(&mut self, id: ActorId) -> Option<ActorSlot> {
        self.slots.get_mut(id.sequence() as usize).and_then(|s| s.take())
    }

    pub fn put_back(&mut self, slot: ActorSlot) {
        let seq = slot.id.sequence() as usize;
        if self.slots.len() <= seq {
            self.slots.resize_with(seq + 1, || None);
        }
        self.slots[seq] = Some(slot);
    }

    /// Permanently remove a slot (the cleanup pass, after it has run through
    /// resource release). A dead id never re-resolves because `next_sequence`
    /// never rewinds.
    pub fn destroy(&mut self, id: ActorId) -> Option<ActorSlot> {
        self.slots.get_mut(id.sequence() as usize).and_then(|s| s.take())
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.slots.iter().filter_map(|s| s.as_ref().map(|slot| slot.id))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopBehavior;
    impl Behavior for NoopBehavior {
        fn handle(&mut self, _kernel: &mut super::super::Kernel, _msg: crate::message::Message) -> bool {
            false
        }
    }

    fn slot(id: ActorId) -> ActorSlot {
        ActorSlot {
            id,
            mailbox: Mailbox::new(4),
            behavior: Box::new(NoopBehavior),
            status: ActorStatus::Idle,
            parent: None,
            exit_reason: None,
            links: Vec::new(),
            monitors: Vec::new(),
            trap_exit: false,
        }
    }

    #[test]
    fn sequences_are_monotonic_and_never_reused() {
        let mut t = ActorTable::new(10);
        let a = t.insert(slot).unwrap();
        let b = t.insert(slot).unwrap();
        assert!(a.sequence() < b.sequence());
        t.destroy(a);
        let c = t.insert(slot).unwrap();
        assert_ne!(c, a, "a freed sequence must never be reissued");
    }

    #[test]
    fn insert_fails_once_capacity_reached() {
        let mut t = ActorTable::new(1);
        assert!(t.insert(slot).is_some());
        assert!(t.insert(slot).is_none());
    }

    #[test]
    fn dead_id_does_not_resolve() {
        let mut t = ActorTable::new(10);
        let a = t.insert(slot).unwrap();
        t.destroy(a);
        assert!(t.get(a).is_none());
    }
}
