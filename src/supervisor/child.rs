//! Child specs and runtime state (grounded on `snow-rt/src/actor/child_spec.rs`
//! and `supervisor.rs`'s `ChildState`).
//!
//! The teacher stores a child's start function as a raw `*const u8` entry
//! point plus an argument pointer, because its coroutines are spawned from
//! compiled machine code. This kernel's actors are plain `Behavior` trait
//! objects, so the equivalent is a boxed factory closure: `make` is called
//! once per (re)start and produces a fresh behavior instance.

use std::rc::Rc;

use crate::actor::{ActorId, Behavior};

/// When a stopped child should be restarted (spec.md SPEC_FULL §C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartType {
    /// Always restart, regardless of exit reason.
    Permanent,
    /// Restart only on abnormal exit (not `Normal`, not `Shutdown`).
    Transient,
    /// Never restart; removed from the supervisor's child list on exit.
    Temporary,
}

/// How a supervisor asks a child to stop (spec.md SPEC_FULL §C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownType {
    /// Kill immediately, no grace period.
    BrutalKill,
    /// Ask a trapping child to shut down on its own terms; force-kill if it
    /// hasn't exited within `0` milliseconds. Non-trapping children are
    /// always killed immediately regardless of this value.
    Timeout(u64),
}

/// A child the supervisor knows how to (re)start.
pub struct ChildSpec {
    pub id: String,
    pub restart: RestartType,
    pub shutdown: ShutdownType,
    pub mailbox_capacity: usize,
    pub make: Rc<dyn Fn(ActorId) -> Box<dyn Behavior>>,
}

impl Clone for ChildSpec {
    fn clone(&self) -> Self {
        ChildSpec {
            id: self.id.clone(),
            restart: self.restart,
            shutdown: self.shutdown,
            mailbox_capacity: self.mailbox_capacity,
            make: Rc::clone(&self.make),
        }
    }
}

impl ChildSpec {
    pub fn new(
        id: impl Into<String>,
        restart: RestartType,
        shutdown: ShutdownType,
        make: impl Fn(ActorId) -> Box<dyn Behavior> + 'static,
    ) -> Self {
        ChildSpec { id: id.into(), restart, shutdown, mailbox_capacity: 0, make: Rc::new(make) }
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }
}

/// A child's current runtime state, alongside its static spec.
pub struct ChildState {
    pub spec: ChildSpec,
    pub actor_id: Option<ActorId>,
    pub running: bool,
}

impl ChildState {
    pub fn new(spec: ChildSpec) -> Self {
        ChildState { spec, actor_id: None, running: false }
    }
}
