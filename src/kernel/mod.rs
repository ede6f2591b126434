//! The runtime kernel: spawn/stop/send/step/run, poll-set construction, event
//! dispatch, and the stopped-actor cleanup pass (spec.md §4.3).

mod api;
mod cleanup;
mod dispatch;
mod poll;

use std::time::Duration;

use tracing::{debug, warn};

use crate::actor::{ActorId, ActorSlot, ActorStatus, ActorTable, Behavior, ExitReason, Scheduler};
use crate::config::KernelConfig;
use crate::conn::ConnTable;
use crate::error::KernelError;
use crate::fdwatch::FdWatchTable;
use crate::message::{tags, Message};
use crate::registry::Registry;
use crate::timer::TimerTable;
use crate::transport::TransportTable;

/// Owns every kernel-level table and drives the single-threaded run loop.
/// Nothing here is behind a lock: spec.md §5 — "all mutations happen on this
/// single thread."
pub struct Kernel {
    pub(crate) node_id: u32,
    pub(crate) actors: ActorTable,
    pub(crate) scheduler: Scheduler,
    pub(crate) registry: Registry,
    pub(crate) timers: TimerTable,
    pub(crate) fdwatch: FdWatchTable,
    pub(crate) conns: ConnTable,
    pub(crate) transports: TransportTable,
    pub(crate) poll: mio::Poll,
    pub(crate) events: mio::Events,
    /// The actor currently executing its behavior, if any (spec.md §4.3:
    /// "source is the currently running actor, or Invalid if called from
    /// outside a behavior"). Doubles as the context a `Behavior::handle`
    /// implementation reads via [`Kernel::current`].
    current: Option<ActorId>,
    /// Set by [`Kernel::stop_self`] while a behavior is running; consumed by
    /// `step` once the behavior returns (the slot is out of the table for
    /// the duration of the call, so it cannot be mutated directly).
    pending_self_stop: Option<(ActorId, ExitReason)>,
    stopping: bool,
    config: KernelConfig,
}

impl Kernel {
    pub fn new(node_id: u32, config: KernelConfig) -> std::io::Result<Self> {
        let poll = mio::Poll::new()?;
        Ok(Kernel {
            node_id,
            actors: ActorTable::new(config.actor_table_capacity),
            scheduler: Scheduler::new(),
            registry: Registry::new(),
            timers: TimerTable::new(),
            fdwatch: FdWatchTable::new(),
            conns: ConnTable::new(config.connection_slots),
            transports: TransportTable::new(config.transport_slots),
            poll,
            events: mio::Events::with_capacity(256),
            current: None,
            pending_self_stop: None,
            stopping: false,
            config,
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    /// The actor currently executing, or `ActorId::INVALID` outside a
    /// behavior invocation (spec.md §6: `self() → actor_id`).
    pub fn current(&self) -> ActorId {
        self.current.unwrap_or(ActorId::INVALID)
    }

    /// Allocate a fresh actor, running `make_behavior` with its id to build
    /// the initial behavior (spec.md §4.3 "Spawn").
    pub fn spawn(
        &mut self,
        parent: Option<ActorId>,
        mailbox_capacity: usize,
        make_behavior: impl FnOnce(ActorId) -> Box<dyn Behavior>,
    ) -> Result<ActorId, KernelError> {
        let cap = if mailbox_capacity == 0 { self.config.default_mailbox_capacity } else { mailbox_capacity };
        let id = self
            .actors
            .insert(|id| ActorSlot {
                id,
                mailbox: crate::actor::Mailbox::new(cap),
                behavior: make_behavior(id),
                status: ActorStatus::Idle,
                parent,
                exit_reason: None,
                links: Vec::new(),
                monitors: Vec::new(),
                trap_exit: false,
            })
            .ok_or(KernelError::TableFull)?;
        debug!(actor = %id, "spawned");
        Ok(id)
    }

    /// Mark `id` as exited with `reason` and run its cleanup pass (spec.md
    /// §4.3). If `id` is the actor currently executing its own behavior, the
    /// slot is out of the table (see [`Kernel::step`]) — deferred to
    /// [`Kernel::stop_self`]'s `pending_self_stop` mechanism instead.
    pub fn stop(&mut self, id: ActorId, reason: ExitReason) {
        if self.current == Some(id) {
            self.pending_self_stop = Some((id, reason));
            return;
        }
        if let Some(slot) = self.actors.get_mut(id) {
            if slot.status != ActorStatus::Stopped {
                slot.status = ActorStatus::Stopped;
                slot.exit_reason = Some(reason);
            }
        }
        cleanup::finalize_one(self, id);
    }

    /// Request the run loop exit after the current drain (spec.md §4.3 "Run
    /// loop": "Repeat ... or `stop()` called" — here read as "shut the
    /// kernel down", distinct from stopping a single actor).
    pub fn shutdown(&mut self) {
        self.stopping = true;
    }

    /// Route a message to `dest` (spec.md §4.3 "Send").
    pub fn send(&mut self, dest: ActorId, type_tag: u32, payload: Vec<u8>) -> Result<(), KernelError> {
        let source = self.current();
        self.send_as(source, dest, type_tag, payload)
    }

    /// Route a message with an explicit source, bypassing [`Kernel::current`].
    /// Used by callers driving the kernel from outside a behavior (the
    /// registry's synchronous `call` helper, transport handshake replay).
    pub fn send_as(&mut self, source: ActorId, dest: ActorId, type_tag: u32, payload: Vec<u8>) -> Result<(), KernelError> {
        if dest.node_id() != self.node_id && dest.node_id() != 0 {
            return self.send_remote(source, dest, type_tag, payload);
        }
        self.deliver_local(source, dest, type_tag, payload)
    }

    pub(crate) fn deliver_local(
        &mut self,
        source: ActorId,
        dest: ActorId,
        type_tag: u32,
        payload: Vec<u8>,
    ) -> Result<(), KernelError> {
        let was_idle = {
            let slot = self.actors.get_mut(dest).ok_or(KernelError::UnknownActor(dest))?;
            if slot.status == ActorStatus::Stopped {
                return Err(KernelError::UnknownActor(dest));
            }
            let msg = Message::new(source, dest, type_tag, payload);
            if !slot.mailbox.enqueue(msg) {
                return Err(KernelError::MailboxFull(dest));
            }
            slot.status == ActorStatus::Idle
        };
        if was_idle {
            if let Some(slot) = self.actors.get_mut(dest) {
                slot.status = ActorStatus::Ready;
            }
            self.scheduler.enqueue(dest);
        }
        Ok(())
    }

    fn send_remote(
        &mut self,
        source: ActorId,
        dest: ActorId,
        type_tag: u32,
        payload: Vec<u8>,
    ) -> Result<(), KernelError> {
        let node = dest.node_id();
        let transport = self.transports.get_mut_by_node(node).ok_or(KernelError::NoTransport(node))?;
        let msg = Message::new(source, dest, type_tag, payload);
        transport
            .send(&msg)
            .map_err(|_| KernelError::NoTransport(node))
    }

    /// Run one actor through one message (spec.md §4.3 "Step").
    pub fn step(&mut self) -> bool {
        let Some(id) = self.scheduler.dequeue() else { return false };
        let Some(mut slot) = self.actors.take(id) else { return true };
        slot.status = ActorStatus::Running;
        let Some(msg) = slot.mailbox.dequeue() else {
            slot.status = ActorStatus::Idle;
            self.actors.put_back(slot);
            return true;
        };

        self.current = Some(id);
        let keep_going = slot.behavior.handle(self, msg);
        self.current = None;

        if let Some((stopped_id, reason)) = self.pending_self_stop.take() {
            if stopped_id == id {
                slot.status = ActorStatus::Stopped;
                slot.exit_reason = Some(reason);
            }
        }

        if !keep_going && slot.status != ActorStatus::Stopped {
            slot.status = ActorStatus::Stopped;
            slot.exit_reason = Some(ExitReason::Normal);
        }

        if slot.status != ActorStatus::Stopped && !slot.mailbox.is_empty() {
            slot.status = ActorStatus::Ready;
            self.scheduler.enqueue(id);
        } else if slot.status != ActorStatus::Stopped {
            slot.status = ActorStatus::Idle;
        }

        self.actors.put_back(slot);

        if self.actors.get(id).map(|s| s.status) == Some(ActorStatus::Stopped) {
            cleanup::finalize_one(self, id);
        }
        true
    }

    /// spec.md §4.3 "Run loop".
    pub fn run(&mut self) {
        loop {
            if self.stopping {
                break;
            }
            while self.step() {
                if self.stopping {
                    break;
                }
            }
            if self.stopping {
                break;
            }
            let has_io = self.has_io_sources();
            if !has_io && self.scheduler.is_empty() {
                break;
            }
            let timeout = if has_io { Some(Duration::from_millis(0)) } else { None };
            if let Err(e) = self.poll_once(timeout) {
                warn!(error = %e, "poll failed");
            }
            if self.scheduler.is_empty() && has_io {
                if let Err(e) = self.poll_once(Some(self.config.poll_timeout)) {
                    warn!(error = %e, "poll failed");
                }
            }
        }
    }

    fn has_io_sources(&self) -> bool {
        !self.transports.is_empty() || !self.timers.is_empty() || !self.fdwatch.is_empty() || !self.conns.is_empty()
    }

    /// Stop the currently running actor (the behavior-facing half of
    /// `Kernel::stop`, used when a behavior wants to terminate itself with a
    /// non-Normal reason — e.g. an observed error).
    pub fn stop_self(&mut self, reason: ExitReason) {
        if let Some(id) = self.current {
            self.pending_self_stop = Some((id, reason));
        }
    }
}
