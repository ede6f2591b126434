//! Poll-set construction (spec.md §4.3 "Poll set construction").
//!
//! Each wakeup rebuilds the registered-source set from the live tables rather
//! than diffing against the previous call — "rebuild (not diff) keeps
//! invariants local". `mio::Registry` has no bulk "replace" operation, so the
//! rebuild is expressed as: deregister everything this kernel registered last
//! time, then register everything live now. The cost is a few extra epoll_ctl
//! calls per wakeup; the benefit is that `register_all` is the single place
//! that can get the pollfd set wrong.
//!
//! Timers are not backed by platform timer fds (`timerfd`/`kqueue` EVFILT_TIMER
//! are not exposed portably through `mio`, and the kernel targets embedded
//! platforms that may have neither) — instead the earliest upcoming deadline
//! caps the poll timeout, and expired timers are fired by a direct scan after
//! each `poll` returns. This is a deliberate deviation from a literal fd-per-timer
//! model; see DESIGN.md.

use std::time::Duration;

use mio::unix::SourceFd;
use mio::{Interest, Token};

use super::dispatch;
use super::Kernel;
use crate::conn::ConnDirection;

const KIND_SHIFT: usize = 56;
const KIND_TRANSPORT: usize = 0;
const KIND_FDWATCH: usize = 1;
const KIND_CONN: usize = 2;
const KIND_LISTENER: usize = 3;

fn token(kind: usize, idx: usize) -> Token {
    Token((kind << KIND_SHIFT) | idx)
}

fn decode(t: Token) -> (usize, usize) {
    (t.0 >> KIND_SHIFT, t.0 & ((1 << KIND_SHIFT) - 1))
}

impl Kernel {
    pub(super) fn poll_once(&mut self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.deregister_all()?;
        self.register_all()?;

        let effective_timeout = self.cap_timeout_to_next_deadline(timeout);
        self.poll.poll(&mut self.events, effective_timeout)?;

        self.fire_expired_timers();

        let mut events = std::mem::replace(&mut self.events, mio::Events::with_capacity(256));
        for ev in events.iter() {
            let (kind, idx) = decode(ev.token());
            match kind {
                KIND_TRANSPORT => dispatch::on_transport_readable(self, idx),
                KIND_FDWATCH => dispatch::on_fd_ready(self, idx, ev),
                KIND_CONN => dispatch::on_conn_ready(self, idx, ev),
                KIND_LISTENER => dispatch::on_listener_ready(self, idx),
                _ => {}
            }
        }
        events.clear();
        self.events = events;
        Ok(())
    }

    fn cap_timeout_to_next_deadline(&self, requested: Option<Duration>) -> Option<Duration> {
        let next = self.timers.next_deadline();
        match (requested, next) {
            (Some(r), Some(d)) => Some(r.min(d)),
            (None, Some(d)) => Some(d),
            (r, None) => r,
        }
    }

    fn fire_expired_timers(&mut self) {
        for (owner, payload) in self.timers.take_expired() {
            let _ = self.deliver_local(crate::actor::ActorId::INVALID, owner, crate::message::tags::TIMER, payload.encode());
        }
    }

    fn deregister_all(&mut self) -> std::io::Result<()> {
        for fd in self.transports.registered_fds() {
            let _ = self.poll.registry().deregister(&mut SourceFd(&fd));
        }
        for fd in self.fdwatch.registered_fds() {
            let _ = self.poll.registry().deregister(&mut SourceFd(&fd));
        }
        for fd in self.conns.registered_fds() {
            let _ = self.poll.registry().deregister(&mut SourceFd(&fd));
        }
        for fd in self.conns.registered_listener_fds() {
            let _ = self.poll.registry().deregister(&mut SourceFd(&fd));
        }
        Ok(())
    }

    fn register_all(&mut self) -> std::io::Result<()> {
        for (idx, fd) in self.transports.iter_fds() {
            self.poll.registry().register(&mut SourceFd(&fd), token(KIND_TRANSPORT, idx), Interest::READABLE)?;
        }
        for (idx, fd, mask) in self.fdwatch.iter_fds() {
            let interest = mask.to_interest();
            self.poll.registry().register(&mut SourceFd(&fd), token(KIND_FDWATCH, idx), interest)?;
        }
        for (idx, fd, dir) in self.conns.iter_fds() {
            let interest = match dir {
                ConnDirection::Sending => Interest::WRITABLE,
                ConnDirection::Receiving => Interest::READABLE,
            };
            self.poll.registry().register(&mut SourceFd(&fd), token(KIND_CONN, idx), interest)?;
        }
        for (idx, fd) in self.conns.iter_listener_fds() {
            self.poll.registry().register(&mut SourceFd(&fd), token(KIND_LISTENER, idx), Interest::READABLE)?;
        }
        Ok(())
    }
}
