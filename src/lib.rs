//! `finch-rt`: a cooperative, single-threaded actor microkernel.
//!
//! One OS thread runs every actor's behavior to completion before the next
//! runs (spec.md §1 Non-goals: no preemption, no multithreading). Actors
//! communicate by sending typed, owned messages through bounded mailboxes;
//! a single `mio`-backed poll set multiplexes cross-node transports, timers,
//! arbitrary fd watches, and the HTTP/1.1 + SSE + WebSocket connection
//! engine into the same run loop that drives the scheduler (spec.md §4,
//! §5). A supervision tree on top of bidirectional process links provides
//! Erlang/OTP-style restart strategies (SPEC_FULL.md §C).
//!
//! Start here: [`kernel::Kernel`] owns every table and exposes the
//! external operations of spec.md §6 as inherent methods; [`actor::Behavior`]
//! is what an application implements; [`supervisor::start_supervisor`]
//! wraps a group of behaviors in a restart strategy.

pub mod actor;
pub mod conn;
pub mod config;
pub mod error;
pub mod fdwatch;
pub mod kernel;
pub mod message;
pub mod registry;
pub mod supervisor;
pub mod timer;
pub mod transport;
pub mod util;

pub use actor::{ActorId, Behavior, ExitReason};
pub use config::KernelConfig;
pub use kernel::Kernel;
pub use message::{tags, Message};
