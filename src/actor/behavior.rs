//! The actor behavior function (spec.md §3: "opaque state with an optional
//! release callback; a behavior function").
//!
//! The teacher's ABI (snow-rt) models state as a raw pointer plus a manual
//! release callback because its entry points are `extern "C" fn(*const u8)`.
//! In safe Rust the idiomatic replacement (spec.md §9: "manual pointers →
//! ownership") is to let a `Behavior` own its state directly and rely on
//! `Drop` for release — a closure capturing its state, or any type
//! implementing this trait, gets cleanup for free when the kernel drops it
//! after the actor reaches `Stopped`.

use super::Kernel;
use crate::message::Message;

/// Invoked once per delivered message. Returning `false` means normal
/// termination (spec.md §3); returning `true` requests continuation,
/// provided the mailbox still holds more messages or later receives one.
pub trait Behavior: 'static {
    fn handle(&mut self, kernel: &mut Kernel, msg: Message) -> bool;
}

impl<F> Behavior for F
where
    F: FnMut(&mut Kernel, Message) -> bool + 'static,
{
    fn handle(&mut self, kernel: &mut Kernel, msg: Message) -> bool {
        self(kernel, msg)
    }
}
