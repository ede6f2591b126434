//! Restart strategies (spec.md SPEC_FULL §C), grounded on
//! `snow-rt/src/actor/child_spec.rs`'s `Strategy` enum.

/// How a supervisor reacts to one child's exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Restart only the child that exited.
    OneForOne,
    /// Terminate every other child, then restart all of them in start order.
    OneForAll,
    /// Terminate every child started after the one that exited, then
    /// restart that child and all of those, in start order.
    RestForOne,
    /// Like `OneForOne`, but children are added dynamically at runtime from
    /// a single template spec rather than declared up front.
    SimpleOneForOne,
}
