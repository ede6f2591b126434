//! WebSocket framing and handshake (spec.md §4.4).

pub mod frame;
pub mod handshake;

pub use frame::{WsFrame, WsOpcode};
