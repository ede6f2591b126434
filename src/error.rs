//! Crate-wide error types.
//!
//! Each component gets its own canonical error enum rather than one giant
//! catch-all, following the shape of `SupervisorError` in the airssys-rt
//! example pack: one variant per failure mode named in spec.md §7's
//! taxonomy, `#[error(...)]` messages, `#[source]` chains where a lower
//! layer's error is wrapped.

use thiserror::Error;

use crate::actor::ActorId;

/// Errors from kernel-level operations: spawn, send, step.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("actor table is full")]
    TableFull,

    #[error("destination actor {0} does not exist or has stopped")]
    UnknownActor(ActorId),

    #[error("mailbox of actor {0} is full")]
    MailboxFull(ActorId),

    #[error("no transport registered for node {0}")]
    NoTransport(u32),

    #[error("operation requires a currently-running actor context")]
    NoCurrentActor,
}

/// Errors from the name/path registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("name '{0}' is already registered")]
    NameTaken(String),

    #[error("path '{0}' is already registered")]
    PathTaken(String),

    #[error("name exceeds the 63-byte limit: '{0}'")]
    NameTooLong(String),

    #[error("name '{0}' is not registered")]
    NameNotFound(String),

    #[error("synchronous call timed out after {0} scheduler steps")]
    CallBudgetExhausted(u32),
}

/// Errors from the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("restart intensity exceeded: {restarts} restarts within {window_ms}ms")]
    RestartIntensityExceeded { restarts: u32, window_ms: u64 },

    #[error("child '{0}' failed to start: {1}")]
    ChildStartFailed(String, String),

    #[error("unknown child id {0}")]
    UnknownChild(usize),
}

/// Errors from the HTTP/WS/SSE connection engine. Protocol failures (§7) move
/// the connection to its Error state and are reported once via this type;
/// they are not retried by the engine.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("malformed HTTP status line: {0}")]
    BadStatusLine(String),

    #[error("malformed HTTP request line: {0}")]
    BadRequestLine(String),

    #[error("malformed header: {0}")]
    BadHeader(String),

    #[error("malformed chunk size line: {0}")]
    BadChunkSize(String),

    #[error("WebSocket handshake failed: {0}")]
    WsHandshakeFailed(String),

    #[error("invalid WebSocket frame: {0}")]
    BadFrame(String),

    #[error("connection slot pool exhausted")]
    SlotsExhausted,

    #[error("unknown connection id")]
    UnknownConn,

    #[error("write failed: {0}")]
    Io(#[source] std::io::Error),

    #[error("peer reset the connection")]
    Reset,
}

impl From<std::io::Error> for ConnError {
    fn from(e: std::io::Error) -> Self {
        ConnError::Io(e)
    }
}

/// Errors from the cross-node transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("handshake magic mismatch: expected {expected:#x}, got {got:#x}")]
    MagicMismatch { expected: u32, got: u32 },

    #[error("peer node id {0} is already connected")]
    DuplicateNode(u32),

    #[error("peer node id equals local node id ({0})")]
    SelfConnect(u32),

    #[error("transport table is full")]
    TableFull,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
