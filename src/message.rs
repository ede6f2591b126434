//! The message envelope and the fixed payload schemas of spec.md §6.

use crate::actor::ActorId;

/// An owned, typed, sized message. Destroyed exactly once after the
/// receiving behavior returns (§3 invariant).
#[derive(Debug, Clone)]
pub struct Message {
    pub source: ActorId,
    pub dest: ActorId,
    pub type_tag: u32,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(source: ActorId, dest: ActorId, type_tag: u32, payload: Vec<u8>) -> Self {
        Message { source, dest, type_tag, payload }
    }
}

/// Reserved type tags for the kernel-originated messages of §6. User-defined
/// behaviors are free to use any tag at or above [`USER_TAG_START`].
pub mod tags {
    pub const TIMER: u32 = 1;
    pub const FD_EVENT: u32 = 2;
    pub const CHILD_EXIT: u32 = 3;
    pub const HTTP_REQUEST: u32 = 4;
    pub const HTTP_RESPONSE: u32 = 5;
    pub const HTTP_ERROR: u32 = 6;
    pub const SSE_OPEN: u32 = 7;
    pub const SSE_EVENT: u32 = 8;
    pub const SSE_CLOSED: u32 = 9;
    pub const WS_OPEN: u32 = 10;
    pub const WS_MESSAGE: u32 = 11;
    pub const WS_CLOSED: u32 = 12;
    pub const WS_ERROR: u32 = 13;
    pub const NAME_REGISTER: u32 = 14;
    pub const NAME_UNREGISTER: u32 = 15;
    pub const PATH_REGISTER: u32 = 16;
    pub const PATH_UNREGISTER: u32 = 17;
    pub const PROCESS_DOWN: u32 = 18;
    /// A supervisor asking a trapping child to shut down on its own terms
    /// (SPEC_FULL.md §C `ShutdownType::Timeout`); carries no payload.
    pub const SHUTDOWN_SIGNAL: u32 = 19;
    /// Self-addressed to a freshly spawned supervisor to start its children
    /// on the next scheduler step (SPEC_FULL.md §C); carries no payload.
    pub const SUPERVISOR_START: u32 = 20;
    /// Asks a `SimpleOneForOne` supervisor to start one more instance of its
    /// child template (SPEC_FULL.md §C); carries no payload.
    pub const SUPERVISOR_ADD_CHILD: u32 = 21;

    pub const USER_TAG_START: u32 = 1000;
}

/// `Timer{id, expirations}` — delivered when a timer fires (§6). A periodic
/// timer may coalesce multiple expirations into a single delivery; the count
/// is reported rather than dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerPayload {
    pub id: u32,
    pub expirations: u64,
}

impl TimerPayload {
    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12);
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.expirations.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 12 {
            return None;
        }
        let id = u32::from_le_bytes(buf[0..4].try_into().ok()?);
        let expirations = u64::from_le_bytes(buf[4..12].try_into().ok()?);
        Some(TimerPayload { id, expirations })
    }
}

/// `FdEvent{fd, revents}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdEventPayload {
    pub fd: i32,
    pub revents: u32,
}

impl FdEventPayload {
    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        buf.extend_from_slice(&self.fd.to_le_bytes());
        buf.extend_from_slice(&self.revents.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 8 {
            return None;
        }
        let fd = i32::from_le_bytes(buf[0..4].try_into().ok()?);
        let revents = u32::from_le_bytes(buf[4..8].try_into().ok()?);
        Some(FdEventPayload { fd, revents })
    }
}

/// Reason an actor (or linked process) exited, delivered to a parent as part
/// of `ChildExit`, or to a linked/monitoring actor as `ProcessDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitReasonTag {
    Normal = 0,
    Killed = 1,
    Error = 2,
    Shutdown = 3,
}

impl ExitReasonTag {
    pub fn from_u8(b: u8) -> Self {
        match b {
            1 => ExitReasonTag::Killed,
            2 => ExitReasonTag::Error,
            3 => ExitReasonTag::Shutdown,
            _ => ExitReasonTag::Normal,
        }
    }
}

/// `ChildExit{child_id, exit_reason}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExitPayload {
    pub child_id: ActorId,
    pub exit_reason: ExitReasonTag,
}

impl ChildExitPayload {
    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9);
        buf.extend_from_slice(&self.child_id.as_u64().to_le_bytes());
        buf.push(self.exit_reason as u8);
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 9 {
            return None;
        }
        let child_id = ActorId::from_u64(u64::from_le_bytes(buf[0..8].try_into().ok()?));
        let exit_reason = ExitReasonTag::from_u8(buf[8]);
        Some(ChildExitPayload { child_id, exit_reason })
    }
}

/// `ProcessDown{pid, reason}` — delivered to a monitor when the monitored
/// process exits (supplemented feature, see SPEC_FULL.md §C).
pub type ProcessDownPayload = ChildExitPayload;

/// A single HTTP header, stored as owned strings for simplicity at the
/// message boundary (the wire representation concatenates raw
/// `"Name: Value\0"` segments per spec.md §4.4; this is the parsed form
/// handed to actor behaviors).
pub type Header = (String, String);

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn take_bytes<'a>(buf: &'a [u8], at: &mut usize) -> Option<&'a [u8]> {
    let len = u32::from_le_bytes(buf.get(*at..*at + 4)?.try_into().ok()?) as usize;
    *at += 4;
    let slice = buf.get(*at..*at + len)?;
    *at += len;
    Some(slice)
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

fn take_str(buf: &[u8], at: &mut usize) -> Option<String> {
    Some(String::from_utf8(take_bytes(buf, at)?.to_vec()).ok()?)
}

fn put_headers(buf: &mut Vec<u8>, headers: &[Header]) {
    buf.extend_from_slice(&(headers.len() as u32).to_le_bytes());
    for (k, v) in headers {
        put_str(buf, k);
        put_str(buf, v);
    }
}

fn take_headers(buf: &[u8], at: &mut usize) -> Option<Vec<Header>> {
    let count = u32::from_le_bytes(buf.get(*at..*at + 4)?.try_into().ok()?) as usize;
    *at += 4;
    let mut headers = Vec::with_capacity(count);
    for _ in 0..count {
        let k = take_str(buf, at)?;
        let v = take_str(buf, at)?;
        headers.push((k, v));
    }
    Some(headers)
}

/// `HttpRequest{conn_id, method, path, headers, body}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequestPayload {
    pub conn_id: u32,
    pub method: String,
    pub path: String,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

impl HttpRequestPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.conn_id.to_le_bytes());
        put_str(&mut buf, &self.method);
        put_str(&mut buf, &self.path);
        put_headers(&mut buf, &self.headers);
        put_bytes(&mut buf, &self.body);
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let mut at = 0;
        let conn_id = u32::from_le_bytes(buf.get(at..at + 4)?.try_into().ok()?);
        at += 4;
        let method = take_str(buf, &mut at)?;
        let path = take_str(buf, &mut at)?;
        let headers = take_headers(buf, &mut at)?;
        let body = take_bytes(buf, &mut at)?.to_vec();
        Some(HttpRequestPayload { conn_id, method, path, headers, body })
    }
}

/// `HttpResponse{conn_id, status_code, headers, body}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponsePayload {
    pub conn_id: u32,
    pub status_code: i32,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

impl HttpResponsePayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.conn_id.to_le_bytes());
        buf.extend_from_slice(&self.status_code.to_le_bytes());
        put_headers(&mut buf, &self.headers);
        put_bytes(&mut buf, &self.body);
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let mut at = 0;
        let conn_id = u32::from_le_bytes(buf.get(at..at + 4)?.try_into().ok()?);
        at += 4;
        let status_code = i32::from_le_bytes(buf.get(at..at + 4)?.try_into().ok()?);
        at += 4;
        let headers = take_headers(buf, &mut at)?;
        let body = take_bytes(buf, &mut at)?.to_vec();
        Some(HttpResponsePayload { conn_id, status_code, headers, body })
    }
}

/// `HttpError{conn_id, code, message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpErrorPayload {
    pub conn_id: u32,
    pub code: i32,
    pub message: String,
}

impl HttpErrorPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.conn_id.to_le_bytes());
        buf.extend_from_slice(&self.code.to_le_bytes());
        put_str(&mut buf, &self.message);
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let mut at = 0;
        let conn_id = u32::from_le_bytes(buf.get(at..at + 4)?.try_into().ok()?);
        at += 4;
        let code = i32::from_le_bytes(buf.get(at..at + 4)?.try_into().ok()?);
        at += 4;
        let message = take_str(buf, &mut at)?;
        Some(HttpErrorPayload { conn_id, code, message })
    }
}

/// `SseOpen/Closed{conn_id, status}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SseStatusPayload {
    pub conn_id: u32,
    pub status: i32,
}

impl SseStatusPayload {
    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        buf.extend_from_slice(&self.conn_id.to_le_bytes());
        buf.extend_from_slice(&self.status.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 8 {
            return None;
        }
        Some(SseStatusPayload {
            conn_id: u32::from_le_bytes(buf[0..4].try_into().ok()?),
            status: i32::from_le_bytes(buf[4..8].try_into().ok()?),
        })
    }
}

/// `SseEvent{conn_id, event, data}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEventPayload {
    pub conn_id: u32,
    pub event: String,
    pub data: String,
}

impl SseEventPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.conn_id.to_le_bytes());
        put_str(&mut buf, &self.event);
        put_str(&mut buf, &self.data);
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let mut at = 0;
        let conn_id = u32::from_le_bytes(buf.get(at..at + 4)?.try_into().ok()?);
        at += 4;
        let event = take_str(buf, &mut at)?;
        let data = take_str(buf, &mut at)?;
        Some(SseEventPayload { conn_id, event, data })
    }
}

/// `WsOpen{conn_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsOpenPayload {
    pub conn_id: u32,
}

impl WsOpenPayload {
    pub fn encode(self) -> Vec<u8> {
        self.conn_id.to_le_bytes().to_vec()
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        Some(WsOpenPayload { conn_id: u32::from_le_bytes(buf.get(0..4)?.try_into().ok()?) })
    }
}

/// `WsMessage{conn_id, is_binary, data}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsMessagePayload {
    pub conn_id: u32,
    pub is_binary: bool,
    pub data: Vec<u8>,
}

impl WsMessagePayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.conn_id.to_le_bytes());
        buf.push(self.is_binary as u8);
        put_bytes(&mut buf, &self.data);
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let mut at = 0;
        let conn_id = u32::from_le_bytes(buf.get(at..at + 4)?.try_into().ok()?);
        at += 4;
        let is_binary = *buf.get(at)? != 0;
        at += 1;
        let data = take_bytes(buf, &mut at)?.to_vec();
        Some(WsMessagePayload { conn_id, is_binary, data })
    }
}

/// `WsClosed{conn_id, close_code}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsClosedPayload {
    pub conn_id: u32,
    pub close_code: u16,
}

impl WsClosedPayload {
    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(6);
        buf.extend_from_slice(&self.conn_id.to_le_bytes());
        buf.extend_from_slice(&self.close_code.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 6 {
            return None;
        }
        Some(WsClosedPayload {
            conn_id: u32::from_le_bytes(buf[0..4].try_into().ok()?),
            close_code: u16::from_le_bytes(buf[4..6].try_into().ok()?),
        })
    }
}

/// `WsError{conn_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsErrorPayload {
    pub conn_id: u32,
}

impl WsErrorPayload {
    pub fn encode(self) -> Vec<u8> {
        self.conn_id.to_le_bytes().to_vec()
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        Some(WsErrorPayload { conn_id: u32::from_le_bytes(buf.get(0..4)?.try_into().ok()?) })
    }
}

/// `NameRegister/Unregister{name, actor_id}` — broadcast over transports when
/// a flat (non-`/`) name is (de)registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRegisterPayload {
    pub name: String,
    pub actor_id: ActorId,
}

impl NameRegisterPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_str(&mut buf, &self.name);
        buf.extend_from_slice(&self.actor_id.as_u64().to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let mut at = 0;
        let name = take_str(buf, &mut at)?;
        let actor_id = ActorId::from_u64(u64::from_le_bytes(buf.get(at..at + 8)?.try_into().ok()?));
        Some(NameRegisterPayload { name, actor_id })
    }
}

/// `PathRegister/Unregister{path, actor_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRegisterPayload {
    pub path: String,
    pub actor_id: ActorId,
}

impl PathRegisterPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_str(&mut buf, &self.path);
        buf.extend_from_slice(&self.actor_id.as_u64().to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let mut at = 0;
        let path = take_str(buf, &mut at)?;
        let actor_id = ActorId::from_u64(u64::from_le_bytes(buf.get(at..at + 8)?.try_into().ok()?));
        Some(PathRegisterPayload { path, actor_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_payload_round_trips() {
        let p = TimerPayload { id: 7, expirations: 3 };
        assert_eq!(TimerPayload::decode(&p.encode()), Some(p));
    }

    #[test]
    fn fd_event_payload_round_trips() {
        let p = FdEventPayload { fd: -1, revents: 0x4 };
        assert_eq!(FdEventPayload::decode(&p.encode()), Some(p));
    }

    #[test]
    fn child_exit_payload_round_trips() {
        let p = ChildExitPayload {
            child_id: ActorId::new(0, 5),
            exit_reason: ExitReasonTag::Error,
        };
        assert_eq!(ChildExitPayload::decode(&p.encode()), Some(p));
    }

    #[test]
    fn http_request_payload_round_trips_with_headers_and_body() {
        let p = HttpRequestPayload {
            conn_id: 3,
            method: "GET".into(),
            path: "/hello".into(),
            headers: vec![("Host".into(), "x".into())],
            body: vec![1, 2, 3],
        };
        assert_eq!(HttpRequestPayload::decode(&p.encode()), Some(p));
    }

    #[test]
    fn ws_message_payload_round_trips() {
        let p = WsMessagePayload { conn_id: 1, is_binary: false, data: b"hello ws".to_vec() };
        assert_eq!(WsMessagePayload::decode(&p.encode()), Some(p));
    }

    #[test]
    fn name_register_payload_round_trips() {
        let p = NameRegisterPayload { name: "alice".into(), actor_id: ActorId::new(0, 9) };
        assert_eq!(NameRegisterPayload::decode(&p.encode()), Some(p));
    }
}
