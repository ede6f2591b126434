//! The connection engine: per-connection HTTP client/server, SSE, and
//! WebSocket state machines (spec.md §4.4).
//!
//! A connection is a discriminated record with one active state, driven by a
//! single `advance` entry point the kernel calls with the poll result. State
//! transitions and parsing follow spec.md §4.4's state diagrams; emission to
//! the owner actor happens through [`ConnEvent`], which the kernel's dispatch
//! layer encodes into a tagged [`crate::message::Message`].

pub mod chunked;
pub mod http;
pub mod sse;
pub mod ws;

use std::io::{ErrorKind, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

use mio::net::{TcpListener, TcpStream};
use rand::Rng;

use crate::actor::ActorId;
use crate::error::ConnError;
use crate::message::{
    HttpErrorPayload, HttpRequestPayload, HttpResponsePayload, SseEventPayload, SseStatusPayload, WsClosedPayload,
    WsErrorPayload, WsMessagePayload, WsOpenPayload,
};

use chunked::ChunkedDecoder;
use http::{BodyHint, HeaderAccumulator};
use sse::SseBuilder;
use ws::frame::{self, WsFrame, WsOpcode};
use ws::handshake;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnDirection {
    Sending,
    Receiving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Sending,
    RecvStatus,
    RecvHeaders,
    BodyContentLen,
    BodyChunked,
    BodyStream,
    WsActive,
    SrvRecvRequest,
    SrvRecvHeaders,
    SrvRecvBody,
    SrvSending,
    SrvSseActive,
    Done,
    Error,
}

pub enum ConnEvent {
    HttpResponse(HttpResponsePayload),
    HttpError(HttpErrorPayload),
    HttpRequest(HttpRequestPayload),
    SseOpen(SseStatusPayload),
    SseEvent(SseEventPayload),
    SseClosed(SseStatusPayload),
    WsOpen(WsOpenPayload),
    WsMessage(WsMessagePayload),
    WsClosed(WsClosedPayload),
    WsError(WsErrorPayload),
}

/// What kind of body/upgrade this connection ends up negotiating, decided
/// once headers finish parsing.
#[derive(Clone, Copy, PartialEq, Eq)]
enum BodyMode {
    WebSocket,
    Sse,
    ContentLen(usize),
    Chunked,
    UntilClose,
    None,
}

pub struct Connection {
    pub id: u32,
    pub owner: ActorId,
    socket: TcpStream,
    state: State,
    is_client: bool,
    write_buf: Vec<u8>,
    header_acc: HeaderAccumulator,
    body_hint: BodyHint,
    body_mode: BodyMode,
    body: Vec<u8>,
    chunked: ChunkedDecoder,
    sse: SseBuilder,
    status: i32,
    method: String,
    path: String,
    headers: Vec<crate::message::Header>,
    ws_sent_key: Option<String>,
    ws_read_buf: Vec<u8>,
    /// Set by `connect_sse`; the response body mode is decided from what the
    /// caller asked to connect as, not guessed from the response shape.
    expects_sse: bool,
}

impl Connection {
    pub fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    pub fn direction(&self) -> ConnDirection {
        if !self.write_buf.is_empty() {
            ConnDirection::Sending
        } else {
            ConnDirection::Receiving
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, State::Done | State::Error)
    }

    /// Build a client connection and queue the request line/headers for
    /// the first writable wakeup (spec.md §6 `http_get`/`http_fetch`).
    pub fn connect_http(
        id: u32,
        owner: ActorId,
        addr: std::net::SocketAddr,
        method: &str,
        path: &str,
        mut headers: Vec<crate::message::Header>,
        body: &[u8],
    ) -> std::io::Result<Self> {
        let socket = TcpStream::connect(addr)?;
        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("Content-Length")) && !body.is_empty() {
            headers.push(("Content-Length".into(), body.len().to_string()));
        }
        let mut buf = format!("{method} {path} HTTP/1.1\r\n").into_bytes();
        for (k, v) in &headers {
            buf.extend_from_slice(format!("{k}: {v}\r\n").as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(body);
        Ok(Connection {
            id,
            owner,
            socket,
            state: State::Sending,
            is_client: true,
            write_buf: buf,
            header_acc: HeaderAccumulator::new(),
            body_hint: BodyHint::default(),
            body_mode: BodyMode::None,
            body: Vec::new(),
            chunked: ChunkedDecoder::new(),
            sse: SseBuilder::new(),
            status: 0,
            method: String::new(),
            path: String::new(),
            headers: Vec::new(),
            ws_sent_key: None,
            ws_read_buf: Vec::new(),
            expects_sse: false,
        })
    }

    /// Build a client WebSocket connection (spec.md §6 `ws_connect`).
    pub fn connect_ws(id: u32, owner: ActorId, addr: std::net::SocketAddr, path: &str) -> std::io::Result<Self> {
        let key = handshake::generate_client_key();
        let headers = handshake::upgrade_request_headers(&key);
        let mut conn = Self::connect_http(id, owner, addr, "GET", path, headers, &[])?;
        conn.ws_sent_key = Some(key);
        Ok(conn)
    }

    /// Build an SSE client connection (spec.md §6 `sse_connect`).
    pub fn connect_sse(id: u32, owner: ActorId, addr: std::net::SocketAddr, path: &str) -> std::io::Result<Self> {
        let mut conn =
            Self::connect_http(id, owner, addr, "GET", path, vec![("Accept".into(), "text/event-stream".into())], &[])?;
        conn.expects_sse = true;
        Ok(conn)
    }

    /// Accept a server-side connection from a listener (spec.md §4.3
    /// "Listener ready"). Initial state is server-side receive.
    pub fn accept_server(id: u32, owner: ActorId, stream: TcpStream) -> Self {
        Connection {
            id,
            owner,
            socket: stream,
            state: State::SrvRecvRequest,
            is_client: false,
            write_buf: Vec::new(),
            header_acc: HeaderAccumulator::new(),
            body_hint: BodyHint::default(),
            body_mode: BodyMode::None,
            body: Vec::new(),
            chunked: ChunkedDecoder::new(),
            sse: SseBuilder::new(),
            status: 0,
            method: String::new(),
            path: String::new(),
            headers: Vec::new(),
            ws_sent_key: None,
            ws_read_buf: Vec::new(),
            expects_sse: false,
        }
    }

    /// spec.md §6 `http_respond(conn_id, status, headers, body)`.
    pub fn respond(&mut self, status: i32, headers: &[crate::message::Header], body: &[u8]) {
        let reason = reason_phrase(status);
        let mut buf = format!("HTTP/1.1 {status} {reason}\r\n").into_bytes();
        let has_len = headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("Content-Length"));
        for (k, v) in headers {
            buf.extend_from_slice(format!("{k}: {v}\r\n").as_bytes());
        }
        if !has_len {
            buf.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(body);
        self.write_buf.extend_from_slice(&buf);
        self.state = State::SrvSending;
    }

    /// spec.md §6 `sse_start(conn_id)`: send the SSE response preamble and
    /// move to streaming mode.
    pub fn sse_start(&mut self) {
        let buf = b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: keep-alive\r\n\r\n";
        self.write_buf.extend_from_slice(buf);
        self.state = State::SrvSending;
        self.body_mode = BodyMode::Sse;
    }

    /// spec.md §6 `sse_push(conn_id, event?, data)`.
    pub fn sse_push(&mut self, event: Option<&str>, data: &str) {
        let mut buf = Vec::new();
        if let Some(ev) = event {
            buf.extend_from_slice(format!("event: {ev}\n").as_bytes());
        }
        for line in data.split('\n') {
            buf.extend_from_slice(format!("data: {line}\n").as_bytes());
        }
        buf.extend_from_slice(b"\n");
        self.write_buf.extend_from_slice(&buf);
    }

    /// spec.md §6 `ws_send_text/binary`.
    pub fn ws_send(&mut self, is_binary: bool, data: &[u8]) {
        let frame = WsFrame {
            fin: true,
            opcode: if is_binary { WsOpcode::Binary } else { WsOpcode::Text },
            payload: data.to_vec(),
        };
        let mask = self.is_client.then(|| random_mask());
        self.write_buf.extend_from_slice(&frame::write_frame(&frame, mask));
    }

    /// spec.md §6 `ws_send_close` / spec.md §4.4 "Close reciprocates".
    pub fn ws_close(&mut self, code: u16) {
        let frame = WsFrame { fin: true, opcode: WsOpcode::Close, payload: code.to_be_bytes().to_vec() };
        let mask = self.is_client.then(|| random_mask());
        self.write_buf.extend_from_slice(&frame::write_frame(&frame, mask));
    }

    /// Single entry point driving every state transition for one poll
    /// wakeup (spec.md §4.4 "Transitions are driven by a single `advance`
    /// entry point").
    pub fn advance(&mut self, writable: bool, readable: bool) -> Vec<ConnEvent> {
        let mut events = Vec::new();
        if matches!(self.state, State::Done | State::Error) {
            return events;
        }
        if writable && !self.write_buf.is_empty() {
            if let Err(e) = self.flush_write() {
                if e.kind() != ErrorKind::WouldBlock {
                    self.fail(&mut events, ConnError::Io(e));
                    return events;
                }
            }
            if self.write_buf.is_empty() {
                self.on_write_drained(&mut events);
            }
        }
        if readable {
            self.pump_read(&mut events);
        }
        events
    }

    fn flush_write(&mut self) -> std::io::Result<()> {
        while !self.write_buf.is_empty() {
            match self.socket.write(&self.write_buf) {
                Ok(0) => return Err(std::io::Error::new(ErrorKind::WriteZero, "write returned 0")),
                Ok(n) => {
                    self.write_buf.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Err(e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn on_write_drained(&mut self, events: &mut Vec<ConnEvent>) {
        match self.state {
            State::Sending => self.state = State::RecvStatus,
            State::SrvSending => match self.body_mode {
                BodyMode::Sse => self.state = State::SrvSseActive,
                _ => self.state = State::Done,
            },
            _ => {}
        }
        let _ = events;
    }

    fn pump_read(&mut self, events: &mut Vec<ConnEvent>) {
        let mut chunk = [0u8; 4096];
        loop {
            match self.socket.read(&mut chunk) {
                Ok(0) => {
                    self.on_eof(events);
                    return;
                }
                Ok(n) => {
                    if let Err(e) = self.feed(&chunk[..n], events) {
                        self.fail(events, e);
                        return;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) => {
                    self.fail(events, ConnError::Io(e));
                    return;
                }
            }
        }
    }

    fn on_eof(&mut self, events: &mut Vec<ConnEvent>) {
        match self.state {
            // EOF in body-until-close on an HTTP client is Done, not Error
            // (spec.md §4.4, §7; this kernel's explicit policy for §9's
            // open question on unknown-length bodies).
            State::BodyStream if self.is_client && matches!(self.body_mode, BodyMode::UntilClose) => {
                self.state = State::Done;
                events.push(ConnEvent::HttpResponse(HttpResponsePayload {
                    conn_id: self.id,
                    status_code: self.status,
                    headers: self.headers.clone(),
                    body: std::mem::take(&mut self.body),
                }));
            }
            State::WsActive => {
                self.state = State::Done;
                events.push(ConnEvent::WsClosed(WsClosedPayload { conn_id: self.id, close_code: 1006 }));
            }
            State::SrvSseActive => {
                self.state = State::Done;
                events.push(ConnEvent::SseClosed(SseStatusPayload { conn_id: self.id, status: 0 }));
            }
            _ => self.fail(events, ConnError::Reset),
        }
    }

    fn fail(&mut self, events: &mut Vec<ConnEvent>, err: ConnError) {
        self.state = State::Error;
        match self.body_mode {
            BodyMode::WebSocket => events.push(ConnEvent::WsError(WsErrorPayload { conn_id: self.id })),
            BodyMode::Sse => events.push(ConnEvent::SseClosed(SseStatusPayload { conn_id: self.id, status: -1 })),
            _ if self.is_client => {
                events.push(ConnEvent::HttpError(HttpErrorPayload { conn_id: self.id, code: -1, message: err.to_string() }))
            }
            _ => events.push(ConnEvent::HttpError(HttpErrorPayload { conn_id: self.id, code: -1, message: err.to_string() })),
        }
    }

    fn feed(&mut self, bytes: &[u8], events: &mut Vec<ConnEvent>) -> Result<(), ConnError> {
        match self.state {
            State::RecvStatus | State::RecvHeaders => self.feed_client_headers(bytes, events),
            State::SrvRecvRequest | State::SrvRecvHeaders => self.feed_server_headers(bytes, events),
            State::BodyContentLen | State::BodyChunked | State::BodyStream => self.feed_client_body(bytes, events),
            State::WsActive => self.feed_ws(bytes, events),
            State::SrvSseActive => {
                // server pushing SSE: no inbound data expected beyond client
                // abort/keepalive bytes; ignore.
                let _ = bytes;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn feed_client_headers(&mut self, bytes: &[u8], events: &mut Vec<ConnEvent>) -> Result<(), ConnError> {
        let lines = self.header_acc.feed(bytes);
        for (i, line) in lines.iter().enumerate() {
            if self.status == 0 && self.state == State::RecvStatus {
                let s = http::parse_status_line(line)?;
                self.status = s.status;
                self.state = State::RecvHeaders;
            } else {
                let _ = i;
                self.headers.push(http::parse_header_line(line)?);
            }
        }
        if self.header_acc.done {
            self.body_hint = http::scan_headers(&self.headers);
            self.decide_client_body_mode(events)?;
            let remainder = self.header_acc.take_remainder();
            if !remainder.is_empty() {
                self.feed(&remainder, events)?;
            }
        }
        Ok(())
    }

    fn decide_client_body_mode(&mut self, events: &mut Vec<ConnEvent>) -> Result<(), ConnError> {
        if self.body_hint.upgrade_websocket {
            let sent_key = self.ws_sent_key.clone().unwrap_or_default();
            handshake::validate_upgrade_response(self.status, &self.headers, &sent_key)
                .map_err(|e| ConnError::WsHandshakeFailed(e.to_string()))?;
            self.state = State::WsActive;
            self.body_mode = BodyMode::WebSocket;
            events.push(ConnEvent::WsOpen(WsOpenPayload { conn_id: self.id }));
            return Ok(());
        }
        if self.expects_sse && (200..300).contains(&self.status) {
            // sse_connect asked for this explicitly (spec.md §4.4 "SSE: require 2xx, move to BodyStream");
            // a plain http_get never takes this branch, regardless of what the response looks like.
            self.state = State::BodyStream;
            self.body_mode = BodyMode::Sse;
            events.push(ConnEvent::SseOpen(SseStatusPayload { conn_id: self.id, status: self.status }));
            return Ok(());
        }
        if self.body_hint.chunked {
            self.state = State::BodyChunked;
            self.body_mode = BodyMode::Chunked;
        } else if let Some(len) = self.body_hint.content_length {
            self.body_mode = BodyMode::ContentLen(len);
            if len == 0 || matches!(self.status, 204 | 304) {
                self.state = State::Done;
                events.push(ConnEvent::HttpResponse(HttpResponsePayload {
                    conn_id: self.id,
                    status_code: self.status,
                    headers: self.headers.clone(),
                    body: Vec::new(),
                }));
                return Ok(());
            }
            self.state = State::BodyContentLen;
        } else {
            self.state = State::BodyStream;
            self.body_mode = BodyMode::UntilClose;
        }
        Ok(())
    }

    fn feed_client_body(&mut self, bytes: &[u8], events: &mut Vec<ConnEvent>) -> Result<(), ConnError> {
        match self.body_mode {
            BodyMode::ContentLen(len) => {
                self.body.extend_from_slice(bytes);
                if self.body.len() >= len {
                    self.body.truncate(len);
                    self.state = State::Done;
                    events.push(ConnEvent::HttpResponse(HttpResponsePayload {
                        conn_id: self.id,
                        status_code: self.status,
                        headers: self.headers.clone(),
                        body: std::mem::take(&mut self.body),
                    }));
                }
            }
            BodyMode::Chunked => {
                if self.chunked.feed(bytes)? {
                    self.state = State::Done;
                    events.push(ConnEvent::HttpResponse(HttpResponsePayload {
                        conn_id: self.id,
                        status_code: self.status,
                        headers: self.headers.clone(),
                        body: std::mem::take(&mut self.chunked.body),
                    }));
                }
            }
            BodyMode::Sse => {
                for ev in self.sse.feed(bytes) {
                    events.push(ConnEvent::SseEvent(SseEventPayload { conn_id: self.id, event: ev.event, data: ev.data }));
                }
            }
            BodyMode::UntilClose => self.body.extend_from_slice(bytes),
            BodyMode::WebSocket | BodyMode::None => {}
        }
        Ok(())
    }

    fn feed_server_headers(&mut self, bytes: &[u8], events: &mut Vec<ConnEvent>) -> Result<(), ConnError> {
        let lines = self.header_acc.feed(bytes);
        for line in lines {
            if self.method.is_empty() && self.state == State::SrvRecvRequest {
                let r = http::parse_request_line(&line)?;
                self.method = r.method;
                self.path = r.path;
                self.state = State::SrvRecvHeaders;
            } else {
                self.headers.push(http::parse_header_line(&line)?);
            }
        }
        if self.header_acc.done {
            self.body_hint = http::scan_headers(&self.headers);
            if self.body_hint.upgrade_websocket {
                let client_key = handshake::validate_upgrade_request(&self.method, &self.headers)
                    .map_err(|e| ConnError::WsHandshakeFailed(e.to_string()))?;
                let accept = handshake::compute_accept_key(&client_key);
                let resp_headers = handshake::upgrade_response_headers(&accept);
                let mut buf = b"HTTP/1.1 101 Switching Protocols\r\n".to_vec();
                for (k, v) in &resp_headers {
                    buf.extend_from_slice(format!("{k}: {v}\r\n").as_bytes());
                }
                buf.extend_from_slice(b"\r\n");
                self.write_buf.extend_from_slice(&buf);
                self.state = State::WsActive;
                self.body_mode = BodyMode::WebSocket;
                events.push(ConnEvent::WsOpen(WsOpenPayload { conn_id: self.id }));
                let remainder = self.header_acc.take_remainder();
                if !remainder.is_empty() {
                    self.feed_ws(&remainder, events)?;
                }
                return Ok(());
            }
            self.state = State::SrvRecvBody;
            if self.body_hint.chunked {
                self.body_mode = BodyMode::Chunked;
            } else if let Some(len) = self.body_hint.content_length {
                self.body_mode = BodyMode::ContentLen(len);
                if len == 0 {
                    self.emit_request(events);
                    return Ok(());
                }
            } else {
                self.emit_request(events);
                return Ok(());
            }
            let remainder = self.header_acc.take_remainder();
            if !remainder.is_empty() {
                self.feed_server_body(&remainder, events)?;
            }
        }
        Ok(())
    }

    fn feed_server_body(&mut self, bytes: &[u8], events: &mut Vec<ConnEvent>) -> Result<(), ConnError> {
        match self.body_mode {
            BodyMode::ContentLen(len) => {
                self.body.extend_from_slice(bytes);
                if self.body.len() >= len {
                    self.body.truncate(len);
                    self.emit_request(events);
                }
            }
            BodyMode::Chunked => {
                if self.chunked.feed(bytes)? {
                    self.body = std::mem::take(&mut self.chunked.body);
                    self.emit_request(events);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn emit_request(&mut self, events: &mut Vec<ConnEvent>) {
        events.push(ConnEvent::HttpRequest(HttpRequestPayload {
            conn_id: self.id,
            method: self.method.clone(),
            path: self.path.clone(),
            headers: self.headers.clone(),
            body: std::mem::take(&mut self.body),
        }));
        // Owner responds asynchronously via `respond`; keep reading is not
        // needed for this connection's one request (no pipelining, spec.md
        // does not require keep-alive parsing of a second request).
    }

    fn feed_ws(&mut self, bytes: &[u8], events: &mut Vec<ConnEvent>) -> Result<(), ConnError> {
        self.ws_read_buf.extend_from_slice(bytes);
        loop {
            let Some((frame, consumed)) = frame::read_frame(&self.ws_read_buf)? else { break };
            self.ws_read_buf.drain(..consumed);
            match frame.opcode {
                WsOpcode::Text | WsOpcode::Binary => {
                    events.push(ConnEvent::WsMessage(WsMessagePayload {
                        conn_id: self.id,
                        is_binary: frame.opcode == WsOpcode::Binary,
                        data: frame.payload,
                    }));
                }
                WsOpcode::Ping => {
                    let pong = WsFrame { fin: true, opcode: WsOpcode::Pong, payload: frame.payload };
                    let mask = self.is_client.then(random_mask);
                    self.write_buf.extend_from_slice(&ws::frame::write_frame(&pong, mask));
                }
                WsOpcode::Pong => {}
                WsOpcode::Close => {
                    let code = frame.payload.get(0..2).map(|b| u16::from_be_bytes([b[0], b[1]])).unwrap_or(1000);
                    let echo = WsFrame { fin: true, opcode: WsOpcode::Close, payload: frame.payload };
                    let mask = self.is_client.then(random_mask);
                    self.write_buf.extend_from_slice(&ws::frame::write_frame(&echo, mask));
                    self.state = State::Done;
                    events.push(ConnEvent::WsClosed(WsClosedPayload { conn_id: self.id, close_code: code }));
                }
                WsOpcode::Continuation => {}
            }
        }
        Ok(())
    }
}

fn random_mask() -> [u8; 4] {
    rand::rng().random()
}

fn reason_phrase(status: i32) -> &'static str {
    match status {
        200 => "OK",
        101 => "Switching Protocols",
        204 => "No Content",
        304 => "Not Modified",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// A bound listener: accepts connections, handing each off to a fresh
/// `Connection` owned by the listener's actor.
pub struct Listener {
    pub id: u32,
    pub owner: ActorId,
    socket: TcpListener,
}

impl Listener {
    /// spec.md §6 `http_listen(port)`.
    pub fn bind(id: u32, owner: ActorId, addr: std::net::SocketAddr) -> std::io::Result<Self> {
        let socket = TcpListener::bind(addr)?;
        Ok(Listener { id, owner, socket })
    }

    pub fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    pub fn accept(&self) -> std::io::Result<(TcpStream, std::net::SocketAddr)> {
        self.socket.accept()
    }
}

/// Bounded pool of connections and listeners (spec.md §3 "Connection slots
/// are a bounded shared pool").
#[derive(Default)]
pub struct ConnTable {
    conns: Vec<Option<Connection>>,
    listeners: Vec<Option<Listener>>,
    capacity: usize,
    next_id: u32,
}

impl ConnTable {
    pub fn new(capacity: usize) -> Self {
        ConnTable { conns: Vec::new(), listeners: Vec::new(), capacity, next_id: 1 }
    }

    fn fresh_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    pub fn alloc_id(&mut self) -> Result<u32, ConnError> {
        let live = self.conns.iter().filter(|c| c.is_some()).count() + self.listeners.iter().filter(|l| l.is_some()).count();
        if live >= self.capacity {
            return Err(ConnError::SlotsExhausted);
        }
        Ok(self.fresh_id())
    }

    pub fn insert_conn(&mut self, conn: Connection) {
        if let Some(slot) = self.conns.iter_mut().find(|s| s.is_none()) {
            *slot = Some(conn);
        } else {
            self.conns.push(Some(conn));
        }
    }

    pub fn insert_listener(&mut self, listener: Listener) {
        if let Some(slot) = self.listeners.iter_mut().find(|s| s.is_none()) {
            *slot = Some(listener);
        } else {
            self.listeners.push(Some(listener));
        }
    }

    pub fn get_mut(&mut self, conn_id: u32) -> Option<&mut Connection> {
        self.conns.iter_mut().flatten().find(|c| c.id == conn_id)
    }

    pub fn remove(&mut self, conn_id: u32) -> Option<Connection> {
        if let Some(slot) = self.conns.iter_mut().find(|s| s.as_ref().map(|c| c.id) == Some(conn_id)) {
            return slot.take();
        }
        None
    }

    pub fn remove_listener(&mut self, listener_id: u32) -> Option<Listener> {
        if let Some(slot) = self.listeners.iter_mut().find(|s| s.as_ref().map(|l| l.id) == Some(listener_id)) {
            return slot.take();
        }
        None
    }

    pub fn release_owned(&mut self, owner: ActorId) {
        for slot in &mut self.conns {
            if slot.as_ref().map(|c| c.owner) == Some(owner) {
                *slot = None;
            }
        }
        for slot in &mut self.listeners {
            if slot.as_ref().map(|l| l.owner) == Some(owner) {
                *slot = None;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conns.iter().all(|c| c.is_none()) && self.listeners.iter().all(|l| l.is_none())
    }

    pub fn iter_fds(&self) -> impl Iterator<Item = (usize, RawFd, ConnDirection)> + '_ {
        self.conns.iter().enumerate().filter_map(|(i, c)| {
            let c = c.as_ref()?;
            if c.is_terminal() {
                return None;
            }
            Some((i, c.fd(), c.direction()))
        })
    }

    pub fn registered_fds(&self) -> Vec<RawFd> {
        self.iter_fds().map(|(_, fd, _)| fd).collect()
    }

    pub fn iter_listener_fds(&self) -> impl Iterator<Item = (usize, RawFd)> + '_ {
        self.listeners.iter().enumerate().filter_map(|(i, l)| l.as_ref().map(|l| (i, l.fd())))
    }

    pub fn registered_listener_fds(&self) -> Vec<RawFd> {
        self.iter_listener_fds().map(|(_, fd)| fd).collect()
    }

    pub fn conn_at(&mut self, idx: usize) -> Option<&mut Connection> {
        self.conns.get_mut(idx).and_then(|c| c.as_mut())
    }

    pub fn listener_at(&self, idx: usize) -> Option<&Listener> {
        self.listeners.get(idx).and_then(|l| l.as_ref())
    }

    /// Remove every connection that reached a terminal state and whose
    /// events have already been delivered (cleanup on the owner's behalf is
    /// still driven by actor-stop, but a Done/Error connection with no
    /// further owner interest can be reclaimed opportunistically).
    pub fn sweep_terminal(&mut self) {
        for slot in &mut self.conns {
            if slot.as_ref().map(|c| c.is_terminal()).unwrap_or(false) {
                *slot = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct_and_nonzero() {
        let mut t = ConnTable::new(4);
        let a = t.alloc_id().unwrap();
        let b = t.alloc_id().unwrap();
        assert_ne!(a, b);
        assert!(a != 0 && b != 0);
    }

    #[test]
    fn slots_exhausted_once_capacity_reached() {
        let mut t = ConnTable::new(0);
        assert!(matches!(t.alloc_id(), Err(ConnError::SlotsExhausted)));
    }
}
