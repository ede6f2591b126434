//! HTTP/1.1 line and header parsing shared by client and server connections
//! (spec.md §4.4 "HTTP/1.1 parsing").

use crate::error::ConnError;
use crate::message::Header;

pub struct StatusLine {
    pub status: i32,
    pub reason: String,
}

/// `HTTP/1.x SSS reason` with `100 <= SSS <= 599`.
pub fn parse_status_line(line: &str) -> Result<StatusLine, ConnError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(|| ConnError::BadStatusLine(line.to_string()))?;
    if !version.starts_with("HTTP/1.") {
        return Err(ConnError::BadStatusLine(line.to_string()));
    }
    let status: i32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ConnError::BadStatusLine(line.to_string()))?;
    if !(100..=599).contains(&status) {
        return Err(ConnError::BadStatusLine(line.to_string()));
    }
    let reason = parts.next().unwrap_or("").to_string();
    Ok(StatusLine { status, reason })
}

pub struct RequestLine {
    pub method: String,
    pub path: String,
}

pub fn parse_request_line(line: &str) -> Result<RequestLine, ConnError> {
    let mut parts = line.splitn(3, ' ');
    let method = parts.next().ok_or_else(|| ConnError::BadRequestLine(line.to_string()))?;
    let path = parts.next().ok_or_else(|| ConnError::BadRequestLine(line.to_string()))?;
    let version = parts.next().ok_or_else(|| ConnError::BadRequestLine(line.to_string()))?;
    if !version.starts_with("HTTP/1.") {
        return Err(ConnError::BadRequestLine(line.to_string()));
    }
    Ok(RequestLine { method: method.to_string(), path: path.to_string() })
}

pub fn parse_header_line(line: &str) -> Result<Header, ConnError> {
    let (name, value) = line.split_once(':').ok_or_else(|| ConnError::BadHeader(line.to_string()))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

/// What the recognized headers of spec.md §4.4 tell the connection about
/// the body it is about to read.
#[derive(Debug, Default, Clone)]
pub struct BodyHint {
    pub content_length: Option<usize>,
    pub chunked: bool,
    pub upgrade_websocket: bool,
    pub sec_websocket_accept: Option<String>,
}

pub fn scan_headers(headers: &[Header]) -> BodyHint {
    let mut hint = BodyHint::default();
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("Content-Length") {
            hint.content_length = value.trim().parse().ok();
        } else if name.eq_ignore_ascii_case("Transfer-Encoding") && value.eq_ignore_ascii_case("chunked") {
            hint.chunked = true;
        } else if name.eq_ignore_ascii_case("Upgrade") && value.eq_ignore_ascii_case("websocket") {
            hint.upgrade_websocket = true;
        } else if name.eq_ignore_ascii_case("Sec-WebSocket-Accept") {
            hint.sec_websocket_accept = Some(value.clone());
        }
    }
    hint
}

/// Incrementally accumulates raw bytes into header lines, splitting on CRLF
/// (tolerating bare LF) and stopping at the blank-line terminator.
#[derive(Default)]
pub struct HeaderAccumulator {
    buf: Vec<u8>,
    pub done: bool,
}

impl HeaderAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns newly completed lines (the request/status line is
    /// the first one returned, followed by header lines, with the blank
    /// terminator line consumed but not returned).
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else { break };
            let mut line = self.buf[..pos].to_vec();
            self.buf.drain(..=pos);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                self.done = true;
                break;
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Bytes fed but not yet consumed as header lines — the start of the
    /// body, once `done` is true.
    pub fn take_remainder(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_parses_code_and_reason() {
        let s = parse_status_line("HTTP/1.1 200 OK").unwrap();
        assert_eq!(s.status, 200);
        assert_eq!(s.reason, "OK");
    }

    #[test]
    fn status_line_out_of_range_is_rejected() {
        assert!(parse_status_line("HTTP/1.1 999 Nope").is_err());
    }

    #[test]
    fn request_line_parses_method_and_path() {
        let r = parse_request_line("GET /hello HTTP/1.1").unwrap();
        assert_eq!(r.method, "GET");
        assert_eq!(r.path, "/hello");
    }

    #[test]
    fn header_accumulator_splits_and_terminates_on_blank_line() {
        let mut acc = HeaderAccumulator::new();
        let lines = acc.feed(b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody-start");
        assert_eq!(lines, vec!["GET / HTTP/1.1", "Host: x"]);
        assert!(acc.done);
        assert_eq!(acc.take_remainder(), b"body-start");
    }

    #[test]
    fn content_length_header_is_recognized_case_insensitively() {
        let headers = vec![("content-length".to_string(), "5".to_string())];
        assert_eq!(scan_headers(&headers).content_length, Some(5));
    }
}
