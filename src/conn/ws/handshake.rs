//! WebSocket HTTP upgrade handshake, RFC 6455 §4.2 (spec.md §4.4, §6 "Wire
//! format — WebSocket handshake"). Grounded on the teacher's
//! `snow-rt/src/ws/handshake.rs`; `compute_accept_key` and
//! `validate_upgrade_request` are carried essentially unchanged, since the
//! computation itself does not depend on the blocking-vs-non-blocking I/O
//! model. The stream-reading entry point (`perform_upgrade`) is not carried:
//! this kernel's connection engine already accumulates headers incrementally
//! (`conn::http`), so validation plugs in at that layer instead of reading
//! its own request line.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::message::Header;

const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// `base64(SHA1(client_key ∥ magic_guid))` (spec.md §4.4, §6).
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// A fresh 16-byte random key, base64-encoded, for a client-initiated
/// handshake (spec.md §4.4 "Clients generate a 16-byte random key").
pub fn generate_client_key() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
}

/// Validate a server-received upgrade request, returning the client's
/// `Sec-WebSocket-Key` on success.
pub fn validate_upgrade_request(method: &str, headers: &[Header]) -> Result<String, &'static str> {
    if !method.eq_ignore_ascii_case("GET") {
        return Err("method must be GET");
    }
    match find_header(headers, "Upgrade") {
        Some(v) if v.to_ascii_lowercase().contains("websocket") => {}
        _ => return Err("missing or invalid Upgrade header"),
    }
    match find_header(headers, "Connection") {
        Some(v) if v.to_ascii_lowercase().contains("upgrade") => {}
        _ => return Err("missing or invalid Connection header"),
    }
    let client_key = match find_header(headers, "Sec-WebSocket-Key") {
        Some(k) => k.to_string(),
        None => return Err("missing Sec-WebSocket-Key header"),
    };
    match find_header(headers, "Sec-WebSocket-Version") {
        Some("13") => {}
        _ => return Err("missing or invalid Sec-WebSocket-Version (must be 13)"),
    }
    Ok(client_key)
}

/// Validate a client-received `101` response against the key it sent
/// (spec.md §4.4 "require status 101 and Upgrade: websocket; validate
/// Sec-WebSocket-Accept").
pub fn validate_upgrade_response(status: i32, headers: &[Header], sent_key: &str) -> Result<(), &'static str> {
    if status != 101 {
        return Err("expected status 101");
    }
    match find_header(headers, "Upgrade") {
        Some(v) if v.eq_ignore_ascii_case("websocket") => {}
        _ => return Err("missing or invalid Upgrade header"),
    }
    let accept = find_header(headers, "Sec-WebSocket-Accept").ok_or("missing Sec-WebSocket-Accept header")?;
    if accept != compute_accept_key(sent_key) {
        return Err("Sec-WebSocket-Accept mismatch");
    }
    Ok(())
}

pub fn upgrade_response_headers(accept_key: &str) -> Vec<Header> {
    vec![
        ("Upgrade".into(), "websocket".into()),
        ("Connection".into(), "Upgrade".into()),
        ("Sec-WebSocket-Accept".into(), accept_key.to_string()),
    ]
}

pub fn upgrade_request_headers(client_key: &str) -> Vec<Header> {
    vec![
        ("Upgrade".into(), "websocket".into()),
        ("Connection".into(), "Upgrade".into()),
        ("Sec-WebSocket-Key".into(), client_key.to_string()),
        ("Sec-WebSocket-Version".into(), "13".into()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc_example() {
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        assert_eq!(compute_accept_key(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn validate_request_rejects_missing_upgrade() {
        let headers = vec![
            ("Connection".to_string(), "Upgrade".to_string()),
            ("Sec-WebSocket-Key".to_string(), "dGhlIHNhbXBsZSBub25jZQ==".to_string()),
            ("Sec-WebSocket-Version".to_string(), "13".to_string()),
        ];
        assert!(validate_upgrade_request("GET", &headers).is_err());
    }

    #[test]
    fn validate_response_checks_accept_key() {
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        let headers = upgrade_response_headers(&compute_accept_key(key));
        assert!(validate_upgrade_response(101, &headers, key).is_ok());
        assert!(validate_upgrade_response(101, &headers, "wrong-key").is_err());
    }
}
