//! Small ambient helpers: node identity and the minimal URL splitting the
//! connection-engine entry points need (spec.md §6 `http_get`/`ws_connect`/
//! `sse_connect` all take a URL string). No crate in the dependency stack
//! offers a pure parser without also pulling in a competing HTTP client
//! (e.g. the teacher's `ureq`), so this is hand-rolled — see DESIGN.md.

pub mod node_identity;

pub use node_identity::node_identity;

use crate::error::ConnError;

pub struct ParsedUrl {
    pub is_tls: bool,
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// Split `scheme://host[:port][/path]` into parts. Supports `http`, `ws`
/// (plain) and rejects everything else — TLS is out of scope (spec.md §1
/// Non-goals).
pub fn parse_url(url: &str) -> Result<ParsedUrl, ConnError> {
    let (scheme, rest) = url.split_once("://").ok_or_else(|| ConnError::BadRequestLine(url.to_string()))?;
    let default_port = match scheme {
        "http" | "ws" => 80,
        "https" | "wss" => return Err(ConnError::BadRequestLine(format!("TLS scheme not supported: {scheme}"))),
        other => return Err(ConnError::BadRequestLine(format!("unsupported scheme: {other}"))),
    };
    let (authority, path) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, "/"),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) => (h, p.parse::<u16>().map_err(|_| ConnError::BadRequestLine(url.to_string()))?),
        None => (authority, default_port),
    };
    if host.is_empty() {
        return Err(ConnError::BadRequestLine(url.to_string()));
    }
    Ok(ParsedUrl { is_tls: false, host: host.to_string(), port, path: path.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port_and_path() {
        let u = parse_url("http://127.0.0.1:8080/hello").unwrap();
        assert_eq!(u.host, "127.0.0.1");
        assert_eq!(u.port, 8080);
        assert_eq!(u.path, "/hello");
    }

    #[test]
    fn missing_path_defaults_to_root() {
        let u = parse_url("ws://example.com").unwrap();
        assert_eq!(u.path, "/");
        assert_eq!(u.port, 80);
    }

    #[test]
    fn tls_schemes_are_rejected() {
        assert!(parse_url("https://example.com").is_err());
    }
}
