//! Chunked transfer-encoding codec (spec.md §4.4 "Chunked transfer").

use crate::error::ConnError;

/// Incremental chunked-body decoder. Feed bytes with [`ChunkedDecoder::feed`];
/// `true` is returned once the terminating zero-size chunk has been seen.
#[derive(Default)]
pub struct ChunkedDecoder {
    buf: Vec<u8>,
    pub body: Vec<u8>,
    state: ChunkState,
}

#[derive(Default, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    #[default]
    Size,
    Data(usize),
    Done,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Result<bool, ConnError> {
        self.buf.extend_from_slice(bytes);
        loop {
            match self.state {
                ChunkState::Size => {
                    let Some(pos) = find_crlf(&self.buf) else { return Ok(false) };
                    let line = &self.buf[..pos];
                    let size_str = std::str::from_utf8(line)
                        .ok()
                        .and_then(|s| s.split(';').next())
                        .ok_or_else(|| ConnError::BadChunkSize(String::from_utf8_lossy(line).into_owned()))?;
                    let size = usize::from_str_radix(size_str.trim(), 16)
                        .map_err(|_| ConnError::BadChunkSize(size_str.to_string()))?;
                    self.buf.drain(..pos + 2);
                    self.state = if size == 0 { ChunkState::Done } else { ChunkState::Data(size) };
                }
                ChunkState::Data(size) => {
                    if self.buf.len() < size + 2 {
                        return Ok(false);
                    }
                    self.body.extend_from_slice(&self.buf[..size]);
                    self.buf.drain(..size + 2);
                    self.state = ChunkState::Size;
                }
                ChunkState::Done => return Ok(true),
            }
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Encode `body` as a single chunk followed by the terminator. Nothing in
/// this crate emits `Transfer-Encoding: chunked` itself (`respond` always
/// sends `Content-Length`); this exists to drive the decoder's round-trip
/// property test against realistic chunked input.
pub fn encode_chunked(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 16);
    out.extend_from_slice(format!("{:x}\r\n", body.len()).as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n0\r\n\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_chunk() {
        let mut d = ChunkedDecoder::new();
        let done = d.feed(b"5\r\nhello\r\n0\r\n\r\n").unwrap();
        assert!(done);
        assert_eq!(d.body, b"hello");
    }

    #[test]
    fn decodes_across_feed_boundaries() {
        let mut d = ChunkedDecoder::new();
        assert!(!d.feed(b"5\r\nhel").unwrap());
        assert!(d.feed(b"lo\r\n0\r\n\r\n").unwrap());
        assert_eq!(d.body, b"hello");
    }

    #[test]
    fn encode_then_decode_is_identity() {
        let body = b"the quick brown fox".to_vec();
        let encoded = encode_chunked(&body);
        let mut d = ChunkedDecoder::new();
        assert!(d.feed(&encoded).unwrap());
        assert_eq!(d.body, body);
    }

    #[test]
    fn bad_chunk_size_is_reported_not_panicked() {
        let mut d = ChunkedDecoder::new();
        assert!(d.feed(b"zzz\r\n").is_err());
    }

    proptest::proptest! {
        #[test]
        fn encode_then_decode_is_identity_for_any_body(
            body in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..=8192),
            split_at in 0usize..64,
        ) {
            let encoded = encode_chunked(&body);
            let mut d = ChunkedDecoder::new();
            let split = split_at.min(encoded.len());
            let mut done = d.feed(&encoded[..split]).unwrap();
            if !done {
                done = d.feed(&encoded[split..]).unwrap();
            }
            proptest::prop_assert!(done);
            proptest::prop_assert_eq!(d.body, body);
        }
    }
}
