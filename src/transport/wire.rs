//! Wire framing for cross-node message transport (spec.md §6 "Wire format —
//! transport"). Grounded on the teacher's tagged binary format
//! (`snow-rt/src/dist/wire.rs`): a version byte followed by
//! `(source, dest, type, payload_size, payload)`. "The exact framing is left
//! to the implementation provided it preserves order per peer and delivers
//! whole messages" (spec.md §6) — this one does, via a length-prefixed frame.

use thiserror::Error;

use crate::actor::ActorId;
use crate::message::Message;

pub const WIRE_VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),
    #[error("truncated frame")]
    Truncated,
}

/// Encode one message as `[version:1][source:8][dest:8][type:4][len:4][payload]`.
pub fn encode(msg: &Message) -> Vec<u8> {
    let mut buf = Vec::with_capacity(25 + msg.payload.len());
    buf.push(WIRE_VERSION);
    buf.extend_from_slice(&msg.source.as_u64().to_le_bytes());
    buf.extend_from_slice(&msg.dest.as_u64().to_le_bytes());
    buf.extend_from_slice(&msg.type_tag.to_le_bytes());
    buf.extend_from_slice(&(msg.payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&msg.payload);
    buf
}

/// Decode one message from the front of `buf`, returning the message and how
/// many bytes it consumed. Returns `Ok(None)` if `buf` does not yet hold a
/// whole frame (the caller should wait for more bytes, not treat this as an
/// error — spec.md §4.7's "delivers whole messages").
pub fn decode(buf: &[u8]) -> Result<Option<(Message, usize)>, WireError> {
    const HEADER_LEN: usize = 1 + 8 + 8 + 4 + 4;
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let version = buf[0];
    if version != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let source = ActorId::from_u64(u64::from_le_bytes(buf[1..9].try_into().map_err(|_| WireError::Truncated)?));
    let dest = ActorId::from_u64(u64::from_le_bytes(buf[9..17].try_into().map_err(|_| WireError::Truncated)?));
    let type_tag = u32::from_le_bytes(buf[17..21].try_into().map_err(|_| WireError::Truncated)?);
    let len = u32::from_le_bytes(buf[21..25].try_into().map_err(|_| WireError::Truncated)?) as usize;
    if buf.len() < HEADER_LEN + len {
        return Ok(None);
    }
    let payload = buf[HEADER_LEN..HEADER_LEN + len].to_vec();
    Ok(Some((Message::new(source, dest, type_tag, payload), HEADER_LEN + len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips() {
        let msg = Message::new(ActorId::new(1, 2), ActorId::new(3, 4), 7, vec![9, 9, 9]);
        let bytes = encode(&msg);
        let (decoded, consumed) = decode(&bytes).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.source, msg.source);
        assert_eq!(decoded.dest, msg.dest);
        assert_eq!(decoded.type_tag, msg.type_tag);
        assert_eq!(decoded.payload, msg.payload);
    }

    #[test]
    fn partial_frame_reports_none_not_error() {
        let msg = Message::new(ActorId::new(0, 1), ActorId::new(0, 2), 1, vec![1, 2, 3]);
        let bytes = encode(&msg);
        assert!(decode(&bytes[..bytes.len() - 1]).unwrap().is_none());
    }
}
