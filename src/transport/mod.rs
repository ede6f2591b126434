//! Cross-node transport (spec.md §4.7): a framed stream per peer carrying
//! messages, with a handshake and registry replication on connect.

pub mod wire;

use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpStream as StdTcpStream;
use std::os::unix::io::{AsRawFd, RawFd};

use mio::net::TcpStream;
use tracing::{info, warn};

use crate::error::TransportError;
use crate::message::Message;

/// Arbitrary but fixed magic distinguishing this protocol from a stray
/// connection (spec.md §4.7 "mismatched magic ... fails the handshake").
pub const HANDSHAKE_MAGIC: u32 = 0xF1C4_B00F;

/// One peer connection: the capability set `{send, recv, fd, destroy,
/// peer_node}` spec.md §9 calls for.
pub struct Transport {
    stream: TcpStream,
    peer_node: u32,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Transport {
    pub fn peer_node(&self) -> u32 {
        self.peer_node
    }

    pub fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    /// Queue `msg` and attempt to flush immediately; if the socket would
    /// block, the remainder stays buffered for the next writable wakeup.
    pub fn send(&mut self, msg: &Message) -> io::Result<()> {
        self.write_buf.extend_from_slice(&wire::encode(msg));
        self.flush_pending()
    }

    pub fn flush_pending(&mut self) -> io::Result<()> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => return Err(io::Error::new(ErrorKind::WriteZero, "transport write returned 0")),
                Ok(n) => {
                    self.write_buf.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Read whatever is available and decode as many whole frames as
    /// present (spec.md §4.3 "Transport readable → pull all decoded
    /// messages").
    pub fn recv_ready(&mut self) -> io::Result<Vec<Message>> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(io::Error::new(ErrorKind::UnexpectedEof, "peer closed transport")),
                Ok(n) => self.read_buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        let mut messages = Vec::new();
        let mut consumed_total = 0;
        loop {
            match wire::decode(&self.read_buf[consumed_total..]) {
                Ok(Some((msg, consumed))) => {
                    messages.push(msg);
                    consumed_total += consumed;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "dropping corrupt transport frame");
                    self.read_buf.clear();
                    return Ok(messages);
                }
            }
        }
        self.read_buf.drain(..consumed_total);
        Ok(messages)
    }
}

fn write_handshake(stream: &mut StdTcpStream, node_id: u32, identity: &str) -> io::Result<()> {
    let mut buf = Vec::with_capacity(8 + 4 + identity.len());
    buf.extend_from_slice(&HANDSHAKE_MAGIC.to_le_bytes());
    buf.extend_from_slice(&node_id.to_le_bytes());
    buf.extend_from_slice(&(identity.len() as u32).to_le_bytes());
    buf.extend_from_slice(identity.as_bytes());
    stream.write_all(&buf)
}

fn read_handshake(stream: &mut StdTcpStream) -> io::Result<(u32, u32, String)> {
    let mut header = [0u8; 12];
    stream.read_exact(&mut header)?;
    let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
    let node_id = u32::from_le_bytes(header[4..8].try_into().unwrap());
    let ident_len = u32::from_le_bytes(header[8..12].try_into().unwrap()) as usize;
    let mut ident_buf = vec![0u8; ident_len];
    stream.read_exact(&mut ident_buf)?;
    let identity = String::from_utf8_lossy(&ident_buf).into_owned();
    Ok((magic, node_id, identity))
}

/// Perform the handshake of spec.md §4.7 on an already-connected blocking
/// stream, then convert it to non-blocking for the poll set (spec.md §5
/// "Sockets must be set non-blocking before entering the poll set").
pub fn handshake(
    mut std_stream: StdTcpStream,
    local_node_id: u32,
    local_identity: &str,
) -> Result<Transport, TransportError> {
    write_handshake(&mut std_stream, local_node_id, local_identity)?;
    let (magic, peer_node, peer_identity) = read_handshake(&mut std_stream)?;
    if magic != HANDSHAKE_MAGIC {
        return Err(TransportError::MagicMismatch { expected: HANDSHAKE_MAGIC, got: magic });
    }
    if peer_node == local_node_id {
        return Err(TransportError::SelfConnect(peer_node));
    }
    info!(peer_node, peer_identity, "transport handshake complete");
    std_stream.set_nonblocking(true)?;
    let stream = TcpStream::from_std(std_stream);
    Ok(Transport { stream, peer_node, read_buf: Vec::new(), write_buf: Vec::new() })
}

/// Bounded table of live transports, keyed by a slot index and looked up by
/// peer node id (spec.md §3 "transport table full").
#[derive(Default)]
pub struct TransportTable {
    slots: Vec<Option<Transport>>,
    capacity: usize,
}

impl TransportTable {
    pub fn new(capacity: usize) -> Self {
        TransportTable { slots: Vec::new(), capacity }
    }

    pub fn insert(&mut self, transport: Transport) -> Result<usize, TransportError> {
        if self.slots.iter().any(|s| s.as_ref().map(|t| t.peer_node) == Some(transport.peer_node)) {
            return Err(TransportError::DuplicateNode(transport.peer_node));
        }
        if let Some(idx) = self.slots.iter().position(|s| s.is_none()) {
            self.slots[idx] = Some(transport);
            return Ok(idx);
        }
        if self.slots.len() >= self.capacity {
            return Err(TransportError::TableFull);
        }
        self.slots.push(Some(transport));
        Ok(self.slots.len() - 1)
    }

    pub fn remove(&mut self, idx: usize) -> Option<Transport> {
        self.slots.get_mut(idx).and_then(|s| s.take())
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Transport> {
        self.slots.get_mut(idx).and_then(|s| s.as_mut())
    }

    pub fn get_mut_by_node(&mut self, node: u32) -> Option<&mut Transport> {
        self.slots.iter_mut().flatten().find(|t| t.peer_node == node)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    pub fn iter_fds(&self) -> impl Iterator<Item = (usize, RawFd)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.as_ref().map(|t| (i, t.fd())))
    }

    pub fn registered_fds(&self) -> Vec<RawFd> {
        self.iter_fds().map(|(_, fd)| fd).collect()
    }

    pub fn all_peer_nodes(&self) -> Vec<u32> {
        self.slots.iter().flatten().map(|t| t.peer_node).collect()
    }
}
