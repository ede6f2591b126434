//! Kernel operations named in spec.md §6's external interface: the registry,
//! timers, fd watches, and the HTTP/WS/SSE connection engine. Thin wrappers
//! over the tables built in their own modules — the point of this file is
//! the wiring, not new logic.

use std::net::{SocketAddr, ToSocketAddrs};

use crate::actor::ActorId;
use crate::conn::{Connection, Listener};
use crate::error::{ConnError, RegistryError};
use crate::fdwatch::EventMask;
use crate::message::{tags, Header, Message, NameRegisterPayload, PathRegisterPayload};
use crate::util::parse_url;

use super::Kernel;

impl Kernel {
    /// spec.md §6 `register_name(name, actor_id) -> ok?`, extended to
    /// `/`-prefixed paths per spec.md §4.6. Broadcasts to every connected
    /// transport so remote registries stay current.
    pub fn register_name(&mut self, key: &str, actor_id: ActorId) -> Result<(), RegistryError> {
        self.registry.register(key, actor_id)?;
        self.broadcast_registry_update(key, actor_id, false);
        Ok(())
    }

    /// spec.md §6 `lookup(name) -> actor_id?`.
    pub fn lookup(&self, key: &str) -> Option<ActorId> {
        self.registry.lookup(key)
    }

    /// spec.md §6 `reverse_lookup(id) -> name?`.
    pub fn reverse_lookup(&self, id: ActorId) -> Option<&str> {
        self.registry.reverse_lookup(id)
    }

    fn broadcast_registry_update(&mut self, key: &str, actor_id: ActorId, unregister: bool) {
        if self.transports.is_empty() {
            return;
        }
        let (tag, payload) = if key.starts_with('/') {
            let tag = if unregister { tags::PATH_UNREGISTER } else { tags::PATH_REGISTER };
            (tag, PathRegisterPayload { path: key.to_string(), actor_id }.encode())
        } else {
            let tag = if unregister { tags::NAME_UNREGISTER } else { tags::NAME_REGISTER };
            (tag, NameRegisterPayload { name: key.to_string(), actor_id }.encode())
        };
        for node in self.transports.all_peer_nodes() {
            if let Some(t) = self.transports.get_mut_by_node(node) {
                let msg = Message::new(actor_id, ActorId::new(node, 0), tag, payload.clone());
                let _ = t.send(&msg);
            }
        }
    }

    /// Bidirectional link (SPEC_FULL.md §C): each side is added to the
    /// other's link set. Re-linking an already-linked pair is a no-op.
    pub fn link(&mut self, a: ActorId, b: ActorId) {
        if let Some(slot) = self.actors.get_mut(a) {
            if !slot.links.contains(&b) {
                slot.links.push(b);
            }
        }
        if let Some(slot) = self.actors.get_mut(b) {
            if !slot.links.contains(&a) {
                slot.links.push(a);
            }
        }
    }

    pub fn unlink(&mut self, a: ActorId, b: ActorId) {
        if let Some(slot) = self.actors.get_mut(a) {
            slot.links.retain(|x| *x != b);
        }
        if let Some(slot) = self.actors.get_mut(b) {
            slot.links.retain(|x| *x != a);
        }
    }

    /// SPEC_FULL.md §C: a trapping actor receives a `ProcessDown` message
    /// instead of being killed when a linked partner exits abnormally.
    pub fn set_trap_exit(&mut self, id: ActorId, trap: bool) {
        if let Some(slot) = self.actors.get_mut(id) {
            slot.trap_exit = trap;
        }
    }

    /// One-way monitor: `watcher` gets a `ProcessDown` when `target` exits,
    /// for any reason, without being killed itself.
    pub fn monitor(&mut self, watcher: ActorId, target: ActorId) {
        if let Some(slot) = self.actors.get_mut(target) {
            if !slot.monitors.contains(&watcher) {
                slot.monitors.push(watcher);
            }
        }
    }

    /// spec.md §6 `set_timer(interval_ms, periodic?) -> timer_id`. Owned by
    /// the currently running actor.
    pub fn set_timer(&mut self, interval_ms: u64, periodic: bool) -> u32 {
        let owner = self.current();
        self.timers.set(owner, interval_ms, periodic)
    }

    /// spec.md §6 `cancel_timer(id)`.
    pub fn cancel_timer(&mut self, id: u32) {
        self.timers.cancel(id);
    }

    /// spec.md §6 `watch_fd(fd, events) -> ok?`.
    pub fn watch_fd(&mut self, fd: i32, mask: EventMask) -> bool {
        let owner = self.current();
        self.fdwatch.watch(owner, fd, mask)
    }

    /// spec.md §6 `unwatch_fd(fd)`.
    pub fn unwatch_fd(&mut self, fd: i32) {
        self.fdwatch.unwatch(fd);
    }

    /// spec.md §6 `http_get(url) -> conn_id`.
    pub fn http_get(&mut self, url: &str) -> Result<u32, ConnError> {
        self.http_fetch("GET", url, Vec::new(), &[])
    }

    /// spec.md §6 `http_fetch(method, url, headers, body) -> conn_id`.
    pub fn http_fetch(&mut self, method: &str, url: &str, headers: Vec<Header>, body: &[u8]) -> Result<u32, ConnError> {
        let parsed = parse_url(url)?;
        let addr = resolve(&parsed.host, parsed.port)?;
        let owner = self.current();
        let id = self.conns.alloc_id()?;
        let conn = Connection::connect_http(id, owner, addr, method, &parsed.path, headers, body)?;
        self.conns.insert_conn(conn);
        Ok(id)
    }

    /// spec.md §6 `sse_connect(url) -> conn_id`.
    pub fn sse_connect(&mut self, url: &str) -> Result<u32, ConnError> {
        let parsed = parse_url(url)?;
        let addr = resolve(&parsed.host, parsed.port)?;
        let owner = self.current();
        let id = self.conns.alloc_id()?;
        let conn = Connection::connect_sse(id, owner, addr, &parsed.path)?;
        self.conns.insert_conn(conn);
        Ok(id)
    }

    /// spec.md §6 `ws_connect(url) -> conn_id`.
    pub fn ws_connect(&mut self, url: &str) -> Result<u32, ConnError> {
        let parsed = parse_url(url)?;
        let addr = resolve(&parsed.host, parsed.port)?;
        let owner = self.current();
        let id = self.conns.alloc_id()?;
        let conn = Connection::connect_ws(id, owner, addr, &parsed.path)?;
        self.conns.insert_conn(conn);
        Ok(id)
    }

    /// spec.md §6 `http_listen(port) -> listener_id`.
    pub fn http_listen(&mut self, port: u16) -> Result<u32, ConnError> {
        let owner = self.current();
        let id = self.conns.alloc_id()?;
        let addr: SocketAddr = format!("0.0.0.0:{port}")
            .parse()
            .map_err(|_| ConnError::BadRequestLine(format!("invalid port {port}")))?;
        let listener = Listener::bind(id, owner, addr)?;
        self.conns.insert_listener(listener);
        Ok(id)
    }

    /// spec.md §6 `http_respond(conn_id, status, headers, body)`.
    pub fn http_respond(&mut self, conn_id: u32, status: i32, headers: &[Header], body: &[u8]) -> Result<(), ConnError> {
        let conn = self.conns.get_mut(conn_id).ok_or(ConnError::UnknownConn)?;
        conn.respond(status, headers, body);
        Ok(())
    }

    /// spec.md §6 `sse_start(conn_id)`.
    pub fn sse_start(&mut self, conn_id: u32) -> Result<(), ConnError> {
        let conn = self.conns.get_mut(conn_id).ok_or(ConnError::UnknownConn)?;
        conn.sse_start();
        Ok(())
    }

    /// spec.md §6 `sse_push(conn_id, event?, data)`.
    pub fn sse_push(&mut self, conn_id: u32, event: Option<&str>, data: &str) -> Result<(), ConnError> {
        let conn = self.conns.get_mut(conn_id).ok_or(ConnError::UnknownConn)?;
        conn.sse_push(event, data);
        Ok(())
    }

    /// spec.md §6 `ws_send_text`.
    pub fn ws_send_text(&mut self, conn_id: u32, data: &str) -> Result<(), ConnError> {
        let conn = self.conns.get_mut(conn_id).ok_or(ConnError::UnknownConn)?;
        conn.ws_send(false, data.as_bytes());
        Ok(())
    }

    /// spec.md §6 `ws_send_binary`.
    pub fn ws_send_binary(&mut self, conn_id: u32, data: &[u8]) -> Result<(), ConnError> {
        let conn = self.conns.get_mut(conn_id).ok_or(ConnError::UnknownConn)?;
        conn.ws_send(true, data);
        Ok(())
    }

    /// spec.md §6 `ws_send_close`.
    pub fn ws_send_close(&mut self, conn_id: u32, code: u16) -> Result<(), ConnError> {
        let conn = self.conns.get_mut(conn_id).ok_or(ConnError::UnknownConn)?;
        conn.ws_close(code);
        Ok(())
    }

    /// spec.md §6 `http_close(conn_id)`.
    pub fn http_close(&mut self, conn_id: u32) -> Result<(), ConnError> {
        self.conns.remove(conn_id).ok_or(ConnError::UnknownConn)?;
        Ok(())
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConnError> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ConnError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, format!("could not resolve {host}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;

    #[test]
    fn register_then_lookup_round_trips() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        let id = ActorId::new(0, 1);
        kernel.register_name("alice", id).unwrap();
        assert_eq!(kernel.lookup("alice"), Some(id));
        assert_eq!(kernel.reverse_lookup(id), Some("alice"));
    }

    #[test]
    fn unknown_conn_operations_report_unknown_conn() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        assert!(matches!(kernel.http_respond(999, 200, &[], &[]), Err(ConnError::UnknownConn)));
    }
}
