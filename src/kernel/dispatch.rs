//! Event dispatch: turns one ready poll token into the actor-visible effect
//! it represents (spec.md §4.3 "Event dispatch").

use mio::event::Event;
use tracing::warn;

use super::Kernel;
use crate::actor::ActorId;
use crate::conn::Connection;
use crate::fdwatch::EventMask;
use crate::message::{tags, FdEventPayload, NameRegisterPayload, PathRegisterPayload};

/// Transport readable: pull every decoded message and either apply it to the
/// local registry mirror (replicated register/unregister control messages
/// "apply without re-broadcasting", spec.md §4.6) or deliver it locally,
/// ignoring delivery to a dead destination.
pub(super) fn on_transport_readable(kernel: &mut Kernel, idx: usize) {
    let result = match kernel.transports.get_mut(idx) {
        Some(t) => t.recv_ready(),
        None => return,
    };
    let messages = match result {
        Ok(messages) => messages,
        Err(e) => {
            warn!(error = %e, "transport closed");
            kernel.transports.remove(idx);
            return;
        }
    };
    for msg in messages {
        match msg.type_tag {
            tags::NAME_REGISTER => {
                if let Some(p) = NameRegisterPayload::decode(&msg.payload) {
                    let _ = kernel.registry.register(&p.name, p.actor_id);
                }
            }
            tags::NAME_UNREGISTER => {
                if let Some(p) = NameRegisterPayload::decode(&msg.payload) {
                    kernel.registry.deregister(&p.name);
                }
            }
            tags::PATH_REGISTER => {
                if let Some(p) = PathRegisterPayload::decode(&msg.payload) {
                    let _ = kernel.registry.register(&p.path, p.actor_id);
                }
            }
            tags::PATH_UNREGISTER => {
                if let Some(p) = PathRegisterPayload::decode(&msg.payload) {
                    kernel.registry.deregister(&p.path);
                }
            }
            _ => {
                let _ = kernel.deliver_local(msg.source, msg.dest, msg.type_tag, msg.payload);
            }
        }
    }
}

/// FD watch ready: deliver `FdEvent{fd, revents}` to the owner (spec.md §4.3).
/// Level-triggered — the fd stays registered, so a still-ready condition is
/// reported again on the next wakeup.
pub(super) fn on_fd_ready(kernel: &mut Kernel, idx: usize, event: &Event) {
    let Some(owner) = kernel.fdwatch.owner_of(idx) else { return };
    let Some(fd) = kernel.fdwatch.fd_of(idx) else { return };
    let mask = EventMask { readable: event.is_readable(), writable: event.is_writable() };
    let payload = FdEventPayload { fd, revents: mask.as_u32() };
    let _ = kernel.deliver_local(ActorId::INVALID, owner, tags::FD_EVENT, payload.encode());
}

/// Connection ready: advance its state machine and emit whatever it
/// produced to the owning actor (spec.md §4.4).
pub(super) fn on_conn_ready(kernel: &mut Kernel, idx: usize, event: &Event) {
    let (owner, events, terminal, conn_id) = {
        let Some(conn) = kernel.conns.conn_at(idx) else { return };
        let owner = conn.owner;
        let conn_id = conn.id;
        let events = conn.advance(event.is_writable(), event.is_readable());
        let terminal = conn.is_terminal();
        (owner, events, terminal, conn_id)
    };
    for ev in events {
        emit_conn_event(kernel, owner, ev);
    }
    if terminal {
        kernel.conns.remove(conn_id);
    }
}

fn emit_conn_event(kernel: &mut Kernel, owner: ActorId, ev: crate::conn::ConnEvent) {
    use crate::conn::ConnEvent::*;
    let (tag, payload) = match ev {
        HttpResponse(p) => (tags::HTTP_RESPONSE, p.encode()),
        HttpError(p) => (tags::HTTP_ERROR, p.encode()),
        HttpRequest(p) => (tags::HTTP_REQUEST, p.encode()),
        SseOpen(p) => (tags::SSE_OPEN, p.encode()),
        SseEvent(p) => (tags::SSE_EVENT, p.encode()),
        SseClosed(p) => (tags::SSE_CLOSED, p.encode()),
        WsOpen(p) => (tags::WS_OPEN, p.encode()),
        WsMessage(p) => (tags::WS_MESSAGE, p.encode()),
        WsClosed(p) => (tags::WS_CLOSED, p.encode()),
        WsError(p) => (tags::WS_ERROR, p.encode()),
    };
    let _ = kernel.deliver_local(ActorId::INVALID, owner, tag, payload);
}

/// Listener ready: accept every pending connection, handing each a fresh
/// connection slot owned by the listener's actor (spec.md §4.3 "Listener
/// ready").
pub(super) fn on_listener_ready(kernel: &mut Kernel, idx: usize) {
    let Some(owner) = kernel.conns.listener_at(idx).map(|l| l.owner) else { return };
    loop {
        let accepted = match kernel.conns.listener_at(idx) {
            Some(l) => l.accept(),
            None => break,
        };
        match accepted {
            Ok((stream, _addr)) => match kernel.conns.alloc_id() {
                Ok(id) => {
                    let conn = Connection::accept_server(id, owner, stream);
                    kernel.conns.insert_conn(conn);
                }
                Err(e) => {
                    warn!(error = %e, "dropping accepted connection");
                    break;
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => {
                warn!(error = %e, "accept failed");
                break;
            }
        }
    }
}
