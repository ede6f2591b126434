//! Stopped-actor cleanup (spec.md §4.3 "Stopped-actor cleanup").
//!
//! Runs once per actor, right after `step` leaves it Stopped: release every
//! resource it owned, deregister its names/paths (broadcasting the
//! unregistration), notify links/monitors, tell its parent, then destroy the
//! slot. A dead sequence number is never reissued (`ActorTable::destroy`),
//! so nothing here can resurrect it.

use super::Kernel;
use crate::actor::ExitReason;
use crate::message::{tags, ChildExitPayload, NameRegisterPayload, PathRegisterPayload};
use crate::actor::ActorId;

pub(super) fn finalize_one(kernel: &mut Kernel, id: ActorId) {
    let Some(slot) = kernel.actors.destroy(id) else { return };

    kernel.timers.release_owned(id);
    kernel.fdwatch.release_owned(id);
    kernel.conns.release_owned(id);

    let removed_keys = kernel.registry.deregister_owner(id);
    broadcast_unregister(kernel, id, &removed_keys);

    let reason = slot.exit_reason.unwrap_or(ExitReason::Normal);

    for monitor in &slot.monitors {
        notify_down(kernel, *monitor, id, &reason);
    }

    for linked in &slot.links {
        propagate_link_exit(kernel, *linked, id, &reason);
    }

    if let Some(parent) = slot.parent {
        if kernel.actors.get(parent).is_some() {
            let payload = ChildExitPayload { child_id: id, exit_reason: reason.tag() };
            let _ = kernel.deliver_local(ActorId::INVALID, parent, tags::CHILD_EXIT, payload.encode());
        }
    }
}

fn broadcast_unregister(kernel: &mut Kernel, owner: ActorId, keys: &[String]) {
    if keys.is_empty() || kernel.transports.is_empty() {
        return;
    }
    for key in keys {
        let (tag, payload) = if key.starts_with('/') {
            (tags::PATH_UNREGISTER, PathRegisterPayload { path: key.clone(), actor_id: owner }.encode())
        } else {
            (tags::NAME_UNREGISTER, NameRegisterPayload { name: key.clone(), actor_id: owner }.encode())
        };
        for node in kernel.transports.all_peer_nodes() {
            if let Some(t) = kernel.transports.get_mut_by_node(node) {
                let msg = crate::message::Message::new(owner, ActorId::new(node, 0), tag, payload.clone());
                let _ = t.send(&msg);
            }
        }
    }
}

fn notify_down(kernel: &mut Kernel, monitor: ActorId, dead: ActorId, reason: &ExitReason) {
    if kernel.actors.get(monitor).is_none() {
        return;
    }
    let payload = ChildExitPayload { child_id: dead, exit_reason: reason.tag() };
    let _ = kernel.deliver_local(ActorId::INVALID, monitor, tags::PROCESS_DOWN, payload.encode());
}

/// A link notifies the other side unconditionally if it traps exits; if it
/// does not and the exit was abnormal, the exit is propagated by killing the
/// linked actor too (and recursing its own cleanup).
fn propagate_link_exit(kernel: &mut Kernel, linked: ActorId, dead: ActorId, reason: &ExitReason) {
    let Some(other) = kernel.actors.get(linked) else { return };
    if other.trap_exit {
        let payload = ChildExitPayload { child_id: dead, exit_reason: reason.tag() };
        let _ = kernel.deliver_local(ActorId::INVALID, linked, tags::PROCESS_DOWN, payload.encode());
    } else if reason.is_abnormal() {
        kernel.stop(linked, ExitReason::Killed);
    }
}
