//! Erlang/OTP-style supervision (spec.md SPEC_FULL §C), grounded on
//! `snow-rt/src/actor/supervisor.rs`.
//!
//! A supervisor is an ordinary actor: it traps exits, links each child it
//! starts, and reacts to the `ChildExit`/`Timer` messages that arrive in its
//! own mailbox like any other message. There is no separate scheduler hook
//! or global state table — see `tree.rs` for why that diverges from the
//! teacher.

pub mod child;
pub mod strategy;
pub mod tree;

pub use child::{ChildSpec, ChildState, RestartType, ShutdownType};
pub use strategy::Strategy;
pub use tree::SupervisorState;

use crate::actor::{ActorId, Behavior, ExitReason};
use crate::error::SupervisorError;
use crate::kernel::Kernel;
use crate::message::{tags, ChildExitPayload, ExitReasonTag, Message, TimerPayload};

/// The supervisor behavior: owns a [`SupervisorState`] and drives it from
/// the two message kinds it cares about.
struct Supervisor {
    state: SupervisorState,
}

impl Behavior for Supervisor {
    fn handle(&mut self, kernel: &mut Kernel, msg: Message) -> bool {
        let sup_id = kernel.current();
        match msg.type_tag {
            tags::SUPERVISOR_START => {
                if let Err(e) = self.state.start_children(kernel, sup_id) {
                    tracing::warn!(supervisor = %sup_id, error = %e, "supervisor failed to start children");
                    kernel.stop_self(ExitReason::Error(e.to_string()));
                    return false;
                }
                true
            }
            tags::CHILD_EXIT => {
                let Some(payload) = ChildExitPayload::decode(&msg.payload) else { return true };
                let reason = exit_reason_from_tag(payload.exit_reason);
                if let Err(e) = self.state.handle_child_exit(kernel, sup_id, payload.child_id, &reason) {
                    tracing::warn!(supervisor = %sup_id, error = %e, "supervisor giving up");
                    kernel.stop_self(ExitReason::Error(e.to_string()));
                    return false;
                }
                true
            }
            tags::TIMER => {
                if let Some(payload) = TimerPayload::decode(&msg.payload) {
                    self.state.on_kill_timer(kernel, payload.id);
                }
                true
            }
            tags::SUPERVISOR_ADD_CHILD => {
                if let Err(e) = self.state.start_dynamic_child(kernel, sup_id) {
                    tracing::warn!(supervisor = %sup_id, error = %e, "dynamic child failed to start");
                }
                true
            }
            _ => true,
        }
    }
}

fn exit_reason_from_tag(tag: ExitReasonTag) -> ExitReason {
    match tag {
        ExitReasonTag::Normal => ExitReason::Normal,
        ExitReasonTag::Killed => ExitReason::Killed,
        ExitReasonTag::Error => ExitReason::Error(String::new()),
        ExitReasonTag::Shutdown => ExitReason::Shutdown,
    }
}

/// Start a supervisor with a fixed set of children (spec.md SPEC_FULL §C).
/// Spawns the supervisor actor (trapping exits) and arms its children to
/// start on the next scheduler step — `Behavior::handle` is the only place
/// with typed access to the supervisor's own state (spawning is otherwise
/// just `ActorId -> Box<dyn Behavior>`, with no room to run `start_children`
/// synchronously against the slot that will hold it), so the supervisor
/// sends itself a `SUPERVISOR_START` message and starts children the first
/// time it is stepped. Run the kernel at least once after this call before
/// relying on children being alive.
pub fn start_supervisor(
    kernel: &mut Kernel,
    parent: Option<ActorId>,
    strategy: Strategy,
    max_restarts: u32,
    max_seconds: u64,
    children: Vec<ChildSpec>,
) -> Result<ActorId, SupervisorError> {
    let mut state = SupervisorState::new(strategy, max_restarts, max_seconds);
    state.children = children.into_iter().map(ChildState::new).collect();

    let sup_id = kernel
        .spawn(parent, 0, move |_id| Box::new(Supervisor { state }) as Box<dyn Behavior>)
        .map_err(|e| SupervisorError::ChildStartFailed("<supervisor>".into(), e.to_string()))?;
    kernel.set_trap_exit(sup_id, true);
    let _ = kernel.send_as(ActorId::INVALID, sup_id, tags::SUPERVISOR_START, Vec::new());
    Ok(sup_id)
}

/// Start a `SimpleOneForOne` supervisor with no children up front; children
/// are added later with [`add_dynamic_child`].
pub fn start_dynamic_supervisor(
    kernel: &mut Kernel,
    parent: Option<ActorId>,
    max_restarts: u32,
    max_seconds: u64,
    template: ChildSpec,
) -> Result<ActorId, SupervisorError> {
    let mut state = SupervisorState::new(Strategy::SimpleOneForOne, max_restarts, max_seconds);
    state.child_template = Some(template);
    let sup_id = kernel
        .spawn(parent, 0, move |_id| Box::new(Supervisor { state }) as Box<dyn Behavior>)
        .map_err(|e| SupervisorError::ChildStartFailed("<supervisor>".into(), e.to_string()))?;
    kernel.set_trap_exit(sup_id, true);
    Ok(sup_id)
}

/// Ask a running `SimpleOneForOne` supervisor to start one more instance of
/// its child template. Asynchronous: the new child is started the next time
/// `supervisor` is stepped, not before this call returns.
pub fn add_dynamic_child(kernel: &mut Kernel, supervisor: ActorId) -> Result<(), crate::error::KernelError> {
    kernel.send_as(ActorId::INVALID, supervisor, tags::SUPERVISOR_ADD_CHILD, Vec::new())
}
