//! Supervisor runtime state: child start/stop order, restart-intensity
//! tracking, and strategy dispatch (spec.md SPEC_FULL §C). Grounded on
//! `snow-rt/src/actor/supervisor.rs`, redesigned for a single-threaded,
//! cooperative kernel:
//!
//! - The teacher keeps `SupervisorState` in a global
//!   `Arc<Mutex<FxHashMap<ProcessId, Arc<Mutex<SupervisorState>>>>>` because
//!   its coroutine entry points only receive a `*const u8`. Here the state
//!   just lives inside the supervisor's own [`super::Supervisor`] behavior —
//!   no global table, no locks, single thread.
//! - The teacher's `ShutdownType::Timeout` termination path blocks the
//!   calling thread in a `sleep`-polling loop waiting for the child to
//!   exit. A cooperative kernel cannot block the thread at all: a trapping
//!   child is sent [`tags::SHUTDOWN_SIGNAL`] and the supervisor arms a
//!   kernel timer; the real cleanup happens asynchronously, either when the
//!   child's own `ChildExit` arrives or when the timer fires and the
//!   supervisor force-kills it (see `terminate_single_child`).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::actor::{ActorId, ExitReason};
use crate::error::SupervisorError;
use crate::kernel::Kernel;
use crate::message::tags;

use super::child::{ChildSpec, ChildState, RestartType, ShutdownType};
use super::strategy::Strategy;

pub struct SupervisorState {
    pub strategy: Strategy,
    pub max_restarts: u32,
    pub max_seconds: u64,
    pub children: Vec<ChildState>,
    pub restart_history: VecDeque<Instant>,
    /// For `SimpleOneForOne`: the spec used to start dynamically-added
    /// children.
    pub child_template: Option<ChildSpec>,
    /// Timer id -> child actor awaiting a timed-out graceful shutdown.
    pending_kills: HashMap<u32, ActorId>,
}

impl SupervisorState {
    pub fn new(strategy: Strategy, max_restarts: u32, max_seconds: u64) -> Self {
        SupervisorState {
            strategy,
            max_restarts,
            max_seconds,
            children: Vec::new(),
            restart_history: VecDeque::new(),
            child_template: None,
            pending_kills: HashMap::new(),
        }
    }

    pub fn find_child_index(&self, actor_id: ActorId) -> Option<usize> {
        self.children.iter().position(|c| c.actor_id == Some(actor_id))
    }

    pub fn running_count(&self) -> usize {
        self.children.iter().filter(|c| c.running).count()
    }

    /// Start every configured child, in order. If one fails, the ones
    /// already started are torn back down in reverse and the error
    /// propagated (teacher's `start_children`).
    pub fn start_children(&mut self, kernel: &mut Kernel, sup_id: ActorId) -> Result<(), SupervisorError> {
        self.start_children_from(kernel, sup_id, 0)
    }

    pub fn start_children_from(
        &mut self,
        kernel: &mut Kernel,
        sup_id: ActorId,
        from_idx: usize,
    ) -> Result<(), SupervisorError> {
        for i in from_idx..self.children.len() {
            if let Err(e) = start_single_child(kernel, sup_id, &mut self.children[i]) {
                self.terminate_children_range(kernel, sup_id, from_idx, i);
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn terminate_all_children(&mut self, kernel: &mut Kernel, sup_id: ActorId) {
        let len = self.children.len();
        self.terminate_children_range(kernel, sup_id, 0, len);
    }

    /// Terminate `[from, to)` in reverse start order (teacher's
    /// `terminate_children_range`).
    pub fn terminate_children_range(&mut self, kernel: &mut Kernel, sup_id: ActorId, from: usize, to: usize) {
        for i in (from..to).rev() {
            if self.children[i].running {
                terminate_single_child(kernel, sup_id, &mut self.children[i], &mut self.pending_kills);
            }
        }
    }

    pub fn terminate_children_from(&mut self, kernel: &mut Kernel, sup_id: ActorId, from_idx: usize) {
        let len = self.children.len();
        self.terminate_children_range(kernel, sup_id, from_idx, len);
    }

    /// Sliding-window restart-intensity check (teacher's
    /// `check_restart_limit`): drop timestamps older than `now -
    /// max_seconds`, then accept iff the remaining count is under the
    /// limit, recording `now` on acceptance.
    pub fn check_restart_limit(&mut self) -> bool {
        let now = Instant::now();
        let window = Duration::from_secs(self.max_seconds);
        while let Some(&oldest) = self.restart_history.front() {
            if now.duration_since(oldest) > window {
                self.restart_history.pop_front();
            } else {
                break;
            }
        }
        if self.restart_history.len() >= self.max_restarts as usize {
            false
        } else {
            self.restart_history.push_back(now);
            true
        }
    }

    /// React to a child's `ChildExit` (teacher's `handle_child_exit`).
    /// `Ok(())` means handled; `Err` means the restart-intensity limit was
    /// exceeded and every child has been torn down — the caller should stop
    /// the supervisor itself.
    pub fn handle_child_exit(
        &mut self,
        kernel: &mut Kernel,
        sup_id: ActorId,
        dead: ActorId,
        reason: &ExitReason,
    ) -> Result<(), SupervisorError> {
        let Some(idx) = self.find_child_index(dead) else { return Ok(()) };

        self.children[idx].running = false;
        self.children[idx].actor_id = None;

        let restart = self.children[idx].spec.restart;
        if restart == RestartType::Temporary {
            self.children.remove(idx);
            return Ok(());
        }

        let should_restart = match restart {
            RestartType::Permanent => true,
            RestartType::Transient => reason.is_abnormal(),
            RestartType::Temporary => unreachable!("handled above"),
        };
        if !should_restart {
            return Ok(());
        }

        if !self.check_restart_limit() {
            self.terminate_all_children(kernel, sup_id);
            return Err(SupervisorError::RestartIntensityExceeded {
                restarts: self.max_restarts,
                window_ms: self.max_seconds * 1000,
            });
        }

        self.apply_strategy(kernel, sup_id, idx)
    }

    /// Dispatch the configured strategy after child `failed_idx` exited
    /// (teacher's `apply_strategy`).
    fn apply_strategy(&mut self, kernel: &mut Kernel, sup_id: ActorId, failed_idx: usize) -> Result<(), SupervisorError> {
        match self.strategy {
            Strategy::OneForOne | Strategy::SimpleOneForOne => {
                start_single_child(kernel, sup_id, &mut self.children[failed_idx])?;
            }
            Strategy::OneForAll => {
                self.terminate_all_children(kernel, sup_id);
                self.start_children(kernel, sup_id)?;
            }
            Strategy::RestForOne => {
                self.terminate_children_from(kernel, sup_id, failed_idx);
                self.start_children_from(kernel, sup_id, failed_idx)?;
            }
        }
        Ok(())
    }

    /// `SimpleOneForOne` dynamic child add: spawn one more instance of
    /// `child_template` and track it.
    pub fn start_dynamic_child(&mut self, kernel: &mut Kernel, sup_id: ActorId) -> Result<ActorId, SupervisorError> {
        let template = self
            .child_template
            .clone()
            .ok_or_else(|| SupervisorError::ChildStartFailed("<template>".into(), "no child_template set".into()))?;
        let mut child = ChildState::new(template);
        let id = start_single_child(kernel, sup_id, &mut child)?;
        self.children.push(child);
        Ok(id)
    }

    /// A force-kill timer fired (SPEC_FULL.md §C `ShutdownType::Timeout`
    /// grace-period expiry). Kills the target if it is still alive; a no-op
    /// if it already exited on its own in the meantime.
    pub fn on_kill_timer(&mut self, kernel: &mut Kernel, timer_id: u32) {
        let Some(target) = self.pending_kills.remove(&timer_id) else { return };
        if kernel.actors.get(target).is_some() {
            kernel.stop(target, ExitReason::Killed);
        }
    }
}

fn start_single_child(kernel: &mut Kernel, sup_id: ActorId, child: &mut ChildState) -> Result<ActorId, SupervisorError> {
    let spec = child.spec.clone();
    let make = spec.make.clone();
    let id = kernel
        .spawn(Some(sup_id), spec.mailbox_capacity, move |id| make(id))
        .map_err(|e| SupervisorError::ChildStartFailed(spec.id.clone(), e.to_string()))?;
    kernel.link(sup_id, id);
    child.actor_id = Some(id);
    child.running = true;
    Ok(id)
}

/// Terminate one child per its `ShutdownType` (teacher's
/// `terminate_single_child`, minus the blocking wait — see module docs).
/// Must run with `kernel.current() == sup_id` (true whenever this is called
/// from [`super::Supervisor::handle`]) so the force-kill timer is billed to
/// the supervisor's own timer budget.
fn terminate_single_child(
    kernel: &mut Kernel,
    sup_id: ActorId,
    child: &mut ChildState,
    pending_kills: &mut HashMap<u32, ActorId>,
) {
    let Some(id) = child.actor_id else {
        child.running = false;
        return;
    };

    let traps = kernel.actors.get(id).map(|s| s.trap_exit).unwrap_or(false);
    match child.spec.shutdown {
        ShutdownType::BrutalKill => kernel.stop(id, ExitReason::Killed),
        ShutdownType::Timeout(ms) if traps => {
            let _ = kernel.send_as(sup_id, id, tags::SHUTDOWN_SIGNAL, Vec::new());
            let timer_id = kernel.set_timer(ms, false);
            pending_kills.insert(timer_id, id);
        }
        ShutdownType::Timeout(_) => kernel.stop(id, ExitReason::Shutdown),
    }

    kernel.unlink(sup_id, id);
    child.running = false;
    child.actor_id = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Behavior;
    use crate::config::KernelConfig;
    use crate::message::Message;
    use crate::supervisor::child::ChildSpec;

    fn noop_child(id: &str) -> ChildSpec {
        ChildSpec::new(id, RestartType::Permanent, ShutdownType::BrutalKill, |_id| {
            Box::new(|_k: &mut Kernel, _m: Message| true) as Box<dyn Behavior>
        })
    }

    fn child_spec(id: &str, restart: RestartType) -> ChildSpec {
        ChildSpec::new(id, restart, ShutdownType::BrutalKill, |_id| {
            Box::new(|_k: &mut Kernel, _m: Message| true) as Box<dyn Behavior>
        })
    }

    /// A supervisor in these tests is just a plain spawned actor id: the
    /// `SupervisorState` methods only need `sup_id` for linking and parent
    /// assignment, not the `Supervisor` behavior wrapper itself.
    fn setup(kernel: &mut Kernel, strategy: Strategy, specs: Vec<ChildSpec>) -> (SupervisorState, ActorId) {
        let sup_id = kernel.spawn(None, 0, |_id| Box::new(|_k: &mut Kernel, _m: Message| true) as Box<dyn Behavior>).unwrap();
        kernel.set_trap_exit(sup_id, true);
        let mut state = SupervisorState::new(strategy, 3, 5);
        state.children = specs.into_iter().map(ChildState::new).collect();
        state.start_children(kernel, sup_id).unwrap();
        (state, sup_id)
    }

    #[test]
    fn one_for_one_restarts_only_failed_child() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        let specs = vec![noop_child("a"), noop_child("b"), noop_child("c")];
        let (mut state, sup_id) = setup(&mut kernel, Strategy::OneForOne, specs);
        let before: Vec<_> = state.children.iter().map(|c| c.actor_id.unwrap()).collect();

        state.handle_child_exit(&mut kernel, sup_id, before[1], &ExitReason::Error("crash".into())).unwrap();

        assert_eq!(state.children[0].actor_id.unwrap(), before[0]);
        assert_ne!(state.children[1].actor_id.unwrap(), before[1]);
        assert_eq!(state.children[2].actor_id.unwrap(), before[2]);
        assert!(state.children.iter().all(|c| c.running));
    }

    #[test]
    fn one_for_all_restarts_every_child() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        let specs = vec![noop_child("a"), noop_child("b"), noop_child("c")];
        let (mut state, sup_id) = setup(&mut kernel, Strategy::OneForAll, specs);
        let before: Vec<_> = state.children.iter().map(|c| c.actor_id.unwrap()).collect();

        state.handle_child_exit(&mut kernel, sup_id, before[1], &ExitReason::Error("crash".into())).unwrap();

        for i in 0..3 {
            assert_ne!(state.children[i].actor_id.unwrap(), before[i]);
        }
    }

    #[test]
    fn rest_for_one_restarts_failed_and_subsequent_only() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        let specs = vec![noop_child("a"), noop_child("b"), noop_child("c")];
        let (mut state, sup_id) = setup(&mut kernel, Strategy::RestForOne, specs);
        let before: Vec<_> = state.children.iter().map(|c| c.actor_id.unwrap()).collect();

        state.handle_child_exit(&mut kernel, sup_id, before[1], &ExitReason::Error("crash".into())).unwrap();

        assert_eq!(state.children[0].actor_id.unwrap(), before[0]);
        assert_ne!(state.children[1].actor_id.unwrap(), before[1]);
        assert_ne!(state.children[2].actor_id.unwrap(), before[2]);
    }

    #[test]
    fn restart_limit_exceeded_gives_up_and_clears_children() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        let (mut state, sup_id) = setup(&mut kernel, Strategy::OneForOne, vec![noop_child("a")]);
        state.max_restarts = 2;

        for _ in 0..2 {
            let dead = state.children[0].actor_id.unwrap();
            state.handle_child_exit(&mut kernel, sup_id, dead, &ExitReason::Error("x".into())).unwrap();
        }
        let dead = state.children[0].actor_id.unwrap();
        let result = state.handle_child_exit(&mut kernel, sup_id, dead, &ExitReason::Error("x".into()));
        assert!(matches!(result, Err(SupervisorError::RestartIntensityExceeded { .. })));
        assert!(state.children.iter().all(|c| !c.running));
    }

    #[test]
    fn permanent_restarts_even_on_normal_exit() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        let (mut state, sup_id) = setup(&mut kernel, Strategy::OneForOne, vec![child_spec("a", RestartType::Permanent)]);
        let dead = state.children[0].actor_id.unwrap();
        state.handle_child_exit(&mut kernel, sup_id, dead, &ExitReason::Normal).unwrap();
        assert!(state.children[0].running);
        assert_ne!(state.children[0].actor_id.unwrap(), dead);
    }

    #[test]
    fn transient_does_not_restart_on_normal_exit() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        let (mut state, sup_id) = setup(&mut kernel, Strategy::OneForOne, vec![child_spec("a", RestartType::Transient)]);
        let dead = state.children[0].actor_id.unwrap();
        state.handle_child_exit(&mut kernel, sup_id, dead, &ExitReason::Normal).unwrap();
        assert!(!state.children[0].running);
        assert!(state.children[0].actor_id.is_none());
    }

    #[test]
    fn transient_restarts_on_abnormal_exit() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        let (mut state, sup_id) = setup(&mut kernel, Strategy::OneForOne, vec![child_spec("a", RestartType::Transient)]);
        let dead = state.children[0].actor_id.unwrap();
        state.handle_child_exit(&mut kernel, sup_id, dead, &ExitReason::Error("boom".into())).unwrap();
        assert!(state.children[0].running);
    }

    #[test]
    fn temporary_child_is_dropped_on_exit_never_restarted() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        let (mut state, sup_id) = setup(&mut kernel, Strategy::OneForOne, vec![child_spec("a", RestartType::Temporary)]);
        let dead = state.children[0].actor_id.unwrap();
        state.handle_child_exit(&mut kernel, sup_id, dead, &ExitReason::Error("boom".into())).unwrap();
        assert!(state.children.is_empty());
    }

    #[test]
    fn unknown_child_exit_is_ignored() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        let (mut state, sup_id) = setup(&mut kernel, Strategy::OneForOne, vec![noop_child("a")]);
        let dead = state.children[0].actor_id.unwrap();
        let unknown = ActorId::new(0, 9999);
        state.handle_child_exit(&mut kernel, sup_id, unknown, &ExitReason::Error("x".into())).unwrap();
        assert_eq!(state.children[0].actor_id.unwrap(), dead);
        assert!(state.children[0].running);
    }

    #[test]
    fn simple_one_for_one_dynamic_child_restarts_in_place() {
        let mut kernel = Kernel::new(0, KernelConfig::default()).unwrap();
        let sup_id = kernel.spawn(None, 0, |_id| Box::new(|_k: &mut Kernel, _m: Message| true) as Box<dyn Behavior>).unwrap();
        kernel.set_trap_exit(sup_id, true);
        let mut state = SupervisorState::new(Strategy::SimpleOneForOne, 3, 5);
        state.child_template = Some(noop_child("template"));
        for _ in 0..3 {
            state.start_dynamic_child(&mut kernel, sup_id).unwrap();
        }
        let before: Vec<_> = state.children.iter().map(|c| c.actor_id.unwrap()).collect();

        state.handle_child_exit(&mut kernel, sup_id, before[1], &ExitReason::Error("crash".into())).unwrap();

        assert_eq!(state.children[0].actor_id.unwrap(), before[0]);
        assert_ne!(state.children[1].actor_id.unwrap(), before[1]);
        assert_eq!(state.children[2].actor_id.unwrap(), before[2]);
    }
}
