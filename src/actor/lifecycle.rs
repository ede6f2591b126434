//! Actor lifecycle status and exit reason (spec.md §3).

/// Lifecycle status of an actor. `spawn → Idle ⇄ Ready ⇄ Running → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStatus {
    /// Alive, mailbox empty or not yet scheduled.
    Idle,
    /// In the scheduler's ready queue, waiting to run.
    Ready,
    /// Currently executing its behavior.
    Running,
    /// Exited; awaiting the cleanup pass.
    Stopped,
}

/// Why an actor exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The behavior returned `false` (or the final message was handled
    /// without requesting continuation).
    Normal,
    /// `stop()` was called, or a supervisor force-killed the actor.
    Killed,
    /// The behavior's execution could not continue (host-observable panic
    /// translated to a killed-style exit per spec.md §7).
    Error(String),
    /// Ordered shutdown requested by a supervisor (distinct from `Killed` so
    /// `RestartType::Transient` children do not restart on it, per §4.5/§C).
    Shutdown,
}

impl ExitReason {
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, ExitReason::Normal | ExitReason::Shutdown)
    }

    pub fn tag(&self) -> crate::message::ExitReasonTag {
        use crate::message::ExitReasonTag as T;
        match self {
            ExitReason::Normal => T::Normal,
            ExitReason::Killed => T::Killed,
            ExitReason::Error(_) => T::Error,
            ExitReason::Shutdown => T::Shutdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_and_shutdown_are_not_abnormal() {
        assert!(!ExitReason::Normal.is_abnormal());
        assert!(!ExitReason::Shutdown.is_abnormal());
    }

    #[test]
    fn killed_and_error_are_abnormal() {
        assert!(ExitReason::Killed.is_abnormal());
        assert!(ExitReason::Error("boom".into()).is_abnormal());
    }
}
