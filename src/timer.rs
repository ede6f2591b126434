//! Timer service (spec.md §4.3, §3 "Timer entry").
//!
//! `(id, owner_actor, platform_handle, periodic?)`. Rather than a platform
//! timer fd per entry (not portable to the embedded targets spec.md §1
//! names), entries are deadlines checked against `Instant::now()` each time
//! the run loop wakes; `next_deadline` caps the poll timeout so a due timer
//! is never missed by more than the poll granularity.

use std::time::{Duration, Instant};

use crate::actor::ActorId;
use crate::message::TimerPayload;

struct TimerEntry {
    id: u32,
    owner: ActorId,
    deadline: Instant,
    period: Option<Duration>,
    expirations: u64,
}

#[derive(Default)]
pub struct TimerTable {
    entries: Vec<TimerEntry>,
    next_id: u32,
}

impl TimerTable {
    pub fn new() -> Self {
        TimerTable { entries: Vec::new(), next_id: 1 }
    }

    /// spec.md §6 `set_timer(interval_ms, periodic?) -> timer_id`.
    pub fn set(&mut self, owner: ActorId, interval_ms: u64, periodic: bool) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        let interval = Duration::from_millis(interval_ms);
        self.entries.push(TimerEntry {
            id,
            owner,
            deadline: Instant::now() + interval,
            period: if periodic { Some(interval) } else { None },
            expirations: 0,
        });
        id
    }

    /// spec.md §6 `cancel_timer(id)`.
    pub fn cancel(&mut self, id: u32) {
        self.entries.retain(|e| e.id != id);
    }

    pub fn release_owned(&mut self, owner: ActorId) {
        self.entries.retain(|e| e.owner != owner);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        let now = Instant::now();
        self.entries.iter().map(|e| e.deadline.saturating_duration_since(now)).min()
    }

    /// Pop every timer that has fired, coalescing multiple periodic
    /// expirations into a single `TimerPayload` (spec.md §5 "a periodic
    /// timer may coalesce expirations and report the count"). One-shot
    /// timers are removed; periodic timers are rescheduled forward from
    /// their *original* deadline so drift does not accumulate.
    pub fn take_expired(&mut self) -> Vec<(ActorId, TimerPayload)> {
        let now = Instant::now();
        let mut fired = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].deadline <= now {
                let mut entry = self.entries.remove(i);
                if let Some(period) = entry.period {
                    while entry.deadline <= now {
                        entry.deadline += period;
                        entry.expirations += 1;
                    }
                    let payload = TimerPayload { id: entry.id, expirations: entry.expirations };
                    fired.push((entry.owner, payload));
                    entry.expirations = 0;
                    self.entries.push(entry);
                } else {
                    entry.expirations += 1;
                    fired.push((entry.owner, TimerPayload { id: entry.id, expirations: entry.expirations }));
                }
            } else {
                i += 1;
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once_and_is_removed() {
        let mut t = TimerTable::new();
        let owner = ActorId::new(0, 1);
        let id = t.set(owner, 0, false);
        std::thread::sleep(Duration::from_millis(1));
        let fired = t.take_expired();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1.id, id);
        assert!(t.is_empty());
    }

    #[test]
    fn periodic_single_due_firing_reports_one_expiration() {
        let mut t = TimerTable::new();
        let owner = ActorId::new(0, 1);
        t.set(owner, 0, true);
        std::thread::sleep(Duration::from_millis(1));
        let fired = t.take_expired();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1.expirations, 1);
    }

    #[test]
    fn cancel_removes_before_fire() {
        let mut t = TimerTable::new();
        let owner = ActorId::new(0, 1);
        let id = t.set(owner, 1000, false);
        t.cancel(id);
        assert!(t.is_empty());
    }

    #[test]
    fn release_owned_drops_all_of_that_actors_timers() {
        let mut t = TimerTable::new();
        let a = ActorId::new(0, 1);
        let b = ActorId::new(0, 2);
        t.set(a, 1000, false);
        t.set(b, 1000, false);
        t.release_owned(a);
        assert_eq!(t.next_deadline().is_some(), true);
        t.release_owned(b);
        assert!(t.is_empty());
    }
}
