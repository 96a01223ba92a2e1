//! Cooperative timers on a virtual game clock.
//!
//! The clock only moves when [`Scheduler::advance`] is called, once per
//! fixed tick, so every timer-driven rule can be tested frame by frame.

use std::time::Duration;

/// What a timer means when it fires. The rule engine routes each kind to
/// the component that armed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    NoWinTimeout,
    SurviveWin,
    HazardSpawn,
    LaunchCooldown,
    RunnerFinish,
}

/// Handle for cancelling a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Entry {
    id: TimerId,
    due: Duration,
    interval: Option<Duration>,
    kind: TimerKind,
}

/// Single-threaded timer wheel owned by the level.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    now: Duration,
    next_id: u64,
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current game time since the level was loaded.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Moves the clock forward. Due timers are collected by [`Self::poll`].
    pub fn advance(&mut self, dt: Duration) {
        self.now += dt;
    }

    /// Fires `kind` once, `delay` from now.
    pub fn schedule(&mut self, delay: Duration, kind: TimerKind) -> TimerId {
        self.insert(delay, None, kind)
    }

    /// Fires `kind` after `delay`, then every `interval` until cancelled.
    pub fn schedule_repeating(
        &mut self,
        delay: Duration,
        interval: Duration,
        kind: TimerKind,
    ) -> TimerId {
        self.insert(delay, Some(interval), kind)
    }

    fn insert(&mut self, delay: Duration, interval: Option<Duration>, kind: TimerKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            due: self.now + delay,
            interval: interval.filter(|i| !i.is_zero()),
            kind,
        });
        id
    }

    /// Cancels a pending timer. Returns false if it already fired or was
    /// cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Removes and returns every timer due at the current time, ordered by
    /// due time and then by scheduling order. Repeating timers are re-armed
    /// and may appear more than once if the clock jumped several intervals.
    pub fn poll(&mut self) -> Vec<(TimerId, TimerKind)> {
        let mut fired: Vec<(Duration, TimerId, TimerKind)> = Vec::new();

        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].due > self.now {
                i += 1;
                continue;
            }
            match self.entries[i].interval {
                Some(interval) => {
                    let entry = &mut self.entries[i];
                    while entry.due <= self.now {
                        fired.push((entry.due, entry.id, entry.kind));
                        entry.due += interval;
                    }
                    i += 1;
                }
                None => {
                    let entry = self.entries.remove(i);
                    fired.push((entry.due, entry.id, entry.kind));
                }
            }
        }

        fired.sort_by_key(|(due, id, _)| (*due, *id));
        fired.into_iter().map(|(_, id, kind)| (id, kind)).collect()
    }
}
