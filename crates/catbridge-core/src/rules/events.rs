//! Inbound event queue and outbound rule events.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rapier2d::prelude::ColliderHandle;

use crate::geometry::Point;

/// Input consumed by the rule engine, in arrival order, once per tick.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    /// A collision-start between two colliders.
    Collision {
        a: ColliderHandle,
        b: ColliderHandle,
    },
    /// Pause/resume of drawing from the host.
    SetCaptureEnabled(bool),
    UnlockLaunchPad,
    /// The runner's finishing flourish has ended.
    FinishComplete,
}

/// Cloneable handle to the engine's input queue.
#[derive(Debug, Clone)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<GameEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Push an event to be processed on the next drain.
    pub fn push(&self, event: GameEvent) {
        self.inner.lock().push_back(event);
    }

    /// Drain all pending events.
    pub fn drain(&self) -> Vec<GameEvent> {
        self.inner.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Why an attempt was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoseReason {
    Hazard,
    Fell,
    Timeout,
    Stuck,
}

/// Terminal summary of a won attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinReport {
    pub ink_used: f32,
    pub ink_budget: f32,
    /// `1 - ink_used / ink_budget`, in `0..=1`.
    pub efficiency: f32,
    pub stars: u8,
    /// Time from the start of the attempt to the qualifying event.
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Win(WinReport),
    Lose(LoseReason),
}

impl Outcome {
    pub fn is_win(&self) -> bool {
        matches!(self, Self::Win(_))
    }
}

/// Terminal result recorded in [`AttemptPhase::Resolved`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Win,
    Lose(LoseReason),
}

/// Phases of one level attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    /// Waiting for permission to start.
    Setup,
    Drawing,
    Attempting,
    /// A win qualified; the finishing flourish is playing.
    WinQueued,
    Resolved(Resolution),
}

impl AttemptPhase {
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Output for external collaborators (HUD, progress, menus).
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEvent {
    InkChanged(f32),
    PhaseChanged(AttemptPhase),
    AttemptRefused,
    Outcome(Outcome),
}
