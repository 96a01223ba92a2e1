//! Level rule engine: turns input, collisions and timers into exactly one
//! terminal outcome per attempt.
//!
//! # Tick order
//!
//! 1. Drain queued input (pointer, synthetic collisions, host controls).
//! 2. Step physics; collision-start pairs are classified immediately.
//! 3. Advance the virtual clock by one fixed step.
//! 4. Logic update: runner, hazards, obstacle outline, fall and stuck checks.
//! 5. Fire due timers.
//! 6. Drain input again so callbacks raised during the tick land this tick.

mod events;
pub mod scoring;
mod stuck;

pub use events::{
    AttemptPhase, EventQueue, GameEvent, LoseReason, Outcome, Resolution, RuleEvent, WinReport,
};
pub use stuck::{STUCK_WINDOW, StuckDetector};

use std::time::Duration;

use rapier2d::prelude::*;
use tracing::{debug, info, warn};

use crate::context::{WorldContext, tick_duration};
use crate::geometry::Point;
use crate::hazard::{HazardSpawner, OUT_OF_BOUNDS_MARGIN};
use crate::launch_pad::LaunchPad;
use crate::level::{DEFAULT_GOAL_SIZE, DEFAULT_MIN_MOVE_PX, GOAL_TRIGGER_ID, LevelConfig, WinRule};
use crate::physics::{BodyKind, BodyRoot};
use crate::runner::RunnerAgent;
use crate::scheduler::{TimerId, TimerKind};
use crate::stroke::{PhysicsAuthor, Stroke, StrokeCapture, simplify};

/// Delay between a qualifying win event and the terminal Win outcome.
pub const WIN_PRESENTATION_DELAY: Duration = Duration::from_millis(700);

const PLATFORM_FRICTION: f32 = 0.8;

/// Orchestrates one level attempt.
#[derive(Debug)]
pub struct LevelRuleEngine {
    level: LevelConfig,
    phase: AttemptPhase,
    queue: EventQueue,
    outbox: Vec<RuleEvent>,
    capture: StrokeCapture,
    author: PhysicsAuthor,
    runner: RunnerAgent,
    hazards: Option<HazardSpawner>,
    pad: Option<LaunchPad>,
    stuck: Option<StuckDetector>,
    goal: Point,
    fall_below_y: f32,
    platforms: Vec<ColliderHandle>,
    triggers: Vec<(String, ColliderHandle)>,
    no_win_timer: Option<TimerId>,
    survive_timer: Option<TimerId>,
    attempt_started: Option<Duration>,
    win_elapsed: Duration,
    ink_used: f32,
    torn_down: bool,
}

impl LevelRuleEngine {
    /// Builds the level's static geometry and actors in `ctx`. The attempt
    /// stays in [`AttemptPhase::Setup`] until [`Self::begin`].
    pub fn new(ctx: &mut WorldContext, level: LevelConfig) -> Self {
        let bounds = ctx.bounds;

        let platforms = level
            .platforms
            .iter()
            .map(|p| {
                let center = bounds.resolve_point(Point::new(p.x, p.y));
                let collider =
                    ColliderBuilder::cuboid(bounds.resolve_x(p.w) / 2.0, bounds.resolve_y(p.h) / 2.0)
                        .translation(Vector::new(center.x, center.y))
                        .rotation(p.rotation)
                        .friction(PLATFORM_FRICTION)
                        .build();
                ctx.physics
                    .add_tagged_static_collider(collider, BodyKind::Platform)
            })
            .collect();

        let goal = bounds.resolve_point(level.goal);
        let mut triggers = Vec::new();
        if !level.triggers.iter().any(|t| t.id == GOAL_TRIGGER_ID) {
            triggers.push((
                GOAL_TRIGGER_ID.to_string(),
                add_trigger(ctx, GOAL_TRIGGER_ID, goal, DEFAULT_GOAL_SIZE, DEFAULT_GOAL_SIZE),
            ));
        }
        for zone in &level.triggers {
            let center = bounds.resolve_point(Point::new(zone.x, zone.y));
            triggers.push((
                zone.id.clone(),
                add_trigger(ctx, &zone.id, center, zone.w, zone.h),
            ));
        }

        let start = bounds.resolve_point(level.start);
        let heading = if goal.x < start.x { -1.0 } else { 1.0 };
        let runner = RunnerAgent::spawn(ctx, start, &level.movement, heading);

        let hazards = level
            .hazard
            .as_ref()
            .filter(|h| h.enabled)
            .map(|h| HazardSpawner::new(h, bounds));
        let pad = level
            .launch_pad
            .as_ref()
            .filter(|p| p.enabled)
            .map(|p| LaunchPad::new(ctx, p));
        let stuck = level.lose.stuck_ms.filter(|ms| *ms > 0).map(|ms| {
            StuckDetector::new(
                Duration::from_millis(ms),
                level.lose.min_move_px.unwrap_or(DEFAULT_MIN_MOVE_PX),
            )
        });
        let fall_below_y = level
            .lose
            .fall_below_y
            .unwrap_or(bounds.height + OUT_OF_BOUNDS_MARGIN);

        let mut capture = StrokeCapture::new(level.ink_max);
        capture.set_enabled(false);

        info!(
            level = level.id,
            platforms = level.platforms.len(),
            hazard = hazards.is_some(),
            launch_pad = pad.is_some(),
            win = ?level.win,
            "level built"
        );

        Self {
            level,
            phase: AttemptPhase::Setup,
            queue: EventQueue::new(),
            outbox: Vec::new(),
            capture,
            author: PhysicsAuthor::new(),
            runner,
            hazards,
            pad,
            stuck,
            goal,
            fall_below_y,
            platforms,
            triggers,
            no_win_timer: None,
            survive_timer: None,
            attempt_started: None,
            win_elapsed: Duration::ZERO,
            ink_used: 0.0,
            torn_down: false,
        }
    }

    /// Setup to Drawing, if the host grants permission (e.g. a life was
    /// available). A refused attempt never leaves Setup.
    pub fn begin(&mut self, permitted: bool) -> bool {
        if self.phase != AttemptPhase::Setup || self.torn_down {
            return false;
        }
        if !permitted {
            warn!(level = self.level.id, "attempt refused");
            self.outbox.push(RuleEvent::AttemptRefused);
            return false;
        }
        self.capture.set_enabled(true);
        self.set_phase(AttemptPhase::Drawing);
        self.outbox
            .push(RuleEvent::InkChanged(self.capture.ink_remaining()));
        true
    }

    /// Queues an input event for the next drain.
    pub fn push(&self, event: GameEvent) {
        self.queue.push(event);
    }

    /// Takes every rule event produced since the last call.
    pub fn drain_events(&mut self) -> Vec<RuleEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Runs one fixed frame.
    pub fn tick(&mut self, ctx: &mut WorldContext) {
        if self.torn_down {
            return;
        }
        self.process_events(ctx);

        let pairs: Vec<(ColliderHandle, ColliderHandle)> = ctx
            .physics
            .step_with_events()
            .into_iter()
            .filter(|e| e.started())
            .map(|e| (e.collider1(), e.collider2()))
            .collect();
        if !pairs.is_empty() {
            self.classify(ctx, &pairs);
        }

        ctx.scheduler.advance(tick_duration());
        self.update(ctx);
        self.process_timers(ctx);
        self.process_events(ctx);
    }

    fn process_events(&mut self, ctx: &mut WorldContext) {
        let mut batch = Vec::new();
        for event in self.queue.drain() {
            if let GameEvent::Collision { a, b } = event {
                batch.push((a, b));
                continue;
            }
            if !batch.is_empty() {
                self.classify(ctx, &std::mem::take(&mut batch));
            }
            self.handle_event(ctx, event);
        }
        if !batch.is_empty() {
            self.classify(ctx, &batch);
        }
    }

    fn handle_event(&mut self, ctx: &mut WorldContext, event: GameEvent) {
        match event {
            GameEvent::PointerDown(p) => {
                if self.phase == AttemptPhase::Drawing && self.capture.begin(p) {
                    self.outbox
                        .push(RuleEvent::InkChanged(self.capture.ink_remaining()));
                }
            }
            GameEvent::PointerMove(p) => {
                if self.capture.extend(p) {
                    self.outbox
                        .push(RuleEvent::InkChanged(self.capture.ink_remaining()));
                }
            }
            GameEvent::PointerUp => {
                let was_dragging = self.capture.is_dragging();
                match self.capture.end() {
                    Some(stroke) => self.finalize(ctx, &stroke),
                    None if was_dragging => {
                        self.outbox
                            .push(RuleEvent::InkChanged(self.capture.ink_remaining()));
                    }
                    None => {}
                }
            }
            GameEvent::Collision { a, b } => self.classify(ctx, &[(a, b)]),
            GameEvent::SetCaptureEnabled(enabled) => {
                // resuming only matters while the stroke is still open
                self.capture
                    .set_enabled(enabled && self.phase == AttemptPhase::Drawing);
            }
            GameEvent::UnlockLaunchPad => {
                if let Some(pad) = &mut self.pad {
                    pad.unlock();
                }
            }
            GameEvent::FinishComplete => self.resolve_win(),
        }
    }

    /// Drawing to Attempting.
    fn finalize(&mut self, ctx: &mut WorldContext, stroke: &Stroke) {
        if self.phase != AttemptPhase::Drawing {
            return;
        }
        self.capture.set_enabled(false);
        self.runner.end_glide();

        let simplified = simplify(stroke.points());
        if self.author.install(ctx, &simplified).is_none() {
            debug!(points = stroke.len(), "stroke produced no obstacle");
        }
        self.ink_used = stroke.length();
        debug!(
            raw = stroke.len(),
            simplified = simplified.len(),
            ink = self.ink_used,
            "stroke finalized"
        );

        let now = ctx.now();
        self.attempt_started = Some(now);
        self.runner.start(ctx);
        if let Some(hazards) = &mut self.hazards {
            hazards.start(ctx);
        }
        if let Some(ms) = self.level.lose.no_win_timeout_ms.filter(|ms| *ms > 0) {
            self.no_win_timer = Some(
                ctx.scheduler
                    .schedule(Duration::from_millis(ms), TimerKind::NoWinTimeout),
            );
        }
        if let WinRule::Survive { duration_ms } = self.level.win {
            self.survive_timer = Some(
                ctx.scheduler
                    .schedule(Duration::from_millis(duration_ms), TimerKind::SurviveWin),
            );
        }
        let pos = self.runner.position(ctx);
        if let Some(stuck) = &mut self.stuck {
            stuck.arm(now, pos);
        }
        self.set_phase(AttemptPhase::Attempting);
    }

    /// Classifies a batch of collision-start pairs. The fall check runs
    /// first, then hazard contacts across the whole batch, then launch pad
    /// and trigger handling pair by pair.
    fn classify(&mut self, ctx: &mut WorldContext, pairs: &[(ColliderHandle, ColliderHandle)]) {
        if self.phase == AttemptPhase::Attempting && self.runner.is_below(ctx, self.fall_below_y) {
            self.lose(ctx, LoseReason::Fell);
        }

        for &(a, b) in pairs {
            if self.is_runner_hazard_pair(ctx, a, b) {
                self.lose(ctx, LoseReason::Hazard);
            }
        }

        for &(a, b) in pairs {
            if !matches!(
                self.phase,
                AttemptPhase::Attempting | AttemptPhase::WinQueued
            ) {
                return;
            }
            if self.phase == AttemptPhase::Attempting {
                if let Some(pad) = &mut self.pad {
                    if pad.handle_collision(ctx, a, b, &mut self.runner, self.goal) {
                        continue;
                    }
                }
            }
            let other = if self.is_runner(ctx, a) {
                b
            } else if self.is_runner(ctx, b) {
                a
            } else {
                continue;
            };
            let touched = match ctx.physics.kind_of(other) {
                Some(BodyKind::Trigger(id)) => id.clone(),
                _ => continue,
            };
            if self.level.winning_trigger() == Some(touched.as_str()) {
                self.queue_win(ctx);
            } else {
                debug!(trigger = %touched, "runner touched non-winning trigger");
            }
        }
    }

    fn is_runner(&self, ctx: &WorldContext, collider: ColliderHandle) -> bool {
        ctx.physics.root_of(collider) == BodyRoot::Body(self.runner.body())
    }

    fn is_runner_hazard_pair(&self, ctx: &WorldContext, a: ColliderHandle, b: ColliderHandle) -> bool {
        let Some(hazards) = &self.hazards else {
            return false;
        };
        (self.is_runner(ctx, a) && hazards.is_hazard(ctx, b))
            || (self.is_runner(ctx, b) && hazards.is_hazard(ctx, a))
    }

    fn update(&mut self, ctx: &mut WorldContext) {
        self.runner.update(ctx);
        if let Some(hazards) = &mut self.hazards {
            hazards.update(ctx);
        }
        self.author.sync(ctx);

        if self.phase != AttemptPhase::Attempting {
            return;
        }
        if self.runner.is_below(ctx, self.fall_below_y) {
            self.lose(ctx, LoseReason::Fell);
            return;
        }
        let now = ctx.now();
        let pos = self.runner.position(ctx);
        if let Some(stuck) = &mut self.stuck {
            if stuck.sample(now, pos) {
                self.lose(ctx, LoseReason::Stuck);
            }
        }
    }

    fn process_timers(&mut self, ctx: &mut WorldContext) {
        for (id, kind) in ctx.scheduler.poll() {
            debug!(?kind, "timer fired");
            match kind {
                TimerKind::NoWinTimeout => {
                    if self.no_win_timer == Some(id) {
                        self.no_win_timer = None;
                        self.lose(ctx, LoseReason::Timeout);
                    }
                }
                TimerKind::SurviveWin => {
                    if self.survive_timer == Some(id) {
                        self.survive_timer = None;
                        self.queue_win(ctx);
                    }
                }
                TimerKind::HazardSpawn => {
                    if let Some(hazards) = &mut self.hazards {
                        hazards.on_timer(ctx, id);
                    }
                }
                TimerKind::LaunchCooldown => {
                    if let Some(pad) = &mut self.pad {
                        pad.on_timer(id);
                    }
                }
                TimerKind::RunnerFinish => {
                    self.runner.complete_finish(id);
                }
            }
        }
    }

    /// Attempting to WinQueued; the outcome follows once the runner's
    /// finishing flourish completes.
    fn queue_win(&mut self, ctx: &mut WorldContext) {
        if self.phase != AttemptPhase::Attempting {
            debug!(phase = ?self.phase, "redundant win ignored");
            return;
        }
        self.cancel_rule_timers(ctx);
        self.win_elapsed = self.elapsed(ctx);
        self.set_phase(AttemptPhase::WinQueued);

        self.runner.stop(ctx);
        let queue = self.queue.clone();
        self.runner.begin_finish(
            ctx,
            WIN_PRESENTATION_DELAY,
            Box::new(move || queue.push(GameEvent::FinishComplete)),
        );
    }

    fn resolve_win(&mut self) {
        if self.phase != AttemptPhase::WinQueued {
            return;
        }
        let efficiency = scoring::efficiency(self.ink_used, self.level.ink_max);
        let report = WinReport {
            ink_used: self.ink_used,
            ink_budget: self.level.ink_max,
            efficiency,
            stars: scoring::stars(efficiency),
            elapsed: self.win_elapsed,
        };
        info!(
            level = self.level.id,
            stars = report.stars,
            efficiency = report.efficiency,
            elapsed = ?report.elapsed,
            "level won"
        );
        self.set_phase(AttemptPhase::Resolved(Resolution::Win));
        self.outbox.push(RuleEvent::Outcome(Outcome::Win(report)));
    }

    fn lose(&mut self, ctx: &mut WorldContext, reason: LoseReason) {
        if self.phase != AttemptPhase::Attempting {
            debug!(phase = ?self.phase, ?reason, "redundant lose ignored");
            return;
        }
        self.cancel_rule_timers(ctx);
        self.runner.stop(ctx);
        self.capture.set_enabled(false);
        info!(level = self.level.id, ?reason, "level lost");
        self.set_phase(AttemptPhase::Resolved(Resolution::Lose(reason)));
        self.outbox.push(RuleEvent::Outcome(Outcome::Lose(reason)));
    }

    fn cancel_rule_timers(&mut self, ctx: &mut WorldContext) {
        for id in [self.no_win_timer.take(), self.survive_timer.take()]
            .into_iter()
            .flatten()
        {
            ctx.scheduler.cancel(id);
        }
    }

    fn set_phase(&mut self, phase: AttemptPhase) {
        debug!(from = ?self.phase, to = ?phase, "phase change");
        self.phase = phase;
        self.outbox.push(RuleEvent::PhaseChanged(phase));
    }

    fn elapsed(&self, ctx: &WorldContext) -> Duration {
        self.attempt_started
            .map_or(Duration::ZERO, |t| ctx.now().saturating_sub(t))
    }

    /// Cancels every timer and removes every body this level created.
    /// Further ticks are no-ops.
    pub fn teardown(&mut self, ctx: &mut WorldContext) {
        if self.torn_down {
            return;
        }
        self.cancel_rule_timers(ctx);
        if let Some(hazards) = &mut self.hazards {
            hazards.destroy(ctx);
        }
        if let Some(pad) = &mut self.pad {
            pad.destroy(ctx);
        }
        self.author.clear(ctx);
        self.runner.destroy(ctx);
        for handle in self.platforms.drain(..) {
            ctx.physics.remove_static_collider(handle);
        }
        for (_, handle) in self.triggers.drain(..) {
            ctx.physics.remove_static_collider(handle);
        }
        ctx.scheduler.cancel_all();
        self.queue.clear();
        self.capture.set_enabled(false);
        self.torn_down = true;
        debug!(level = self.level.id, "level torn down");
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub fn level(&self) -> &LevelConfig {
        &self.level
    }

    pub fn capture(&self) -> &StrokeCapture {
        &self.capture
    }

    pub fn author(&self) -> &PhysicsAuthor {
        &self.author
    }

    pub fn runner(&self) -> &RunnerAgent {
        &self.runner
    }

    /// Host-side access to the runner (debug teleports and the like).
    pub fn runner_mut(&mut self) -> &mut RunnerAgent {
        &mut self.runner
    }

    pub fn hazards(&self) -> Option<&HazardSpawner> {
        self.hazards.as_ref()
    }

    pub fn launch_pad(&self) -> Option<&LaunchPad> {
        self.pad.as_ref()
    }

    /// Resolved goal position in pixels.
    pub fn goal(&self) -> Point {
        self.goal
    }

    pub fn fall_below_y(&self) -> f32 {
        self.fall_below_y
    }

    pub fn trigger_collider(&self, id: &str) -> Option<ColliderHandle> {
        self.triggers
            .iter()
            .find(|(trigger, _)| trigger == id)
            .map(|(_, handle)| *handle)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

fn add_trigger(ctx: &mut WorldContext, id: &str, center: Point, w: f32, h: f32) -> ColliderHandle {
    let collider = ColliderBuilder::cuboid(w / 2.0, h / 2.0)
        .translation(Vector::new(center.x, center.y))
        .sensor(true)
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .build();
    ctx.physics
        .add_tagged_static_collider(collider, BodyKind::Trigger(id.to_string()))
}
