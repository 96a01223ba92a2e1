//! The runner: a physics ball with a small logical state machine on top.

use std::fmt;
use std::time::Duration;

use rapier2d::prelude::*;
use tracing::debug;

use crate::context::WorldContext;
use crate::geometry::Point;
use crate::level::{Movement, MovementMode};
use crate::physics::BodyKind;
use crate::scheduler::{TimerId, TimerKind};

/// Ball radius in pixels.
pub const RUNNER_RADIUS: f32 = 18.0;
pub const RUNNER_FRICTION: f32 = 0.01;

const GLIDE_AMPLITUDE: f32 = 6.0;
const GLIDE_PERIOD_SECS: f32 = 1.2;
/// Upward visual lift reached at the end of the finishing flourish.
const FINISH_LIFT: f32 = 40.0;

/// What drives the runner while it is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    /// Forward speed is held at or above the walk speed.
    Walking,
    /// Frozen in place until an impulse source launches it.
    AwaitingLaunch,
    /// Free flight; physics alone decides.
    Launched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Gliding,
    Active(Motion),
    Frozen,
    Finishing,
}

/// Completion callback handed to [`RunnerAgent::begin_finish`].
pub type FinishCallback = Box<dyn FnOnce() + Send>;

struct Finish {
    started: Duration,
    delay: Duration,
    timer: TimerId,
    on_done: Option<FinishCallback>,
}

impl fmt::Debug for Finish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finish")
            .field("started", &self.started)
            .field("delay", &self.delay)
            .field("timer", &self.timer)
            .field("pending", &self.on_done.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct RunnerAgent {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    state: RunnerState,
    mode: MovementMode,
    walk_speed: f32,
    heading: f32,
    glide_allowed: bool,
    visual_offset: Point,
    finish: Option<Finish>,
}

impl RunnerAgent {
    /// Spawns the runner frozen at `start`. `heading` is the sign of the
    /// walking direction (+1 right, -1 left).
    pub fn spawn(ctx: &mut WorldContext, start: Point, movement: &Movement, heading: f32) -> Self {
        let body = RigidBodyBuilder::fixed()
            .translation(Vector::new(start.x, start.y))
            .ccd_enabled(true)
            .can_sleep(false)
            .build();
        let body = ctx.physics.add_tagged_body(body, BodyKind::Runner);

        let collider = ColliderBuilder::ball(RUNNER_RADIUS)
            .friction(RUNNER_FRICTION)
            .restitution(0.0)
            .density(1.0)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        let collider = ctx.physics.add_collider(collider, body);

        let state = if movement.glide {
            RunnerState::Gliding
        } else {
            RunnerState::Idle
        };
        debug!(x = start.x, y = start.y, ?state, "runner spawned");

        Self {
            body,
            collider,
            state,
            mode: movement.mode,
            walk_speed: movement.speed,
            heading: if heading < 0.0 { -1.0 } else { 1.0 },
            glide_allowed: movement.glide,
            visual_offset: Point::ZERO,
            finish: None,
        }
    }

    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Cosmetic displacement to add to the physics position when drawing.
    pub fn visual_offset(&self) -> Point {
        self.visual_offset
    }

    pub fn position(&self, ctx: &WorldContext) -> Point {
        ctx.physics
            .get_rigid_body(self.body)
            .map_or(Point::ZERO, |body| {
                let pos = body.translation();
                Point::new(pos.x, pos.y)
            })
    }

    pub fn velocity(&self, ctx: &WorldContext) -> Point {
        ctx.physics
            .get_rigid_body(self.body)
            .map_or(Point::ZERO, |body| {
                let vel = body.linvel();
                Point::new(vel.x, vel.y)
            })
    }

    /// Turns off the pre-draw sway for the rest of the attempt.
    pub fn end_glide(&mut self) {
        self.glide_allowed = false;
        if self.state == RunnerState::Gliding {
            self.state = RunnerState::Idle;
            self.visual_offset = Point::ZERO;
        }
    }

    /// Idle/Gliding to Active. Walk mode releases the body immediately;
    /// launch mode stays frozen until [`Self::launch`].
    pub fn start(&mut self, ctx: &mut WorldContext) -> bool {
        if !matches!(self.state, RunnerState::Idle | RunnerState::Gliding) {
            return false;
        }
        self.glide_allowed = false;
        self.visual_offset = Point::ZERO;
        let motion = match self.mode {
            MovementMode::Walk => {
                self.set_dynamic(ctx);
                Motion::Walking
            }
            MovementMode::Launch => Motion::AwaitingLaunch,
        };
        self.state = RunnerState::Active(motion);
        debug!(?motion, "runner started");
        true
    }

    /// Zeroes all motion and holds the body static.
    pub fn stop(&mut self, ctx: &mut WorldContext) {
        self.freeze(ctx);
        if self.state != RunnerState::Finishing {
            self.state = RunnerState::Frozen;
        }
    }

    /// Moves the body and clears its velocity. A frozen runner is released
    /// back into the simulation.
    pub fn teleport_to(&mut self, ctx: &mut WorldContext, pos: Point) {
        if let Some(body) = ctx.physics.get_rigid_body_mut(self.body) {
            body.set_translation(Vector::new(pos.x, pos.y), true);
            body.set_linvel(Vector::new(0.0, 0.0), true);
            body.set_angvel(0.0, true);
        }
        if self.state == RunnerState::Frozen {
            self.set_dynamic(ctx);
            self.state = RunnerState::Active(match self.mode {
                MovementMode::Walk => Motion::Walking,
                MovementMode::Launch => Motion::Launched,
            });
        }
    }

    /// True when the runner's center is further down than `threshold_y`.
    pub fn is_below(&self, ctx: &WorldContext, threshold_y: f32) -> bool {
        self.position(ctx).y > threshold_y
    }

    /// Applies `velocity` directly, bypassing the walk floor. Only an
    /// active runner can be launched.
    pub fn launch(&mut self, ctx: &mut WorldContext, velocity: Point) -> bool {
        if !matches!(self.state, RunnerState::Active(_)) {
            return false;
        }
        self.set_dynamic(ctx);
        if let Some(body) = ctx.physics.get_rigid_body_mut(self.body) {
            body.set_linvel(Vector::new(velocity.x, velocity.y), true);
        }
        self.state = RunnerState::Active(Motion::Launched);
        debug!(vx = velocity.x, vy = velocity.y, "runner launched");
        true
    }

    /// Freezes the runner and arms a completion timer `delay` from now.
    /// `on_done` runs from [`Self::complete_finish`]. Calls made while
    /// already finishing are ignored.
    pub fn begin_finish(
        &mut self,
        ctx: &mut WorldContext,
        delay: Duration,
        on_done: FinishCallback,
    ) -> bool {
        if self.state == RunnerState::Finishing {
            debug!("finish already in progress, ignoring");
            return false;
        }
        self.freeze(ctx);
        let timer = ctx.scheduler.schedule(delay, TimerKind::RunnerFinish);
        self.finish = Some(Finish {
            started: ctx.now(),
            delay,
            timer,
            on_done: Some(on_done),
        });
        self.state = RunnerState::Finishing;
        true
    }

    /// Invoked when the finishing timer `timer` fires. Runs the callback at
    /// most once; stale timer ids are ignored.
    pub fn complete_finish(&mut self, timer: TimerId) -> bool {
        let Some(finish) = self.finish.as_mut() else {
            return false;
        };
        if finish.timer != timer {
            return false;
        }
        match finish.on_done.take() {
            Some(on_done) => {
                self.visual_offset = Point::new(0.0, -FINISH_LIFT);
                on_done();
                true
            }
            None => false,
        }
    }

    /// Per-tick logic: walk floor and cosmetic offsets.
    pub fn update(&mut self, ctx: &mut WorldContext) {
        match self.state {
            RunnerState::Gliding => {
                let t = ctx.now().as_secs_f32();
                let phase = t / GLIDE_PERIOD_SECS * std::f32::consts::TAU;
                self.visual_offset = Point::new(phase.sin() * GLIDE_AMPLITUDE, 0.0);
            }
            RunnerState::Active(Motion::Walking) => {
                let floor = self.walk_speed;
                let heading = self.heading;
                if let Some(body) = ctx.physics.get_rigid_body_mut(self.body) {
                    let (vx, vy) = (body.linvel().x, body.linvel().y);
                    if vx * heading < floor {
                        body.set_linvel(Vector::new(floor * heading, vy), true);
                    }
                }
            }
            RunnerState::Finishing => {
                if let Some(finish) = &self.finish {
                    let elapsed = ctx.now().saturating_sub(finish.started).as_secs_f32();
                    let total = finish.delay.as_secs_f32();
                    let progress = if total > 0.0 {
                        (elapsed / total).min(1.0)
                    } else {
                        1.0
                    };
                    self.visual_offset = Point::new(0.0, -FINISH_LIFT * progress);
                }
            }
            RunnerState::Idle
            | RunnerState::Active(Motion::AwaitingLaunch | Motion::Launched)
            | RunnerState::Frozen => {}
        }
    }

    /// Cancels the finishing timer and removes the body.
    pub fn destroy(&mut self, ctx: &mut WorldContext) {
        if let Some(finish) = self.finish.take() {
            ctx.scheduler.cancel(finish.timer);
        }
        ctx.physics.remove_rigid_body(self.body);
    }

    pub fn is_gliding_allowed(&self) -> bool {
        self.glide_allowed
    }

    fn freeze(&self, ctx: &mut WorldContext) {
        if let Some(body) = ctx.physics.get_rigid_body_mut(self.body) {
            body.set_linvel(Vector::new(0.0, 0.0), true);
            body.set_angvel(0.0, true);
            body.set_body_type(RigidBodyType::Fixed, true);
        }
    }

    fn set_dynamic(&self, ctx: &mut WorldContext) {
        if let Some(body) = ctx.physics.get_rigid_body_mut(self.body) {
            if !body.is_dynamic() {
                body.set_body_type(RigidBodyType::Dynamic, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::context::{WorldBounds, tick_duration};
    use crate::level::DEFAULT_WALK_SPEED;

    fn walk() -> Movement {
        Movement::default()
    }

    fn tick(ctx: &mut WorldContext, runner: &mut RunnerAgent) -> Vec<(TimerId, TimerKind)> {
        ctx.physics.step_with_events();
        ctx.scheduler.advance(tick_duration());
        runner.update(ctx);
        ctx.scheduler.poll()
    }

    #[test]
    fn test_spawn_is_frozen() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let runner = RunnerAgent::spawn(&mut ctx, Point::new(100.0, 100.0), &walk(), 1.0);
        ctx.physics.step_n(30);
        assert_eq!(runner.state(), RunnerState::Idle);
        assert_eq!(runner.position(&ctx), Point::new(100.0, 100.0));
    }

    #[test]
    fn test_walk_speed_is_a_floor() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        ctx.physics.gravity = Vector::new(0.0, 0.0);
        let mut runner = RunnerAgent::spawn(&mut ctx, Point::new(100.0, 100.0), &walk(), 1.0);
        assert!(runner.start(&mut ctx));
        assert_eq!(runner.state(), RunnerState::Active(Motion::Walking));

        tick(&mut ctx, &mut runner);
        assert!((runner.velocity(&ctx).x - DEFAULT_WALK_SPEED).abs() < 1e-3);

        // already faster: not slowed down
        if let Some(body) = ctx.physics.get_rigid_body_mut(runner.body()) {
            body.set_linvel(Vector::new(400.0, 0.0), true);
        }
        runner.update(&mut ctx);
        assert!(runner.velocity(&ctx).x > 399.0);
    }

    #[test]
    fn test_launch_mode_waits_for_impulse() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let movement = Movement {
            mode: MovementMode::Launch,
            ..Movement::default()
        };
        let mut runner = RunnerAgent::spawn(&mut ctx, Point::new(100.0, 100.0), &movement, 1.0);
        runner.start(&mut ctx);
        assert_eq!(runner.state(), RunnerState::Active(Motion::AwaitingLaunch));
        ctx.physics.step_n(10);
        assert_eq!(runner.position(&ctx), Point::new(100.0, 100.0));

        assert!(runner.launch(&mut ctx, Point::new(50.0, -570.0)));
        assert_eq!(runner.state(), RunnerState::Active(Motion::Launched));
        ctx.physics.step_n(1);
        assert!(runner.position(&ctx).y < 100.0);
    }

    #[test]
    fn test_stop_and_teleport() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let mut runner = RunnerAgent::spawn(&mut ctx, Point::new(100.0, 100.0), &walk(), 1.0);
        runner.start(&mut ctx);
        ctx.physics.step_n(5);
        runner.stop(&mut ctx);
        assert_eq!(runner.state(), RunnerState::Frozen);
        assert_eq!(runner.velocity(&ctx), Point::ZERO);
        assert!(!runner.launch(&mut ctx, Point::new(10.0, 10.0)));

        runner.teleport_to(&mut ctx, Point::new(300.0, 50.0));
        assert_eq!(runner.position(&ctx), Point::new(300.0, 50.0));
        assert_eq!(runner.state(), RunnerState::Active(Motion::Walking));
        assert!(runner.is_below(&ctx, 40.0));
        assert!(!runner.is_below(&ctx, 50.0));
    }

    #[test]
    fn test_finish_fires_once_after_delay() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let mut runner = RunnerAgent::spawn(&mut ctx, Point::new(100.0, 100.0), &walk(), 1.0);
        runner.start(&mut ctx);
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        assert!(runner.begin_finish(
            &mut ctx,
            Duration::from_millis(100),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
        ));
        let c = Arc::clone(&calls);
        assert!(!runner.begin_finish(
            &mut ctx,
            Duration::from_millis(10),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
        ));

        let mut fired_at = None;
        for _ in 0..30 {
            for (id, kind) in tick(&mut ctx, &mut runner) {
                if kind == TimerKind::RunnerFinish && runner.complete_finish(id) {
                    fired_at = Some(ctx.now());
                }
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(fired_at.unwrap() >= Duration::from_millis(100));
        assert_eq!(runner.state(), RunnerState::Finishing);
        assert!(runner.visual_offset().y < 0.0);
    }

    #[test]
    fn test_glide_sways_until_ended() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let movement = Movement {
            glide: true,
            ..Movement::default()
        };
        let mut runner = RunnerAgent::spawn(&mut ctx, Point::new(100.0, 100.0), &movement, 1.0);
        assert_eq!(runner.state(), RunnerState::Gliding);
        for _ in 0..10 {
            tick(&mut ctx, &mut runner);
        }
        assert!(runner.visual_offset().x.abs() > 0.0);
        assert_eq!(runner.position(&ctx), Point::new(100.0, 100.0));

        runner.end_glide();
        assert_eq!(runner.state(), RunnerState::Idle);
        assert!(!runner.is_gliding_allowed());
        assert_eq!(runner.visual_offset(), Point::ZERO);
    }

    #[test]
    fn test_destroy_removes_body() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let mut runner = RunnerAgent::spawn(&mut ctx, Point::new(100.0, 100.0), &walk(), 1.0);
        runner.destroy(&mut ctx);
        assert!(ctx.physics.get_rigid_body(runner.body()).is_none());
    }
}
