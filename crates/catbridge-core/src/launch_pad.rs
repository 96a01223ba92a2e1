//! Two-sided launch pad: striking either flank sensor with the obstacle
//! throws the runner toward the goal.

use std::time::Duration;

use rapier2d::prelude::*;
use tracing::debug;

use crate::context::WorldContext;
use crate::geometry::Point;
use crate::level::LaunchPadConfig;
use crate::physics::{BodyKind, Side};
use crate::runner::RunnerAgent;
use crate::scheduler::{TimerId, TimerKind};

/// Horizontal offset of each sensor from the plank center, as a fraction
/// of plank width.
const SENSOR_OFFSET: f32 = 0.35;
const PLANK_FRICTION: f32 = 0.6;

/// Arming state. `Cooling` ignores every contact; `latched` records whether
/// the one-shot lock is still held once the cooldown ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadState {
    Armed,
    Cooling { latched: bool },
    Spent,
}

#[derive(Debug)]
pub struct LaunchPad {
    plank: ColliderHandle,
    left: ColliderHandle,
    right: ColliderHandle,
    center: Point,
    up_velocity: f32,
    flight_time: f32,
    horizontal_scale: f32,
    extra_x_boost: f32,
    cooldown: Duration,
    tilt_angle: f32,
    tilt_duration: Duration,
    state: PadState,
    cooldown_timer: Option<TimerId>,
    tilt: Option<(Duration, Side)>,
    launches: u32,
}

impl LaunchPad {
    /// Builds the plank and both sensors as static colliders.
    pub fn new(ctx: &mut WorldContext, config: &LaunchPadConfig) -> Self {
        let center = ctx.bounds.resolve_point(Point::new(config.x, config.y));

        let plank = ColliderBuilder::cuboid(config.width / 2.0, config.height / 2.0)
            .translation(Vector::new(center.x, center.y))
            .friction(PLANK_FRICTION)
            .build();
        let plank = ctx.physics.add_tagged_static_collider(plank, BodyKind::PadPlank);

        let sensor_y = center.y - config.sensor_height / 2.0;
        let mut sensor = |side: Side| {
            let x = center.x + side.sign() * SENSOR_OFFSET * config.width;
            let collider = ColliderBuilder::cuboid(config.sensor_width / 2.0, config.sensor_height / 2.0)
                .translation(Vector::new(x, sensor_y))
                .sensor(true)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build();
            ctx.physics
                .add_tagged_static_collider(collider, BodyKind::PadSensor(side))
        };
        let left = sensor(Side::Left);
        let right = sensor(Side::Right);

        Self {
            plank,
            left,
            right,
            center,
            up_velocity: config.up_velocity,
            flight_time: config.flight_time,
            horizontal_scale: config.horizontal_scale,
            extra_x_boost: config.extra_x_boost,
            cooldown: Duration::from_millis(config.cooldown_ms),
            tilt_angle: config.tilt_angle,
            tilt_duration: Duration::from_millis(config.tilt_duration_ms),
            state: PadState::Armed,
            cooldown_timer: None,
            tilt: None,
            launches: 0,
        }
    }

    pub fn state(&self) -> PadState {
        self.state
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// Offers a collision pair to the pad. Returns true when the pair was a
    /// sensor/obstacle contact and the pad consumed it; false means the
    /// caller should classify the pair some other way.
    pub fn handle_collision(
        &mut self,
        ctx: &mut WorldContext,
        a: ColliderHandle,
        b: ColliderHandle,
        runner: &mut RunnerAgent,
        goal: Point,
    ) -> bool {
        if matches!(self.state, PadState::Cooling { .. }) {
            return false;
        }
        let Some(side) = self.struck_side(ctx, a, b).or_else(|| self.struck_side(ctx, b, a)) else {
            return false;
        };
        if self.state == PadState::Spent {
            debug!(?side, "launch pad struck while spent");
            return true;
        }

        let velocity = self.launch_velocity(runner.position(ctx), goal, side);
        if !runner.launch(ctx, velocity) {
            debug!(?side, state = ?runner.state(), "launch pad struck, runner not launchable");
            return true;
        }

        let now = ctx.now();
        self.state = PadState::Cooling { latched: true };
        self.cooldown_timer = Some(ctx.scheduler.schedule(self.cooldown, TimerKind::LaunchCooldown));
        self.tilt = Some((now, side));
        self.launches += 1;
        debug!(?side, vx = velocity.x, vy = velocity.y, "launch pad fired");
        true
    }

    /// Approximate ballistic solve: fixed upward speed, horizontal speed
    /// proportional to the remaining distance over the nominal flight time.
    pub fn launch_velocity(&self, from: Point, goal: Point, side: Side) -> Point {
        let dx = goal.x - from.x;
        let vx = dx / self.flight_time * self.horizontal_scale + side.sign() * self.extra_x_boost;
        Point::new(vx, -self.up_velocity)
    }

    fn struck_side(&self, ctx: &WorldContext, sensor: ColliderHandle, other: ColliderHandle) -> Option<Side> {
        let side = if sensor == self.left {
            Side::Left
        } else if sensor == self.right {
            Side::Right
        } else {
            return None;
        };
        matches!(ctx.physics.kind_of(other), Some(BodyKind::Obstacle)).then_some(side)
    }

    /// Handles a fired cooldown timer.
    pub fn on_timer(&mut self, id: TimerId) -> bool {
        if self.cooldown_timer != Some(id) {
            return false;
        }
        self.cooldown_timer = None;
        self.state = match self.state {
            PadState::Cooling { latched: true } => PadState::Spent,
            PadState::Cooling { latched: false } | PadState::Armed => PadState::Armed,
            PadState::Spent => PadState::Spent,
        };
        debug!(state = ?self.state, "launch pad cooldown elapsed");
        true
    }

    /// Releases the one-shot lock so the pad can fire again.
    pub fn unlock(&mut self) {
        self.state = match self.state {
            PadState::Cooling { .. } => PadState::Cooling { latched: false },
            PadState::Spent | PadState::Armed => PadState::Armed,
        };
    }

    /// Cosmetic plank rotation at `now`: a tilt toward the struck side and
    /// back, each leg lasting the tilt duration.
    pub fn plank_angle(&self, now: Duration) -> f32 {
        let Some((started, side)) = self.tilt else {
            return 0.0;
        };
        let leg = self.tilt_duration.as_secs_f32();
        if leg <= 0.0 {
            return 0.0;
        }
        let t = now.saturating_sub(started).as_secs_f32() / leg;
        let amount = if t < 1.0 {
            t
        } else if t < 2.0 {
            2.0 - t
        } else {
            0.0
        };
        side.sign() * self.tilt_angle * amount
    }

    /// Cancels the cooldown and removes the pad's colliders.
    pub fn destroy(&mut self, ctx: &mut WorldContext) {
        if let Some(id) = self.cooldown_timer.take() {
            ctx.scheduler.cancel(id);
        }
        for handle in [self.plank, self.left, self.right] {
            if ctx.physics.collider_set.get(handle).is_some() {
                ctx.physics.remove_static_collider(handle);
            }
        }
    }

    pub fn sensor(&self, side: Side) -> ColliderHandle {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{WorldBounds, tick_duration};
    use crate::level::{Movement, MovementMode};
    use crate::runner::{Motion, RunnerState};

    struct Rig {
        ctx: WorldContext,
        pad: LaunchPad,
        runner: RunnerAgent,
        obstacle: ColliderHandle,
    }

    fn rig() -> Rig {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let pad = LaunchPad::new(&mut ctx, &LaunchPadConfig::at(360.0, 900.0));
        let movement = Movement {
            mode: MovementMode::Launch,
            ..Movement::default()
        };
        let mut runner = RunnerAgent::spawn(&mut ctx, Point::new(200.0, 880.0), &movement, 1.0);
        runner.start(&mut ctx);
        let body = ctx
            .physics
            .add_tagged_body(RigidBodyBuilder::dynamic().build(), BodyKind::Obstacle);
        let obstacle = ctx
            .physics
            .add_collider(ColliderBuilder::cuboid(20.0, 7.0).build(), body);
        Rig {
            ctx,
            pad,
            runner,
            obstacle,
        }
    }

    #[test]
    fn test_geometry_defaults() {
        let r = rig();
        let left = r.ctx.physics.collider_set.get(r.pad.sensor(Side::Left)).unwrap();
        let right = r.ctx.physics.collider_set.get(r.pad.sensor(Side::Right)).unwrap();
        assert!(left.is_sensor());
        assert!((left.translation().x - (360.0 - 77.0)).abs() < 1e-3);
        assert!((right.translation().x - (360.0 + 77.0)).abs() < 1e-3);
        assert!((left.translation().y - 870.0).abs() < 1e-3);
    }

    #[test]
    fn test_strike_launches_runner_once() {
        let mut r = rig();
        let goal = Point::new(600.0, 500.0);
        let sensor = r.pad.sensor(Side::Right);

        assert!(r.pad.handle_collision(&mut r.ctx, r.obstacle, sensor, &mut r.runner, goal));
        assert_eq!(r.runner.state(), RunnerState::Active(Motion::Launched));
        let v = r.runner.velocity(&r.ctx);
        assert!((v.y + 570.0).abs() < 1e-3);
        let expected_vx = (600.0 - 200.0) / 0.95 * 0.6;
        assert!((v.x - expected_vx).abs() < 1e-2);
        assert_eq!(r.pad.state(), PadState::Cooling { latched: true });

        // cooling: rejected outright
        assert!(!r.pad.handle_collision(&mut r.ctx, sensor, r.obstacle, &mut r.runner, goal));
        assert_eq!(r.pad.launches(), 1);
    }

    #[test]
    fn test_cooldown_then_spent_until_unlocked() {
        let mut r = rig();
        let goal = Point::new(600.0, 500.0);
        let sensor = r.pad.sensor(Side::Left);
        r.pad.handle_collision(&mut r.ctx, sensor, r.obstacle, &mut r.runner, goal);

        for _ in 0..40 {
            r.ctx.scheduler.advance(tick_duration());
            for (id, kind) in r.ctx.scheduler.poll() {
                if kind == TimerKind::LaunchCooldown {
                    assert!(r.pad.on_timer(id));
                }
            }
        }
        assert_eq!(r.pad.state(), PadState::Spent);

        // consumed but no second launch
        assert!(r.pad.handle_collision(&mut r.ctx, sensor, r.obstacle, &mut r.runner, goal));
        assert_eq!(r.pad.launches(), 1);

        r.pad.unlock();
        assert_eq!(r.pad.state(), PadState::Armed);
        assert!(r.pad.handle_collision(&mut r.ctx, sensor, r.obstacle, &mut r.runner, goal));
        assert_eq!(r.pad.launches(), 2);
    }

    #[test]
    fn test_strike_on_finishing_runner_keeps_pad_armed() {
        let mut r = rig();
        let goal = Point::new(600.0, 500.0);
        let sensor = r.pad.sensor(Side::Left);
        r.runner
            .begin_finish(&mut r.ctx, Duration::from_millis(700), Box::new(|| {}));
        assert_eq!(r.runner.state(), RunnerState::Finishing);

        assert!(r.pad.handle_collision(&mut r.ctx, r.obstacle, sensor, &mut r.runner, goal));
        assert_eq!(r.pad.state(), PadState::Armed);
        assert_eq!(r.pad.launches(), 0);
        assert_eq!(r.runner.state(), RunnerState::Finishing);
        let v = r.runner.velocity(&r.ctx);
        assert_eq!((v.x, v.y), (0.0, 0.0));
    }

    #[test]
    fn test_unrelated_pairs_fall_through() {
        let mut r = rig();
        let goal = Point::new(600.0, 500.0);
        let runner_collider = r.runner.collider();
        let sensor = r.pad.sensor(Side::Left);

        assert!(!r.pad.handle_collision(&mut r.ctx, runner_collider, sensor, &mut r.runner, goal));
        assert!(!r.pad.handle_collision(&mut r.ctx, runner_collider, r.obstacle, &mut r.runner, goal));
        assert_eq!(r.pad.state(), PadState::Armed);
    }

    #[test]
    fn test_plank_tilt_yoyo() {
        let mut r = rig();
        let sensor = r.pad.sensor(Side::Left);
        r.pad
            .handle_collision(&mut r.ctx, sensor, r.obstacle, &mut r.runner, Point::new(600.0, 500.0));

        assert_eq!(r.pad.plank_angle(Duration::ZERO), 0.0);
        let peak = r.pad.plank_angle(Duration::from_millis(160));
        assert!((peak + 0.28).abs() < 1e-4);
        let half_back = r.pad.plank_angle(Duration::from_millis(240));
        assert!((half_back + 0.14).abs() < 1e-4);
        assert_eq!(r.pad.plank_angle(Duration::from_millis(400)), 0.0);
    }

    #[test]
    fn test_extra_boost_follows_side() {
        let mut config = LaunchPadConfig::at(360.0, 900.0);
        config.extra_x_boost = 30.0;
        let mut ctx = WorldContext::new(WorldBounds::default());
        let pad = LaunchPad::new(&mut ctx, &config);
        let from = Point::new(100.0, 0.0);
        let goal = Point::new(100.0, 0.0);
        assert_eq!(pad.launch_velocity(from, goal, Side::Right).x, 30.0);
        assert_eq!(pad.launch_velocity(from, goal, Side::Left).x, -30.0);
    }

    #[test]
    fn test_destroy_removes_colliders() {
        let mut r = rig();
        let before = r.ctx.physics.collider_set.len();
        r.pad.destroy(&mut r.ctx);
        r.pad.destroy(&mut r.ctx);
        assert_eq!(r.ctx.physics.collider_set.len(), before - 3);
    }
}
