//! Scheduled hazard balls that end the attempt on contact with the runner.

use std::time::Duration;

use rapier2d::prelude::*;
use tracing::debug;

use crate::context::{WorldBounds, WorldContext};
use crate::geometry::Point;
use crate::level::HazardConfig;
use crate::physics::BodyKind;
use crate::scheduler::{TimerId, TimerKind};

pub const HAZARD_RESTITUTION: f32 = 0.2;
/// Distance below the world's bottom edge where defaults cull bodies.
pub const OUT_OF_BOUNDS_MARGIN: f32 = 200.0;

/// A live hazard and the position its visual was last synced to.
#[derive(Debug, Clone, Copy)]
pub struct Hazard {
    pub body: RigidBodyHandle,
    pub visual: Point,
}

#[derive(Debug)]
pub struct HazardSpawner {
    enabled: bool,
    spawn_at: Point,
    delay: Duration,
    interval: Option<Duration>,
    radius: f32,
    kill_below_y: f32,
    started: bool,
    timer: Option<TimerId>,
    hazards: Vec<Hazard>,
    spawned: u32,
}

impl HazardSpawner {
    pub fn new(config: &HazardConfig, bounds: WorldBounds) -> Self {
        let interval = (config.repeat && config.interval_ms > 0)
            .then(|| Duration::from_millis(config.interval_ms));
        Self {
            enabled: config.enabled,
            spawn_at: Point::new(bounds.resolve_x(config.spawn_x), config.spawn_y),
            delay: Duration::from_millis(config.start_delay_ms),
            interval,
            radius: config.radius,
            kill_below_y: config
                .kill_below_y
                .unwrap_or(bounds.height + OUT_OF_BOUNDS_MARGIN),
            started: false,
            timer: None,
            hazards: Vec::new(),
            spawned: 0,
        }
    }

    /// Arms the schedule. Only the first call has any effect.
    pub fn start(&mut self, ctx: &mut WorldContext) -> bool {
        if !self.enabled || self.started {
            return false;
        }
        self.started = true;
        let id = match self.interval {
            Some(interval) => {
                ctx.scheduler
                    .schedule_repeating(self.delay, interval, TimerKind::HazardSpawn)
            }
            None => ctx.scheduler.schedule(self.delay, TimerKind::HazardSpawn),
        };
        self.timer = Some(id);
        debug!(delay = ?self.delay, interval = ?self.interval, "hazard schedule armed");
        true
    }

    /// Handles a fired spawn timer. Timers this spawner did not arm are
    /// ignored.
    pub fn on_timer(&mut self, ctx: &mut WorldContext, id: TimerId) -> bool {
        if self.timer != Some(id) {
            return false;
        }
        if self.interval.is_none() {
            self.timer = None;
        }
        self.spawn(ctx);
        true
    }

    /// Drops one hazard at the spawn point.
    pub fn spawn(&mut self, ctx: &mut WorldContext) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(self.spawn_at.x, self.spawn_at.y))
            .ccd_enabled(true)
            .build();
        let body = ctx.physics.add_tagged_body(body, BodyKind::Hazard);
        let collider = ColliderBuilder::ball(self.radius)
            .restitution(HAZARD_RESTITUTION)
            .density(1.0)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        ctx.physics.add_collider(collider, body);

        self.hazards.push(Hazard {
            body,
            visual: self.spawn_at,
        });
        self.spawned += 1;
        debug!(count = self.hazards.len(), "hazard spawned");
        body
    }

    /// Syncs visuals and removes hazards that fell past the kill line.
    pub fn update(&mut self, ctx: &mut WorldContext) {
        let kill_below_y = self.kill_below_y;
        self.hazards.retain_mut(|hazard| {
            let Some(body) = ctx.physics.get_rigid_body(hazard.body) else {
                return false;
            };
            let pos = body.translation();
            hazard.visual = Point::new(pos.x, pos.y);
            if hazard.visual.y > kill_below_y {
                ctx.physics.remove_rigid_body(hazard.body);
                debug!(y = hazard.visual.y, "hazard culled");
                return false;
            }
            true
        });
    }

    /// Whether `collider` belongs to a hazard body.
    pub fn is_hazard(&self, ctx: &WorldContext, collider: ColliderHandle) -> bool {
        matches!(ctx.physics.kind_of(collider), Some(BodyKind::Hazard))
    }

    /// Cancels pending spawns and removes every live hazard. Safe to call
    /// repeatedly.
    pub fn destroy(&mut self, ctx: &mut WorldContext) {
        if let Some(id) = self.timer.take() {
            ctx.scheduler.cancel(id);
        }
        for hazard in self.hazards.drain(..) {
            ctx.physics.remove_rigid_body(hazard.body);
        }
    }

    pub fn hazards(&self) -> &[Hazard] {
        &self.hazards
    }

    /// Total hazards spawned since construction.
    pub fn spawned(&self) -> u32 {
        self.spawned
    }

    pub fn kill_below_y(&self) -> f32 {
        self.kill_below_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tick_duration;

    fn config(repeat: bool) -> HazardConfig {
        HazardConfig {
            start_delay_ms: 100,
            repeat,
            interval_ms: 50,
            ..HazardConfig::default()
        }
    }

    fn run(ctx: &mut WorldContext, spawner: &mut HazardSpawner, ticks: u32) {
        for _ in 0..ticks {
            ctx.physics.step_with_events();
            ctx.scheduler.advance(tick_duration());
            spawner.update(ctx);
            for (id, kind) in ctx.scheduler.poll() {
                if kind == TimerKind::HazardSpawn {
                    spawner.on_timer(ctx, id);
                }
            }
        }
    }

    #[test]
    fn test_one_shot_spawns_once() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let mut spawner = HazardSpawner::new(&config(false), ctx.bounds);
        assert!(spawner.start(&mut ctx));
        assert!(!spawner.start(&mut ctx));

        run(&mut ctx, &mut spawner, 5);
        assert_eq!(spawner.spawned(), 0);
        run(&mut ctx, &mut spawner, 60);
        assert_eq!(spawner.spawned(), 1);
        assert_eq!(ctx.scheduler.pending(), 0);
    }

    #[test]
    fn test_repeating_spawns_on_interval() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let mut spawner = HazardSpawner::new(&config(true), ctx.bounds);
        spawner.start(&mut ctx);
        // 100ms delay, then every 50ms: fires at 100, 150, 200, 250, 300
        run(&mut ctx, &mut spawner, 19);
        assert_eq!(spawner.spawned(), 5);
    }

    #[test]
    fn test_spawn_position_resolves_x_fraction_only() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let mut spawner = HazardSpawner::new(&HazardConfig::default(), ctx.bounds);
        let body = spawner.spawn(&mut ctx);
        let pos = ctx.physics.get_rigid_body(body).unwrap().translation();
        assert_eq!((pos.x, pos.y), (360.0, -50.0));
        assert_eq!(spawner.kill_below_y(), 1480.0);

        // spawn Y is absolute even inside 0..=1
        let cfg = HazardConfig {
            spawn_y: 1.0,
            ..HazardConfig::default()
        };
        let mut spawner = HazardSpawner::new(&cfg, ctx.bounds);
        let body = spawner.spawn(&mut ctx);
        let pos = ctx.physics.get_rigid_body(body).unwrap().translation();
        assert_eq!((pos.x, pos.y), (360.0, 1.0));
    }

    #[test]
    fn test_falling_hazards_are_culled() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let cfg = HazardConfig {
            kill_below_y: Some(100.0),
            ..HazardConfig::default()
        };
        let mut spawner = HazardSpawner::new(&cfg, ctx.bounds);
        let body = spawner.spawn(&mut ctx);
        run(&mut ctx, &mut spawner, 120);
        assert!(spawner.hazards().is_empty());
        assert!(ctx.physics.get_rigid_body(body).is_none());
    }

    #[test]
    fn test_is_hazard_classifies_colliders() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let mut spawner = HazardSpawner::new(&HazardConfig::default(), ctx.bounds);
        let body = spawner.spawn(&mut ctx);
        let collider = ctx.physics.get_rigid_body(body).unwrap().colliders()[0];
        let other = ctx
            .physics
            .add_tagged_static_collider(ColliderBuilder::cuboid(5.0, 5.0).build(), BodyKind::Platform);

        assert!(spawner.is_hazard(&ctx, collider));
        assert!(!spawner.is_hazard(&ctx, other));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let mut spawner = HazardSpawner::new(&config(true), ctx.bounds);
        spawner.start(&mut ctx);
        spawner.spawn(&mut ctx);
        spawner.spawn(&mut ctx);

        spawner.destroy(&mut ctx);
        spawner.destroy(&mut ctx);
        assert!(spawner.hazards().is_empty());
        assert_eq!(ctx.scheduler.pending(), 0);
        assert_eq!(ctx.physics.rigid_body_set.len(), 0);

        run(&mut ctx, &mut spawner, 60);
        assert_eq!(spawner.spawned(), 2);
    }

    #[test]
    fn test_disabled_spawner_never_arms() {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let cfg = HazardConfig {
            enabled: false,
            ..HazardConfig::default()
        };
        let mut spawner = HazardSpawner::new(&cfg, ctx.bounds);
        assert!(!spawner.start(&mut ctx));
        assert_eq!(ctx.scheduler.pending(), 0);
    }
}
