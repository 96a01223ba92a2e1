//! Shared harness: a world, an engine, and exact fixed-step advancing.

#![allow(dead_code)]

use std::time::Duration;

use catbridge_core::level::{LevelConfig, PlatformRect};
use catbridge_core::{
    AttemptPhase, GameEvent, LevelRuleEngine, Outcome, PHYSICS_DT, Point, RuleEvent, WorldBounds,
    WorldContext,
};

/// Y of the top surface of [`flat_level`]'s ground.
pub const GROUND_TOP: f32 = 980.0;
/// Center Y of a runner resting on that ground.
pub const ON_GROUND_Y: f32 = GROUND_TOP - 18.0;

/// Flat full-width ground at y 980..1020, start at x 100, goal out of
/// reach above the ground.
pub fn flat_level() -> LevelConfig {
    let mut level = LevelConfig::new(100);
    level.platforms = vec![PlatformRect {
        x: 0.5,
        y: 1000.0,
        w: 1.0,
        h: 40.0,
        rotation: 0.0,
    }];
    level.start = Point::new(100.0, ON_GROUND_Y);
    level.goal = Point::new(650.0, 200.0);
    level
}

pub struct TestLevel {
    pub ctx: WorldContext,
    pub engine: LevelRuleEngine,
    pub events: Vec<RuleEvent>,
    pub ticks: usize,
}

impl TestLevel {
    /// Builds `level` and starts the attempt.
    pub fn new(level: LevelConfig) -> Self {
        let mut ctx = WorldContext::new(WorldBounds::default());
        let mut engine = LevelRuleEngine::new(&mut ctx, level);
        engine.begin(true);
        let events = engine.drain_events();
        Self {
            ctx,
            engine,
            events,
            ticks: 0,
        }
    }

    /// Queues a straight drag from `from` to `to` in `steps` moves, then
    /// a release.
    pub fn draw_line(&self, from: Point, to: Point, steps: usize) {
        self.engine.push(GameEvent::PointerDown(from));
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            self.engine.push(GameEvent::PointerMove(from.lerp(to, t)));
        }
        self.engine.push(GameEvent::PointerUp);
    }

    /// Draws a short stroke well away from the runner and starts the attempt.
    pub fn commit_harmless_stroke(&mut self) {
        self.draw_line(Point::new(560.0, 700.0), Point::new(660.0, 700.0), 5);
        self.step(1);
        assert_eq!(self.engine.phase(), AttemptPhase::Attempting);
    }

    /// Advances exactly `n` fixed frames.
    pub fn step(&mut self, n: usize) {
        for _ in 0..n {
            self.engine.tick(&mut self.ctx);
            self.ticks += 1;
            self.events.extend(self.engine.drain_events());
        }
    }

    /// Steps until `done` holds or `max` frames pass. Returns the number of
    /// frames stepped when `done` became true.
    pub fn step_until(&mut self, max: usize, mut done: impl FnMut(&Self) -> bool) -> Option<usize> {
        for i in 1..=max {
            self.step(1);
            if done(self) {
                return Some(i);
            }
        }
        None
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.events
            .iter()
            .filter_map(|e| match e {
                RuleEvent::Outcome(o) => Some(*o),
                _ => None,
            })
            .collect()
    }

    pub fn phases(&self) -> Vec<AttemptPhase> {
        self.events
            .iter()
            .filter_map(|e| match e {
                RuleEvent::PhaseChanged(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn ink_updates(&self) -> Vec<f32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                RuleEvent::InkChanged(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn runner_position(&self) -> Point {
        self.engine.runner().position(&self.ctx)
    }
}

/// Number of frames covering `ms` milliseconds, rounded up.
pub fn frames_for(ms: u64) -> usize {
    let dt = Duration::from_secs_f32(PHYSICS_DT);
    let frames = Duration::from_millis(ms).as_nanos().div_ceil(dt.as_nanos());
    usize::try_from(frames).unwrap_or(usize::MAX)
}
