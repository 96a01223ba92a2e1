//! Explicit world context handed to every gameplay component.

use std::time::Duration;

use crate::geometry::Point;
use crate::physics::{PHYSICS_DT, PhysicsWorld};
use crate::scheduler::Scheduler;

/// Default world width in pixels.
pub const DEFAULT_WORLD_WIDTH: f32 = 720.0;
/// Default world height in pixels.
pub const DEFAULT_WORLD_HEIGHT: f32 = 1280.0;

/// Size of the playable area.
///
/// Level records may express coordinates as fractions of this size: any
/// component in `0.0..=1.0` is scaled, anything else is taken as pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            width: DEFAULT_WORLD_WIDTH,
            height: DEFAULT_WORLD_HEIGHT,
        }
    }
}

impl WorldBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn resolve_x(&self, x: f32) -> f32 {
        resolve(x, self.width)
    }

    pub fn resolve_y(&self, y: f32) -> f32 {
        resolve(y, self.height)
    }

    pub fn resolve_point(&self, p: Point) -> Point {
        Point::new(self.resolve_x(p.x), self.resolve_y(p.y))
    }
}

fn resolve(v: f32, extent: f32) -> f32 {
    if (0.0..=1.0).contains(&v) { v * extent } else { v }
}

/// Everything a component may touch: physics, dimensions, and the clock.
#[derive(Debug, Default)]
pub struct WorldContext {
    pub physics: PhysicsWorld,
    pub bounds: WorldBounds,
    pub scheduler: Scheduler,
}

impl WorldContext {
    pub fn new(bounds: WorldBounds) -> Self {
        Self {
            physics: PhysicsWorld::new(),
            bounds,
            scheduler: Scheduler::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }
}

/// One fixed tick as a `Duration`.
pub fn tick_duration() -> Duration {
    Duration::from_secs_f32(PHYSICS_DT)
}
