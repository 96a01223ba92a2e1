//! Synthesis of the compound obstacle body from a simplified stroke.

use rapier2d::prelude::*;
use tracing::debug;

use crate::context::WorldContext;
use crate::geometry::Point;
use crate::physics::BodyKind;

/// Physical thickness of every stroke segment.
pub const STROKE_THICKNESS: f32 = 14.0;
/// Segments not longer than this are dropped.
pub const MIN_SEGMENT_LENGTH: f32 = 4.0;

const SEGMENT_FRICTION: f32 = 0.9;

/// The four world-space corners of one segment collider.
pub type SegmentQuad = [Point; 4];

/// Owns the single obstacle body and its derived outline.
#[derive(Debug, Default)]
pub struct PhysicsAuthor {
    body: Option<RigidBodyHandle>,
    segments: Vec<ColliderHandle>,
    outline: Vec<SegmentQuad>,
}

impl PhysicsAuthor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing obstacle with one built from `points`.
    ///
    /// Returns `None` when no segment survives the length filter; the
    /// previous obstacle is still removed in that case.
    pub fn install(&mut self, ctx: &mut WorldContext, points: &[Point]) -> Option<RigidBodyHandle> {
        self.clear(ctx);

        let segments: Vec<(Point, Point)> = points
            .windows(2)
            .map(|w| (w[0], w[1]))
            .filter(|(a, b)| a.distance(*b) > MIN_SEGMENT_LENGTH)
            .collect();
        if segments.is_empty() {
            debug!(points = points.len(), "no usable segments, obstacle not created");
            return None;
        }

        let count = segments.len() as f32;
        let (sx, sy) = segments.iter().fold((0.0, 0.0), |(sx, sy), (a, b)| {
            let mid = a.midpoint(*b);
            (sx + mid.x, sy + mid.y)
        });
        let origin = Point::new(sx / count, sy / count);

        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(origin.x, origin.y))
            .ccd_enabled(true)
            .build();
        let handle = ctx.physics.add_tagged_body(body, BodyKind::Obstacle);

        for (a, b) in &segments {
            let local = a.midpoint(*b).sub(origin);
            let collider = ColliderBuilder::cuboid(a.distance(*b) / 2.0, STROKE_THICKNESS / 2.0)
                .translation(Vector::new(local.x, local.y))
                .rotation(a.angle_to(*b))
                .friction(SEGMENT_FRICTION)
                .restitution(0.0)
                .density(1.0)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build();
            self.segments.push(ctx.physics.add_collider(collider, handle));
        }

        debug!(segments = self.segments.len(), x = origin.x, y = origin.y, "obstacle installed");
        self.body = Some(handle);
        self.sync(ctx);
        Some(handle)
    }

    /// Re-derives the outline from the live collider geometry.
    pub fn sync(&mut self, ctx: &WorldContext) {
        self.outline.clear();
        for handle in &self.segments {
            let Some(collider) = ctx.physics.collider_set.get(*handle) else {
                continue;
            };
            let Some(cuboid) = collider.shape().as_cuboid() else {
                continue;
            };
            let center = collider.translation();
            let center = Point::new(center.x, center.y);
            let angle = collider.rotation().angle();
            let (hx, hy) = (cuboid.half_extents.x, cuboid.half_extents.y);
            self.outline.push(
                [
                    Point::new(-hx, -hy),
                    Point::new(hx, -hy),
                    Point::new(hx, hy),
                    Point::new(-hx, hy),
                ]
                .map(|corner| center.add(corner.rotated(angle))),
            );
        }
    }

    /// Removes the obstacle, if any.
    pub fn clear(&mut self, ctx: &mut WorldContext) {
        if let Some(handle) = self.body.take() {
            ctx.physics.remove_rigid_body(handle);
            debug!("previous obstacle removed");
        }
        self.segments.clear();
        self.outline.clear();
    }

    pub fn body(&self) -> Option<RigidBodyHandle> {
        self.body
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// One quad per live segment, as of the last [`Self::sync`].
    pub fn outline(&self) -> &[SegmentQuad] {
        &self.outline
    }
}
