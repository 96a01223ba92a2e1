//! Stroke pipeline: pointer capture, simplification, and obstacle synthesis.

mod author;
mod capture;
mod simplify;

pub use author::{MIN_SEGMENT_LENGTH, PhysicsAuthor, STROKE_THICKNESS, SegmentQuad};
pub use capture::{MIN_POINT_SPACING, MIN_STROKE_LENGTH, StrokeCapture};
pub use simplify::{SIMPLIFY_EPSILON, simplify, simplify_with};

use crate::geometry::Point;

/// A finalized polyline. Immutable once produced by [`StrokeCapture::end`].
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    points: Vec<Point>,
    length: f32,
}

impl Stroke {
    pub(crate) fn new(points: Vec<Point>, length: f32) -> Self {
        Self { points, length }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Cumulative drawn length, i.e. ink consumed.
    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
