//! Pointer-drag capture bounded by an ink budget.

use tracing::debug;

use super::Stroke;
use crate::geometry::Point;

/// Minimum distance between consecutive captured points.
pub const MIN_POINT_SPACING: f32 = 10.0;
/// Strokes not longer than this are discarded on release.
pub const MIN_STROKE_LENGTH: f32 = 20.0;

/// Accumulates one drag gesture into a polyline while spending ink.
#[derive(Debug, Clone)]
pub struct StrokeCapture {
    ink_max: f32,
    ink_remaining: f32,
    points: Vec<Point>,
    length: f32,
    enabled: bool,
    dragging: bool,
}

impl StrokeCapture {
    pub fn new(ink_max: f32) -> Self {
        Self {
            ink_max,
            ink_remaining: ink_max,
            points: Vec::new(),
            length: 0.0,
            enabled: true,
            dragging: false,
        }
    }

    /// Starts a new gesture at `point`, refilling the ink budget.
    ///
    /// Returns false (and changes nothing) while capture is disabled.
    pub fn begin(&mut self, point: Point) -> bool {
        if !self.enabled {
            return false;
        }
        self.points.clear();
        self.points.push(point);
        self.length = 0.0;
        self.ink_remaining = self.ink_max;
        self.dragging = true;
        true
    }

    /// Appends `point` if it is far enough from the last point and ink
    /// remains. A step longer than the remaining ink is clipped along the
    /// segment so the total drawn length lands exactly on the budget.
    pub fn extend(&mut self, point: Point) -> bool {
        if !self.enabled || !self.dragging || self.ink_remaining <= 0.0 {
            return false;
        }
        let Some(&last) = self.points.last() else {
            return false;
        };

        let step = last.distance(point);
        if step < MIN_POINT_SPACING {
            return false;
        }

        if step >= self.ink_remaining {
            let t = self.ink_remaining / step;
            self.points.push(last.lerp(point, t));
            self.length = self.ink_max;
            self.ink_remaining = 0.0;
        } else {
            self.points.push(point);
            self.length += step;
            self.ink_remaining = (self.ink_max - self.length).max(0.0);
        }
        true
    }

    /// Finishes the gesture. Returns the stroke only when it has at least
    /// two points and is longer than [`MIN_STROKE_LENGTH`]; shorter input
    /// is dropped and the budget is restored.
    pub fn end(&mut self) -> Option<Stroke> {
        if !self.dragging {
            return None;
        }
        self.dragging = false;

        let points = std::mem::take(&mut self.points);
        let length = self.length;
        self.length = 0.0;

        if points.len() < 2 || length <= MIN_STROKE_LENGTH {
            debug!(points = points.len(), length, "stroke too short, discarded");
            self.ink_remaining = self.ink_max;
            return None;
        }
        Some(Stroke::new(points, length))
    }

    pub fn ink_remaining(&self) -> f32 {
        self.ink_remaining
    }

    pub fn ink_max(&self) -> f32 {
        self.ink_max
    }

    /// Length drawn so far in the current gesture.
    pub fn drawn_length(&self) -> f32 {
        self.length
    }

    /// Points captured so far in the current gesture.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Disabling mid-drag abandons the gesture in progress.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled && self.dragging {
            self.dragging = false;
            self.points.clear();
            self.length = 0.0;
            self.ink_remaining = self.ink_max;
        }
    }
}
