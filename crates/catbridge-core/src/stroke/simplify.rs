//! Corner-preserving polyline decimation.

use std::f32::consts::{PI, TAU};

use crate::geometry::Point;

/// Minimum turning angle (radians) for an interior vertex to survive.
pub const SIMPLIFY_EPSILON: f32 = 0.12;

/// Simplifies with [`SIMPLIFY_EPSILON`].
pub fn simplify(points: &[Point]) -> Vec<Point> {
    simplify_with(points, SIMPLIFY_EPSILON)
}

/// Keeps the endpoints and every interior vertex whose turning angle
/// exceeds `epsilon`. Passes repeat until nothing more is removed, so the
/// output is a fixed point: simplifying it again returns it unchanged.
pub fn simplify_with(points: &[Point], epsilon: f32) -> Vec<Point> {
    let mut current = points.to_vec();
    loop {
        let next = single_pass(&current, epsilon);
        if next.len() == current.len() {
            return next;
        }
        current = next;
    }
}

fn single_pass(points: &[Point], epsilon: f32) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut out = Vec::with_capacity(points.len());
    out.push(points[0]);

    for i in 1..last {
        let prev = out[out.len() - 1];
        let cur = points[i];
        let next = points[i + 1];
        // degenerate segments carry no direction
        if prev.distance(cur) <= f32::EPSILON || cur.distance(next) <= f32::EPSILON {
            continue;
        }
        if turning_angle(prev, cur, next) > epsilon {
            out.push(cur);
        }
    }

    out.push(points[last]);
    out
}

/// Absolute angle between the directions `a -> b` and `b -> c`, in `[0, PI]`.
fn turning_angle(a: Point, b: Point, c: Point) -> f32 {
    let mut diff = b.angle_to(c) - a.angle_to(b);
    while diff > PI {
        diff -= TAU;
    }
    while diff < -PI {
        diff += TAU;
    }
    diff.abs()
}
