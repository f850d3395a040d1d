use super::{Point2d, Vector2d};
use cgmath::prelude::*;

/// Rotates a vector 90 degrees anticlockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// Normalises a vector, or returns `None` if its magnitude is not above `eps`.
pub fn try_normalize(vec: Vector2d, eps: f64) -> Option<Vector2d> {
    let mag = vec.magnitude();
    (mag.is_finite() && mag > eps).then(|| vec / mag)
}

/// Mirrors a world space direction into screen space, where the Y axis points down.
pub fn flip_y(vec: Vector2d) -> Vector2d {
    Vector2d::new(vec.x, -vec.y)
}

/// Linearly interpolates between `a` and `b`.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Hermite smoothstep of `x` between `edge0` and `edge1`.
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge1 <= edge0 {
        return if x >= edge1 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// The midpoint of two points.
pub fn midpoint(a: Point2d, b: Point2d) -> Point2d {
    a.midpoint(b)
}

/// Distance from `point` to the line segment `a`-`b`, and the
/// parameter in `[0, 1]` of the closest point on the segment.
pub fn distance_to_segment(point: Point2d, a: Point2d, b: Point2d) -> (f64, f64) {
    let ab = b - a;
    let len2 = ab.magnitude2();
    if len2 <= f64::EPSILON {
        return (point.distance(a), 0.0);
    }
    let t = ((point - a).dot(ab) / len2).clamp(0.0, 1.0);
    (point.distance(a + ab * t), t)
}
