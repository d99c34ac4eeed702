//! 2-D vector algebra and geometric predicates shared by the crowd solver.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

mod vec2;

pub use vec2::Vec2;

/// Shared tolerance for "on the line" classifications.
pub const EPSILON: f64 = 1e-5;

pub fn sqr(x: f64) -> f64 {
    x * x
}

/// 2-D determinant (z component of the cross product).
pub fn det(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Signed orientation test: positive when `c` lies to the left of the directed
/// line through `a` and `b`.
pub fn left_of(a: Vec2, b: Vec2, c: Vec2) -> f64 {
    det(a - c, b - a)
}

/// Squared distance from `r` to the segment from `p` to `q`, by projecting
/// onto the segment and clamping the parameter to `[0, 1]`.
pub fn dist_sq_point_segment(p: Vec2, q: Vec2, r: Vec2) -> f64 {
    let t = ((r - p).dot(q - p) / (q - p).length_sq()).clamp(0.0, 1.0);
    r.distance_sq(p + (q - p) * t)
}
