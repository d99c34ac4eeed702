use crowd_geom::{det, sqr, Vec2, EPSILON};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A directed line in velocity space.
///
/// The admissible half-plane lies to the left of the line:
/// `det(direction, point - v) <= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Line {
    /// A point on the line.
    pub point: Vec2,
    /// Unit direction of the line.
    pub direction: Vec2,
}

/// Optimization target of the program, ignoring constraints.
#[derive(Debug, Clone, Copy)]
pub(crate) enum OptimalValue {
    /// The admissible velocity closest to this point wins.
    Point(Vec2),
    /// The admissible velocity farthest along this unit direction wins.
    Direction(Vec2),
}

pub(crate) fn violates(line: &Line, velocity: Vec2) -> bool {
    det(line.direction, line.point - velocity) > 0.0
}

/// 1-D program along `lines[line_no]`, subject to the earlier constraints and
/// the speed disc. `None` when the segment is clipped away entirely.
fn solve_along_line(
    lines: &[Line],
    line_no: usize,
    radius: f64,
    optimal: OptimalValue,
) -> Option<Vec2> {
    let line = &lines[line_no];
    let dot_product = line.point.dot(line.direction);
    let discriminant = sqr(dot_product) + sqr(radius) - line.point.length_sq();
    if discriminant < 0.0 {
        // The speed disc misses this line entirely.
        return None;
    }

    let sqrt_discriminant = discriminant.sqrt();
    let mut t_left = -dot_product - sqrt_discriminant;
    let mut t_right = -dot_product + sqrt_discriminant;

    for other in &lines[..line_no] {
        let denominator = det(line.direction, other.direction);
        let numerator = det(other.direction, line.point - other.point);

        if denominator.abs() <= EPSILON {
            // Nearly parallel: either the whole line is admissible for
            // `other`, or none of it is.
            if numerator < 0.0 {
                return None;
            }
            continue;
        }

        let t = numerator / denominator;
        if denominator >= 0.0 {
            t_right = t_right.min(t);
        } else {
            t_left = t_left.max(t);
        }
        if t_left > t_right {
            return None;
        }
    }

    let t = match optimal {
        OptimalValue::Direction(direction) => {
            if direction.dot(line.direction) > 0.0 {
                t_right
            } else {
                t_left
            }
        }
        OptimalValue::Point(point) => line.direction.dot(point - line.point).clamp(t_left, t_right),
    };
    Some(line.point + line.direction * t)
}

/// 2-D program over all constraints and the speed disc, walked in insertion
/// order.
///
/// Returns the number of satisfied constraints (`lines.len()` on success)
/// together with the best velocity found so far; on failure the velocity from
/// before the failing constraint is returned unchanged.
pub(crate) fn solve(lines: &[Line], radius: f64, optimal: OptimalValue) -> (usize, Vec2) {
    let mut result = match optimal {
        // The direction is a unit vector; the seed sits on the disc boundary.
        OptimalValue::Direction(direction) => direction * radius,
        OptimalValue::Point(point) if point.length_sq() > sqr(radius) => {
            point.normalized() * radius
        }
        OptimalValue::Point(point) => point,
    };

    for (i, line) in lines.iter().enumerate() {
        if violates(line, result) {
            match solve_along_line(lines, i, radius, optimal) {
                Some(velocity) => result = velocity,
                None => return (i, result),
            }
        }
    }
    (lines.len(), result)
}

/// Fallback for an infeasible program: starting at the constraint that failed,
/// minimize the largest penetration across the remaining constraints while
/// keeping every obstacle constraint hard.
pub(crate) fn solve_fallback(
    lines: &[Line],
    num_obstacle_lines: usize,
    begin_line: usize,
    radius: f64,
    mut result: Vec2,
) -> Vec2 {
    let mut distance = 0.0;

    for i in begin_line..lines.len() {
        if det(lines[i].direction, lines[i].point - result) <= distance {
            continue;
        }

        // Project every earlier agent constraint onto constraint i; obstacle
        // constraints are copied verbatim and never relaxed.
        let mut projected: Vec<Line> = lines[..num_obstacle_lines].to_vec();
        for j in num_obstacle_lines..i {
            let determinant = det(lines[i].direction, lines[j].direction);
            let point = if determinant.abs() <= EPSILON {
                if lines[i].direction.dot(lines[j].direction) > 0.0 {
                    // Same direction: constraint j adds nothing here.
                    continue;
                }
                (lines[i].point + lines[j].point) * 0.5
            } else {
                lines[i].point
                    + lines[i].direction
                        * (det(lines[j].direction, lines[i].point - lines[j].point) / determinant)
            };
            projected.push(Line {
                point,
                direction: (lines[j].direction - lines[i].direction).normalized(),
            });
        }

        let (satisfied, velocity) = solve(
            &projected,
            radius,
            OptimalValue::Direction(lines[i].direction.perp()),
        );
        if satisfied >= projected.len() {
            // The projected program is feasible by construction; a short
            // count means floating-point drift, in which case the previous
            // best stands.
            result = velocity;
        }
        distance = det(lines[i].direction, lines[i].point - result);
    }

    result
}
