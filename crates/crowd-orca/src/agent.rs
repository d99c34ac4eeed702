use crowd_geom::{det, sqr, Vec2, EPSILON};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::linear_program::{self, Line, OptimalValue};
use crate::obstacle::ObstacleArena;

/// Parameter template applied to agents created through the simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AgentDefaults {
    /// Range within which other agents are considered as neighbors.
    pub neighbor_dist: f64,
    /// Upper bound on the number of agent neighbors retained.
    pub max_neighbors: usize,
    /// How far into the future agent-agent collisions are avoided, in
    /// seconds.
    pub time_horizon: f64,
    /// How far into the future obstacle collisions are avoided, in seconds.
    pub time_horizon_obst: f64,
    pub radius: f64,
    pub max_speed: f64,
    /// Initial velocity of newly created agents.
    pub velocity: Vec2,
}

#[derive(Debug, Clone)]
pub(crate) struct Agent {
    pub id: usize,
    pub position: Vec2,
    pub velocity: Vec2,
    pub pref_velocity: Vec2,
    pub new_velocity: Vec2,
    pub radius: f64,
    pub max_speed: f64,
    pub neighbor_dist: f64,
    pub max_neighbors: usize,
    pub time_horizon: f64,
    pub time_horizon_obst: f64,
    /// Agent neighbors of the last tick, ascending by squared distance.
    pub agent_neighbors: Vec<(f64, usize)>,
    /// Obstacle-edge neighbors of the last tick, ascending by squared
    /// point-to-segment distance.
    pub obstacle_neighbors: Vec<(f64, u32)>,
    /// ORCA constraints of the last tick; obstacle lines come first.
    pub orca_lines: Vec<Line>,
}

impl Agent {
    pub fn new(id: usize, position: Vec2, defaults: &AgentDefaults) -> Self {
        Self {
            id,
            position,
            velocity: defaults.velocity,
            pref_velocity: Vec2::ZERO,
            new_velocity: Vec2::ZERO,
            radius: defaults.radius,
            max_speed: defaults.max_speed,
            neighbor_dist: defaults.neighbor_dist,
            max_neighbors: defaults.max_neighbors,
            time_horizon: defaults.time_horizon,
            time_horizon_obst: defaults.time_horizon_obst,
            agent_neighbors: Vec::new(),
            obstacle_neighbors: Vec::new(),
            orca_lines: Vec::new(),
        }
    }

    /// Build the ORCA constraints for the gathered neighbors and solve for
    /// the admissible velocity closest to the preferred velocity.
    ///
    /// `lines` is the agent's retained constraint buffer, taken out by the
    /// caller so this can read the full agent slice.
    pub fn compute_new_velocity(
        &self,
        agents: &[Agent],
        obstacles: &ObstacleArena,
        time_step: f64,
        lines: &mut Vec<Line>,
    ) -> Vec2 {
        lines.clear();
        self.obstacle_orca_lines(obstacles, lines);
        let num_obstacle_lines = lines.len();
        self.agent_orca_lines(agents, time_step, lines);

        let (satisfied, mut velocity) =
            linear_program::solve(lines, self.max_speed, OptimalValue::Point(self.pref_velocity));
        if satisfied < lines.len() {
            velocity = linear_program::solve_fallback(
                lines,
                num_obstacle_lines,
                satisfied,
                self.max_speed,
                velocity,
            );
        }
        velocity
    }

    /// One constraint per obstacle-edge neighbor, processed nearest first so
    /// that edges already excluded by an earlier constraint can be skipped.
    fn obstacle_orca_lines(&self, obstacles: &ObstacleArena, lines: &mut Vec<Line>) {
        let inv_time_horizon = 1.0 / self.time_horizon_obst;
        let radius_sq = sqr(self.radius);

        for &(_, neighbor) in &self.obstacle_neighbors {
            let mut obstacle1 = neighbor;
            let mut obstacle2 = obstacles.next_no(obstacle1);

            let relative_position1 = obstacles.point(obstacle1) - self.position;
            let relative_position2 = obstacles.point(obstacle2) - self.position;

            // Skip this edge when every velocity it would forbid is already
            // forbidden by an earlier (closer) constraint.
            let already_covered = lines.iter().any(|line| {
                det(relative_position1 * inv_time_horizon - line.point, line.direction)
                    - inv_time_horizon * self.radius
                    >= -EPSILON
                    && det(relative_position2 * inv_time_horizon - line.point, line.direction)
                        - inv_time_horizon * self.radius
                        >= -EPSILON
            });
            if already_covered {
                continue;
            }

            let dist_sq1 = relative_position1.length_sq();
            let dist_sq2 = relative_position2.length_sq();

            let obstacle_vector = obstacles.point(obstacle2) - obstacles.point(obstacle1);
            let s = (-relative_position1).dot(obstacle_vector) / obstacle_vector.length_sq();
            let dist_sq_line = (-relative_position1 - obstacle_vector * s).length_sq();

            if s < 0.0 && dist_sq1 <= radius_sq {
                // Collision with the left vertex. A non-convex vertex is
                // handled by its neighboring edges.
                if obstacles.get(obstacle1).convex {
                    lines.push(Line {
                        point: Vec2::ZERO,
                        direction: relative_position1.perp().normalized(),
                    });
                }
                continue;
            } else if s > 1.0 && dist_sq2 <= radius_sq {
                // Collision with the right vertex; deferred to the next edge
                // unless this one faces the agent.
                if obstacles.get(obstacle2).convex
                    && det(relative_position2, obstacles.get(obstacle2).direction) >= 0.0
                {
                    lines.push(Line {
                        point: Vec2::ZERO,
                        direction: relative_position2.perp().normalized(),
                    });
                }
                continue;
            } else if (0.0..=1.0).contains(&s) && dist_sq_line <= radius_sq {
                // Collision with the edge interior.
                lines.push(Line {
                    point: Vec2::ZERO,
                    direction: -obstacles.get(obstacle1).direction,
                });
                continue;
            }

            // No collision: compute the two tangent legs bounding the
            // velocity obstacle of the inflated edge.
            let mut left_leg_direction: Vec2;
            let mut right_leg_direction: Vec2;

            if s < 0.0 && dist_sq_line <= radius_sq {
                // The edge is viewed obliquely, so the left vertex alone
                // defines the velocity obstacle.
                if !obstacles.get(obstacle1).convex {
                    continue;
                }
                obstacle2 = obstacle1;

                let leg1 = (dist_sq1 - radius_sq).sqrt();
                left_leg_direction = Vec2::new(
                    relative_position1.x * leg1 - relative_position1.y * self.radius,
                    relative_position1.x * self.radius + relative_position1.y * leg1,
                ) / dist_sq1;
                right_leg_direction = Vec2::new(
                    relative_position1.x * leg1 + relative_position1.y * self.radius,
                    -relative_position1.x * self.radius + relative_position1.y * leg1,
                ) / dist_sq1;
            } else if s > 1.0 && dist_sq_line <= radius_sq {
                // Symmetric: the right vertex alone defines it.
                if !obstacles.get(obstacle2).convex {
                    continue;
                }
                obstacle1 = obstacle2;

                let leg2 = (dist_sq2 - radius_sq).sqrt();
                left_leg_direction = Vec2::new(
                    relative_position2.x * leg2 - relative_position2.y * self.radius,
                    relative_position2.x * self.radius + relative_position2.y * leg2,
                ) / dist_sq2;
                right_leg_direction = Vec2::new(
                    relative_position2.x * leg2 + relative_position2.y * self.radius,
                    -relative_position2.x * self.radius + relative_position2.y * leg2,
                ) / dist_sq2;
            } else {
                if obstacles.get(obstacle1).convex {
                    let leg1 = (dist_sq1 - radius_sq).sqrt();
                    left_leg_direction = Vec2::new(
                        relative_position1.x * leg1 - relative_position1.y * self.radius,
                        relative_position1.x * self.radius + relative_position1.y * leg1,
                    ) / dist_sq1;
                } else {
                    // Non-convex left vertex: the edge itself bounds the
                    // obstacle on the left.
                    left_leg_direction = -obstacles.get(obstacle1).direction;
                }

                if obstacles.get(obstacle2).convex {
                    let leg2 = (dist_sq2 - radius_sq).sqrt();
                    right_leg_direction = Vec2::new(
                        relative_position2.x * leg2 + relative_position2.y * self.radius,
                        -relative_position2.x * self.radius + relative_position2.y * leg2,
                    ) / dist_sq2;
                } else {
                    right_leg_direction = obstacles.get(obstacle1).direction;
                }
            }

            // Legs that point through the neighboring edge are foreign: the
            // neighbor is responsible there, and the leg is clamped to it.
            let left_neighbor = obstacles.prev_no(obstacle1);
            let mut is_left_leg_foreign = false;
            let mut is_right_leg_foreign = false;

            if obstacles.get(obstacle1).convex
                && det(left_leg_direction, -obstacles.get(left_neighbor).direction) >= 0.0
            {
                left_leg_direction = -obstacles.get(left_neighbor).direction;
                is_left_leg_foreign = true;
            }
            if obstacles.get(obstacle2).convex
                && det(right_leg_direction, obstacles.get(obstacle2).direction) <= 0.0
            {
                right_leg_direction = obstacles.get(obstacle2).direction;
                is_right_leg_foreign = true;
            }

            let left_cutoff = (obstacles.point(obstacle1) - self.position) * inv_time_horizon;
            let right_cutoff = (obstacles.point(obstacle2) - self.position) * inv_time_horizon;
            let cutoff_vector = right_cutoff - left_cutoff;

            let degenerate = obstacle1 == obstacle2;
            let t = if degenerate {
                0.5
            } else {
                (self.velocity - left_cutoff).dot(cutoff_vector) / cutoff_vector.length_sq()
            };
            let t_left = (self.velocity - left_cutoff).dot(left_leg_direction);
            let t_right = (self.velocity - right_cutoff).dot(right_leg_direction);

            if (t < 0.0 && t_left < 0.0) || (degenerate && t_left < 0.0 && t_right < 0.0) {
                // The current velocity projects onto the left cut-off circle.
                let unit_w = (self.velocity - left_cutoff).normalized();
                lines.push(Line {
                    direction: Vec2::new(unit_w.y, -unit_w.x),
                    point: left_cutoff + unit_w * (self.radius * inv_time_horizon),
                });
                continue;
            } else if t > 1.0 && t_right < 0.0 {
                let unit_w = (self.velocity - right_cutoff).normalized();
                lines.push(Line {
                    direction: Vec2::new(unit_w.y, -unit_w.x),
                    point: right_cutoff + unit_w * (self.radius * inv_time_horizon),
                });
                continue;
            }

            // Otherwise the nearest piece of the velocity obstacle boundary
            // is the cut-off segment, the left leg, or the right leg.
            let dist_sq_cutoff = if t < 0.0 || t > 1.0 || degenerate {
                f64::INFINITY
            } else {
                (self.velocity - (left_cutoff + cutoff_vector * t)).length_sq()
            };
            let dist_sq_left = if t_left < 0.0 {
                f64::INFINITY
            } else {
                (self.velocity - (left_cutoff + left_leg_direction * t_left)).length_sq()
            };
            let dist_sq_right = if t_right < 0.0 {
                f64::INFINITY
            } else {
                (self.velocity - (right_cutoff + right_leg_direction * t_right)).length_sq()
            };

            if dist_sq_cutoff <= dist_sq_left && dist_sq_cutoff <= dist_sq_right {
                let direction = -obstacles.get(obstacle1).direction;
                lines.push(Line {
                    direction,
                    point: left_cutoff + direction.perp() * (self.radius * inv_time_horizon),
                });
            } else if dist_sq_left <= dist_sq_right {
                if is_left_leg_foreign {
                    continue;
                }
                lines.push(Line {
                    direction: left_leg_direction,
                    point: left_cutoff
                        + left_leg_direction.perp() * (self.radius * inv_time_horizon),
                });
            } else {
                if is_right_leg_foreign {
                    continue;
                }
                let direction = -right_leg_direction;
                lines.push(Line {
                    direction,
                    point: right_cutoff + direction.perp() * (self.radius * inv_time_horizon),
                });
            }
        }
    }

    /// One constraint per agent neighbor; each side takes half of the
    /// required velocity change.
    fn agent_orca_lines(&self, agents: &[Agent], time_step: f64, lines: &mut Vec<Line>) {
        let inv_time_horizon = 1.0 / self.time_horizon;

        for &(_, neighbor) in &self.agent_neighbors {
            let other = &agents[neighbor];

            let relative_position = other.position - self.position;
            let relative_velocity = self.velocity - other.velocity;
            let dist_sq = relative_position.length_sq();
            let combined_radius = self.radius + other.radius;
            let combined_radius_sq = sqr(combined_radius);

            let direction;
            let u;

            if dist_sq > combined_radius_sq {
                // No present overlap: work with the velocity obstacle
                // truncated at the time horizon.
                let w = relative_velocity - relative_position * inv_time_horizon;
                let w_length_sq = w.length_sq();

                let dot_product = w.dot(relative_position);
                if dot_product < 0.0 && sqr(dot_product) > combined_radius_sq * w_length_sq {
                    // Closest point on the cut-off circle.
                    let w_length = w_length_sq.sqrt();
                    let unit_w = w / w_length;
                    direction = Vec2::new(unit_w.y, -unit_w.x);
                    u = unit_w * (combined_radius * inv_time_horizon - w_length);
                } else {
                    // Closest point on one of the legs.
                    let leg = (dist_sq - combined_radius_sq).sqrt();
                    if det(relative_position, w) > 0.0 {
                        direction = Vec2::new(
                            relative_position.x * leg - relative_position.y * combined_radius,
                            relative_position.x * combined_radius + relative_position.y * leg,
                        ) / dist_sq;
                    } else {
                        direction = -Vec2::new(
                            relative_position.x * leg + relative_position.y * combined_radius,
                            -relative_position.x * combined_radius + relative_position.y * leg,
                        ) / dist_sq;
                    }
                    u = direction * relative_velocity.dot(direction) - relative_velocity;
                }
            } else {
                // Already overlapping: resolve within a single time step.
                let inv_time_step = 1.0 / time_step;
                let w = relative_velocity - relative_position * inv_time_step;
                let w_length = w.length();
                let unit_w = w / w_length;
                direction = Vec2::new(unit_w.y, -unit_w.x);
                u = unit_w * (combined_radius * inv_time_step - w_length);
            }

            lines.push(Line {
                direction,
                point: self.velocity + u * 0.5,
            });
        }
    }
}
