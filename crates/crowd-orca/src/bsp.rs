use crowd_geom::{det, dist_sq_point_segment, left_of, sqr, Vec2, EPSILON};

use crate::obstacle::ObstacleArena;

#[derive(Debug)]
struct BspNode {
    /// First vertex of the splitting edge; `next` gives the second.
    edge: u32,
    left: Option<Box<BspNode>>,
    right: Option<Box<BspNode>>,
}

/// Binary space partition over obstacle edges, built once after all obstacles
/// are committed and immutable afterwards.
///
/// Every edge in a subtree lies wholly on one side of its ancestors' splitting
/// lines; edges that straddle a line are cut in two by splicing a new vertex
/// into their polygon chain.
#[derive(Debug, Default)]
pub(crate) struct ObstacleBsp {
    root: Option<Box<BspNode>>,
}

impl ObstacleBsp {
    pub fn build(arena: &mut ObstacleArena) -> Self {
        let edges: Vec<u32> = (0..arena.len() as u32).collect();
        Self {
            root: build_recursive(arena, edges),
        }
    }

    /// Collect every edge within the squared range of `position` into `out`,
    /// keyed and sorted by squared point-to-segment distance.
    ///
    /// Unlike the agent query, the range never tightens: all edges within the
    /// initial range constrain the agent.
    pub fn query_neighbors(
        &self,
        arena: &ObstacleArena,
        position: Vec2,
        range_sq: f64,
        out: &mut Vec<(f64, u32)>,
    ) {
        query_recursive(self.root.as_deref(), arena, position, range_sq, out);
    }

    /// Whether the segment from `q1` to `q2`, inflated by `radius`, is free of
    /// obstacle edges.
    pub fn query_visibility(&self, arena: &ObstacleArena, q1: Vec2, q2: Vec2, radius: f64) -> bool {
        visibility_recursive(self.root.as_deref(), arena, q1, q2, radius)
    }
}

fn build_recursive(arena: &mut ObstacleArena, edges: Vec<u32>) -> Option<Box<BspNode>> {
    if edges.is_empty() {
        return None;
    }

    // Pick the splitter minimizing (max(L, R), min(L, R)) lexicographically,
    // where L and R count edges falling strictly left and right of its line.
    let mut optimal = 0usize;
    let mut min_left = edges.len();
    let mut min_right = edges.len();

    for (i, &edge_i) in edges.iter().enumerate() {
        let mut left_size = 0usize;
        let mut right_size = 0usize;
        let i1 = arena.point(edge_i);
        let i2 = arena.point(arena.next_no(edge_i));

        for (j, &edge_j) in edges.iter().enumerate() {
            if i == j {
                continue;
            }
            let j1 = arena.point(edge_j);
            let j2 = arena.point(arena.next_no(edge_j));
            let j1_left = left_of(i1, i2, j1);
            let j2_left = left_of(i1, i2, j2);

            if j1_left >= -EPSILON && j2_left >= -EPSILON {
                left_size += 1;
            } else if j1_left <= EPSILON && j2_left <= EPSILON {
                right_size += 1;
            } else {
                left_size += 1;
                right_size += 1;
            }

            // Counts only grow; abandon this candidate once it cannot win.
            if (left_size.max(right_size), left_size.min(right_size))
                >= (min_left.max(min_right), min_left.min(min_right))
            {
                break;
            }
        }

        if (left_size.max(right_size), left_size.min(right_size))
            < (min_left.max(min_right), min_left.min(min_right))
        {
            min_left = left_size;
            min_right = right_size;
            optimal = i;
        }
    }

    let edge_i = edges[optimal];
    let i1 = arena.point(edge_i);
    let i2 = arena.point(arena.next_no(edge_i));
    let mut left_edges = Vec::with_capacity(min_left);
    let mut right_edges = Vec::with_capacity(min_right);

    for (j, &edge_j) in edges.iter().enumerate() {
        if j == optimal {
            continue;
        }
        let j1 = arena.point(edge_j);
        let j2 = arena.point(arena.next_no(edge_j));
        let j1_left = left_of(i1, i2, j1);
        let j2_left = left_of(i1, i2, j2);

        if j1_left >= -EPSILON && j2_left >= -EPSILON {
            left_edges.push(edge_j);
        } else if j1_left <= EPSILON && j2_left <= EPSILON {
            right_edges.push(edge_j);
        } else {
            // The edge straddles the splitting line; cut it at the
            // intersection so each half lands wholly on one side.
            let t = det(i2 - i1, j1 - i1) / det(i2 - i1, j1 - j2);
            let split = arena.split_edge(edge_j, t);
            if j1_left > 0.0 {
                left_edges.push(edge_j);
                right_edges.push(split);
            } else {
                right_edges.push(edge_j);
                left_edges.push(split);
            }
        }
    }

    let left = build_recursive(arena, left_edges);
    let right = build_recursive(arena, right_edges);
    Some(Box::new(BspNode {
        edge: edge_i,
        left,
        right,
    }))
}

fn query_recursive(
    node: Option<&BspNode>,
    arena: &ObstacleArena,
    position: Vec2,
    range_sq: f64,
    out: &mut Vec<(f64, u32)>,
) {
    let Some(node) = node else { return };
    let e1 = node.edge;
    let e2 = arena.next_no(e1);
    let p1 = arena.point(e1);
    let p2 = arena.point(e2);

    let agent_left = left_of(p1, p2, position);
    let (near, far) = if agent_left >= 0.0 {
        (node.left.as_deref(), node.right.as_deref())
    } else {
        (node.right.as_deref(), node.left.as_deref())
    };
    query_recursive(near, arena, position, range_sq, out);

    let dist_sq_line = sqr(agent_left) / (p2 - p1).length_sq();
    if dist_sq_line < range_sq {
        if agent_left < 0.0 {
            // Only edges whose blocking side faces the agent constrain it.
            insert_obstacle_neighbor(arena, e1, position, range_sq, out);
        }
        query_recursive(far, arena, position, range_sq, out);
    }
}

fn insert_obstacle_neighbor(
    arena: &ObstacleArena,
    edge: u32,
    position: Vec2,
    range_sq: f64,
    out: &mut Vec<(f64, u32)>,
) {
    let p1 = arena.point(edge);
    let p2 = arena.point(arena.next_no(edge));
    let dist_sq = dist_sq_point_segment(p1, p2, position);
    if dist_sq < range_sq {
        out.push((dist_sq, edge));
        let mut i = out.len() - 1;
        while i != 0 && dist_sq < out[i - 1].0 {
            out[i] = out[i - 1];
            i -= 1;
        }
        out[i] = (dist_sq, edge);
    }
}

fn visibility_recursive(
    node: Option<&BspNode>,
    arena: &ObstacleArena,
    q1: Vec2,
    q2: Vec2,
    radius: f64,
) -> bool {
    let Some(node) = node else { return true };
    let e1 = node.edge;
    let e2 = arena.next_no(e1);
    let p1 = arena.point(e1);
    let p2 = arena.point(e2);

    let q1_left = left_of(p1, p2, q1);
    let q2_left = left_of(p1, p2, q2);
    let inv_length = 1.0 / (p2 - p1).length_sq();

    let left = node.left.as_deref();
    let right = node.right.as_deref();

    if q1_left >= 0.0 && q2_left >= 0.0 {
        // The whole query segment is left of the splitting line; the right
        // subtree only matters if the segment comes within `radius` of the
        // line itself.
        visibility_recursive(left, arena, q1, q2, radius)
            && ((sqr(q1_left) * inv_length >= sqr(radius)
                && sqr(q2_left) * inv_length >= sqr(radius))
                || visibility_recursive(right, arena, q1, q2, radius))
    } else if q1_left <= 0.0 && q2_left <= 0.0 {
        visibility_recursive(right, arena, q1, q2, radius)
            && ((sqr(q1_left) * inv_length >= sqr(radius)
                && sqr(q2_left) * inv_length >= sqr(radius))
                || visibility_recursive(left, arena, q1, q2, radius))
    } else if q1_left >= 0.0 && q2_left <= 0.0 {
        // The segment crosses from left to right; both sides must be clear.
        visibility_recursive(left, arena, q1, q2, radius)
            && visibility_recursive(right, arena, q1, q2, radius)
    } else {
        // Crossing right to left: the splitting edge itself may lie between
        // the endpoints, so additionally require both of its endpoints on one
        // side of the query segment and clear of it by `radius`.
        let p1_left = left_of(q1, q2, p1);
        let p2_left = left_of(q1, q2, p2);
        let inv_length_q = 1.0 / (q2 - q1).length_sq();
        p1_left * p2_left >= 0.0
            && sqr(p1_left) * inv_length_q > sqr(radius)
            && sqr(p2_left) * inv_length_q > sqr(radius)
            && visibility_recursive(left, arena, q1, q2, radius)
            && visibility_recursive(right, arena, q1, q2, radius)
    }
}
