use crowd_geom::{sqr, Vec2};

use crate::agent::Agent;

const MAX_LEAF_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
struct Node {
    begin: usize,
    end: usize,
    left: usize,
    right: usize,
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

/// Bounding-box k-D tree over agent positions, rebuilt from scratch every
/// tick.
///
/// The tree stores agent indices and borrows the agent slice at build and
/// query time; it holds no reference to the simulator.
#[derive(Debug, Default)]
pub(crate) struct AgentKdTree {
    indices: Vec<usize>,
    nodes: Vec<Node>,
}

impl AgentKdTree {
    pub fn build(&mut self, agents: &[Agent]) {
        self.indices.clear();
        self.indices.extend(0..agents.len());
        self.nodes.clear();
        self.nodes.resize(2 * agents.len(), Node::default());
        if !agents.is_empty() {
            self.build_recursive(agents, 0, agents.len(), 0);
        }
    }

    fn build_recursive(&mut self, agents: &[Agent], begin: usize, end: usize, node: usize) {
        let mut min_x = agents[self.indices[begin]].position.x;
        let mut max_x = min_x;
        let mut min_y = agents[self.indices[begin]].position.y;
        let mut max_y = min_y;
        for &i in &self.indices[begin + 1..end] {
            let p = agents[i].position;
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }

        let n = &mut self.nodes[node];
        n.begin = begin;
        n.end = end;
        n.min_x = min_x;
        n.max_x = max_x;
        n.min_y = min_y;
        n.max_y = max_y;

        if end - begin <= MAX_LEAF_SIZE {
            return;
        }

        // Split on the longer axis at the bbox midpoint.
        let vertical = max_x - min_x > max_y - min_y;
        let split_value = 0.5 * if vertical { max_x + min_x } else { max_y + min_y };
        let coord = |agent: &Agent| if vertical { agent.position.x } else { agent.position.y };

        let mut left = begin;
        let mut right = end;
        while left < right {
            while left < right && coord(&agents[self.indices[left]]) < split_value {
                left += 1;
            }
            while right > left && coord(&agents[self.indices[right - 1]]) >= split_value {
                right -= 1;
            }
            if left < right {
                self.indices.swap(left, right - 1);
                left += 1;
                right -= 1;
            }
        }

        // Coincident positions can leave the left side empty; force one
        // element across so the recursion terminates.
        if left == begin {
            left += 1;
        }

        let left_node = node + 1;
        let right_node = node + 2 * (left - begin);
        self.nodes[node].left = left_node;
        self.nodes[node].right = right_node;
        self.build_recursive(agents, begin, left, left_node);
        self.build_recursive(agents, left, end, right_node);
    }

    /// Collect the nearest agents to `agents[agent_no]` into `out`, keyed and
    /// sorted by squared distance, keeping at most `max_neighbors` entries.
    ///
    /// `range_sq` shrinks to the largest retained key once the list is full,
    /// which prunes the remaining traversal.
    pub fn query_neighbors(
        &self,
        agents: &[Agent],
        agent_no: usize,
        range_sq: &mut f64,
        max_neighbors: usize,
        out: &mut Vec<(f64, usize)>,
    ) {
        if agents.is_empty() || max_neighbors == 0 {
            return;
        }
        self.query_recursive(agents, agent_no, range_sq, max_neighbors, out, 0);
    }

    fn query_recursive(
        &self,
        agents: &[Agent],
        agent_no: usize,
        range_sq: &mut f64,
        max_neighbors: usize,
        out: &mut Vec<(f64, usize)>,
        node: usize,
    ) {
        let n = self.nodes[node];
        if n.end - n.begin <= MAX_LEAF_SIZE {
            let position = agents[agent_no].position;
            for &i in &self.indices[n.begin..n.end] {
                if i == agent_no {
                    continue;
                }
                let dist_sq = position.distance_sq(agents[i].position);
                insert_neighbor(out, max_neighbors, dist_sq, i, range_sq);
            }
            return;
        }

        let position = agents[agent_no].position;
        let dist_left = bbox_dist_sq(&self.nodes[n.left], position);
        let dist_right = bbox_dist_sq(&self.nodes[n.right], position);

        // Descend into the closer child first; the range may have shrunk
        // enough by then to skip the farther one.
        if dist_left < dist_right {
            if dist_left < *range_sq {
                self.query_recursive(agents, agent_no, range_sq, max_neighbors, out, n.left);
                if dist_right < *range_sq {
                    self.query_recursive(agents, agent_no, range_sq, max_neighbors, out, n.right);
                }
            }
        } else if dist_right < *range_sq {
            self.query_recursive(agents, agent_no, range_sq, max_neighbors, out, n.right);
            if dist_left < *range_sq {
                self.query_recursive(agents, agent_no, range_sq, max_neighbors, out, n.left);
            }
        }
    }

    /// All agent indices within the squared range of `point`, in tree order.
    pub fn query_within(
        &self,
        agents: &[Agent],
        point: Vec2,
        range_sq: f64,
        out: &mut Vec<usize>,
    ) {
        if agents.is_empty() {
            return;
        }
        self.within_recursive(agents, point, range_sq, out, 0);
    }

    fn within_recursive(
        &self,
        agents: &[Agent],
        point: Vec2,
        range_sq: f64,
        out: &mut Vec<usize>,
        node: usize,
    ) {
        let n = self.nodes[node];
        if bbox_dist_sq(&self.nodes[node], point) >= range_sq {
            return;
        }
        if n.end - n.begin <= MAX_LEAF_SIZE {
            for &i in &self.indices[n.begin..n.end] {
                if point.distance_sq(agents[i].position) < range_sq {
                    out.push(i);
                }
            }
            return;
        }
        self.within_recursive(agents, point, range_sq, out, n.left);
        self.within_recursive(agents, point, range_sq, out, n.right);
    }
}

fn bbox_dist_sq(node: &Node, p: Vec2) -> f64 {
    sqr((node.min_x - p.x).max(0.0))
        + sqr((p.x - node.max_x).max(0.0))
        + sqr((node.min_y - p.y).max(0.0))
        + sqr((p.y - node.max_y).max(0.0))
}

/// Bounded insertion sort keyed by squared distance. Once `max_neighbors`
/// entries are held, the farthest is evicted and the caller's range cell is
/// tightened to the largest retained key.
fn insert_neighbor(
    out: &mut Vec<(f64, usize)>,
    max_neighbors: usize,
    dist_sq: f64,
    agent_no: usize,
    range_sq: &mut f64,
) {
    if dist_sq >= *range_sq {
        return;
    }
    if out.len() < max_neighbors {
        out.push((dist_sq, agent_no));
    }
    let mut i = out.len() - 1;
    while i != 0 && dist_sq < out[i - 1].0 {
        out[i] = out[i - 1];
        i -= 1;
    }
    out[i] = (dist_sq, agent_no);
    if out.len() == max_neighbors {
        *range_sq = out[out.len() - 1].0;
    }
}
