use crowd_geom::{left_of, Vec2};

use crate::SimulatorError;

/// One node of a doubly-linked polygon chain, addressed by its insertion
/// index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleVertex {
    /// Position of the vertex.
    pub point: Vec2,
    /// Unit direction of the outgoing edge, toward the next vertex.
    pub direction: Vec2,
    /// Whether the polygon is non-reflex at this vertex.
    pub convex: bool,
    pub(crate) next: u32,
    pub(crate) prev: u32,
}

/// Append-only arena of obstacle vertices.
///
/// Chains are cyclic: every vertex has valid `next`/`prev` links into the same
/// polygon. Preprocessing may splice additional vertices into existing chains;
/// ids never change and nothing is ever removed.
#[derive(Debug, Clone, Default)]
pub(crate) struct ObstacleArena {
    vertices: Vec<ObstacleVertex>,
}

impl ObstacleArena {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    pub fn get(&self, no: u32) -> &ObstacleVertex {
        &self.vertices[no as usize]
    }

    pub fn point(&self, no: u32) -> Vec2 {
        self.vertices[no as usize].point
    }

    pub fn next_no(&self, no: u32) -> u32 {
        self.vertices[no as usize].next
    }

    pub fn prev_no(&self, no: u32) -> u32 {
        self.vertices[no as usize].prev
    }

    pub fn set_point(&mut self, no: u32, point: Vec2) {
        self.vertices[no as usize].point = point;
    }

    /// Append a polygon as a cyclic chain and return the id of its first
    /// vertex. Two-vertex "line" obstacles are legal and convex at both ends.
    pub fn add_polygon(&mut self, vertices: &[Vec2]) -> Result<usize, SimulatorError> {
        if vertices.len() < 2 {
            return Err(SimulatorError::TooFewVertices);
        }

        let first = self.vertices.len();
        let n = vertices.len();
        for i in 0..n {
            let prev = if i == 0 { n - 1 } else { i - 1 };
            let next = if i == n - 1 { 0 } else { i + 1 };
            let convex =
                n == 2 || left_of(vertices[prev], vertices[i], vertices[next]) >= 0.0;
            self.vertices.push(ObstacleVertex {
                point: vertices[i],
                direction: (vertices[next] - vertices[i]).normalized(),
                convex,
                next: (first + next) as u32,
                prev: (first + prev) as u32,
            });
        }
        Ok(first)
    }

    /// Splice a new vertex into the edge leaving `edge`, at parameter `t`
    /// along it. The new vertex inherits the edge direction, is convex, and
    /// receives the next free id.
    pub fn split_edge(&mut self, edge: u32, t: f64) -> u32 {
        let next = self.next_no(edge);
        let p1 = self.point(edge);
        let p2 = self.point(next);
        let id = self.vertices.len() as u32;
        self.vertices.push(ObstacleVertex {
            point: p1 + (p2 - p1) * t,
            direction: self.vertices[edge as usize].direction,
            convex: true,
            next,
            prev: edge,
        });
        self.vertices[edge as usize].next = id;
        self.vertices[next as usize].prev = id;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_links_wrap_around() {
        let mut arena = ObstacleArena::default();
        let first = arena
            .add_polygon(&[
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
            ])
            .unwrap();
        assert_eq!(first, 0);
        assert_eq!(arena.len(), 3);
        for i in 0..3u32 {
            assert_eq!(arena.next_no(i), (i + 1) % 3);
            assert_eq!(arena.prev_no(arena.next_no(i)), i);
        }
    }

    #[test]
    fn two_vertex_obstacle_is_convex_both_ways() {
        let mut arena = ObstacleArena::default();
        arena
            .add_polygon(&[Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0)])
            .unwrap();
        assert!(arena.get(0).convex);
        assert!(arena.get(1).convex);
        assert_eq!(arena.get(0).direction, Vec2::new(1.0, 0.0));
        assert_eq!(arena.get(1).direction, Vec2::new(-1.0, 0.0));
        assert_eq!(arena.next_no(0), 1);
        assert_eq!(arena.next_no(1), 0);
    }

    #[test]
    fn split_edge_splices_into_the_chain() {
        let mut arena = ObstacleArena::default();
        arena
            .add_polygon(&[Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0)])
            .unwrap();
        let split = arena.split_edge(0, 0.25);
        assert_eq!(split, 2);
        assert_eq!(arena.point(split), Vec2::new(1.0, 0.0));
        assert_eq!(arena.next_no(0), split);
        assert_eq!(arena.next_no(split), 1);
        assert_eq!(arena.prev_no(1), split);
        assert_eq!(arena.prev_no(split), 0);
        assert!(arena.get(split).convex);
        assert_eq!(arena.get(split).direction, arena.get(0).direction);
    }

    #[test]
    fn too_few_vertices_is_rejected() {
        let mut arena = ObstacleArena::default();
        assert_eq!(
            arena.add_polygon(&[Vec2::ZERO]),
            Err(SimulatorError::TooFewVertices)
        );
        assert_eq!(arena.len(), 0);
    }
}
