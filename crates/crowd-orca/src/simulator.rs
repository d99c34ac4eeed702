use crowd_geom::{sqr, Vec2};

use crate::agent::{Agent, AgentDefaults};
use crate::bsp::ObstacleBsp;
use crate::kdtree::AgentKdTree;
use crate::linear_program::Line;
use crate::obstacle::{ObstacleArena, ObstacleVertex};
use crate::SimulatorError;

/// The simulation: agents, obstacles, spatial indices, the default agent
/// template, tick length, and global time.
///
/// Agents and obstacle vertices are addressed by their insertion index; ids
/// are stable for the life of the simulator and nothing is ever removed short
/// of [`clear`](Simulator::clear).
#[derive(Debug)]
pub struct Simulator {
    agents: Vec<Agent>,
    obstacles: ObstacleArena,
    agent_tree: AgentKdTree,
    obstacle_tree: ObstacleBsp,
    defaults: Option<AgentDefaults>,
    time_step: f64,
    global_time: f64,
    agent_tree_dirty: bool,
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            agents: Vec::new(),
            obstacles: ObstacleArena::default(),
            agent_tree: AgentKdTree::default(),
            obstacle_tree: ObstacleBsp::default(),
            defaults: None,
            time_step: 0.1,
            global_time: 0.0,
            agent_tree_dirty: true,
        }
    }

    /// Set the template used by [`add_agent`](Simulator::add_agent).
    pub fn set_agent_defaults(&mut self, defaults: AgentDefaults) {
        self.defaults = Some(defaults);
    }

    pub fn set_time_step(&mut self, time_step: f64) {
        self.time_step = time_step;
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn global_time(&self) -> f64 {
        self.global_time
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn obstacle_vertex_count(&self) -> usize {
        self.obstacles.len()
    }

    /// Drop all agents, obstacles, both indices, and the default template,
    /// and reset global time. The tick length is kept.
    pub fn clear(&mut self) {
        self.agents.clear();
        self.obstacles.clear();
        self.agent_tree = AgentKdTree::default();
        self.obstacle_tree = ObstacleBsp::default();
        self.defaults = None;
        self.global_time = 0.0;
        self.agent_tree_dirty = true;
    }

    /// Add an agent from the default template. Fails if no defaults have
    /// been set since construction or the last [`clear`](Simulator::clear).
    pub fn add_agent(&mut self, position: Vec2) -> Result<usize, SimulatorError> {
        let defaults = self.defaults.ok_or(SimulatorError::MissingDefaults)?;
        Ok(self.push_agent(position, &defaults))
    }

    /// Add an agent with explicit parameters, bypassing the template.
    pub fn add_agent_with_params(&mut self, position: Vec2, params: AgentDefaults) -> usize {
        self.push_agent(position, &params)
    }

    fn push_agent(&mut self, position: Vec2, params: &AgentDefaults) -> usize {
        let id = self.agents.len();
        self.agents.push(Agent::new(id, position, params));
        self.agent_tree_dirty = true;
        id
    }

    /// Append a polygonal obstacle and return the id of its first vertex.
    ///
    /// Vertices of a blocking polygon are expected in counterclockwise
    /// order; two vertices describe a wall that blocks from both sides.
    pub fn add_obstacle(&mut self, vertices: &[Vec2]) -> Result<usize, SimulatorError> {
        self.obstacles.add_polygon(vertices)
    }

    /// Build the obstacle BSP from every obstacle added so far.
    ///
    /// Must run before stepping or visibility queries see the obstacles.
    /// Straddling edges are split, which can grow the vertex list; the
    /// obstacle set is frozen afterwards.
    pub fn process_obstacles(&mut self) {
        self.obstacle_tree = ObstacleBsp::build(&mut self.obstacles);
    }

    /// Whether the segment between two points, inflated by `radius`, is free
    /// of obstacle edges. Meaningful only after
    /// [`process_obstacles`](Simulator::process_obstacles).
    pub fn query_visibility(&self, point1: Vec2, point2: Vec2, radius: f64) -> bool {
        self.obstacle_tree
            .query_visibility(&self.obstacles, point1, point2, radius)
    }

    /// Advance the simulation by one tick and return the new global time.
    ///
    /// The neighbor-gathering and velocity-solving phase reads only pre-tick
    /// positions and velocities; the commit phase then writes them all at
    /// once, so the outcome does not depend on agent order.
    pub fn do_step(&mut self) -> f64 {
        self.agent_tree.build(&self.agents);
        self.agent_tree_dirty = false;

        for i in 0..self.agents.len() {
            self.compute_neighbors(i);
            self.compute_new_velocity(i);
        }

        let dt = self.time_step;
        for agent in &mut self.agents {
            agent.velocity = agent.new_velocity;
            agent.position = agent.position + agent.velocity * dt;
        }
        self.agent_tree_dirty = true;

        self.global_time += dt;
        self.global_time
    }

    fn compute_neighbors(&mut self, i: usize) {
        let mut obstacle_neighbors = std::mem::take(&mut self.agents[i].obstacle_neighbors);
        obstacle_neighbors.clear();
        let agent = &self.agents[i];
        let range_sq = sqr(agent.time_horizon_obst * agent.max_speed + agent.radius);
        self.obstacle_tree.query_neighbors(
            &self.obstacles,
            agent.position,
            range_sq,
            &mut obstacle_neighbors,
        );
        self.agents[i].obstacle_neighbors = obstacle_neighbors;

        let mut agent_neighbors = std::mem::take(&mut self.agents[i].agent_neighbors);
        agent_neighbors.clear();
        let max_neighbors = self.agents[i].max_neighbors;
        if max_neighbors > 0 {
            let mut range_sq = sqr(self.agents[i].neighbor_dist);
            self.agent_tree.query_neighbors(
                &self.agents,
                i,
                &mut range_sq,
                max_neighbors,
                &mut agent_neighbors,
            );
        }
        self.agents[i].agent_neighbors = agent_neighbors;
    }

    fn compute_new_velocity(&mut self, i: usize) {
        let mut lines = std::mem::take(&mut self.agents[i].orca_lines);
        let velocity = self.agents[i].compute_new_velocity(
            &self.agents,
            &self.obstacles,
            self.time_step,
            &mut lines,
        );
        let agent = &mut self.agents[i];
        agent.orca_lines = lines;
        agent.new_velocity = velocity;
    }

    /// Ids of all agents strictly within `range` of `point`, ascending.
    ///
    /// Reuses the agent k-D tree, rebuilding it first when positions have
    /// changed since it was last built.
    pub fn agents_within(&mut self, point: Vec2, range: f64) -> Vec<usize> {
        if self.agent_tree_dirty {
            self.agent_tree.build(&self.agents);
            self.agent_tree_dirty = false;
        }
        let mut out = Vec::new();
        self.agent_tree
            .query_within(&self.agents, point, sqr(range), &mut out);
        out.sort_unstable();
        out
    }

    // Per-agent state. Indexing with an id that was never returned from
    // add_agent panics.

    pub fn agent_position(&self, agent_no: usize) -> Vec2 {
        self.agents[agent_no].position
    }

    pub fn set_agent_position(&mut self, agent_no: usize, position: Vec2) {
        self.agents[agent_no].position = position;
        self.agent_tree_dirty = true;
    }

    pub fn agent_velocity(&self, agent_no: usize) -> Vec2 {
        self.agents[agent_no].velocity
    }

    pub fn set_agent_velocity(&mut self, agent_no: usize, velocity: Vec2) {
        self.agents[agent_no].velocity = velocity;
    }

    pub fn agent_pref_velocity(&self, agent_no: usize) -> Vec2 {
        self.agents[agent_no].pref_velocity
    }

    pub fn set_agent_pref_velocity(&mut self, agent_no: usize, velocity: Vec2) {
        self.agents[agent_no].pref_velocity = velocity;
    }

    pub fn agent_radius(&self, agent_no: usize) -> f64 {
        self.agents[agent_no].radius
    }

    pub fn set_agent_radius(&mut self, agent_no: usize, radius: f64) {
        self.agents[agent_no].radius = radius;
    }

    pub fn agent_max_speed(&self, agent_no: usize) -> f64 {
        self.agents[agent_no].max_speed
    }

    pub fn set_agent_max_speed(&mut self, agent_no: usize, max_speed: f64) {
        self.agents[agent_no].max_speed = max_speed;
    }

    pub fn agent_neighbor_dist(&self, agent_no: usize) -> f64 {
        self.agents[agent_no].neighbor_dist
    }

    pub fn set_agent_neighbor_dist(&mut self, agent_no: usize, neighbor_dist: f64) {
        self.agents[agent_no].neighbor_dist = neighbor_dist;
    }

    pub fn agent_max_neighbors(&self, agent_no: usize) -> usize {
        self.agents[agent_no].max_neighbors
    }

    pub fn set_agent_max_neighbors(&mut self, agent_no: usize, max_neighbors: usize) {
        self.agents[agent_no].max_neighbors = max_neighbors;
    }

    pub fn agent_time_horizon(&self, agent_no: usize) -> f64 {
        self.agents[agent_no].time_horizon
    }

    pub fn set_agent_time_horizon(&mut self, agent_no: usize, time_horizon: f64) {
        self.agents[agent_no].time_horizon = time_horizon;
    }

    pub fn agent_time_horizon_obst(&self, agent_no: usize) -> f64 {
        self.agents[agent_no].time_horizon_obst
    }

    pub fn set_agent_time_horizon_obst(&mut self, agent_no: usize, time_horizon_obst: f64) {
        self.agents[agent_no].time_horizon_obst = time_horizon_obst;
    }

    // Introspection into the last tick's neighbor lists and constraints.

    pub fn agent_neighbor_count(&self, agent_no: usize) -> usize {
        self.agents[agent_no].agent_neighbors.len()
    }

    /// Id of the `neighbor_no`-th nearest agent neighbor from the last tick.
    pub fn agent_neighbor(&self, agent_no: usize, neighbor_no: usize) -> usize {
        self.agents[agent_no].agent_neighbors[neighbor_no].1
    }

    pub fn agent_obstacle_neighbor_count(&self, agent_no: usize) -> usize {
        self.agents[agent_no].obstacle_neighbors.len()
    }

    /// First vertex id of the `neighbor_no`-th nearest obstacle edge from the
    /// last tick.
    pub fn agent_obstacle_neighbor(&self, agent_no: usize, neighbor_no: usize) -> usize {
        self.agents[agent_no].obstacle_neighbors[neighbor_no].1 as usize
    }

    pub fn agent_orca_line_count(&self, agent_no: usize) -> usize {
        self.agents[agent_no].orca_lines.len()
    }

    pub fn agent_orca_line(&self, agent_no: usize, line_no: usize) -> Line {
        self.agents[agent_no].orca_lines[line_no]
    }

    // Obstacle vertices and polygon-chain navigation.

    pub fn obstacle_vertex(&self, vertex_no: usize) -> ObstacleVertex {
        *self.obstacles.get(vertex_no as u32)
    }

    /// Move an obstacle vertex. Only meaningful before
    /// [`process_obstacles`](Simulator::process_obstacles); the BSP is not
    /// rebuilt.
    pub fn set_obstacle_vertex(&mut self, vertex_no: usize, point: Vec2) {
        self.obstacles.set_point(vertex_no as u32, point);
    }

    pub fn next_vertex_no(&self, vertex_no: usize) -> usize {
        self.obstacles.next_no(vertex_no as u32) as usize
    }

    pub fn prev_vertex_no(&self, vertex_no: usize) -> usize {
        self.obstacles.prev_no(vertex_no as u32) as usize
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
