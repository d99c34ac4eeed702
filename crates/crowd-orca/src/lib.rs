//! Optimal Reciprocal Collision Avoidance (ORCA) for disk-shaped agents
//! moving in a plane of static polygonal obstacles.
//!
//! Each tick the [`Simulator`] rebuilds a k-D tree over agent positions,
//! gathers agent and obstacle-edge neighbors for every agent, turns them into
//! half-plane constraints in velocity space, and solves a small linearly
//! constrained program per agent for the velocity closest to its preferred
//! velocity. Positions and velocities are double-buffered, so the result of a
//! tick does not depend on agent iteration order.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

mod agent;
mod bsp;
mod kdtree;
mod linear_program;
mod obstacle;
mod simulator;

pub use agent::AgentDefaults;
pub use linear_program::Line;
pub use obstacle::ObstacleVertex;
pub use simulator::Simulator;

use thiserror::Error;

/// Contract violations reported to the caller.
///
/// A failed call is a no-op; simulator state is never corrupted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorError {
    #[error("agent defaults have not been set")]
    MissingDefaults,
    #[error("an obstacle requires at least two vertices")]
    TooFewVertices,
}
