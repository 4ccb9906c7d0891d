//! Two-layer navigation stack.
//!
//! The global layer runs A* over a smudged costmap and produces a
//! waypoint [`Path`](waymark_world::Path); the local layer follows goals
//! or waypoints at 10 Hz with a Vector Field Histogram for obstacle
//! avoidance and pure pursuit for tracking, including stuck detection
//! and recovery. The facade drives the local planner until success,
//! timeout or failure, always stopping the robot on the way out.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod control;
pub mod error;
pub mod facade;
pub mod global;
pub mod local;

pub use control::{CostmapProvider, VelocityCommand, VelocityControl, VelocitySink};
pub use error::{NavError, NavResult};
pub use facade::{navigate_path_local, navigate_to_goal_global, navigate_to_goal_local};
pub use global::{astar, find_nearest_free_cell, AstarConfig};
pub use local::{LocalPlannerConfig, VfhPurePursuitPlanner};
