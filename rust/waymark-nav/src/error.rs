//! Error types for the navigation stack

use thiserror::Error;

/// Result type for navigation operations
pub type NavResult<T> = Result<T, NavError>;

/// Errors from planning and navigation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    /// Goal is out of bounds or colliding and could not be repaired
    #[error("goal ({x:.2}, {y:.2}) is invalid and could not be repaired")]
    GoalInvalid { x: f64, y: f64 },

    /// A* exhausted its open set without reaching the goal
    #[error("global planner found no path")]
    PlannerFailure,

    /// Local-planner recovery gave up
    #[error("navigation failed after recovery exhausted")]
    NavigationFailed,

    /// No costmap sample is available for planning
    #[error("no costmap available")]
    CostmapUnavailable,

    /// Planner configuration failed validation
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    World(#[from] waymark_world::WorldError),

    #[error(transparent)]
    Stream(#[from] waymark_stream::StreamError),
}
