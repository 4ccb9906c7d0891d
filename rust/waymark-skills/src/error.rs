//! Error types for the skill runtime

use thiserror::Error;

/// Result type for skill operations
pub type SkillResult<T> = Result<T, SkillError>;

/// Errors from skill registration and invocation
#[derive(Error, Debug, Clone)]
pub enum SkillError {
    /// No skill registered under this name
    #[error("skill '{name}' not found")]
    NotFound { name: String },

    /// Arguments did not match the skill's parameter table
    #[error("invalid arguments for '{name}': {message}")]
    InvalidArguments { name: String, message: String },

    /// The skill ran and failed
    #[error("skill '{name}' failed: {message}")]
    Execution { name: String, message: String },

    /// A required collaborator (agent, robot, pipeline) is missing
    #[error("skill '{name}' is missing a dependency: {message}")]
    MissingDependency { name: String, message: String },
}

impl SkillError {
    pub fn execution(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            name: name.into(),
            message: message.into(),
        }
    }
}
