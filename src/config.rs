//! Runtime configuration: TOML file over defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use waymark_memory::MemoryConfig;
use waymark_nav::{AstarConfig, LocalPlannerConfig};
use waymark_world::SmudgeParams;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_spatial_memory_dir() -> PathBuf {
    PathBuf::from("assets/spatial_memory")
}

/// Full runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Root of persisted spatial-memory state.
    #[serde(default = "default_spatial_memory_dir")]
    pub spatial_memory_dir: PathBuf,

    #[serde(default)]
    pub planner: LocalPlannerConfig,

    #[serde(default)]
    pub astar: AstarConfig,

    /// Costmap conservatism applied before global planning.
    #[serde(default)]
    pub smudge: SmudgeParams,

    #[serde(default)]
    pub memory: MemoryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            spatial_memory_dir: default_spatial_memory_dir(),
            planner: LocalPlannerConfig::default(),
            astar: AstarConfig::default(),
            smudge: SmudgeParams::default(),
            memory: MemoryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.planner.validate().map_err(ConfigError::Invalid)?;
        if self.memory.min_interval < 0.0 || self.memory.min_distance < 0.0 {
            return Err(ConfigError::Invalid(
                "memory gating thresholds must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Load configuration: file when given (and it exists), defaults
/// otherwise.
pub fn load_config(path: Option<&Path>) -> Result<RuntimeConfig, ConfigError> {
    let config = match path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        }
        _ => RuntimeConfig::default(),
    };
    config.validate()?;
    Ok(config)
}
