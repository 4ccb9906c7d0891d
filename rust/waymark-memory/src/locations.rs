//! Named robot locations ("kitchen", "charging dock") kept beside the
//! vector store and persisted as `locations.json`.

use crate::error::MemoryResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use waymark_world::Vector;

/// A remembered pose with a human name. Names are unique
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotLocation {
    pub name: String,
    pub position: Vector,
    pub rotation: Vector,
}

impl RobotLocation {
    pub fn new(name: impl Into<String>, position: Vector, rotation: Vector) -> Self {
        Self {
            name: name.into(),
            position,
            rotation,
        }
    }
}

/// Persistent registry of named locations.
pub struct LocationRegistry {
    path: PathBuf,
    locations: RwLock<Vec<RobotLocation>>,
}

impl LocationRegistry {
    /// Load the registry; a missing file starts empty.
    pub fn load(path: &Path) -> MemoryResult<Self> {
        let locations = if path.exists() {
            serde_json::from_slice(&std::fs::read(path)?)?
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            locations: RwLock::new(locations),
        })
    }

    /// Add or replace a location (matched case-insensitively) and
    /// persist the registry.
    pub fn add(&self, location: RobotLocation) -> MemoryResult<()> {
        {
            let mut locations = self.locations.write();
            let lowered = location.name.to_lowercase();
            locations.retain(|l| l.name.to_lowercase() != lowered);
            locations.push(location.clone());
        }
        self.persist()?;
        info!(name = %location.name, "saved robot location");
        Ok(())
    }

    /// Case-insensitive lookup.
    pub fn find(&self, name: &str) -> Option<RobotLocation> {
        let lowered = name.to_lowercase();
        self.locations
            .read()
            .iter()
            .find(|l| l.name.to_lowercase() == lowered)
            .cloned()
    }

    pub fn all(&self) -> Vec<RobotLocation> {
        self.locations.read().clone()
    }

    pub fn clear(&self) -> MemoryResult<()> {
        self.locations.write().clear();
        self.persist()
    }

    fn persist(&self) -> MemoryResult<()> {
        let json = serde_json::to_vec_pretty(&*self.locations.read())?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
