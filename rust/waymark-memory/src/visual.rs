//! Raw image storage paired with the vector store.
//!
//! Images live in memory keyed by frame id and are snapshotted to a
//! single `visual_memory.bin` file; ingestion flushes the snapshot every
//! hundred stored frames.

use crate::error::MemoryResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;

/// In-memory `{id -> image bytes}` store with durable snapshots.
#[derive(Default)]
pub struct ImageStore {
    images: RwLock<HashMap<String, Vec<u8>>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot; a missing file yields an empty store.
    pub fn load(path: &Path) -> MemoryResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = std::fs::read(path)?;
        let images: HashMap<String, Vec<u8>> = bincode::deserialize(&bytes)?;
        Ok(Self {
            images: RwLock::new(images),
        })
    }

    /// Write a snapshot via a temp file so a crash never truncates the
    /// previous one.
    pub fn save(&self, path: &Path) -> MemoryResult<()> {
        let bytes = bincode::serialize(&*self.images.read())?;
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn add(&self, id: &str, image: Vec<u8>) {
        self.images.write().insert(id.to_string(), image);
    }

    pub fn get(&self, id: &str) -> Option<Vec<u8>> {
        self.images.read().get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.images.read().len()
    }

    pub fn clear(&self) {
        self.images.write().clear();
    }
}
