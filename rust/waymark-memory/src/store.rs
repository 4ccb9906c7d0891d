//! Embedding vector store.
//!
//! Entries are append-only `(id, embedding, metadata)` rows in a sled
//! tree. Nearest-neighbor queries use cosine distance; the collection
//! sizes this runtime produces (thousands of frames per building) keep a
//! linear scan well inside the query budget.

use crate::error::MemoryResult;
use serde::{Deserialize, Serialize};

/// Pose metadata stored alongside every frame embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub pos_x: f64,
    pub pos_y: f64,
    pub pos_z: f64,
    pub rot_x: f64,
    pub rot_y: f64,
    pub rot_z: f64,
    /// Capture time, seconds since the epoch.
    pub timestamp: f64,
    pub frame_id: String,
}

/// One nearest-neighbor result.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub metadata: FrameMetadata,
    /// Cosine distance for embedding queries, meters for location queries.
    pub distance: f64,
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    embedding: Vec<f32>,
    metadata: FrameMetadata,
}

/// Sled-backed embedding store.
pub struct VectorStore {
    _db: sled::Db,
    tree: sled::Tree,
}

impl VectorStore {
    pub fn open(path: &std::path::Path) -> MemoryResult<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree("spatial_memory")?;
        Ok(Self { _db: db, tree })
    }

    /// Append one entry. Ids are never overwritten in practice; a repeat
    /// id replaces the row.
    pub fn add(&self, id: &str, embedding: &[f32], metadata: &FrameMetadata) -> MemoryResult<()> {
        let record = StoredRecord {
            embedding: embedding.to_vec(),
            metadata: metadata.clone(),
        };
        self.tree.insert(id.as_bytes(), bincode::serialize(&record)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// k-NN by cosine distance.
    pub fn query_by_embedding(&self, embedding: &[f32], k: usize) -> MemoryResult<Vec<VectorHit>> {
        let mut hits = Vec::new();
        for row in self.tree.iter() {
            let (key, value) = row?;
            let record: StoredRecord = bincode::deserialize(&value)?;
            hits.push(VectorHit {
                id: String::from_utf8_lossy(&key).into_owned(),
                distance: cosine_distance(embedding, &record.embedding),
                metadata: record.metadata,
            });
        }
        sort_and_truncate(&mut hits, k);
        Ok(hits)
    }

    /// All entries within `radius` meters of `(x, y)`, closest first.
    pub fn query_by_location(
        &self,
        x: f64,
        y: f64,
        radius: f64,
        k: usize,
    ) -> MemoryResult<Vec<VectorHit>> {
        let mut hits = Vec::new();
        for row in self.tree.iter() {
            let (key, value) = row?;
            let record: StoredRecord = bincode::deserialize(&value)?;
            let dx = record.metadata.pos_x - x;
            let dy = record.metadata.pos_y - y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance <= radius {
                hits.push(VectorHit {
                    id: String::from_utf8_lossy(&key).into_owned(),
                    distance,
                    metadata: record.metadata,
                });
            }
        }
        sort_and_truncate(&mut hits, k);
        Ok(hits)
    }

    /// Drop every entry.
    pub fn wipe(&self) -> MemoryResult<()> {
        self.tree.clear()?;
        Ok(())
    }
}

fn sort_and_truncate(hits: &mut Vec<VectorHit>, k: usize) {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let na: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if na < 1e-12 || nb < 1e-12 {
        return 1.0;
    }
    1.0 - dot / (na * nb)
}
