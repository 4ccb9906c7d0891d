//! The spatial-memory pipeline: gate, embed, persist, query.

use crate::embedding::{random_unit_embedding, EmbeddingProvider};
use crate::error::MemoryResult;
use crate::locations::{LocationRegistry, RobotLocation};
use crate::store::{FrameMetadata, VectorHit, VectorStore};
use crate::visual::ImageStore;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use waymark_stream::{CancelToken, Topic};
use waymark_world::{Frame, TransformSource, Vector};

/// Ingestion gating and sizing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Minimum travel in meters before a new frame is stored.
    pub min_distance: f64,
    /// Minimum seconds between stored frames.
    pub min_interval: f64,
    /// Snapshot the image store every this many stored frames.
    pub flush_every: u64,
    /// Embedding dimensionality of the wired provider.
    pub embedding_dimensions: usize,
    /// Frame the robot pose is recorded in.
    pub pose_frame: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            min_distance: 0.01,
            min_interval: 1.0,
            flush_every: 100,
            embedding_dimensions: 512,
            pose_frame: "map".to_string(),
        }
    }
}

/// A query result: metadata plus the stored raw image when available.
#[derive(Debug, Clone)]
pub struct SpatialQueryHit {
    pub id: String,
    pub metadata: FrameMetadata,
    pub distance: f64,
    pub image: Option<Vec<u8>>,
}

struct IngestState {
    last_position: Option<Vector>,
    last_record: Option<Instant>,
    frame_count: u64,
    stored_count: u64,
}

/// Builds and queries the robot's semantic map.
pub struct SpatialMemory {
    config: MemoryConfig,
    provider: Arc<dyn EmbeddingProvider>,
    vectors: VectorStore,
    images: ImageStore,
    locations: LocationRegistry,
    visual_path: PathBuf,
    state: Mutex<IngestState>,
}

impl SpatialMemory {
    /// Open (or create) the persisted memory under `root`:
    /// `vector_store/`, `visual_memory.bin` and `locations.json`.
    /// `new_memory` wipes all three first.
    pub fn open(
        root: &Path,
        config: MemoryConfig,
        provider: Arc<dyn EmbeddingProvider>,
        new_memory: bool,
    ) -> MemoryResult<Self> {
        std::fs::create_dir_all(root)?;
        let vector_path = root.join("vector_store");
        let visual_path = root.join("visual_memory.bin");
        let locations_path = root.join("locations.json");

        if new_memory {
            info!(?root, "creating new spatial memory, clearing persisted state");
            if vector_path.exists() {
                std::fs::remove_dir_all(&vector_path)?;
            }
            if visual_path.exists() {
                std::fs::remove_file(&visual_path)?;
            }
            if locations_path.exists() {
                std::fs::remove_file(&locations_path)?;
            }
        }

        let vectors = VectorStore::open(&vector_path)?;
        let images = ImageStore::load(&visual_path)?;
        let locations = LocationRegistry::load(&locations_path)?;
        if !new_memory && images.count() > 0 {
            info!(images = images.count(), entries = vectors.len(), "loaded spatial memory");
        }

        Ok(Self {
            config,
            provider,
            vectors,
            images,
            locations,
            visual_path,
            state: Mutex::new(IngestState {
                last_position: None,
                last_record: None,
                frame_count: 0,
                stored_count: 0,
            }),
        })
    }

    /// Consider one (frame, pose) pair for storage.
    ///
    /// Returns the stored frame id, or `None` when the gate rejected it.
    pub async fn ingest(
        &self,
        frame: &Frame,
        position: &Vector,
        rotation: &Vector,
    ) -> MemoryResult<Option<String>> {
        {
            let mut state = self.state.lock();
            state.frame_count += 1;

            if let Some(last) = &state.last_position {
                if last.distance(position) < self.config.min_distance {
                    debug!("position has not moved, skipping frame");
                    return Ok(None);
                }
            }
            if let Some(last) = state.last_record {
                if last.elapsed().as_secs_f64() < self.config.min_interval {
                    debug!("too soon since last stored frame, skipping");
                    return Ok(None);
                }
            }
        }

        let embedding = match self.provider.embed_image(frame).await {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "embedding failed, storing random unit vector");
                random_unit_embedding(self.config.embedding_dimensions)
            }
        };

        let frame_id = next_frame_id();
        let now = Utc::now();
        let metadata = FrameMetadata {
            pos_x: position.x(),
            pos_y: position.y(),
            pos_z: position.z(),
            rot_x: rotation.x(),
            rot_y: rotation.y(),
            rot_z: rotation.z(),
            timestamp: now.timestamp_millis() as f64 / 1000.0,
            frame_id: frame_id.clone(),
        };

        self.vectors.add(&frame_id, &embedding, &metadata)?;
        self.images.add(&frame_id, frame.data.clone());

        let stored = {
            let mut state = self.state.lock();
            state.last_position = Some(position.clone());
            state.last_record = Some(Instant::now());
            state.stored_count += 1;
            state.stored_count
        };

        debug!(%frame_id, stored, "stored spatial frame");
        if stored % self.config.flush_every == 0 {
            if let Err(e) = self.save() {
                warn!(error = %e, "failed to flush visual memory");
            }
        }

        Ok(Some(frame_id))
    }

    /// Drive ingestion from the video topic until cancelled.
    ///
    /// Frames without an available pose are skipped; store failures skip
    /// the frame and keep the pipeline running.
    pub async fn run(
        &self,
        video: Topic<Frame>,
        transforms: Arc<dyn TransformSource>,
        cancel: CancelToken,
    ) {
        let mut sub = video.subscribe();
        info!("continuous spatial-memory ingestion started");
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                received = sub.recv() => match received {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "video stream ended, stopping ingestion");
                        break;
                    }
                },
            };

            let (position, rotation) =
                match transforms.transform_euler("base_link", &self.config.pose_frame) {
                    Ok(pose) => pose,
                    Err(_) => {
                        debug!("no pose available, skipping frame");
                        continue;
                    }
                };

            if let Err(e) = self.ingest(&frame, &position, &rotation).await {
                warn!(error = %e, "failed to store frame, continuing");
            }
        }
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to save visual memory on shutdown");
        }
        info!("spatial-memory ingestion stopped");
    }

    /// k-NN over stored embeddings.
    pub fn query_by_embedding(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> MemoryResult<Vec<SpatialQueryHit>> {
        Ok(self.attach_images(self.vectors.query_by_embedding(embedding, k)?))
    }

    /// Text query through the joint image/text encoder.
    pub async fn query_by_text(&self, text: &str, k: usize) -> MemoryResult<Vec<SpatialQueryHit>> {
        info!(%text, "querying spatial memory by text");
        let embedding = match self.provider.embed_text(text).await {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "text embedding failed, using random vector");
                random_unit_embedding(self.config.embedding_dimensions)
            }
        };
        self.query_by_embedding(&embedding, k)
    }

    /// Similarity query from an example image.
    pub async fn query_by_image(
        &self,
        frame: &Frame,
        k: usize,
    ) -> MemoryResult<Vec<SpatialQueryHit>> {
        let embedding = match self.provider.embed_image(frame).await {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "image embedding failed, using random vector");
                random_unit_embedding(self.config.embedding_dimensions)
            }
        };
        self.query_by_embedding(&embedding, k)
    }

    /// Stored frames within `radius` meters of `(x, y)`.
    pub fn query_by_location(
        &self,
        x: f64,
        y: f64,
        radius: f64,
        k: usize,
    ) -> MemoryResult<Vec<SpatialQueryHit>> {
        Ok(self.attach_images(self.vectors.query_by_location(x, y, radius, k)?))
    }

    pub fn add_location(&self, location: RobotLocation) -> MemoryResult<()> {
        self.locations.add(location)
    }

    pub fn find_location(&self, name: &str) -> Option<RobotLocation> {
        self.locations.find(name)
    }

    pub fn robot_locations(&self) -> Vec<RobotLocation> {
        self.locations.all()
    }

    /// Snapshot the image store to disk.
    pub fn save(&self) -> MemoryResult<()> {
        self.images.save(&self.visual_path)?;
        debug!(images = self.images.count(), "visual memory saved");
        Ok(())
    }

    pub fn stored_count(&self) -> u64 {
        self.state.lock().stored_count
    }

    pub fn frame_count(&self) -> u64 {
        self.state.lock().frame_count
    }

    pub fn entry_count(&self) -> usize {
        self.vectors.len()
    }

    fn attach_images(&self, hits: Vec<VectorHit>) -> Vec<SpatialQueryHit> {
        hits.into_iter()
            .map(|hit| SpatialQueryHit {
                image: self.images.get(&hit.id),
                id: hit.id,
                metadata: hit.metadata,
                distance: hit.distance,
            })
            .collect()
    }
}

fn next_frame_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "frame_{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{FailingEmbedding, RandomEmbedding};

    fn frame() -> Frame {
        Frame::new(2, 2, vec![10; 12], 0.0).unwrap()
    }

    fn open_memory(dir: &Path, config: MemoryConfig) -> SpatialMemory {
        SpatialMemory::open(dir, config, Arc::new(RandomEmbedding::new(16)), true).unwrap()
    }

    #[tokio::test]
    async fn gating_stores_one_of_many_static_frames() {
        let dir = tempfile::tempdir().unwrap();
        let memory = open_memory(
            dir.path(),
            MemoryConfig {
                min_distance: 0.01,
                min_interval: 1.0,
                embedding_dimensions: 16,
                ..MemoryConfig::default()
            },
        );

        let rotation = Vector::xyz(0.0, 0.0, 0.0);
        let mut stored = 0;
        for i in 0..100 {
            // All positions within a millimeter of the origin.
            let position = Vector::xyz(0.0005 * (i % 2) as f64, 0.0, 0.0);
            if memory
                .ingest(&frame(), &position, &rotation)
                .await
                .unwrap()
                .is_some()
            {
                stored += 1;
            }
        }

        assert_eq!(stored, 1);
        assert_eq!(memory.stored_count(), 1);
        assert_eq!(memory.frame_count(), 100);
    }

    #[tokio::test]
    async fn movement_past_gate_stores_again() {
        let dir = tempfile::tempdir().unwrap();
        let memory = open_memory(
            dir.path(),
            MemoryConfig {
                min_distance: 0.5,
                min_interval: 0.0,
                embedding_dimensions: 16,
                ..MemoryConfig::default()
            },
        );

        let rot = Vector::xyz(0.0, 0.0, 0.0);
        assert!(memory
            .ingest(&frame(), &Vector::xyz(0.0, 0.0, 0.0), &rot)
            .await
            .unwrap()
            .is_some());
        assert!(memory
            .ingest(&frame(), &Vector::xyz(0.1, 0.0, 0.0), &rot)
            .await
            .unwrap()
            .is_none());
        assert!(memory
            .ingest(&frame(), &Vector::xyz(1.0, 0.0, 0.0), &rot)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn stored_frame_is_queryable_with_image() {
        let dir = tempfile::tempdir().unwrap();
        let memory = open_memory(
            dir.path(),
            MemoryConfig {
                min_interval: 0.0,
                embedding_dimensions: 16,
                ..MemoryConfig::default()
            },
        );

        let id = memory
            .ingest(
                &frame(),
                &Vector::xyz(3.0, 4.0, 0.0),
                &Vector::xyz(0.0, 0.0, 1.0),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(id.starts_with("frame_"));

        let hits = memory.query_by_location(3.0, 4.0, 1.0, 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
        assert_eq!(hits[0].metadata.pos_x, 3.0);
        assert_eq!(hits[0].image.as_deref(), Some(frame().data.as_slice()));

        assert!(memory
            .query_by_location(30.0, 40.0, 1.0, 5)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_still_stores_frame() {
        let dir = tempfile::tempdir().unwrap();
        let memory = SpatialMemory::open(
            dir.path(),
            MemoryConfig {
                min_interval: 0.0,
                embedding_dimensions: 16,
                ..MemoryConfig::default()
            },
            Arc::new(FailingEmbedding::new(16)),
            true,
        )
        .unwrap();

        let id = memory
            .ingest(
                &frame(),
                &Vector::xyz(0.0, 0.0, 0.0),
                &Vector::xyz(0.0, 0.0, 0.0),
            )
            .await
            .unwrap();
        assert!(id.is_some());
        assert_eq!(memory.entry_count(), 1);
    }

    #[tokio::test]
    async fn new_memory_wipes_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let memory = open_memory(dir.path(), MemoryConfig::default());
            memory
                .ingest(
                    &frame(),
                    &Vector::xyz(0.0, 0.0, 0.0),
                    &Vector::xyz(0.0, 0.0, 0.0),
                )
                .await
                .unwrap();
            memory.save().unwrap();
            assert_eq!(memory.entry_count(), 1);
        }

        let fresh = open_memory(dir.path(), MemoryConfig::default());
        assert_eq!(fresh.entry_count(), 0);
    }
}
