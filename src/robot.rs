//! The assembled robot: transport streams, transforms, planners,
//! spatial memory and the skill library in one capability bundle.

use crate::config::RuntimeConfig;
use crate::transport::{Transport, TransportSources};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use waymark_memory::{EmbeddingProvider, RandomEmbedding, SpatialMemory};
use waymark_nav::facade::{navigate_to_goal_global, plan_global};
use waymark_nav::{
    AstarConfig, CostmapProvider, VelocityControl, VfhPurePursuitPlanner,
};
use waymark_skills::{
    register_robot_skills, AgentShell, AudioPipeline, AudioQueue, ObserveStreamSkill, Reasoner,
    RobotHandle, SkillLibrary, SpeakSkill,
};
use waymark_stream::{CancelToken, Subscriber, Topic};
use waymark_world::{
    Costmap, Frame, Path, SmudgeParams, Transform, TransformSource, TransformTree, Vector,
};

/// Errors assembling the robot runtime
#[derive(Error, Debug)]
pub enum RobotError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Memory(#[from] waymark_memory::MemoryError),

    #[error(transparent)]
    Nav(#[from] waymark_nav::NavError),
}

/// Latest-costmap cache: the held subscription keeps the producer
/// alive, `latest` is a non-blocking snapshot.
struct TopicCostmap {
    sub: Subscriber<Costmap>,
}

impl CostmapProvider for TopicCostmap {
    fn latest(&self) -> Option<Costmap> {
        self.sub.peek()
    }
}

/// A running robot runtime.
pub struct Robot {
    config: RuntimeConfig,
    video: Topic<Frame>,
    transforms: Arc<TransformTree>,
    velocity: VelocityControl,
    planner: Arc<Mutex<VfhPurePursuitPlanner>>,
    costmap: Arc<dyn CostmapProvider>,
    memory: Arc<SpatialMemory>,
    library: Arc<SkillLibrary>,
    cancel: CancelToken,
}

impl Robot {
    /// Assemble and start the runtime over a transport.
    ///
    /// Spawns the odometry-to-transform bridge and, unless
    /// `skip_build` is set, continuous spatial-memory ingestion.
    pub fn start(
        config: RuntimeConfig,
        transport: &dyn Transport,
        embedding: Option<Arc<dyn EmbeddingProvider>>,
        new_memory: bool,
        skip_build: bool,
    ) -> Result<Arc<Self>, RobotError> {
        config.validate()?;
        let TransportSources {
            video,
            odometry,
            costmap,
        } = transport.sources();

        let transforms = Arc::new(TransformTree::new());
        transforms.set_transform("map", "odom", Transform::identity());
        transforms.set_transform("odom", "base_link", Transform::identity());

        let cancel = CancelToken::new();

        // Bridge: odometry samples keep the odom -> base_link edge
        // fresh for everyone reading poses.
        {
            let transforms = transforms.clone();
            let cancel = cancel.child();
            let mut sub = odometry.subscribe();
            tokio::spawn(async move {
                loop {
                    let sample = tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = sub.recv() => match received {
                            Ok(sample) => sample,
                            Err(e) => {
                                warn!(error = %e, "odometry stream ended");
                                break;
                            }
                        },
                    };
                    transforms.set_transform(
                        "odom",
                        "base_link",
                        Transform::new(sample.position.clone(), sample.orientation),
                    );
                }
            });
        }

        let costmap: Arc<dyn CostmapProvider> = Arc::new(TopicCostmap {
            sub: costmap.subscribe(),
        });

        let velocity = VelocityControl::new(
            transport.velocity_sink(),
            config.planner.max_linear_vel,
            config.planner.max_angular_vel,
        );

        let planner = Arc::new(Mutex::new(VfhPurePursuitPlanner::new(
            config.planner.clone(),
            costmap.clone(),
            transforms.clone(),
        )?));

        let embedding = embedding.unwrap_or_else(|| {
            warn!("no embedding provider wired; spatial queries will be untrained");
            Arc::new(RandomEmbedding::new(config.memory.embedding_dimensions))
        });
        let memory = Arc::new(SpatialMemory::open(
            &config.spatial_memory_dir,
            config.memory.clone(),
            embedding,
            new_memory,
        )?);

        let robot = Arc::new(Self {
            config,
            video: video.clone(),
            transforms,
            velocity,
            planner,
            costmap,
            memory,
            library: SkillLibrary::new(),
            cancel,
        });

        register_robot_skills(&robot.library, robot.clone());

        if skip_build {
            info!("spatial-memory ingestion disabled");
        } else {
            let memory = robot.memory.clone();
            let transforms = robot.transforms();
            let cancel = robot.cancel.child();
            tokio::spawn(async move {
                memory.run(video, transforms, cancel).await;
            });
        }

        info!("robot runtime started");
        Ok(robot)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<SkillLibrary> {
        &self.library
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Plan a global path from the current pose.
    pub fn plan_to(&self, goal: &Vector) -> Option<Path> {
        plan_global(
            self.transforms.as_ref(),
            self.costmap.as_ref(),
            goal,
            &self.config.smudge,
            &self.config.astar,
        )
        .ok()
        .flatten()
    }

    /// Global plan + local follow to an odom-frame goal.
    pub async fn navigate_to(
        &self,
        goal: Vector,
        goal_theta: Option<f64>,
        timeout: Duration,
    ) -> bool {
        navigate_to_goal_global(
            self.planner.as_ref(),
            &self.velocity,
            self.transforms.as_ref(),
            self.costmap.as_ref(),
            goal,
            goal_theta,
            &self.config.smudge,
            &self.config.astar,
            timeout,
            &self.cancel.child(),
        )
        .await
    }

    /// Wire an external reasoner: build the agent shell and register
    /// the agent-dependent skills (the observer).
    pub fn attach_agent(self: &Arc<Self>, reasoner: Arc<dyn Reasoner>) -> Arc<AgentShell> {
        let shell = AgentShell::new(reasoner, self.library.clone());
        self.library.register(
            ObserveStreamSkill::descriptor(),
            ObserveStreamSkill::factory(self.video.clone(), shell.clone(), &self.library),
        );
        info!("agent shell attached");
        shell
    }

    /// Wire a TTS pipeline: start the serialized audio queue and
    /// register the speak skill.
    pub fn attach_audio(self: &Arc<Self>, pipeline: Arc<dyn AudioPipeline>) -> Arc<AudioQueue> {
        let queue = AudioQueue::start(pipeline);
        self.library
            .register(SpeakSkill::descriptor(), SpeakSkill::factory(queue.clone()));
        info!("audio queue attached");
        queue
    }

    /// Cancel all workers, stop the base and flush memory.
    pub fn shutdown(&self) {
        info!("shutting down robot runtime");
        self.cancel.cancel();
        self.velocity.stop();
        if let Err(e) = self.memory.save() {
            warn!(error = %e, "failed to save spatial memory on shutdown");
        }
    }
}

impl RobotHandle for Robot {
    fn velocity(&self) -> &VelocityControl {
        &self.velocity
    }

    fn transforms(&self) -> Arc<dyn TransformSource> {
        self.transforms.clone()
    }

    fn memory(&self) -> Arc<SpatialMemory> {
        self.memory.clone()
    }

    fn local_planner(&self) -> Arc<Mutex<VfhPurePursuitPlanner>> {
        self.planner.clone()
    }

    fn costmap(&self) -> Arc<dyn CostmapProvider> {
        self.costmap.clone()
    }

    fn video(&self) -> Topic<Frame> {
        self.video.clone()
    }

    fn smudge_params(&self) -> SmudgeParams {
        self.config.smudge
    }

    fn astar_config(&self) -> AstarConfig {
        self.config.astar
    }
}
