//! Built-in robot skills: motion primitives, pose capture, navigation
//! and running-skill control.

use crate::error::{SkillError, SkillResult};
use crate::library::{SkillLibrary, TerminateOutcome};
use crate::robot::RobotHandle;
use crate::schema::{ParamKind, ParamSpec, SkillDescriptor};
use crate::skill::{failure_value, success_value, Skill};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{info, warn};
use waymark_memory::RobotLocation;
use waymark_nav::facade::navigate_to_goal_global;
use waymark_stream::CancelToken;
use waymark_world::Vector;

/// Spin rate for the rotate primitives, 45 degrees per second.
const SPIN_SPEED: f64 = std::f64::consts::FRAC_PI_4;

fn bad_args(name: &'static str, e: impl std::fmt::Display) -> SkillError {
    SkillError::InvalidArguments {
        name: name.into(),
        message: e.to_string(),
    }
}

// ---------------------------------------------------------------------
// Motion primitives
// ---------------------------------------------------------------------

#[derive(Deserialize)]
struct MoveParams {
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    yaw: f64,
    #[serde(default)]
    duration: f64,
}

/// Drive with velocity commands, forward positive.
pub struct MoveSkill {
    robot: Arc<dyn RobotHandle>,
    params: MoveParams,
    reverse: bool,
}

impl MoveSkill {
    pub fn descriptor() -> SkillDescriptor {
        SkillDescriptor::new(
            "Move",
            "Move the robot using velocity commands.",
            vec![
                ParamSpec::required("x", ParamKind::Number, "Forward velocity (m/s)."),
                ParamSpec::optional("y", ParamKind::Number, "Left/right velocity (m/s)"),
                ParamSpec::optional("yaw", ParamKind::Number, "Rotational velocity (rad/s)"),
                ParamSpec::optional(
                    "duration",
                    ParamKind::Number,
                    "How long to move (seconds). If 0, command is continuous",
                ),
            ],
        )
    }

    pub fn reverse_descriptor() -> SkillDescriptor {
        SkillDescriptor::new(
            "Reverse",
            "Move the robot backward.",
            vec![
                ParamSpec::required(
                    "x",
                    ParamKind::Number,
                    "Backward velocity (m/s). Positive values move backward.",
                ),
                ParamSpec::optional("y", ParamKind::Number, "Left/right velocity (m/s)"),
                ParamSpec::optional("yaw", ParamKind::Number, "Rotational velocity (rad/s)"),
                ParamSpec::optional(
                    "duration",
                    ParamKind::Number,
                    "How long to move (seconds). If 0, command is continuous",
                ),
            ],
        )
    }

    pub fn factory(
        robot: Arc<dyn RobotHandle>,
        reverse: bool,
    ) -> impl Fn(Value) -> SkillResult<Arc<dyn Skill>> {
        move |args| {
            let params: MoveParams =
                serde_json::from_value(args).map_err(|e| bad_args("Move", e))?;
            Ok(Arc::new(MoveSkill {
                robot: robot.clone(),
                params,
                reverse,
            }) as _)
        }
    }
}

#[async_trait]
impl Skill for MoveSkill {
    async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
        let x = if self.reverse {
            -self.params.x.abs()
        } else {
            self.params.x
        };
        self.robot
            .velocity()
            .move_vel(x, self.params.y, self.params.yaw);
        if self.params.duration > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(self.params.duration)).await;
            self.robot.velocity().stop();
        }
        Ok(success_value(format!(
            "moving with x={x:.2} y={:.2} yaw={:.2}",
            self.params.y, self.params.yaw
        )))
    }

    async fn stop(&self) {
        self.robot.velocity().stop();
    }
}

#[derive(Deserialize)]
struct SpinParams {
    degrees: f64,
}

/// Rotate in place by a fixed angle.
pub struct SpinSkill {
    robot: Arc<dyn RobotHandle>,
    degrees: f64,
}

impl SpinSkill {
    pub fn left_descriptor() -> SkillDescriptor {
        SkillDescriptor::new(
            "SpinLeft",
            "Rotate the robot to the left.",
            vec![ParamSpec::required(
                "degrees",
                ParamKind::Number,
                "Distance to spin left in degrees",
            )],
        )
    }

    pub fn right_descriptor() -> SkillDescriptor {
        SkillDescriptor::new(
            "SpinRight",
            "Rotate the robot to the right.",
            vec![ParamSpec::required(
                "degrees",
                ParamKind::Number,
                "Distance to spin right in degrees",
            )],
        )
    }

    pub fn factory(
        robot: Arc<dyn RobotHandle>,
        clockwise: bool,
    ) -> impl Fn(Value) -> SkillResult<Arc<dyn Skill>> {
        move |args| {
            let params: SpinParams =
                serde_json::from_value(args).map_err(|e| bad_args("Spin", e))?;
            let sign = if clockwise { -1.0 } else { 1.0 };
            Ok(Arc::new(SpinSkill {
                robot: robot.clone(),
                degrees: sign * params.degrees.abs(),
            }) as _)
        }
    }
}

#[async_trait]
impl Skill for SpinSkill {
    async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
        let radians = self.degrees.to_radians();
        let duration = (radians / SPIN_SPEED).abs();
        self.robot
            .velocity()
            .move_vel(0.0, 0.0, SPIN_SPEED * radians.signum());
        tokio::time::sleep(Duration::from_secs_f64(duration)).await;
        self.robot.velocity().stop();
        Ok(success_value(format!("rotated {:.1} degrees", self.degrees)))
    }

    async fn stop(&self) {
        self.robot.velocity().stop();
    }
}

#[derive(Deserialize)]
struct WaitParams {
    seconds: f64,
}

/// Do nothing for a while.
pub struct WaitSkill {
    seconds: f64,
}

impl WaitSkill {
    pub fn descriptor() -> SkillDescriptor {
        SkillDescriptor::new(
            "Wait",
            "Wait for a specified amount of time.",
            vec![ParamSpec::required(
                "seconds",
                ParamKind::Number,
                "Seconds to wait",
            )],
        )
    }

    pub fn factory() -> impl Fn(Value) -> SkillResult<Arc<dyn Skill>> {
        |args| {
            let params: WaitParams =
                serde_json::from_value(args).map_err(|e| bad_args("Wait", e))?;
            Ok(Arc::new(WaitSkill {
                seconds: params.seconds,
            }) as _)
        }
    }
}

#[async_trait]
impl Skill for WaitSkill {
    async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
        tokio::time::sleep(Duration::from_secs_f64(self.seconds.max(0.0))).await;
        Ok(success_value(format!("waited {:.1}s", self.seconds)))
    }
}

// ---------------------------------------------------------------------
// Pose capture
// ---------------------------------------------------------------------

#[derive(Deserialize)]
struct GetPoseParams {
    #[serde(default)]
    location_name: String,
}

/// Report the current pose, optionally remembering it by name.
pub struct GetPoseSkill {
    robot: Arc<dyn RobotHandle>,
    location_name: String,
}

impl GetPoseSkill {
    pub fn descriptor() -> SkillDescriptor {
        SkillDescriptor::new(
            "GetPose",
            "Get the current position and orientation of the robot. Provide a \
             location_name to remember this spot (e.g. 'kitchen') so it can be \
             navigated to later.",
            vec![ParamSpec::optional(
                "location_name",
                ParamKind::String,
                "Optional name to assign to this location (e.g., 'kitchen', 'office')",
            )],
        )
    }

    pub fn factory(robot: Arc<dyn RobotHandle>) -> impl Fn(Value) -> SkillResult<Arc<dyn Skill>> {
        move |args| {
            let params: GetPoseParams =
                serde_json::from_value(args).map_err(|e| bad_args("GetPose", e))?;
            Ok(Arc::new(GetPoseSkill {
                robot: robot.clone(),
                location_name: params.location_name,
            }) as _)
        }
    }
}

#[async_trait]
impl Skill for GetPoseSkill {
    async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
        let Some((position, rotation)) = self.robot.pose() else {
            return Ok(failure_value("Transform", "robot pose unavailable"));
        };

        let mut result = json!({
            "success": true,
            "position": {"x": position.x(), "y": position.y(), "z": position.z()},
            "rotation": {"roll": rotation.x(), "pitch": rotation.y(), "yaw": rotation.z()},
        });

        if !self.location_name.is_empty() {
            let saved = self
                .robot
                .memory()
                .add_location(RobotLocation::new(
                    self.location_name.clone(),
                    position,
                    rotation,
                ))
                .is_ok();
            result["location_saved"] = json!(saved);
            result["location_name"] = json!(self.location_name);
            if !saved {
                warn!(name = %self.location_name, "failed to save location");
            }
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------

#[derive(Deserialize)]
struct NavigateToGoalParams {
    x: f64,
    y: f64,
    #[serde(default)]
    rotation: Option<f64>,
    #[serde(default = "default_nav_timeout")]
    timeout: f64,
}

fn default_nav_timeout() -> f64 {
    120.0
}

/// Plan with A* and follow the path to a pose in the odom frame.
pub struct NavigateToGoalSkill {
    robot: Arc<dyn RobotHandle>,
    library: Weak<SkillLibrary>,
    cancel: CancelToken,
    goal: Vector,
    rotation: Option<f64>,
    timeout: f64,
}

impl NavigateToGoalSkill {
    pub fn descriptor() -> SkillDescriptor {
        SkillDescriptor::new(
            "NavigateToGoal",
            "Navigate the robot to a position and orientation using the global \
             planner and local obstacle avoidance.",
            vec![
                ParamSpec::required("x", ParamKind::Number, "Target x in the odom frame (meters)"),
                ParamSpec::required("y", ParamKind::Number, "Target y in the odom frame (meters)"),
                ParamSpec::optional(
                    "rotation",
                    ParamKind::Number,
                    "Target orientation (yaw) in radians",
                ),
                ParamSpec::optional(
                    "timeout",
                    ParamKind::Number,
                    "Maximum time allowed for navigation (seconds)",
                ),
            ],
        )
    }

    pub fn factory(
        robot: Arc<dyn RobotHandle>,
        library: &Arc<SkillLibrary>,
    ) -> impl Fn(Value) -> SkillResult<Arc<dyn Skill>> {
        let library = Arc::downgrade(library);
        move |args| {
            let params: NavigateToGoalParams =
                serde_json::from_value(args).map_err(|e| bad_args("NavigateToGoal", e))?;
            Ok(Arc::new(NavigateToGoalSkill {
                robot: robot.clone(),
                library: library.clone(),
                cancel: CancelToken::new(),
                goal: Vector::xy(params.x, params.y),
                rotation: params.rotation,
                timeout: params.timeout,
            }) as _)
        }
    }
}

#[async_trait]
impl Skill for NavigateToGoalSkill {
    async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
        info!(
            x = self.goal.x(),
            y = self.goal.y(),
            "starting navigation to goal"
        );
        if let Some(library) = self.library.upgrade() {
            library.register_running("NavigateToGoal", self.clone(), self.cancel.clone());
        }

        let planner = self.robot.local_planner();
        let transforms = self.robot.transforms();
        let costmap = self.robot.costmap();
        let reached = navigate_to_goal_global(
            planner.as_ref(),
            self.robot.velocity(),
            transforms.as_ref(),
            costmap.as_ref(),
            self.goal.clone(),
            self.rotation,
            &self.robot.smudge_params(),
            &self.robot.astar_config(),
            Duration::from_secs_f64(self.timeout),
            &self.cancel,
        )
        .await;

        if let Some(library) = self.library.upgrade() {
            library.unregister_running("NavigateToGoal");
        }

        if reached {
            Ok(json!({
                "success": true,
                "position": [self.goal.x(), self.goal.y()],
                "rotation": self.rotation,
                "message": "Goal reached successfully",
            }))
        } else {
            Ok(failure_value("Navigation", "Goal could not be reached"))
        }
    }

    async fn stop(&self) {
        self.cancel.cancel();
        self.robot.velocity().stop();
    }
}

#[derive(Deserialize)]
struct NavigateWithTextParams {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default = "default_text_timeout")]
    timeout: f64,
    #[serde(default = "default_similarity")]
    similarity_threshold: f64,
}

fn default_limit() -> usize {
    1
}

fn default_text_timeout() -> f64 {
    40.0
}

fn default_similarity() -> f64 {
    0.25
}

/// Navigate to the place in spatial memory best matching a text query.
pub struct NavigateWithTextSkill {
    robot: Arc<dyn RobotHandle>,
    library: Weak<SkillLibrary>,
    cancel: CancelToken,
    query: String,
    limit: usize,
    timeout: f64,
    similarity_threshold: f64,
}

impl NavigateWithTextSkill {
    pub fn descriptor() -> SkillDescriptor {
        SkillDescriptor::new(
            "NavigateWithText",
            "Navigate to a location matching a natural-language description, using \
             the semantic map built from the robot's experience. Call this for one \
             subject at a time.",
            vec![
                ParamSpec::required(
                    "query",
                    ParamKind::String,
                    "Text query to search for in the semantic map",
                ),
                ParamSpec::optional("limit", ParamKind::Integer, "Maximum results to consider"),
                ParamSpec::optional(
                    "timeout",
                    ParamKind::Number,
                    "Maximum time to spend navigating (seconds)",
                ),
                ParamSpec::optional(
                    "similarity_threshold",
                    ParamKind::Number,
                    "Minimum similarity score required for a match to be trusted",
                ),
            ],
        )
    }

    pub fn factory(
        robot: Arc<dyn RobotHandle>,
        library: &Arc<SkillLibrary>,
    ) -> impl Fn(Value) -> SkillResult<Arc<dyn Skill>> {
        let library = Arc::downgrade(library);
        move |args| {
            let params: NavigateWithTextParams =
                serde_json::from_value(args).map_err(|e| bad_args("NavigateWithText", e))?;
            Ok(Arc::new(NavigateWithTextSkill {
                robot: robot.clone(),
                library: library.clone(),
                cancel: CancelToken::new(),
                query: params.query,
                limit: params.limit.max(1),
                timeout: params.timeout,
                similarity_threshold: params.similarity_threshold,
            }) as _)
        }
    }
}

#[async_trait]
impl Skill for NavigateWithTextSkill {
    async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
        if self.query.is_empty() {
            return Ok(failure_value("InvalidArguments", "no query provided"));
        }

        // A named location wins over the embedding search.
        let target = if let Some(location) = self.robot.memory().find_location(&self.query) {
            info!(name = %location.name, "query matched a saved location");
            Some((location.position.to_2d(), location.rotation.z(), 1.0))
        } else {
            let hits = match self.robot.memory().query_by_text(&self.query, self.limit).await {
                Ok(hits) => hits,
                Err(e) => return Ok(failure_value("Store", e)),
            };
            hits.first().map(|best| {
                let similarity = 1.0 - best.distance;
                (
                    Vector::xy(best.metadata.pos_x, best.metadata.pos_y),
                    best.metadata.rot_z,
                    similarity,
                )
            })
        };

        let Some((position, rotation, similarity)) = target else {
            return Ok(failure_value(
                "Memory",
                "No matching location found in semantic map",
            ));
        };

        if similarity < self.similarity_threshold {
            warn!(
                similarity,
                threshold = self.similarity_threshold,
                "match below similarity threshold"
            );
            return Ok(json!({
                "success": false,
                "failure_reason": "Memory",
                "query": self.query,
                "similarity": similarity,
                "error": "Match found but similarity is below threshold",
            }));
        }

        info!(
            query = %self.query,
            x = position.x(),
            y = position.y(),
            similarity,
            "navigating to semantic match"
        );
        if let Some(library) = self.library.upgrade() {
            library.register_running("NavigateWithText", self.clone(), self.cancel.clone());
        }

        let planner = self.robot.local_planner();
        let transforms = self.robot.transforms();
        let costmap = self.robot.costmap();
        let reached = navigate_to_goal_global(
            planner.as_ref(),
            self.robot.velocity(),
            transforms.as_ref(),
            costmap.as_ref(),
            position.clone(),
            Some(rotation),
            &self.robot.smudge_params(),
            &self.robot.astar_config(),
            Duration::from_secs_f64(self.timeout),
            &self.cancel,
        )
        .await;

        if let Some(library) = self.library.upgrade() {
            library.unregister_running("NavigateWithText");
        }

        Ok(json!({
            "success": reached,
            "query": self.query,
            "position": [position.x(), position.y()],
            "rotation": rotation,
            "similarity": similarity,
            "failure_reason": if reached { Value::Null } else { json!("Navigation") },
        }))
    }

    async fn stop(&self) {
        self.cancel.cancel();
        self.robot.velocity().stop();
    }
}

// ---------------------------------------------------------------------
// Running-skill control
// ---------------------------------------------------------------------

#[derive(Deserialize)]
struct KillParams {
    skill_name: String,
}

/// Terminate a running skill by name.
pub struct KillSkill {
    library: Weak<SkillLibrary>,
    skill_name: String,
}

impl KillSkill {
    pub fn descriptor() -> SkillDescriptor {
        SkillDescriptor::new(
            "KillSkill",
            "Terminate a running skill by name, e.g. a long-running observer or \
             navigation.",
            vec![ParamSpec::required(
                "skill_name",
                ParamKind::String,
                "Name of the running skill to terminate",
            )],
        )
    }

    pub fn factory(library: &Arc<SkillLibrary>) -> impl Fn(Value) -> SkillResult<Arc<dyn Skill>> {
        let library = Arc::downgrade(library);
        move |args| {
            let params: KillParams =
                serde_json::from_value(args).map_err(|e| bad_args("KillSkill", e))?;
            Ok(Arc::new(KillSkill {
                library: library.clone(),
                skill_name: params.skill_name,
            }) as _)
        }
    }
}

#[async_trait]
impl Skill for KillSkill {
    async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
        let Some(library) = self.library.upgrade() else {
            return Err(SkillError::MissingDependency {
                name: "KillSkill".into(),
                message: "skill library is gone".into(),
            });
        };
        match library.terminate(&self.skill_name).await {
            TerminateOutcome::Terminated => Ok(success_value(format!(
                "Successfully terminated skill: {}",
                self.skill_name
            ))),
            TerminateOutcome::NotFound => Ok(failure_value(
                "NotFound",
                format!("No running skill found with name: {}", self.skill_name),
            )),
        }
    }
}

/// Register the full built-in robot skill catalog.
pub fn register_robot_skills(library: &Arc<SkillLibrary>, robot: Arc<dyn RobotHandle>) {
    library.register(MoveSkill::descriptor(), MoveSkill::factory(robot.clone(), false));
    library.register(
        MoveSkill::reverse_descriptor(),
        MoveSkill::factory(robot.clone(), true),
    );
    library.register(
        SpinSkill::left_descriptor(),
        SpinSkill::factory(robot.clone(), false),
    );
    library.register(
        SpinSkill::right_descriptor(),
        SpinSkill::factory(robot.clone(), true),
    );
    library.register(WaitSkill::descriptor(), WaitSkill::factory());
    library.register(GetPoseSkill::descriptor(), GetPoseSkill::factory(robot.clone()));
    library.register(
        NavigateToGoalSkill::descriptor(),
        NavigateToGoalSkill::factory(robot.clone(), library),
    );
    library.register(
        NavigateWithTextSkill::descriptor(),
        NavigateWithTextSkill::factory(robot, library),
    );
    library.register(KillSkill::descriptor(), KillSkill::factory(library));
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use waymark_memory::{MemoryConfig, RandomEmbedding, SpatialMemory};
    use waymark_nav::{
        CostmapProvider, LocalPlannerConfig, VelocityCommand, VelocityControl,
        VfhPurePursuitPlanner,
    };
    use waymark_stream::{Emitter, SourceHandle, Topic};
    use waymark_world::{Costmap, Frame, Transform, TransformSource, TransformTree};

    struct TestRobot {
        velocity: VelocityControl,
        transforms: Arc<TransformTree>,
        memory: Arc<SpatialMemory>,
        planner: Arc<Mutex<VfhPurePursuitPlanner>>,
        costmap: Arc<dyn CostmapProvider>,
        video: Topic<Frame>,
        published: Arc<Mutex<Vec<VelocityCommand>>>,
        _dir: tempfile::TempDir,
    }

    impl RobotHandle for TestRobot {
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
    }

    fn test_robot() -> Arc<TestRobot> {
        let transforms = Arc::new(TransformTree::new());
        transforms.set_transform("odom", "base_link", Transform::from_xy_yaw(1.0, 2.0, 0.5));
        transforms.set_transform("map", "odom", Transform::identity());

        let map = Arc::new(Costmap::create_empty(100, 100, 0.1));
        let costmap: Arc<dyn CostmapProvider> = {
            let map = map.clone();
            Arc::new(move || Some((*map).clone()))
        };

        let published: Arc<Mutex<Vec<VelocityCommand>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let published = published.clone();
            move |cmd: VelocityCommand| published.lock().push(cmd)
        };
        let velocity = VelocityControl::new(Arc::new(sink), 0.8, 1.0);

        let dir = tempfile::tempdir().unwrap();
        let memory = Arc::new(
            SpatialMemory::open(
                dir.path(),
                MemoryConfig::default(),
                Arc::new(RandomEmbedding::new(16)),
                true,
            )
            .unwrap(),
        );

        let planner = Arc::new(Mutex::new(
            VfhPurePursuitPlanner::new(
                LocalPlannerConfig::default(),
                costmap.clone(),
                transforms.clone(),
            )
            .unwrap(),
        ));

        let video = Topic::new("/camera", |_emitter: Emitter<Frame>| SourceHandle::noop());

        Arc::new(TestRobot {
            velocity,
            transforms,
            memory,
            planner,
            costmap,
            video,
            published,
            _dir: dir,
        })
    }

    fn library_with_robot(robot: Arc<TestRobot>) -> Arc<SkillLibrary> {
        let library = SkillLibrary::new();
        register_robot_skills(&library, robot);
        library
    }

    #[tokio::test(start_paused = true)]
    async fn move_with_duration_publishes_then_stops() {
        let robot = test_robot();
        let library = library_with_robot(robot.clone());

        let result = library
            .call("Move", json!({"x": 0.5, "duration": 0.5}))
            .await
            .unwrap();
        assert_eq!(result["success"], true);

        let published = robot.published.lock();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0], VelocityCommand::new(0.5, 0.0, 0.0));
        assert!(published[1].is_stop());
    }

    #[tokio::test(start_paused = true)]
    async fn reverse_negates_forward_velocity() {
        let robot = test_robot();
        let library = library_with_robot(robot.clone());

        library
            .call("Reverse", json!({"x": 0.3, "duration": 0.1}))
            .await
            .unwrap();
        assert_eq!(robot.published.lock()[0].x, -0.3);
    }

    #[tokio::test(start_paused = true)]
    async fn spin_left_is_counterclockwise_and_bounded() {
        let robot = test_robot();
        let library = library_with_robot(robot.clone());

        library
            .call("SpinLeft", json!({"degrees": 90.0}))
            .await
            .unwrap();
        let published = robot.published.lock();
        assert!(published[0].yaw > 0.0);
        assert!(published.last().unwrap().is_stop());
    }

    #[tokio::test]
    async fn missing_required_argument_is_reported() {
        let robot = test_robot();
        let library = library_with_robot(robot);

        let result = library.call("Move", json!({})).await.unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["failure_reason"], "InvalidArguments");
    }

    #[tokio::test]
    async fn get_pose_reports_and_saves_location() {
        let robot = test_robot();
        let library = library_with_robot(robot.clone());

        let result = library
            .call("GetPose", json!({"location_name": "dock"}))
            .await
            .unwrap();
        assert_eq!(result["success"], true);
        assert!((result["position"]["x"].as_f64().unwrap() - 1.0).abs() < 1e-9);
        assert!((result["rotation"]["yaw"].as_f64().unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(result["location_saved"], true);

        let saved = robot.memory.find_location("DOCK").unwrap();
        assert!((saved.position.x() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn navigate_with_text_on_empty_memory_fails_cleanly() {
        let robot = test_robot();
        let library = library_with_robot(robot);

        let result = library
            .call("NavigateWithText", json!({"query": "kitchen"}))
            .await
            .unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["failure_reason"], "Memory");
    }

    #[tokio::test]
    async fn kill_skill_not_found_is_clean() {
        let robot = test_robot();
        let library = library_with_robot(robot);

        let result = library
            .call("KillSkill", json!({"skill_name": "observer"}))
            .await
            .unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["failure_reason"], "NotFound");
    }

    #[tokio::test]
    async fn tools_cover_the_catalog() {
        let robot = test_robot();
        let library = library_with_robot(robot);

        let names: Vec<String> = library
            .tools()
            .iter()
            .map(|t| t["name"].as_str().unwrap_or_default().to_string())
            .collect();
        for expected in [
            "Move",
            "Reverse",
            "SpinLeft",
            "SpinRight",
            "Wait",
            "GetPose",
            "NavigateToGoal",
            "NavigateWithText",
            "KillSkill",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }
}
