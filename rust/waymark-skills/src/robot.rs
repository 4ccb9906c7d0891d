//! The robot capability bundle skills program against.

use parking_lot::Mutex;
use std::sync::Arc;
use waymark_memory::SpatialMemory;
use waymark_nav::{AstarConfig, CostmapProvider, VelocityControl, VfhPurePursuitPlanner};
use waymark_stream::Topic;
use waymark_world::{Frame, SmudgeParams, TransformSource, Vector};

/// Everything a robot skill may touch: actuation, perception streams,
/// planners and spatial memory. The concrete robot assembles this once
/// and hands it to the skill factories at registration time.
pub trait RobotHandle: Send + Sync {
    fn velocity(&self) -> &VelocityControl;

    fn transforms(&self) -> Arc<dyn TransformSource>;

    fn memory(&self) -> Arc<SpatialMemory>;

    fn local_planner(&self) -> Arc<Mutex<VfhPurePursuitPlanner>>;

    fn costmap(&self) -> Arc<dyn CostmapProvider>;

    fn video(&self) -> Topic<Frame>;

    fn smudge_params(&self) -> SmudgeParams {
        SmudgeParams::default()
    }

    fn astar_config(&self) -> AstarConfig {
        AstarConfig::default()
    }

    /// Current `(position, rpy)` pose of the robot, preferring the map
    /// frame and falling back to odometry.
    fn pose(&self) -> Option<(Vector, Vector)> {
        let transforms = self.transforms();
        transforms
            .transform_euler("base_link", "map")
            .or_else(|_| transforms.transform_euler("base_link", "odom"))
            .ok()
    }
}
