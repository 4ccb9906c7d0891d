//! Navigation drivers: tick the local planner until success, timeout,
//! failure or cancellation. The robot is stopped on every exit path.

use crate::control::{CostmapProvider, VelocityControl};
use crate::error::NavResult;
use crate::global::{astar, AstarConfig};
use crate::local::VfhPurePursuitPlanner;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{error, info, warn};
use waymark_stream::CancelToken;
use waymark_world::{distance_angle_to_goal_xy, Path, SmudgeParams, TransformSource, Vector};

enum Step {
    Reached,
    Failed,
    Command(crate::control::VelocityCommand),
}

async fn drive(
    planner: &Mutex<VfhPurePursuitPlanner>,
    control: &VelocityControl,
    timeout: Duration,
    cancel: &CancelToken,
) -> bool {
    let period = Duration::from_secs_f64(planner.lock().config().control_period());
    let deadline = tokio::time::Instant::now() + timeout;
    let mut reached = false;

    loop {
        if cancel.is_cancelled() {
            info!("navigation cancelled");
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(?timeout, "navigation timed out before reaching the goal");
            break;
        }

        let step = {
            let mut planner = planner.lock();
            if planner.is_goal_reached() {
                Step::Reached
            } else if planner.navigation_failed() {
                Step::Failed
            } else {
                Step::Command(planner.plan())
            }
        };

        match step {
            Step::Reached => {
                info!("goal reached");
                reached = true;
                break;
            }
            Step::Failed => {
                error!("navigation aborted after repeated recovery failures");
                break;
            }
            Step::Command(cmd) => control.move_vel(cmd.x, cmd.y, cmd.yaw),
        }

        tokio::time::sleep(period).await;
    }

    control.stop();
    reached
}

/// Navigate to a goal given in the robot body frame.
///
/// With `keep_distance > 0` the goal is shortened along the bearing so
/// the robot stops that far from the target. Returns true only when the
/// planner reports the goal reached, orientation included.
pub async fn navigate_to_goal_local(
    planner: &Mutex<VfhPurePursuitPlanner>,
    control: &VelocityControl,
    goal_xy_robot: Vector,
    goal_theta: Option<f64>,
    keep_distance: f64,
    timeout: Duration,
    cancel: &CancelToken,
) -> bool {
    let bearing = goal_xy_robot.y().atan2(goal_xy_robot.x());
    let goal_theta = goal_theta.unwrap_or(bearing);

    let mut goal = goal_xy_robot.to_2d();
    let goal_distance = goal.length();
    if keep_distance > 0.0 && goal_distance > keep_distance {
        let (x, y) = distance_angle_to_goal_xy(goal_distance - keep_distance, bearing);
        goal = Vector::xy(x, y);
    }
    info!(
        x = goal.x(),
        y = goal.y(),
        keep_distance,
        "navigating to local goal"
    );

    if let Err(e) = planner
        .lock()
        .set_goal(&goal, "base_link", Some(goal_theta))
    {
        error!(error = %e, "failed to set goal");
        control.stop();
        return false;
    }

    drive(planner, control, timeout, cancel).await
}

/// Follow a waypoint path expressed in `frame`.
pub async fn navigate_path_local(
    planner: &Mutex<VfhPurePursuitPlanner>,
    control: &VelocityControl,
    path: &Path,
    frame: &str,
    goal_theta: Option<f64>,
    timeout: Duration,
    cancel: &CancelToken,
) -> bool {
    info!(waypoints = path.len(), frame, "navigating along path");
    if let Err(e) = planner.lock().set_goal_waypoints(path, frame, goal_theta) {
        error!(error = %e, "failed to set waypoint path");
        control.stop();
        return false;
    }
    drive(planner, control, timeout, cancel).await
}

/// Plan globally with A* over a smudged costmap, then follow the path
/// with the local planner.
#[allow(clippy::too_many_arguments)]
pub async fn navigate_to_goal_global(
    planner: &Mutex<VfhPurePursuitPlanner>,
    control: &VelocityControl,
    transforms: &dyn TransformSource,
    costmap: &dyn CostmapProvider,
    goal: Vector,
    goal_theta: Option<f64>,
    smudge: &SmudgeParams,
    astar_config: &AstarConfig,
    timeout: Duration,
    cancel: &CancelToken,
) -> bool {
    let plan = match plan_global(transforms, costmap, &goal, smudge, astar_config) {
        Ok(Some(path)) => path,
        Ok(None) => {
            warn!("global planner found no path to the goal");
            control.stop();
            return false;
        }
        Err(e) => {
            error!(error = %e, "global planning failed");
            control.stop();
            return false;
        }
    };

    navigate_path_local(planner, control, &plan, "odom", goal_theta, timeout, cancel).await
}

/// Smudge the latest costmap and run A* from the current pose.
pub fn plan_global(
    transforms: &dyn TransformSource,
    costmap: &dyn CostmapProvider,
    goal: &Vector,
    smudge: &SmudgeParams,
    astar_config: &AstarConfig,
) -> NavResult<Option<Path>> {
    let map = costmap
        .latest()
        .ok_or(crate::error::NavError::CostmapUnavailable)?;
    let (position, _) = transforms.transform_euler("base_link", "odom")?;
    let smudged = map.smudge(smudge);
    Ok(astar(&smudged, &position.to_2d(), goal, astar_config))
}
