//! The local-planner state machine.
//!
//! Per tick: snapshot the latest costmap and pose, progress the goal or
//! waypoint target, run VFH direction selection and pure pursuit, apply
//! the collision override, and low-pass the linear velocity. Stuck
//! detection watches translation over a sliding window and escalates to
//! a reverse-then-rotate recovery before declaring navigation failed.

use crate::control::{CostmapProvider, VelocityCommand};
use crate::error::{NavError, NavResult};
use crate::local::config::LocalPlannerConfig;
use crate::local::vfh;
use std::collections::VecDeque;
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use waymark_world::{normalize_angle, Path, TransformSource, Vector};

const BACKUP_PHASE_SECONDS: f64 = 3.0;
const ROTATE_PHASE_SECONDS: f64 = 2.0;
const BACKUP_SPEED: f64 = 0.2;
/// Goal-collision test threshold.
const GOAL_COLLISION_THRESHOLD: i8 = 80;

/// VFH + pure-pursuit local planner.
pub struct VfhPurePursuitPlanner {
    config: LocalPlannerConfig,
    costmap: Arc<dyn CostmapProvider>,
    transforms: Arc<dyn TransformSource>,

    goal_xy: Option<Vector>,
    goal_theta: Option<f64>,
    position_reached: bool,
    waypoints: Option<Path>,
    waypoint_frame: String,
    waypoints_in_odom: Option<Path>,
    current_waypoint_index: usize,
    final_goal_reached: bool,
    ignore_obstacles: bool,

    histogram: Vec<f64>,
    selected_direction: f64,
    prev_selected_angle: f64,
    prev_linear_vel: f64,

    position_history: VecDeque<(f64, f64, Instant)>,
    history_capacity: usize,
    recovery_active: bool,
    recovery_start: Option<Instant>,
    navigation_failed: bool,
}

impl VfhPurePursuitPlanner {
    pub fn new(
        config: LocalPlannerConfig,
        costmap: Arc<dyn CostmapProvider>,
        transforms: Arc<dyn TransformSource>,
    ) -> NavResult<Self> {
        config.validate().map_err(NavError::Config)?;
        let history_capacity =
            (config.stuck_detection_window_seconds * config.control_frequency) as usize;
        let bins = config.histogram_bins;
        Ok(Self {
            config,
            costmap,
            transforms,
            goal_xy: None,
            goal_theta: None,
            position_reached: false,
            waypoints: None,
            waypoint_frame: "map".to_string(),
            waypoints_in_odom: None,
            current_waypoint_index: 0,
            final_goal_reached: false,
            ignore_obstacles: false,
            histogram: vec![0.0; bins],
            selected_direction: 0.0,
            prev_selected_angle: 0.0,
            prev_linear_vel: 0.0,
            position_history: VecDeque::new(),
            history_capacity,
            recovery_active: false,
            recovery_start: None,
            navigation_failed: false,
        })
    }

    pub fn config(&self) -> &LocalPlannerConfig {
        &self.config
    }

    /// Clear all navigation state; called whenever a new goal is set.
    pub fn reset(&mut self) {
        self.position_history.clear();
        self.recovery_active = false;
        self.recovery_start = None;
        self.navigation_failed = false;
        self.position_reached = false;
        self.final_goal_reached = false;
        self.ignore_obstacles = false;
        self.prev_linear_vel = 0.0;
        info!("local planner state reset");
    }

    /// Set a single goal, converting to the odom frame. Invalid goals
    /// are repaired by walking toward the robot.
    pub fn set_goal(
        &mut self,
        goal_xy: &Vector,
        frame: &str,
        goal_theta: Option<f64>,
    ) -> NavResult<()> {
        self.reset();
        self.waypoints = None;
        self.waypoints_in_odom = None;
        self.current_waypoint_index = 0;
        self.goal_xy = None;
        self.goal_theta = None;

        let target = self
            .transforms
            .transform_point(goal_xy, frame, "odom")?
            .to_2d();
        info!(x = target.x(), y = target.y(), "goal set in odom frame");

        if !self.is_goal_in_costmap_bounds(&target) || self.check_goal_collision(&target) {
            warn!("goal is in collision or out of bounds, repairing");
            self.goal_xy =
                Some(self.adjust_goal_to_valid_position(&target, self.config.goal_adjust_clearance));
        } else {
            self.goal_xy = Some(target);
        }

        if let Some(theta) = goal_theta {
            let rot = self
                .transforms
                .transform_rot(&Vector::xyz(0.0, 0.0, theta), frame, "odom")?;
            self.goal_theta = Some(rot.z());
        }
        Ok(())
    }

    /// Set a waypoint path to follow. An empty path clears the goal.
    pub fn set_goal_waypoints(
        &mut self,
        waypoints: &Path,
        frame: &str,
        goal_theta: Option<f64>,
    ) -> NavResult<()> {
        self.reset();

        if waypoints.is_empty() {
            warn!("empty path given to set_goal_waypoints, ignoring");
            self.waypoints = None;
            self.waypoints_in_odom = None;
            self.goal_xy = None;
            self.goal_theta = None;
            self.current_waypoint_index = 0;
            return Ok(());
        }

        info!(points = waypoints.len(), "following waypoint path");
        self.waypoints = Some(waypoints.clone());
        self.waypoint_frame = frame.to_string();
        self.current_waypoint_index = 0;

        let in_odom = self.transforms.transform_path(waypoints, frame, "odom");
        if in_odom.is_empty() {
            warn!("no waypoint survived the transform to odom");
            self.waypoints = None;
            self.waypoints_in_odom = None;
            self.goal_xy = None;
            return Ok(());
        }

        let first = in_odom.head().cloned();
        self.waypoints_in_odom = Some(in_odom);
        if let Some(first) = first {
            if !self.is_goal_in_costmap_bounds(&first) || self.check_goal_collision(&first) {
                warn!("first waypoint is invalid, repairing");
                self.goal_xy = Some(
                    self.adjust_goal_to_valid_position(&first, self.config.goal_adjust_clearance),
                );
            } else {
                self.goal_xy = Some(first);
            }
        }

        if let Some(theta) = goal_theta {
            let rot = self
                .transforms
                .transform_rot(&Vector::xyz(0.0, 0.0, theta), frame, "odom")?;
            self.goal_theta = Some(rot.z());
        }
        Ok(())
    }

    /// One planning cycle: compute the next velocity command.
    pub fn plan(&mut self) -> VelocityCommand {
        self.tick(Instant::now())
    }

    fn tick(&mut self, now: Instant) -> VelocityCommand {
        let Some((robot_pos, robot_theta)) = self.robot_pose() else {
            warn!("robot pose unavailable, cannot plan");
            return VelocityCommand::stop();
        };

        // Position reached: rotate in place toward the goal heading.
        if self.position_reached
            && self.goal_theta.is_some()
            && !self.is_goal_orientation_reached()
        {
            return self.rotate_to_goal_orientation(robot_theta);
        }

        if self.check_if_stuck(&robot_pos, now) && !self.position_reached {
            // Stuck right next to the goal counts as arrival.
            if let Some(final_goal) = self.final_goal_position() {
                let distance = robot_pos.distance(&final_goal);
                if distance < 2.0 * self.config.safe_goal_distance {
                    info!(
                        distance,
                        "stuck but close to goal, treating navigation as successful"
                    );
                    self.position_reached = true;
                    return VelocityCommand::stop();
                }
            }
            warn!("robot is stuck, executing recovery");
            return self.execute_recovery_behavior(now);
        }

        self.ignore_obstacles = false;

        if self.waypoints.is_some() {
            if self.final_goal_reached {
                return VelocityCommand::stop();
            }

            // Close to the final waypoint: repair it and permit contact.
            if let Some(final_wp) = self
                .waypoints_in_odom
                .as_ref()
                .and_then(|p| p.last().cloned())
            {
                if robot_pos.distance(&final_wp) < self.config.safe_goal_distance {
                    let adjusted = self
                        .adjust_goal_to_valid_position(&final_wp, self.config.goal_adjust_clearance);
                    if let Some(path) = &self.waypoints_in_odom {
                        let mut points: Vec<Vector> = path.iter().cloned().collect();
                        if let Some(last) = points.last_mut() {
                            *last = adjusted;
                        }
                        self.waypoints_in_odom = Path::from_points(points).ok();
                    }
                    self.ignore_obstacles = true;
                    debug!("within safe distance of final waypoint, ignoring obstacles");
                }
            }

            if self.update_waypoint_target(&robot_pos) {
                return VelocityCommand::stop();
            }
        }

        let Some(goal_xy) = self.goal_xy.clone() else {
            return VelocityCommand::stop();
        };
        let Some(costmap) = self.costmap.latest() else {
            warn!("local costmap unavailable, cannot plan");
            return VelocityCommand::stop();
        };

        if self.waypoints.is_none() {
            let goal_distance = robot_pos.distance(&goal_xy);

            if goal_distance < self.config.safe_goal_distance {
                let adjusted = self
                    .adjust_goal_to_valid_position(&goal_xy, self.config.goal_adjust_clearance);
                self.goal_xy = Some(adjusted);
                self.ignore_obstacles = true;
                debug!("within safe distance of goal, ignoring obstacles");
            }

            self.position_reached =
                goal_distance < self.config.goal_tolerance || self.position_reached;
        }

        let Some(goal_xy) = self.goal_xy.clone() else {
            return VelocityCommand::stop();
        };
        self.compute_velocity(&costmap, &goal_xy, &robot_pos, robot_theta)
    }

    /// VFH direction selection plus pure pursuit.
    fn compute_velocity(
        &mut self,
        costmap: &waymark_world::Costmap,
        goal_xy: &Vector,
        robot_pos: &Vector,
        robot_theta: f64,
    ) -> VelocityCommand {
        let dx = goal_xy.x() - robot_pos.x();
        let dy = goal_xy.y() - robot_pos.y();
        let goal_distance = (dx * dx + dy * dy).sqrt();
        let goal_direction = normalize_angle(dy.atan2(dx) - robot_theta);

        self.histogram = if self.ignore_obstacles {
            vec![0.0; self.config.histogram_bins]
        } else {
            vfh::build_polar_histogram(
                costmap,
                robot_pos,
                robot_theta,
                self.config.histogram_bins,
            )
        };

        let mut selected = vfh::select_direction(
            self.config.goal_weight,
            self.config.obstacle_weight,
            self.config.prev_direction_weight,
            &self.histogram,
            goal_direction,
            self.prev_selected_angle,
        );
        self.prev_selected_angle = selected;

        let (mut linear, mut angular) = vfh::pure_pursuit(
            goal_distance,
            selected,
            self.config.goal_tolerance,
            self.config.lookahead_distance,
            self.config.max_linear_vel,
            self.config.max_angular_vel,
        );

        // Slow down through sharp turns.
        if selected.abs() > 0.25 {
            let turn_factor = (1.0 - selected.abs() / FRAC_PI_2).max(0.25);
            linear *= turn_factor;
        }

        // Collision override: bias selection away from the goal pull.
        if !self.ignore_obstacles
            && vfh::check_collision(costmap, robot_pos, robot_theta, selected, 0.5, false)
        {
            selected = vfh::select_direction(
                self.config.goal_weight * 0.2,
                self.config.obstacle_weight,
                self.config.prev_direction_weight * 0.2,
                &self.histogram,
                goal_direction,
                self.prev_selected_angle,
            );
            self.prev_selected_angle = selected;
            let recomputed = vfh::pure_pursuit(
                goal_distance,
                selected,
                self.config.goal_tolerance,
                self.config.lookahead_distance,
                self.config.max_linear_vel,
                self.config.max_angular_vel,
            );
            linear = recomputed.0;
            angular = recomputed.1;
        }

        if vfh::check_collision(
            costmap,
            robot_pos,
            robot_theta,
            0.0,
            self.config.safety_threshold,
            self.ignore_obstacles,
        ) {
            warn!("obstacle straight ahead, stopping forward motion");
            linear = 0.0;
        }

        self.selected_direction = selected;

        let filtered = self.prev_linear_vel * self.config.linear_vel_filter_factor
            + linear * (1.0 - self.config.linear_vel_filter_factor);
        self.prev_linear_vel = filtered;

        VelocityCommand::new(
            filtered.clamp(-self.config.max_linear_vel, self.config.max_linear_vel),
            0.0,
            angular.clamp(-self.config.max_angular_vel, self.config.max_angular_vel),
        )
    }

    /// Final goal: last waypoint in waypoint mode, the single goal
    /// otherwise.
    fn final_goal_position(&self) -> Option<Vector> {
        if let Some(path) = &self.waypoints_in_odom {
            if let Some(last) = path.last() {
                return Some(last.clone());
            }
        }
        self.goal_xy.clone()
    }

    /// True when the final goal is reached, including orientation when
    /// one was requested.
    pub fn is_goal_reached(&self) -> bool {
        if self.waypoints.is_some() {
            return self.final_goal_reached;
        }
        if self.goal_xy.is_none() {
            return false;
        }
        self.position_reached && self.is_goal_orientation_reached()
    }

    pub fn navigation_failed(&self) -> bool {
        self.navigation_failed
    }

    pub fn ignore_obstacles(&self) -> bool {
        self.ignore_obstacles
    }

    /// Latest VFH histogram, for introspection.
    pub fn histogram(&self) -> &[f64] {
        &self.histogram
    }

    pub fn selected_direction(&self) -> f64 {
        self.selected_direction
    }

    fn robot_pose(&self) -> Option<(Vector, f64)> {
        let (pos, rot) = self.transforms.transform_euler("base_link", "odom").ok()?;
        Some((pos.to_2d(), rot.z()))
    }

    fn rotate_to_goal_orientation(&self, robot_theta: f64) -> VelocityCommand {
        let Some(goal_theta) = self.goal_theta else {
            return VelocityCommand::stop();
        };
        let angle_diff = normalize_angle(goal_theta - robot_theta);
        if angle_diff.abs() < self.config.angle_tolerance {
            return VelocityCommand::stop();
        }
        let direction = if angle_diff > 0.0 { 1.0 } else { -1.0 };
        let angular = direction * (angle_diff.abs() * 2.0).min(self.config.max_angular_vel);
        VelocityCommand::new(0.0, 0.0, angular)
    }

    fn is_goal_orientation_reached(&self) -> bool {
        let Some(goal_theta) = self.goal_theta else {
            return true;
        };
        let Some((_, robot_theta)) = self.robot_pose() else {
            return false;
        };
        normalize_angle(goal_theta - robot_theta).abs() <= self.config.angle_tolerance
    }

    /// Progress the waypoint target. Returns true when the final
    /// waypoint was just reached.
    fn update_waypoint_target(&mut self, robot_pos: &Vector) -> bool {
        let Some(waypoints) = self.waypoints.clone() else {
            return false;
        };
        if waypoints.is_empty() {
            return false;
        }

        let in_odom =
            self.transforms
                .transform_path(&waypoints, &self.waypoint_frame, "odom");
        if in_odom.is_empty() {
            return false;
        }
        self.waypoints_in_odom = Some(in_odom.clone());

        let Some(final_wp) = in_odom.last().cloned() else {
            return false;
        };
        if robot_pos.distance(&final_wp) < self.config.goal_tolerance {
            self.position_reached = true;
            self.goal_xy = Some(final_wp);
            if self.goal_theta.is_none() || self.is_goal_orientation_reached() {
                info!("reached final waypoint with correct orientation");
                self.final_goal_reached = true;
                return true;
            }
            info!("reached final waypoint position, rotating to target orientation");
            return false;
        }

        // Lookahead target: first waypoint beyond the lookahead radius.
        let mut lookahead: Option<(usize, Vector)> = None;
        for i in self.current_waypoint_index..in_odom.len() {
            if let Some(wp) = in_odom.get(i) {
                if robot_pos.distance(wp) >= self.config.lookahead_distance {
                    lookahead = Some((i, wp.clone()));
                    break;
                }
            }
        }
        let (index, target) =
            lookahead.unwrap_or((in_odom.len() - 1, final_wp));
        self.current_waypoint_index = index;

        if !self.is_goal_in_costmap_bounds(&target) || self.check_goal_collision(&target) {
            debug!("lookahead point is invalid, repairing");
            self.goal_xy = Some(
                self.adjust_goal_to_valid_position(&target, self.config.goal_adjust_clearance),
            );
        } else {
            self.goal_xy = Some(target);
        }
        false
    }

    /// Goal-cell collision test at the repair threshold. Unknown cells
    /// count as occupied.
    fn check_goal_collision(&self, goal_xy: &Vector) -> bool {
        let Some(costmap) = self.costmap.latest() else {
            warn!("cannot check goal collision without a costmap");
            return false;
        };
        costmap.is_occupied(goal_xy, GOAL_COLLISION_THRESHOLD)
    }

    fn is_goal_in_costmap_bounds(&self, goal_xy: &Vector) -> bool {
        let Some(costmap) = self.costmap.latest() else {
            warn!("cannot check bounds without a costmap");
            return false;
        };
        let (x, y) = costmap.world_to_cell(goal_xy);
        let in_bounds = costmap.in_bounds(x, y);
        if !in_bounds {
            warn!(x = goal_xy.x(), y = goal_xy.y(), "goal outside costmap bounds");
        }
        in_bounds
    }

    /// Walk an invalid goal toward the robot along the line of sight
    /// until a free cell is found, then back off by `clearance` when
    /// that spot is also free.
    pub fn adjust_goal_to_valid_position(&self, goal_xy: &Vector, clearance: f64) -> Vector {
        let goal = goal_xy.to_2d();
        if !self.check_goal_collision(&goal) && self.is_goal_in_costmap_bounds(&goal) {
            return goal;
        }
        let Some((robot_pos, _)) = self.robot_pose() else {
            return goal;
        };

        let offset = &robot_pos - &goal;
        let distance = offset.length();
        if distance < 1e-3 {
            return goal;
        }
        let direction = offset.normalize();
        let step = self.config.goal_adjust_step;

        let mut current = goal.clone();
        let mut first_valid: Option<Vector> = None;

        for _ in 0..self.config.goal_adjust_max_steps {
            current = &current + &(&direction * step);

            if robot_pos.distance(&current) < step {
                // Reached the robot without a free cell; back off one
                // step to avoid self-collision.
                current = &robot_pos - &(&direction * step);
                break;
            }

            if !self.check_goal_collision(&current) && self.is_goal_in_costmap_bounds(&current) {
                if first_valid.is_none() {
                    first_valid = Some(current.clone());
                    if clearance > 0.0 {
                        continue;
                    }
                }

                if clearance > 0.0 {
                    let with_clearance = &current + &(&direction * clearance);
                    if !self.check_goal_collision(&with_clearance)
                        && self.is_goal_in_costmap_bounds(&with_clearance)
                    {
                        info!(
                            x = with_clearance.x(),
                            y = with_clearance.y(),
                            "repaired goal with clearance"
                        );
                        return with_clearance;
                    }
                }
                info!(x = current.x(), y = current.y(), "repaired goal");
                return current;
            }
        }

        if let Some(valid) = first_valid {
            return valid;
        }
        warn!("no valid goal found along line of sight, using closest point to robot");
        current
    }

    /// Sliding-window stuck detection over recent positions.
    fn check_if_stuck(&mut self, robot_pos: &Vector, now: Instant) -> bool {
        self.position_history
            .push_back((robot_pos.x(), robot_pos.y(), now));
        while self.position_history.len() > self.history_capacity {
            self.position_history.pop_front();
        }

        if self.position_history.len() < self.history_capacity {
            return false;
        }

        let window = self.config.stuck_detection_window_seconds;
        let in_window: Vec<&(f64, f64, Instant)> = self
            .position_history
            .iter()
            .filter(|(_, _, t)| now.duration_since(*t).as_secs_f64() <= window)
            .collect();
        if in_window.len() < 3 {
            return false;
        }

        let (ox, oy, oldest) = *in_window[0];
        let (nx, ny, newest) = *in_window[in_window.len() - 1];
        let time_range = newest.duration_since(oldest).as_secs_f64();
        let displacement = ((nx - ox).powi(2) + (ny - oy).powi(2)).sqrt();

        let currently_stuck = time_range >= self.config.stuck_time_threshold
            && time_range <= window
            && displacement < self.config.stuck_distance_threshold;

        if currently_stuck {
            warn!(displacement, time_range, "robot appears to be stuck");
            if !self.recovery_active {
                self.recovery_active = true;
                self.recovery_start = Some(now);
                return true;
            }
            if let Some(start) = self.recovery_start {
                if now.duration_since(start).as_secs_f64() > self.config.recovery_duration {
                    error!("recovery ran its full duration without escaping");
                    self.recovery_active = false;
                    self.recovery_start = Some(now);
                }
            }
        } else if self.recovery_active && displacement > self.config.unstuck_distance_threshold {
            info!(displacement, "robot escaped the stuck state");
            self.recovery_active = false;
        }

        self.recovery_active
    }

    /// Recovery: back up, then rotate a random way, then give up.
    fn execute_recovery_behavior(&mut self, now: Instant) -> VelocityCommand {
        let recovery_time = self
            .recovery_start
            .map(|start| now.duration_since(start).as_secs_f64())
            .unwrap_or(0.0);

        if recovery_time < BACKUP_PHASE_SECONDS {
            info!("recovery: backing up");
            return VelocityCommand::new(-BACKUP_SPEED, 0.0, 0.0);
        }
        if recovery_time < BACKUP_PHASE_SECONDS + ROTATE_PHASE_SECONDS {
            info!("recovery: rotating to find a new path");
            let direction = if rand::random::<bool>() { 1.0 } else { -1.0 };
            return VelocityCommand::new(
                0.0,
                0.0,
                direction * self.config.max_angular_vel * 0.7,
            );
        }

        error!("recovery failed after backup and rotation, terminating navigation");
        self.navigation_failed = true;
        VelocityCommand::stop()
    }
}
