//! Local-planner parameters.

use serde::{Deserialize, Serialize};

/// Tuning for the VFH + pure-pursuit controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalPlannerConfig {
    /// Distance to keep from obstacles, meters.
    pub safety_threshold: f64,
    /// Angular bins in the polar histogram.
    pub histogram_bins: usize,
    /// m/s.
    pub max_linear_vel: f64,
    /// rad/s.
    pub max_angular_vel: f64,
    /// Pure-pursuit lookahead, meters.
    pub lookahead_distance: f64,
    /// Distance at which the position goal counts as reached, meters.
    pub goal_tolerance: f64,
    /// Orientation tolerance, radians.
    pub angle_tolerance: f64,
    /// Planner tick rate, Hz.
    pub control_frequency: f64,
    /// Within this distance of the final goal the planner repairs the
    /// goal and permits contact to reach it, meters.
    pub safe_goal_distance: f64,

    // VFH weights.
    pub obstacle_weight: f64,
    pub goal_weight: f64,
    pub prev_direction_weight: f64,
    /// Low-pass factor applied to linear velocity across ticks.
    pub linear_vel_filter_factor: f64,

    // Stuck detection and recovery.
    pub stuck_detection_window_seconds: f64,
    pub stuck_distance_threshold: f64,
    pub unstuck_distance_threshold: f64,
    pub stuck_time_threshold: f64,
    pub recovery_duration: f64,

    // Goal repair.
    pub goal_adjust_step: f64,
    pub goal_adjust_max_steps: usize,
    pub goal_adjust_clearance: f64,
}

impl Default for LocalPlannerConfig {
    fn default() -> Self {
        Self {
            safety_threshold: 0.8,
            histogram_bins: 144,
            max_linear_vel: 0.8,
            max_angular_vel: 1.0,
            lookahead_distance: 1.0,
            goal_tolerance: 0.2,
            angle_tolerance: 0.1,
            control_frequency: 10.0,
            safe_goal_distance: 1.0,
            obstacle_weight: 10.0,
            goal_weight: 1.0,
            prev_direction_weight: 0.5,
            linear_vel_filter_factor: 0.4,
            stuck_detection_window_seconds: 8.0,
            stuck_distance_threshold: 0.1,
            unstuck_distance_threshold: 0.5,
            stuck_time_threshold: 4.0,
            recovery_duration: 8.0,
            goal_adjust_step: 0.25,
            goal_adjust_max_steps: 50,
            goal_adjust_clearance: 0.5,
        }
    }
}

impl LocalPlannerConfig {
    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.histogram_bins == 0 {
            return Err("histogram_bins must be positive".into());
        }
        if self.control_frequency <= 0.0 {
            return Err("control_frequency must be positive".into());
        }
        if self.max_linear_vel <= 0.0 || self.max_angular_vel <= 0.0 {
            return Err("velocity limits must be positive".into());
        }
        if !(0.0..1.0).contains(&self.linear_vel_filter_factor) {
            return Err("linear_vel_filter_factor must be in [0, 1)".into());
        }
        if self.lookahead_distance <= 0.0 {
            return Err("lookahead_distance must be positive".into());
        }
        Ok(())
    }

    /// Planner tick period in seconds.
    pub fn control_period(&self) -> f64 {
        1.0 / self.control_frequency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn defaults_validate() {
        assert!(LocalPlannerConfig::default().validate().is_ok());
    }

    #[test_case(|c| c.histogram_bins = 0; "no histogram bins")]
    #[test_case(|c| c.control_frequency = 0.0; "zero control frequency")]
    #[test_case(|c| c.max_linear_vel = -0.1; "negative velocity limit")]
    #[test_case(|c| c.linear_vel_filter_factor = 1.0; "filter factor too high")]
    #[test_case(|c| c.lookahead_distance = 0.0; "zero lookahead")]
    fn bad_values_rejected(break_it: fn(&mut LocalPlannerConfig)) {
        let mut config = LocalPlannerConfig::default();
        break_it(&mut config);
        assert!(config.validate().is_err());
    }
}
