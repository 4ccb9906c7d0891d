//! Vector Field Histogram primitives.
//!
//! The polar histogram accumulates obstacle density per angular bin,
//! weighted by cell value and inverse square distance. Direction
//! selection minimizes a weighted sum of obstacle density, deviation
//! from the goal bearing and deviation from the previously chosen
//! direction.

use std::f64::consts::{PI, TAU};
use waymark_world::{normalize_angle, Costmap, Vector};

/// Five-tap smoothing kernel applied to the raw histogram.
const SMOOTHING_WEIGHTS: [f64; 5] = [0.1, 0.2, 0.4, 0.2, 0.1];

/// Bin center angle, `[-pi, pi)` with `bins` equal sectors.
pub fn bin_angle(index: usize, bins: usize) -> f64 {
    -PI + index as f64 * TAU / bins as f64
}

/// Build the obstacle-density histogram around the robot.
pub fn build_polar_histogram(
    costmap: &Costmap,
    robot_pos: &Vector,
    robot_theta: f64,
    bins: usize,
) -> Vec<f64> {
    let mut histogram = vec![0.0; bins];
    let robot_cell = costmap.world_to_grid(robot_pos);

    let mut any = false;
    for (x, y, value) in costmap.occupied_cells() {
        any = true;
        let dx = x as f64 - robot_cell.x();
        let dy = y as f64 - robot_cell.y();
        let distance = (dx * dx + dy * dy).sqrt() * costmap.resolution();
        if distance <= 0.0 {
            continue;
        }
        let angle = normalize_angle(dy.atan2(dx) - robot_theta);
        let bin = (((angle + PI) / TAU) * bins as f64) as usize % bins;
        histogram[bin] += (value as f64 / 100.0) / (distance * distance);
    }

    if !any {
        return histogram;
    }
    smooth_histogram(&histogram)
}

/// Smooth with a 5-tap window, then sharpen local minima (x0.8) and
/// maxima (x1.2, clipped at 1.0) so valleys stand out.
pub fn smooth_histogram(histogram: &[f64]) -> Vec<f64> {
    let bins = histogram.len();
    if bins < SMOOTHING_WEIGHTS.len() {
        return histogram.to_vec();
    }
    let mut smoothed = vec![0.0; bins];
    for i in 0..bins {
        let mut acc = 0.0;
        for (k, weight) in SMOOTHING_WEIGHTS.iter().enumerate() {
            let idx = (i + bins + k - 2) % bins;
            acc += histogram[idx] * weight;
        }
        smoothed[i] = acc;
    }

    let mut enhanced = vec![0.0; bins];
    for i in 0..bins {
        let prev = smoothed[(i + bins - 1) % bins];
        let next = smoothed[(i + 1) % bins];
        let value = smoothed[i];
        enhanced[i] = if value < prev && value < next {
            value * 0.8
        } else if value > prev && value > next {
            (value * 1.2).min(1.0)
        } else {
            value
        };
    }
    enhanced
}

/// Pick the bin angle minimizing the weighted cost.
pub fn select_direction(
    goal_weight: f64,
    obstacle_weight: f64,
    prev_direction_weight: f64,
    histogram: &[f64],
    goal_direction: f64,
    prev_selected_angle: f64,
) -> f64 {
    let bins = histogram.len();
    let max = histogram.iter().cloned().fold(0.0_f64, f64::max);

    let mut best_angle = goal_direction;
    let mut best_cost = f64::INFINITY;
    for i in 0..bins {
        let angle = bin_angle(i, bins);
        let density = if max > 0.0 { histogram[i] / max } else { 0.0 };
        let cost = obstacle_weight * density
            + goal_weight * normalize_angle(angle - goal_direction).abs()
            + prev_direction_weight * normalize_angle(angle - prev_selected_angle).abs();
        if cost < best_cost {
            best_cost = cost;
            best_angle = angle;
        }
    }
    best_angle
}

/// Pure-pursuit velocities toward a target at `goal_distance` along
/// `direction`: `v = min(v_max, d)`, `w = 2 sin(theta) / L`.
pub fn pure_pursuit(
    goal_distance: f64,
    direction: f64,
    goal_tolerance: f64,
    lookahead_distance: f64,
    max_linear_vel: f64,
    max_angular_vel: f64,
) -> (f64, f64) {
    if goal_distance < goal_tolerance {
        return (0.0, 0.0);
    }
    let lookahead = lookahead_distance.min(goal_distance);
    let linear = max_linear_vel.min(goal_distance);
    let angular = (2.0 * direction.sin() / lookahead).clamp(-max_angular_vel, max_angular_vel);
    (linear, angular)
}

/// Ray-march from the robot along `direction` and report an obstacle
/// within `safety_threshold` meters. Cells above 50 block.
pub fn check_collision(
    costmap: &Costmap,
    robot_pos: &Vector,
    robot_theta: f64,
    direction: f64,
    safety_threshold: f64,
    ignore_obstacles: bool,
) -> bool {
    if ignore_obstacles {
        return false;
    }

    let world_direction = robot_theta + direction;
    let safety_cells = (safety_threshold / costmap.resolution()) as i64;
    let robot_cell = costmap.world_to_grid(robot_pos);

    for dist in 1..=safety_cells {
        let cell_x = (robot_cell.x() + (dist as f64 * world_direction.cos()).trunc()) as i64;
        let cell_y = (robot_cell.y() + (dist as f64 * world_direction.sin()).trunc()) as i64;
        match costmap.value_at_cell(cell_x, cell_y) {
            Some(value) if value > 50 => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map_gives_flat_histogram() {
        let map = Costmap::create_empty(20, 20, 0.1);
        let histogram = build_polar_histogram(&map, &Vector::xy(1.0, 1.0), 0.0, 36);
        assert!(histogram.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn obstacle_lands_in_forward_bin() {
        let mut map = Costmap::create_empty(40, 40, 0.1);
        // Robot at center facing +x; obstacle a meter ahead.
        let robot = Vector::xy(2.0, 2.0);
        map.set_value(&Vector::xy(3.0, 2.0), 100);

        let bins = 36;
        let histogram = build_polar_histogram(&map, &robot, 0.0, bins);
        // Angle 0 maps to the middle bin.
        let forward = bins / 2;
        let peak = histogram
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert!((peak as i64 - forward as i64).abs() <= 1);
    }

    #[test]
    fn closer_obstacles_weigh_more() {
        let mut near = Costmap::create_empty(40, 40, 0.1);
        let mut far = Costmap::create_empty(40, 40, 0.1);
        let robot = Vector::xy(2.0, 2.0);
        near.set_value(&Vector::xy(2.5, 2.0), 100);
        far.set_value(&Vector::xy(3.5, 2.0), 100);

        let sum = |h: Vec<f64>| h.iter().sum::<f64>();
        assert!(
            sum(build_polar_histogram(&near, &robot, 0.0, 36))
                > sum(build_polar_histogram(&far, &robot, 0.0, 36))
        );
    }

    #[test]
    fn selects_adjacent_bin_when_straight_ahead_blocked() {
        // Synthetic histogram: single high peak straight ahead.
        let bins = 36;
        let mut histogram = vec![0.0; bins];
        histogram[bins / 2] = 1.0;

        let selected = select_direction(1.0, 10.0, 0.0, &histogram, 0.0, 0.0);
        let selected_bin =
            (((selected + PI) / TAU) * bins as f64).round() as usize % bins;

        assert_ne!(selected_bin, bins / 2, "picked the blocked bin");
        assert!(
            (selected_bin as i64 - (bins / 2) as i64).abs() <= 2,
            "picked a bin far from the goal: {selected_bin}"
        );
    }

    #[test]
    fn clear_histogram_goes_straight_to_goal() {
        let histogram = vec![0.0; 72];
        let goal_direction = 0.7;
        let selected = select_direction(1.0, 10.0, 0.0, &histogram, goal_direction, 0.0);
        assert!((selected - goal_direction).abs() < TAU / 72.0);
    }

    #[test]
    fn previous_direction_pulls_selection() {
        let histogram = vec![0.0; 72];
        let biased = select_direction(1.0, 10.0, 5.0, &histogram, 1.0, -1.0);
        let unbiased = select_direction(1.0, 10.0, 0.0, &histogram, 1.0, -1.0);
        assert!(biased < unbiased);
    }

    #[test]
    fn pure_pursuit_inside_tolerance_stops() {
        assert_eq!(pure_pursuit(0.1, 0.5, 0.2, 1.0, 0.8, 1.0), (0.0, 0.0));
    }

    #[test]
    fn pure_pursuit_clamps() {
        let (v, w) = pure_pursuit(5.0, 1.5, 0.2, 1.0, 0.8, 1.0);
        assert_eq!(v, 0.8);
        assert!(w <= 1.0 && w >= -1.0);
    }

    #[test]
    fn smoothing_preserves_mass_roughly() {
        let mut histogram = vec![0.0; 16];
        histogram[8] = 1.0;
        let smoothed = smooth_histogram(&histogram);
        // Spread across five bins around the peak.
        assert!(smoothed[8] > smoothed[7]);
        assert!(smoothed[6] > 0.0 && smoothed[10] > 0.0);
        assert_eq!(smoothed[0], 0.0);
    }

    #[test]
    fn collision_seen_ahead_only() {
        let mut map = Costmap::create_empty(40, 40, 0.1);
        let robot = Vector::xy(2.0, 2.0);
        map.set_value(&Vector::xy(2.3, 2.0), 100);

        assert!(check_collision(&map, &robot, 0.0, 0.0, 0.5, false));
        // Facing away from the obstacle.
        assert!(!check_collision(&map, &robot, PI, 0.0, 0.5, false));
        // Ignoring obstacles always reports clear.
        assert!(!check_collision(&map, &robot, 0.0, 0.0, 0.5, true));
    }
}
