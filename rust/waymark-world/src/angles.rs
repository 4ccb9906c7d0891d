//! Small angle helpers used across the planners.

use std::f64::consts::{PI, TAU};

/// Wrap an angle to the `(-pi, pi]` range.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Convert a (distance, bearing) pair into planar goal coordinates.
pub fn distance_angle_to_goal_xy(distance: f64, angle: f64) -> (f64, f64) {
    (distance * angle.cos(), distance * angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0.0, 0.0)]
    #[test_case(PI + 0.5, -PI + 0.5)]
    #[test_case(-PI - 0.5, PI - 0.5)]
    #[test_case(3.0 * TAU + 0.25, 0.25)]
    fn wraps_into_range(input: f64, expected: f64) {
        assert!((normalize_angle(input) - expected).abs() < 1e-9);
    }

    #[test]
    fn polar_to_goal() {
        let (x, y) = distance_angle_to_goal_xy(2.0, PI / 2.0);
        assert!(x.abs() < 1e-12);
        assert!((y - 2.0).abs() < 1e-12);
    }
}
