//! Unit quaternion math for frame rotations.
//!
//! Euler angles follow the extrinsic xyz (roll-pitch-yaw) convention
//! used by the rest of the runtime.

use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// A rotation quaternion, scalar-first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quat {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quat {
    pub const fn identity() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Construct from wire order (x, y, z, w).
    pub const fn from_xyzw(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation from roll-pitch-yaw.
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sy, cy) = (yaw * 0.5).sin_cos();
        Self {
            w: cy * cp * cr + sy * sp * sr,
            x: cy * cp * sr - sy * sp * cr,
            y: cy * sp * cr + sy * cp * sr,
            z: sy * cp * cr - cy * sp * sr,
        }
    }

    /// Planar rotation about z.
    pub fn from_yaw(yaw: f64) -> Self {
        Self::from_euler(0.0, 0.0, yaw)
    }

    /// Back to roll-pitch-yaw.
    pub fn to_euler(&self) -> (f64, f64, f64) {
        let roll = (2.0 * (self.w * self.x + self.y * self.z))
            .atan2(1.0 - 2.0 * (self.x * self.x + self.y * self.y));
        let pitch = (2.0 * (self.w * self.y - self.z * self.x))
            .clamp(-1.0, 1.0)
            .asin();
        let yaw = self.yaw();
        (roll, pitch, yaw)
    }

    /// Heading about z.
    pub fn yaw(&self) -> f64 {
        (2.0 * (self.w * self.z + self.x * self.y))
            .atan2(1.0 - 2.0 * (self.y * self.y + self.z * self.z))
    }

    /// Hamilton product `self * other` (apply `other` first).
    pub fn mul(&self, other: &Quat) -> Quat {
        Quat {
            w: self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            x: self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            y: self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            z: self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        }
    }

    pub fn conjugate(&self) -> Quat {
        Quat {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    pub fn normalize(&self) -> Quat {
        let norm =
            (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if norm < 1e-12 {
            return Quat::identity();
        }
        Quat {
            w: self.w / norm,
            x: self.x / norm,
            y: self.y / norm,
            z: self.z / norm,
        }
    }

    /// Rotate a 3-D point.
    pub fn rotate(&self, v: &Vector) -> Vector {
        let p = Quat {
            w: 0.0,
            x: v.x(),
            y: v.y(),
            z: v.z(),
        };
        let rotated = self.mul(&p).mul(&self.conjugate());
        Vector::xyz(rotated.x, rotated.y, rotated.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn euler_roundtrip() {
        let (roll, pitch, yaw) = (0.3, -0.4, 1.2);
        let q = Quat::from_euler(roll, pitch, yaw);
        let (r, p, y) = q.to_euler();
        assert!((r - roll).abs() < 1e-9);
        assert!((p - pitch).abs() < 1e-9);
        assert!((y - yaw).abs() < 1e-9);
    }

    #[test]
    fn yaw_rotation_turns_x_into_y() {
        let q = Quat::from_yaw(FRAC_PI_2);
        let rotated = q.rotate(&Vector::xyz(1.0, 0.0, 0.0));
        assert!(rotated.x().abs() < 1e-9);
        assert!((rotated.y() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn composition_matches_summed_yaw() {
        let a = Quat::from_yaw(0.5);
        let b = Quat::from_yaw(0.75);
        assert!((a.mul(&b).yaw() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn conjugate_inverts_unit_rotation() {
        let q = Quat::from_euler(0.1, 0.2, 0.3);
        let round = q.mul(&q.conjugate());
        assert!((round.w - 1.0).abs() < 1e-9);
        assert!(round.x.abs() < 1e-9);
    }
}
