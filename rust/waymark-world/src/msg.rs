//! Message shapes delivered by the robot transport.

use crate::error::{WorldError, WorldResult};
use crate::quat::Quat;
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// A raw BGR video frame, H x W x 3 bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major BGR bytes.
    pub data: Vec<u8>,
    /// Capture time in seconds.
    pub stamp: f64,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, stamp: f64) -> WorldResult<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(WorldError::FramePayload {
                width,
                height,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            stamp,
        })
    }
}

/// A single odometry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdometrySample {
    pub position: Vector,
    pub orientation: Quat,
    /// Sample time in seconds.
    pub stamp: f64,
}

impl OdometrySample {
    pub fn new(position: Vector, orientation: Quat, stamp: f64) -> Self {
        Self {
            position,
            orientation,
            stamp,
        }
    }

    /// Planar heading.
    pub fn yaw(&self) -> f64 {
        self.orientation.yaw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_validates_payload() {
        assert!(Frame::new(2, 2, vec![0; 12], 0.0).is_ok());
        assert!(matches!(
            Frame::new(2, 2, vec![0; 11], 0.0),
            Err(WorldError::FramePayload { expected: 12, got: 11, .. })
        ));
    }

    #[test]
    fn odometry_yaw() {
        let sample = OdometrySample::new(
            Vector::xyz(1.0, 2.0, 0.0),
            Quat::from_yaw(0.75),
            1.5,
        );
        assert!((sample.yaw() - 0.75).abs() < 1e-9);
    }
}
