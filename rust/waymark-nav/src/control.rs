//! Velocity-command sink and costmap capabilities.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use waymark_world::Costmap;

/// A velocity command in the robot body frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    /// Forward velocity, m/s.
    pub x: f64,
    /// Lateral velocity, m/s.
    pub y: f64,
    /// Angular velocity, rad/s.
    pub yaw: f64,
}

impl VelocityCommand {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    pub fn stop() -> Self {
        Self::default()
    }

    pub fn is_stop(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.yaw == 0.0
    }
}

/// Where velocity commands go: the transport bridge, a simulator, or a
/// test recorder.
pub trait VelocitySink: Send + Sync {
    fn publish(&self, command: VelocityCommand);
}

impl<F> VelocitySink for F
where
    F: Fn(VelocityCommand) + Send + Sync,
{
    fn publish(&self, command: VelocityCommand) {
        (self)(command)
    }
}

/// Clamping front-end over the velocity sink.
///
/// Every published component is limited to the configured maxima, so no
/// caller can push the platform past its envelope.
pub struct VelocityControl {
    sink: Arc<dyn VelocitySink>,
    max_linear: f64,
    max_angular: f64,
}

impl VelocityControl {
    pub fn new(sink: Arc<dyn VelocitySink>, max_linear: f64, max_angular: f64) -> Self {
        Self {
            sink,
            max_linear,
            max_angular,
        }
    }

    /// Publish a clamped velocity command.
    pub fn move_vel(&self, x: f64, y: f64, yaw: f64) {
        let command = VelocityCommand {
            x: x.clamp(-self.max_linear, self.max_linear),
            y: y.clamp(-self.max_linear, self.max_linear),
            yaw: yaw.clamp(-self.max_angular, self.max_angular),
        };
        self.sink.publish(command);
    }

    /// Publish an all-zero command.
    pub fn stop(&self) {
        debug!("publishing stop");
        self.sink.publish(VelocityCommand::stop());
    }

    pub fn max_linear(&self) -> f64 {
        self.max_linear
    }

    pub fn max_angular(&self) -> f64 {
        self.max_angular
    }
}

/// Snapshot access to the most recent costmap.
pub trait CostmapProvider: Send + Sync {
    fn latest(&self) -> Option<Costmap>;
}

impl<F> CostmapProvider for F
where
    F: Fn() -> Option<Costmap> + Send + Sync,
{
    fn latest(&self) -> Option<Costmap> {
        (self)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn commands_are_clamped_to_limits() {
        let published: Arc<Mutex<Vec<VelocityCommand>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let published = published.clone();
            move |cmd: VelocityCommand| published.lock().push(cmd)
        };
        let control = VelocityControl::new(Arc::new(sink), 0.8, 1.0);

        control.move_vel(5.0, -5.0, -9.0);
        control.stop();

        let seen = published.lock();
        assert_eq!(seen[0], VelocityCommand::new(0.8, -0.8, -1.0));
        assert!(seen[1].is_stop());
    }
}
