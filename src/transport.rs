//! Robot transport: the boundary to the middleware that delivers
//! sensor streams and accepts velocity commands.
//!
//! The real transport is external (a ROS bridge, a WebRTC driver); this
//! module specifies only the message shapes crossing the boundary, plus
//! a loopback implementation that integrates commanded velocity into a
//! simulated pose so the binary and integration tests run without
//! hardware.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use waymark_nav::{VelocityCommand, VelocitySink};
use waymark_stream::{Emitter, SourceHandle, Topic};
use waymark_world::{Costmap, Frame, OdometrySample, Quat, Vector};

/// The sensor topics a transport provides.
pub struct TransportSources {
    pub video: Topic<Frame>,
    pub odometry: Topic<OdometrySample>,
    pub costmap: Topic<Costmap>,
}

/// A connected robot transport.
pub trait Transport: Send + Sync {
    fn sources(&self) -> TransportSources;

    fn velocity_sink(&self) -> Arc<dyn VelocitySink>;
}

#[derive(Default)]
struct SimState {
    x: f64,
    y: f64,
    theta: f64,
    command: VelocityCommand,
}

/// Simulated transport: velocity commands integrate into an odometry
/// pose, the costmap is static, frames are synthetic.
pub struct LoopbackTransport {
    state: Arc<Mutex<SimState>>,
    map: Arc<Costmap>,
}

impl LoopbackTransport {
    /// 10x10 empty arena centered on the origin.
    pub fn new() -> Self {
        let map = Costmap::from_parts(
            vec![0; 200 * 200],
            200,
            200,
            0.1,
            Vector::xy(-10.0, -10.0),
            0.0,
        )
        .unwrap_or_else(|_| Costmap::create_empty(200, 200, 0.1));
        Self::with_map(map)
    }

    pub fn with_map(map: Costmap) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            map: Arc::new(map),
        }
    }

    /// Current simulated pose, for assertions.
    pub fn pose(&self) -> (f64, f64, f64) {
        let state = self.state.lock();
        (state.x, state.y, state.theta)
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LoopbackTransport {
    fn sources(&self) -> TransportSources {
        let odom_state = self.state.clone();
        let odometry = Topic::new("/odom", move |emitter: Emitter<OdometrySample>| {
            let state = odom_state.clone();
            let task = tokio::spawn(async move {
                let dt = 0.02;
                let mut ticker = tokio::time::interval(Duration::from_secs_f64(dt));
                let mut stamp = 0.0;
                loop {
                    ticker.tick().await;
                    stamp += dt;
                    let sample = {
                        let mut s = state.lock();
                        s.theta += s.command.yaw * dt;
                        s.x += (s.command.x * s.theta.cos() - s.command.y * s.theta.sin()) * dt;
                        s.y += (s.command.x * s.theta.sin() + s.command.y * s.theta.cos()) * dt;
                        OdometrySample::new(
                            Vector::xyz(s.x, s.y, 0.0),
                            Quat::from_yaw(s.theta),
                            stamp,
                        )
                    };
                    emitter.emit(sample);
                }
            });
            SourceHandle::from_task(task)
        });

        let map = self.map.clone();
        let costmap = Topic::new("/costmap", move |emitter: Emitter<Costmap>| {
            let map = map.clone();
            let task = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(500));
                loop {
                    ticker.tick().await;
                    emitter.emit((*map).clone());
                }
            });
            SourceHandle::from_task(task)
        });

        let video = Topic::new("/camera", |emitter: Emitter<Frame>| {
            let task = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(200));
                let mut stamp = 0.0;
                loop {
                    ticker.tick().await;
                    stamp += 0.2;
                    if let Ok(frame) = Frame::new(32, 24, vec![127; 32 * 24 * 3], stamp) {
                        emitter.emit(frame);
                    }
                }
            });
            SourceHandle::from_task(task)
        });

        TransportSources {
            video,
            odometry,
            costmap,
        }
    }

    fn velocity_sink(&self) -> Arc<dyn VelocitySink> {
        let state = self.state.clone();
        Arc::new(move |cmd: VelocityCommand| {
            state.lock().command = cmd;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn commands_integrate_into_odometry() {
        let transport = LoopbackTransport::new();
        let sources = transport.sources();
        let sink = transport.velocity_sink();

        sink.publish(VelocityCommand::new(1.0, 0.0, 0.0));

        let mut sub = sources.odometry.subscribe();
        let mut last = sub.recv().await.unwrap();
        for _ in 0..50 {
            last = sub.recv().await.unwrap();
        }
        assert!(last.position.x() > 0.5);
        assert!(last.position.y().abs() < 1e-6);

        sink.publish(VelocityCommand::stop());
        // One in-flight sample may still carry the old command.
        let resting = sub.recv().await.unwrap();
        let x = resting.position.x();
        for _ in 0..10 {
            last = sub.recv().await.unwrap();
        }
        assert!((last.position.x() - x).abs() < 0.05);
    }

    #[tokio::test(start_paused = true)]
    async fn costmap_topic_replays_the_arena() {
        let transport = LoopbackTransport::new();
        let sources = transport.sources();
        let mut sub = sources.costmap.subscribe();
        let map = sub.recv().await.unwrap();
        assert_eq!(map.width(), 200);
        assert!(!map.is_occupied(&Vector::xy(0.0, 0.0), 50));
    }
}
