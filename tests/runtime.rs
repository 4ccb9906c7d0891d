//! End-to-end runtime tests over the loopback transport.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use waymark::{LoopbackTransport, Robot, RuntimeConfig};
use waymark_skills::{
    AudioPipeline, Reasoner, ReasonerEvent, ReasonerRequest, RobotHandle, SkillResult,
};
use waymark_world::Vector;

fn config_in(dir: &tempfile::TempDir) -> RuntimeConfig {
    RuntimeConfig {
        spatial_memory_dir: dir.path().join("spatial_memory"),
        ..RuntimeConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn justgo_navigation_reaches_goal() {
    let dir = tempfile::tempdir().unwrap();
    let transport = LoopbackTransport::new();
    let robot = Robot::start(config_in(&dir), &transport, None, true, true).unwrap();

    // Let the first odometry and costmap samples land.
    tokio::time::sleep(Duration::from_millis(600)).await;

    let reached = robot
        .navigate_to(Vector::xy(1.5, 0.0), None, Duration::from_secs(120))
        .await;
    assert!(reached, "navigation did not reach the goal");

    let (x, y, _) = transport.pose();
    assert!(x > 1.0, "robot barely moved: x={x}");
    assert!(y.abs() < 0.5);

    robot.shutdown();
}

#[tokio::test(start_paused = true)]
async fn global_plan_is_available_once_streams_are_live() {
    let dir = tempfile::tempdir().unwrap();
    let transport = LoopbackTransport::new();
    let robot = Robot::start(config_in(&dir), &transport, None, true, true).unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;

    let path = robot.plan_to(&Vector::xy(2.0, 2.0)).unwrap();
    assert!(path.len() >= 2);
    assert_eq!(path.last(), Some(&Vector::xy(2.0, 2.0)));

    robot.shutdown();
}

#[tokio::test(start_paused = true)]
async fn skills_are_registered_and_callable() {
    let dir = tempfile::tempdir().unwrap();
    let transport = LoopbackTransport::new();
    let robot = Robot::start(config_in(&dir), &transport, None, true, true).unwrap();

    let names = robot.library().names();
    assert!(names.contains(&"Move".to_string()));
    assert!(names.contains(&"NavigateToGoal".to_string()));

    let result = robot
        .library()
        .call("Wait", serde_json::json!({"seconds": 0.2}))
        .await
        .unwrap();
    assert_eq!(result["success"], true);

    robot.shutdown();
}

/// Reasoner that answers every query with one canned sentence.
struct CannedReasoner;

#[async_trait]
impl Reasoner for CannedReasoner {
    async fn query(&self, _request: ReasonerRequest) -> SkillResult<mpsc::Receiver<ReasonerEvent>> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            let _ = tx.send(ReasonerEvent::Text("on my way".into())).await;
        });
        Ok(rx)
    }
}

struct SilentAudio;

#[async_trait]
impl AudioPipeline for SilentAudio {
    async fn play(&self, _text: &str) -> SkillResult<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn agent_and_audio_wire_into_the_skill_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let transport = LoopbackTransport::new();
    let robot = Robot::start(config_in(&dir), &transport, None, true, true).unwrap();

    let shell = robot.attach_agent(Arc::new(CannedReasoner));
    robot.attach_audio(Arc::new(SilentAudio));

    let names = robot.library().names();
    assert!(names.contains(&"ObserveStream".to_string()));
    assert!(names.contains(&"Speak".to_string()));

    let mut responses = shell.response_stream();
    let text = shell.handle_query("go to the kitchen", None).await.unwrap();
    assert_eq!(text, "on my way");
    assert_eq!(responses.recv().await.unwrap(), "on my way");

    let spoken = robot
        .library()
        .call("Speak", serde_json::json!({"text": "hello"}))
        .await
        .unwrap();
    assert_eq!(spoken["success"], true);

    robot.shutdown();
}

#[tokio::test(start_paused = true)]
async fn ingestion_stores_gated_frames() {
    let dir = tempfile::tempdir().unwrap();
    let transport = LoopbackTransport::new();
    let robot = Robot::start(config_in(&dir), &transport, None, true, false).unwrap();

    // Robot is stationary: the distance gate admits exactly the first
    // frame no matter how many arrive.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let stored = robot.memory().stored_count();
    assert_eq!(stored, 1, "expected 1 stored frame, got {stored}");
    assert!(robot.memory().frame_count() > 5);

    robot.shutdown();
}
