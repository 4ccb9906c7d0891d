//! Serialized access to the audio device.
//!
//! The audio device is a process-wide shared resource: speech requests
//! queue through a single actor that plays one at a time, waiting for
//! end of playback (bounded by a per-request timeout scaled to text
//! length) before starting the next.

use crate::error::{SkillError, SkillResult};
use crate::skill::{success_value, Skill};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// The external TTS/playback pipeline. `play` resolves when playback
/// finishes.
#[async_trait]
pub trait AudioPipeline: Send + Sync {
    async fn play(&self, text: &str) -> SkillResult<()>;
}

struct SpeakRequest {
    text: String,
    done: oneshot::Sender<SkillResult<()>>,
}

/// Actor serializing all speech through one worker.
pub struct AudioQueue {
    tx: mpsc::Sender<SpeakRequest>,
}

impl AudioQueue {
    /// Playback timeout: generous floor plus 0.15s per character.
    fn playback_timeout(text: &str) -> Duration {
        Duration::from_secs_f64((text.len() as f64 * 0.15).max(10.0))
    }

    /// Spawn the queue worker over a playback pipeline.
    pub fn start(pipeline: Arc<dyn AudioPipeline>) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<SpeakRequest>(32);
        tokio::spawn(async move {
            while let Some(SpeakRequest { text, done }) = rx.recv().await {
                let timeout = Self::playback_timeout(&text);
                let result = match tokio::time::timeout(timeout, pipeline.play(&text)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(?timeout, "audio playback timed out");
                        Err(SkillError::execution("speak", "audio playback timed out"))
                    }
                };
                let _ = done.send(result);
            }
            info!("audio queue worker stopped");
        });
        Arc::new(Self { tx })
    }

    /// Enqueue text and wait until it finished playing.
    pub async fn speak(&self, text: &str) -> SkillResult<()> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(SpeakRequest {
                text: text.to_string(),
                done,
            })
            .await
            .map_err(|_| SkillError::execution("speak", "audio queue is gone"))?;
        rx.await
            .map_err(|_| SkillError::execution("speak", "audio worker dropped the request"))?
    }
}

#[derive(Deserialize)]
struct SpeakParams {
    text: String,
}

/// Speak text out loud to humans nearby.
pub struct SpeakSkill {
    queue: Arc<AudioQueue>,
    text: String,
}

impl SpeakSkill {
    pub fn descriptor() -> crate::schema::SkillDescriptor {
        use crate::schema::{ParamKind, ParamSpec, SkillDescriptor};
        SkillDescriptor::new(
            "Speak",
            "Speak text out loud to humans nearby or to other robots.",
            vec![ParamSpec::required(
                "text",
                ParamKind::String,
                "Text to speak",
            )],
        )
    }

    pub fn factory(queue: Arc<AudioQueue>) -> impl Fn(Value) -> SkillResult<Arc<dyn Skill>> {
        move |args| {
            let params: SpeakParams =
                serde_json::from_value(args).map_err(|e| SkillError::InvalidArguments {
                    name: "Speak".into(),
                    message: e.to_string(),
                })?;
            Ok(Arc::new(SpeakSkill {
                queue: queue.clone(),
                text: params.text,
            }) as _)
        }
    }
}

#[async_trait]
impl Skill for SpeakSkill {
    async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
        self.queue.speak(&self.text).await?;
        Ok(success_value(format!("spoke: {}", self.text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Instant;

    /// Pipeline that records (start, end) spans per utterance.
    struct RecordingPipeline {
        spans: Mutex<Vec<(Instant, Instant)>>,
        duration: Duration,
    }

    #[async_trait]
    impl AudioPipeline for RecordingPipeline {
        async fn play(&self, _text: &str) -> SkillResult<()> {
            let start = Instant::now();
            tokio::time::sleep(self.duration).await;
            self.spans.lock().push((start, Instant::now()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_requests_play_one_at_a_time() {
        let pipeline = Arc::new(RecordingPipeline {
            spans: Mutex::new(Vec::new()),
            duration: Duration::from_millis(50),
        });
        let queue = AudioQueue::start(pipeline.clone());

        let a = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.speak("first").await })
        };
        let b = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.speak("second").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let spans = pipeline.spans.lock();
        assert_eq!(spans.len(), 2);
        // No overlap between the two playbacks.
        let (first, second) = if spans[0].0 <= spans[1].0 {
            (spans[0], spans[1])
        } else {
            (spans[1], spans[0])
        };
        assert!(first.1 <= second.0);
    }

    #[test]
    fn timeout_scales_with_text_length() {
        assert_eq!(AudioQueue::playback_timeout("hi"), Duration::from_secs(10));
        let long = "x".repeat(200);
        assert_eq!(
            AudioQueue::playback_timeout(&long),
            Duration::from_secs_f64(30.0)
        );
    }

    #[tokio::test]
    async fn stuck_pipeline_times_out() {
        struct Hangs;

        #[async_trait]
        impl AudioPipeline for Hangs {
            async fn play(&self, _text: &str) -> SkillResult<()> {
                std::future::pending().await
            }
        }

        tokio::time::pause();
        let queue = AudioQueue::start(Arc::new(Hangs));
        let result = queue.speak("hello").await;
        assert!(matches!(result, Err(SkillError::Execution { .. })));
    }
}
