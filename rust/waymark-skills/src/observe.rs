//! Observer skill: periodic passive perception through the agent.
//!
//! Subscribes to the robot video stream and, at a caller-set period,
//! pulls one frame, base64-encodes it and re-enters the agent with a
//! fixed prompt. Runs on its own worker as a running skill until
//! terminated or until `max_duration` elapses.

use crate::agent::AgentShell;
use crate::error::{SkillError, SkillResult};
use crate::library::SkillLibrary;
use crate::schema::{ParamKind, ParamSpec, SkillDescriptor};
use crate::skill::{success_value, Skill};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use waymark_stream::{CancelToken, Topic};
use waymark_world::Frame;

const DEFAULT_QUERY: &str =
    "What do you see in this image? Alert me if you see any people or important changes.";
const FRAME_WAIT: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct ObserveParams {
    #[serde(default = "default_timestep")]
    timestep: f64,
    #[serde(default)]
    query_text: Option<String>,
    /// 0 runs indefinitely.
    #[serde(default)]
    max_duration: f64,
}

fn default_timestep() -> f64 {
    60.0
}

/// Periodically sends camera frames to the agent for context.
pub struct ObserveStreamSkill {
    video: Topic<Frame>,
    agent: Arc<AgentShell>,
    library: Weak<SkillLibrary>,
    cancel: CancelToken,
    timestep: f64,
    query_text: String,
    max_duration: f64,
}

impl ObserveStreamSkill {
    pub fn descriptor() -> SkillDescriptor {
        SkillDescriptor::new(
            "ObserveStream",
            "Periodically observe the robot camera and send frames to the agent. \
             Runs in the background until terminated; useful for passive monitoring, \
             such as waiting for a person to enter the room.",
            vec![
                ParamSpec::optional(
                    "timestep",
                    ParamKind::Number,
                    "Seconds between observation queries",
                ),
                ParamSpec::optional(
                    "query_text",
                    ParamKind::String,
                    "Query to send to the agent with each image",
                ),
                ParamSpec::optional(
                    "max_duration",
                    ParamKind::Number,
                    "Maximum seconds to run (0 for indefinite)",
                ),
            ],
        )
    }

    pub fn factory(
        video: Topic<Frame>,
        agent: Arc<AgentShell>,
        library: &Arc<SkillLibrary>,
    ) -> impl Fn(Value) -> SkillResult<Arc<dyn Skill>> {
        let library = Arc::downgrade(library);
        move |args| {
            let params: ObserveParams =
                serde_json::from_value(args).map_err(|e| SkillError::InvalidArguments {
                    name: "ObserveStream".into(),
                    message: e.to_string(),
                })?;
            Ok(Arc::new(ObserveStreamSkill {
                video: video.clone(),
                agent: agent.clone(),
                library: library.clone(),
                cancel: CancelToken::new(),
                timestep: params.timestep,
                query_text: params.query_text.unwrap_or_else(|| DEFAULT_QUERY.to_string()),
                max_duration: params.max_duration,
            }) as _)
        }
    }

    async fn observe_once(&self) {
        let frame = {
            let mut sub = self.video.subscribe();
            match tokio::time::timeout(FRAME_WAIT, sub.recv()).await {
                Ok(Ok(frame)) => frame,
                Ok(Err(e)) => {
                    warn!(error = %e, "video stream error while observing");
                    return;
                }
                Err(_) => {
                    warn!("no frame arrived within the observation window");
                    return;
                }
            }
        };

        let encoded = base64::engine::general_purpose::STANDARD.encode(&frame.data);
        let prompt = format!(
            "{}\n\nHere is the current camera view from the robot:",
            self.query_text
        );
        match self.agent.handle_query(&prompt, Some(encoded)).await {
            Ok(response) => info!(chars = response.len(), "observation processed"),
            Err(e) => warn!(error = %e, "observation query failed"),
        }
    }
}

#[async_trait]
impl Skill for ObserveStreamSkill {
    async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
        let Some(library) = self.library.upgrade() else {
            return Err(SkillError::MissingDependency {
                name: "ObserveStream".into(),
                message: "skill library is gone".into(),
            });
        };

        // Restart semantics: a previous observer under the same name is
        // stopped first.
        library.terminate("observestream").await;

        let cancel = self.cancel.clone();
        library.register_running("ObserveStream", self.clone(), cancel.clone());

        let skill = self.clone();
        let started = Instant::now();
        tokio::spawn(async move {
            let period = Duration::from_secs_f64(skill.timestep.max(0.1));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(period) => {}
                }
                if cancel.is_cancelled() {
                    break;
                }
                if skill.max_duration > 0.0
                    && started.elapsed().as_secs_f64() > skill.max_duration
                {
                    info!(
                        max_duration = skill.max_duration,
                        "observer reached its maximum duration"
                    );
                    if let Some(library) = skill.library.upgrade() {
                        library.terminate("observestream").await;
                    }
                    break;
                }
                skill.observe_once().await;
            }
            info!("observer stopped");
        });

        info!(timestep = self.timestep, "observer started");
        Ok(success_value(format!(
            "Observer started with timestep={}s",
            self.timestep
        )))
    }

    async fn stop(&self) {
        self.cancel.cancel();
    }
}
