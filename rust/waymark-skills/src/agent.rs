//! Agent orchestration shell.
//!
//! The LLM reasoner itself is an external collaborator behind the
//! [`Reasoner`] trait: a query goes in, a stream of events comes out.
//! The shell wires text queries and observation context into it, hands
//! it the skill library's tool schemas, executes requested skills, and
//! feeds results back for follow-on replies. Every text chunk is also
//! fanned out on a shared response stream.

use crate::error::SkillResult;
use crate::library::SkillLibrary;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use waymark_stream::{CancelToken, Topic};

/// A query handed to the reasoner.
#[derive(Debug, Clone)]
pub struct ReasonerRequest {
    pub prompt: String,
    /// Base64-encoded image payload, when the query carries one.
    pub image_base64: Option<String>,
    /// Tool schemas the reasoner may call.
    pub tools: Vec<Value>,
}

/// One event of a reasoner's response stream.
#[derive(Debug, Clone)]
pub enum ReasonerEvent {
    /// A chunk of response text.
    Text(String),
    /// The reasoner wants a skill executed.
    ToolCall { name: String, arguments: Value },
}

/// Black-box LLM collaborator: query in, event stream out.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn query(&self, request: ReasonerRequest) -> SkillResult<mpsc::Receiver<ReasonerEvent>>;
}

/// Routes queries into the reasoner and skill invocations back out.
pub struct AgentShell {
    reasoner: Arc<dyn Reasoner>,
    library: Arc<SkillLibrary>,
    response_tx: broadcast::Sender<String>,
    /// Bound on reasoner -> tool -> reasoner round-trips per query.
    max_tool_rounds: usize,
}

impl AgentShell {
    pub fn new(reasoner: Arc<dyn Reasoner>, library: Arc<SkillLibrary>) -> Arc<Self> {
        let (response_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            reasoner,
            library,
            response_tx,
            max_tool_rounds: 8,
        })
    }

    pub fn library(&self) -> &Arc<SkillLibrary> {
        &self.library
    }

    /// Subscribe to the shared response stream.
    pub fn response_stream(&self) -> broadcast::Receiver<String> {
        self.response_tx.subscribe()
    }

    /// Run one query to completion, executing any skills the reasoner
    /// asks for, and return the accumulated response text.
    pub async fn handle_query(
        &self,
        prompt: &str,
        image_base64: Option<String>,
    ) -> SkillResult<String> {
        let mut prompt = prompt.to_string();
        let mut image = image_base64;
        let mut response = String::new();

        for round in 0..self.max_tool_rounds {
            let mut events = self
                .reasoner
                .query(ReasonerRequest {
                    prompt: prompt.clone(),
                    image_base64: image.take(),
                    tools: self.library.tools(),
                })
                .await?;

            let mut tool_call = None;
            while let Some(event) = events.recv().await {
                match event {
                    ReasonerEvent::Text(chunk) => {
                        let _ = self.response_tx.send(chunk.clone());
                        response.push_str(&chunk);
                    }
                    ReasonerEvent::ToolCall { name, arguments } => {
                        tool_call = Some((name, arguments));
                    }
                }
            }

            let Some((name, arguments)) = tool_call else {
                break;
            };
            info!(skill = %name, round, "agent invoked skill");
            let result = match self.library.call(&name, arguments).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(skill = %name, error = %e, "skill call failed");
                    json!({"success": false, "failure_reason": "NotFound", "error": e.to_string()})
                }
            };
            prompt = format!("Result of skill '{name}': {result}");
        }

        Ok(response)
    }

    /// Drive the shell from a query inbox until cancelled.
    ///
    /// When an observation-data topic is given, its latest value is
    /// prepended to every query as context.
    pub async fn run(
        self: Arc<Self>,
        mut queries: mpsc::Receiver<String>,
        observations: Option<Topic<String>>,
        cancel: CancelToken,
    ) {
        info!("agent shell running");
        loop {
            let query = tokio::select! {
                _ = cancel.cancelled() => break,
                next = queries.recv() => match next {
                    Some(q) => q,
                    None => break,
                },
            };

            let prompt = match observations.as_ref().and_then(|topic| topic.peek()) {
                Some(context) => format!("{context}\n\n{query}"),
                None => query,
            };

            if let Err(e) = self.handle_query(&prompt, None).await {
                warn!(error = %e, "query handling failed");
            }
        }
        info!("agent shell stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SkillDescriptor;
    use crate::skill::{success_value, Skill};
    use parking_lot::Mutex;

    /// Scripted reasoner: emits a fixed sequence of event lists, one
    /// per query.
    struct Scripted {
        rounds: Mutex<Vec<Vec<ReasonerEvent>>>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Reasoner for Scripted {
        async fn query(
            &self,
            request: ReasonerRequest,
        ) -> SkillResult<mpsc::Receiver<ReasonerEvent>> {
            self.prompts.lock().push(request.prompt);
            let events = {
                let mut rounds = self.rounds.lock();
                if rounds.is_empty() {
                    Vec::new()
                } else {
                    rounds.remove(0)
                }
            };
            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(async move {
                for event in events {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }
    }

    struct Ping;

    #[async_trait]
    impl Skill for Ping {
        async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
            Ok(success_value("pong"))
        }
    }

    #[tokio::test]
    async fn streams_text_and_returns_full_response() {
        let reasoner = Arc::new(Scripted {
            rounds: Mutex::new(vec![vec![
                ReasonerEvent::Text("hello ".into()),
                ReasonerEvent::Text("world".into()),
            ]]),
            prompts: Mutex::new(Vec::new()),
        });
        let library = SkillLibrary::new();
        let shell = AgentShell::new(reasoner, library);

        let mut stream = shell.response_stream();
        let full = shell.handle_query("hi", None).await.unwrap();
        assert_eq!(full, "hello world");
        assert_eq!(stream.recv().await.unwrap(), "hello ");
        assert_eq!(stream.recv().await.unwrap(), "world");
    }

    #[tokio::test]
    async fn tool_call_is_executed_and_result_fed_back() {
        let reasoner = Arc::new(Scripted {
            rounds: Mutex::new(vec![
                vec![ReasonerEvent::ToolCall {
                    name: "Ping".into(),
                    arguments: json!({}),
                }],
                vec![ReasonerEvent::Text("done".into())],
            ]),
            prompts: Mutex::new(Vec::new()),
        });
        let library = SkillLibrary::new();
        library.register(SkillDescriptor::new("Ping", "Ping.", vec![]), |_| {
            Ok(Arc::new(Ping) as _)
        });
        let shell = AgentShell::new(reasoner.clone(), library);

        let full = shell.handle_query("do it", None).await.unwrap();
        assert_eq!(full, "done");

        let prompts = reasoner.prompts.lock();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Ping"));
        assert!(prompts[1].contains("pong"));
    }

    #[tokio::test]
    async fn unknown_tool_reports_failure_to_reasoner() {
        let reasoner = Arc::new(Scripted {
            rounds: Mutex::new(vec![
                vec![ReasonerEvent::ToolCall {
                    name: "nope".into(),
                    arguments: json!({}),
                }],
                vec![],
            ]),
            prompts: Mutex::new(Vec::new()),
        });
        let shell = AgentShell::new(reasoner.clone(), SkillLibrary::new());

        shell.handle_query("x", None).await.unwrap();
        let prompts = reasoner.prompts.lock();
        assert!(prompts[1].contains("not found"));
    }
}
