//! The skill registry and running-skill tracker.

use crate::error::{SkillError, SkillResult};
use crate::schema::SkillDescriptor;
use crate::skill::{failure_value, Skill};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use waymark_stream::CancelToken;

type SkillFactory = Arc<dyn Fn(Value) -> SkillResult<Arc<dyn Skill>> + Send + Sync>;

struct RegisteredSkill {
    descriptor: SkillDescriptor,
    factory: SkillFactory,
    /// Stored arguments merged into every call; stored values win.
    defaults: Option<Value>,
}

/// A long-running skill instance and its cancellation handle.
pub struct RunningSkill {
    pub instance: Arc<dyn Skill>,
    pub cancel: CancelToken,
}

/// Outcome of [`SkillLibrary::terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    Terminated,
    NotFound,
}

/// Registry of skills plus the map of currently-running instances.
///
/// Skill names are matched case-insensitively; running skills are keyed
/// by lowercased name.
#[derive(Default)]
pub struct SkillLibrary {
    skills: RwLock<Vec<RegisteredSkill>>,
    running: DashMap<String, RunningSkill>,
}

impl SkillLibrary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a skill: its descriptor plus the factory that builds an
    /// instance from call arguments. Dependencies (robot, agent, other
    /// collaborators) are captured by the factory at registration time.
    pub fn register(
        &self,
        descriptor: SkillDescriptor,
        factory: impl Fn(Value) -> SkillResult<Arc<dyn Skill>> + Send + Sync + 'static,
    ) {
        let mut skills = self.skills.write();
        let name = descriptor.name;
        skills.retain(|s| !s.descriptor.name.eq_ignore_ascii_case(name));
        skills.push(RegisteredSkill {
            descriptor,
            factory: Arc::new(factory),
            defaults: None,
        });
        info!(skill = name, "registered skill");
    }

    /// Drop a skill from the registry.
    pub fn remove(&self, name: &str) -> bool {
        let mut skills = self.skills.write();
        let before = skills.len();
        skills.retain(|s| !s.descriptor.name.eq_ignore_ascii_case(name));
        let removed = skills.len() != before;
        if !removed {
            warn!(skill = name, "attempted to remove unknown skill");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills
            .read()
            .iter()
            .any(|s| s.descriptor.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.skills.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.skills
            .read()
            .iter()
            .map(|s| s.descriptor.name.to_string())
            .collect()
    }

    /// Store call arguments for a skill; construction still happens at
    /// call time, with these values taking precedence.
    pub fn set_defaults(&self, name: &str, args: Value) -> SkillResult<()> {
        let mut skills = self.skills.write();
        let entry = skills
            .iter_mut()
            .find(|s| s.descriptor.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| SkillError::NotFound {
                name: name.to_string(),
            })?;
        entry.defaults = Some(args);
        Ok(())
    }

    /// JSON tool schemas for every registered skill, in registration
    /// order.
    pub fn tools(&self) -> Vec<Value> {
        self.skills
            .read()
            .iter()
            .map(|s| s.descriptor.tool_schema())
            .collect()
    }

    /// Construct and invoke a skill.
    ///
    /// Execution failures come back as the structured
    /// `{success: false, failure_reason, error}` map; only an unknown
    /// name is an `Err`.
    pub async fn call(&self, name: &str, args: Value) -> SkillResult<Value> {
        let (skill_name, factory, merged) = {
            let skills = self.skills.read();
            let entry = skills
                .iter()
                .find(|s| s.descriptor.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| SkillError::NotFound {
                    name: name.to_string(),
                })?;
            (
                entry.descriptor.name,
                entry.factory.clone(),
                merge_args(args, entry.defaults.clone()),
            )
        };

        let instance = match factory(merged) {
            Ok(instance) => instance,
            Err(e) => {
                error!(skill = skill_name, error = %e, "failed to construct skill");
                return Ok(failure_value("InvalidArguments", e));
            }
        };

        match instance.invoke().await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(skill = skill_name, error = %e, "skill invocation failed");
                // A failed long-running skill must not linger in the
                // running map.
                self.unregister_running(skill_name);
                Ok(failure_value("Execution", e))
            }
        }
    }

    /// Track a long-running skill so it can be cancelled externally.
    pub fn register_running(&self, name: &str, instance: Arc<dyn Skill>, cancel: CancelToken) {
        let key = name.to_lowercase();
        self.running.insert(key, RunningSkill { instance, cancel });
        info!(skill = name, "registered running skill");
    }

    /// Drop the running registration without stopping the skill.
    pub fn unregister_running(&self, name: &str) -> bool {
        self.running.remove(&name.to_lowercase()).is_some()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains_key(&name.to_lowercase())
    }

    pub fn running_names(&self) -> Vec<String> {
        self.running.iter().map(|e| e.key().clone()).collect()
    }

    /// Stop a running skill: call its `stop`, cancel its token, and
    /// unregister it. Idempotent; never fails.
    pub async fn terminate(&self, name: &str) -> TerminateOutcome {
        let key = name.to_lowercase();
        match self.running.remove(&key) {
            Some((_, running)) => {
                running.instance.stop().await;
                running.cancel.cancel();
                info!(skill = %key, "terminated running skill");
                TerminateOutcome::Terminated
            }
            None => {
                info!(skill = %key, "no running skill with that name");
                TerminateOutcome::NotFound
            }
        }
    }

    /// Terminate every running skill and clear the registry.
    pub async fn clear(&self) {
        let names = self.running_names();
        for name in names {
            self.terminate(&name).await;
        }
        self.skills.write().clear();
    }
}

/// Merge stored defaults over call-site arguments; stored values win.
fn merge_args(call: Value, stored: Option<Value>) -> Value {
    let mut merged = match call {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Some(Value::Object(stored)) = stored {
        for (key, value) in stored {
            merged.insert(key, value);
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParamKind, ParamSpec};
    use crate::skill::success_value;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    struct Echo {
        args: Value,
    }

    #[async_trait]
    impl Skill for Echo {
        async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
            Ok(self.args.clone())
        }
    }

    fn echo_descriptor() -> SkillDescriptor {
        SkillDescriptor::new(
            "Echo",
            "Echo the arguments back.",
            vec![ParamSpec::optional(
                "value",
                ParamKind::String,
                "Anything.",
            )],
        )
    }

    #[tokio::test]
    async fn call_merges_stored_args_with_stored_winning() {
        let library = SkillLibrary::new();
        library.register(echo_descriptor(), |args| Ok(Arc::new(Echo { args }) as _));
        library
            .set_defaults("echo", json!({"value": "stored", "extra": 1}))
            .unwrap();

        let result = library
            .call("Echo", json!({"value": "call-site", "other": 2}))
            .await
            .unwrap();
        assert_eq!(result["value"], "stored");
        assert_eq!(result["extra"], 1);
        assert_eq!(result["other"], 2);
    }

    #[tokio::test]
    async fn unknown_skill_is_an_error() {
        let library = SkillLibrary::new();
        assert!(matches!(
            library.call("missing", json!({})).await,
            Err(SkillError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failing_skill_returns_structured_failure() {
        struct Fails;

        #[async_trait]
        impl Skill for Fails {
            async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
                Err(SkillError::execution("fails", "boom"))
            }
        }

        let library = SkillLibrary::new();
        library.register(
            SkillDescriptor::new("Fails", "Always fails.", vec![]),
            |_| Ok(Arc::new(Fails) as _),
        );

        let result = library.call("fails", json!({})).await.unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["failure_reason"], "Execution");
    }

    /// Counter skill that ticks on its own worker until terminated.
    struct Counter {
        count: Arc<AtomicU64>,
        cancel: CancelToken,
    }

    #[async_trait]
    impl Skill for Counter {
        async fn invoke(self: Arc<Self>) -> SkillResult<Value> {
            let count = self.count.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(100)) => {
                            count.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
            });
            Ok(success_value("counter started"))
        }

        async fn stop(&self) {
            self.cancel.cancel();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn terminate_stops_a_running_skill() {
        let library = SkillLibrary::new();
        let count = Arc::new(AtomicU64::new(0));
        let cancel = CancelToken::new();
        let skill = Arc::new(Counter {
            count: count.clone(),
            cancel: cancel.clone(),
        });

        skill.clone().invoke().await.unwrap();
        library.register_running("Counter", skill, cancel);
        assert!(library.is_running("counter"));

        tokio::time::sleep(Duration::from_millis(550)).await;
        assert_eq!(library.terminate("counter").await, TerminateOutcome::Terminated);
        assert!(!library.is_running("counter"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let after = count.load(Ordering::SeqCst);
        assert!((4..=6).contains(&after), "count was {after}");

        // Counter must not move after termination.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(count.load(Ordering::SeqCst), after);

        // Terminating again is a not-found no-op.
        assert_eq!(library.terminate("counter").await, TerminateOutcome::NotFound);
    }

    #[tokio::test]
    async fn clear_terminates_everything() {
        let library = SkillLibrary::new();
        library.register(echo_descriptor(), |args| Ok(Arc::new(Echo { args }) as _));
        let cancel = CancelToken::new();
        library.register_running(
            "echo",
            Arc::new(Echo { args: json!({}) }),
            cancel.clone(),
        );

        library.clear().await;
        assert!(library.is_empty());
        assert!(library.running_names().is_empty());
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn tools_render_in_registration_order() {
        let library = SkillLibrary::new();
        library.register(echo_descriptor(), |args| Ok(Arc::new(Echo { args }) as _));
        library.register(
            SkillDescriptor::new("Other", "Another skill.", vec![]),
            |_| Ok(Arc::new(Echo { args: Value::Null }) as _),
        );

        let tools = library.tools();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "Echo");
        assert_eq!(tools[1]["name"], "Other");
    }
}
