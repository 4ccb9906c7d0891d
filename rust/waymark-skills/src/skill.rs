//! The skill capability.

use crate::error::SkillResult;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// An activated, parameterized skill instance.
///
/// `invoke` performs the action; it may block its task for the whole
/// action, or spawn a worker, register itself as running and return
/// immediately. `stop` is idempotent cancellation and must not fail.
#[async_trait]
pub trait Skill: Send + Sync {
    async fn invoke(self: Arc<Self>) -> SkillResult<Value>;

    async fn stop(&self) {}
}

/// The structured failure map skills return to the agent.
pub fn failure_value(failure_reason: &str, error: impl std::fmt::Display) -> Value {
    json!({
        "success": false,
        "failure_reason": failure_reason,
        "error": error.to_string(),
    })
}

/// A minimal success map with a human-readable message.
pub fn success_value(message: impl Into<String>) -> Value {
    json!({
        "success": true,
        "message": message.into(),
    })
}
