//! Skill runtime and agent orchestration shell.
//!
//! Skills are the verbs an LLM agent can invoke on the robot: move,
//! rotate, navigate, observe, speak. The [`SkillLibrary`] owns their
//! registry, renders JSON tool schemas for the agent, and tracks
//! long-running skills so they can be cancelled from outside.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod agent;
pub mod audio;
pub mod builtin;
pub mod error;
pub mod library;
pub mod observe;
pub mod robot;
pub mod schema;
pub mod skill;

pub use agent::{AgentShell, Reasoner, ReasonerEvent, ReasonerRequest};
pub use audio::{AudioPipeline, AudioQueue, SpeakSkill};
pub use builtin::{
    register_robot_skills, GetPoseSkill, KillSkill, MoveSkill, NavigateToGoalSkill,
    NavigateWithTextSkill, SpinSkill, WaitSkill,
};
pub use error::{SkillError, SkillResult};
pub use library::{RunningSkill, SkillLibrary, TerminateOutcome};
pub use observe::ObserveStreamSkill;
pub use robot::RobotHandle;
pub use schema::{ParamKind, ParamSpec, SkillDescriptor};
pub use skill::{failure_value, success_value, Skill};
