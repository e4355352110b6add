//! Multi-turn conversation core: command grammar, per-key state, and the engine that drives the
//! query pipeline and follow-up actions.

pub mod command;
pub mod engine;
pub mod registry;
pub mod render;
pub mod state;

use serde::Serialize;

use crate::errors::AssistantError;
use crate::store::resume::ResumeHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Results,
    NoCandidates,
    NoMore,
    Detail,
    Resume,
    ContactSent,
    Ended,
    Superseded,
    Error,
}

/// Observable outcome of one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume: Option<ResumeHandle>,
}

impl Reply {
    pub fn new(kind: ReplyKind, text: String) -> Self {
        Self {
            kind,
            text,
            resume: None,
        }
    }

    pub fn error(err: &AssistantError) -> Self {
        Self::new(ReplyKind::Error, err.user_message())
    }
}
