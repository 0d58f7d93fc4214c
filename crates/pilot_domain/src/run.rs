use derive_more::derive::Display;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};

use crate::ConversationId;

/// Monotonic identifier for one run, unique within a controller.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(u64);

impl RunId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Ownership token for the single run slot of a conversation. Every event
/// handler must present the token of the run it belongs to; a token that no
/// longer matches the active run marks the event as stale.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display("{conversation_id}#{run_id}")]
pub struct RunToken {
    pub conversation_id: ConversationId,
    pub run_id: RunId,
}

impl RunToken {
    pub fn new(conversation_id: ConversationId, run_id: RunId) -> Self {
        Self { conversation_id, run_id }
    }
}

#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(value: impl ToString) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Driven by the user from the interactive conversation.
    #[default]
    Interactive,
    /// Unattended execution in its own conversation.
    Isolated,
}

#[derive(Debug, Default, Clone, PartialEq, Setters, Serialize, Deserialize)]
#[setters(into, strip_option)]
pub struct RunConfig {
    pub model: Option<ModelId>,
    pub kind: RunKind,
}

/// Reply of the agent collaborator to a dispatch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResponse {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }
}

/// Why a run ended without a `done` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The user pressed stop.
    Cancelled,
    /// The daily action allowance ran out mid-run.
    LimitReached { limit: Option<u64> },
    /// The feed went quiet or closed without a terminal event.
    FeedLost,
}
