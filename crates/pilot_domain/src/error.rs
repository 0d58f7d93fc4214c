use crate::ConversationId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Daily action limit reached ({used}/{limit})")]
    LimitReached { used: u64, limit: u64 },

    #[error("No model is configured for this run")]
    NoModelConfigured,

    #[error("A run is already in progress for conversation {0}")]
    RunInProgress(ConversationId),

    #[error("Conversation {0} not found")]
    ConversationNotFound(ConversationId),

    #[error("Agent dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("Unrecognized agent event: {0}")]
    UnrecognizedEvent(String),

    #[error("Failed to decode agent event: {0}")]
    EventDecode(#[from] serde_json::Error),

    #[error("Invalid conversation id: {0}")]
    ConversationId(uuid::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Returns `true` for refusals raised by the quota gate rather than by a
    /// failure.
    pub fn is_limit_reached(&self) -> bool {
        matches!(self, Error::LimitReached { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
