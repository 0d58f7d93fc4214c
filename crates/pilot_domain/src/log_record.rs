use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogKind {
    Tool,
    Result,
    Error,
    Info,
}

/// Operator facing record mirrored to the observability sink. Independent of
/// what gets committed to the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[setters(into, strip_option)]
pub struct LogRecord {
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl LogRecord {
    fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), data: None }
    }

    pub fn tool(message: impl Into<String>) -> Self {
        Self::new(LogKind::Tool, message)
    }

    pub fn result(message: impl Into<String>) -> Self {
        Self::new(LogKind::Result, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogKind::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogKind::Info, message)
    }
}
