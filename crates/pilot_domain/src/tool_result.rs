use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ToolCallFull, ToolCallId, ToolName};

/// Payload returned by the browser surface for one tool invocation.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ToolOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ToolOutput {
    pub fn message(message: impl Into<String>) -> Self {
        Self { message: Some(message.into()), ..Default::default() }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Default::default() }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Short human readable text for the output: the error if any, otherwise
    /// the message, otherwise the serialized payload.
    pub fn summary(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        if let Some(message) = &self.message {
            return message.clone();
        }
        if self.payload.is_empty() {
            return String::new();
        }
        Value::Object(self.payload.clone()).to_string()
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Setters)]
#[setters(strip_option, into)]
pub struct ToolResult {
    pub name: ToolName,
    pub call_id: Option<ToolCallId>,
    pub output: ToolOutput,
}

impl ToolResult {
    pub fn new(name: impl Into<ToolName>) -> ToolResult {
        Self { name: name.into(), call_id: None, output: ToolOutput::default() }
    }

    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.output.error = Some(error.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.output.is_error()
    }
}

impl From<&ToolCallFull> for ToolResult {
    fn from(value: &ToolCallFull) -> Self {
        Self {
            name: value.name.clone(),
            call_id: value.call_id.clone(),
            output: ToolOutput::default(),
        }
    }
}
