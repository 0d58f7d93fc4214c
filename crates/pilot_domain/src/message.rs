use chrono::{DateTime, Utc};
use derive_more::derive::Display;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ToolCallFull, ToolResult};

#[derive(Debug, Display, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single transcript entry.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Setters)]
#[setters(strip_option, into)]
#[serde(rename_all = "snake_case")]
pub struct Message {
    #[setters(skip)]
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallFull>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl ToString) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            content: content.to_string(),
            tool_calls: None,
            tool_results: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl ToString) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl ToString) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl ToString) -> Self {
        Self::new(Role::System, content)
    }

    /// An assistant message carrying one resolved tool invocation.
    pub fn tool_pair(call: ToolCallFull, result: ToolResult) -> Self {
        Self::assistant("")
            .tool_calls(vec![call])
            .tool_results(vec![result])
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn has_tool_call(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }

    /// A message is settled when every tool call it carries has a result with
    /// the same call id.
    pub fn is_settled(&self) -> bool {
        let calls = self.tool_calls.as_deref().unwrap_or_default();
        let results = self.tool_results.as_deref().unwrap_or_default();
        calls
            .iter()
            .all(|call| results.iter().any(|result| result.call_id == call.call_id))
    }

    /// Folds `partial` into this message: text is concatenated and tool lists
    /// are unioned by call id, preserving first-seen order.
    pub fn absorb(&mut self, partial: Message) {
        self.content.push_str(&partial.content);

        if let Some(calls) = partial.tool_calls {
            let existing = self.tool_calls.get_or_insert_with(Vec::new);
            for call in calls {
                if !existing.iter().any(|c| c.call_id == call.call_id) {
                    existing.push(call);
                }
            }
        }

        if let Some(results) = partial.tool_results {
            let existing = self.tool_results.get_or_insert_with(Vec::new);
            for result in results {
                if !existing.iter().any(|r| r.call_id == result.call_id) {
                    existing.push(result);
                }
            }
        }

        self.timestamp = partial.timestamp.max(self.timestamp);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{ToolCallId, ToolName, ToolOutput};

    fn call(id: &str) -> ToolCallFull {
        ToolCallFull::new(ToolName::new("browser_click"))
            .call_id(ToolCallId::new(id))
            .arguments(json!({"selector": "#go"}))
    }

    fn result(id: &str) -> ToolResult {
        ToolResult::new(ToolName::new("browser_click"))
            .call_id(ToolCallId::new(id))
            .output(ToolOutput::message("clicked"))
    }

    #[test]
    fn test_tool_pair_is_settled() {
        let fixture = Message::tool_pair(call("a"), result("a"));
        assert!(fixture.is_settled());
        assert!(fixture.has_tool_call());
        assert!(fixture.has_role(Role::Assistant));
    }

    #[test]
    fn test_call_without_result_is_not_settled() {
        let fixture = Message::assistant("").tool_calls(vec![call("a")]);
        assert!(!fixture.is_settled());
    }

    #[test]
    fn test_absorb_concatenates_and_unions() {
        let mut fixture = Message::assistant("Looking ").tool_calls(vec![call("a")]);
        fixture.absorb(
            Message::assistant("around")
                .tool_calls(vec![call("a"), call("b")])
                .tool_results(vec![result("a")]),
        );

        let actual_ids: Vec<_> = fixture
            .tool_calls
            .clone()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.call_id.map(|id| id.as_str().to_string()))
            .collect();
        assert_eq!(fixture.content, "Looking around");
        assert_eq!(actual_ids, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(fixture.tool_results.map(|r| r.len()), Some(1));
    }
}
