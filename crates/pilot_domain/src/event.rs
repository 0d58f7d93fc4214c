use serde::Deserialize;
use serde_json::Value;
use strum_macros::IntoStaticStr;

use crate::{Error, Result, ToolCallFull, ToolCallId, ToolName, ToolOutput};

/// One event delivered by the agent feed, decoded once at the feed boundary.
#[derive(Clone, Debug, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AgentEvent {
    /// A text fragment. Narration is buffered for live display; anything else
    /// is committed immediately as a finished message.
    Text { content: String, narration: bool },
    ToolCallStart(ToolCallFull),
    ToolResult {
        call_id: Option<ToolCallId>,
        name: Option<ToolName>,
        output: ToolOutput,
    },
    NewTurn,
    LimitReached,
    Done,
}

impl AgentEvent {
    pub fn narration(content: impl Into<String>) -> Self {
        AgentEvent::Text { content: content.into(), narration: true }
    }

    pub fn message(content: impl Into<String>) -> Self {
        AgentEvent::Text { content: content.into(), narration: false }
    }

    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Decodes the loosely shaped wire object into a single event variant.
    ///
    /// When an object carries several markers, terminal markers win over tool
    /// traffic, which wins over turn boundaries and text. Text riding on a
    /// terminal marker is dropped here; use [`Self::decode_all`] to keep it.
    pub fn decode(value: Value) -> Result<Self> {
        let raw: RawEvent = serde_json::from_value(value.clone())?;
        raw.into_event()
            .ok_or_else(|| Error::UnrecognizedEvent(value.to_string()))
    }

    /// Decodes a wire object into the events it carries, in order. Text on a
    /// `done` or `limitReached` object comes out as a text event ahead of the
    /// terminal one.
    pub fn decode_all(value: Value) -> Result<Vec<Self>> {
        let mut raw: RawEvent = serde_json::from_value(value.clone())?;

        let mut events = Vec::new();
        if raw.is_terminal()
            && let Some(content) = raw.content.take()
        {
            events.push(AgentEvent::Text {
                content,
                narration: raw.is_narration.unwrap_or(true),
            });
        }
        let event = raw
            .into_event()
            .ok_or_else(|| Error::UnrecognizedEvent(value.to_string()))?;
        events.push(event);
        Ok(events)
    }

    pub fn from_json(input: &str) -> Result<Self> {
        Self::decode(serde_json::from_str(input)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    content: Option<String>,
    is_narration: Option<bool>,
    tool_call: Option<RawToolCall>,
    tool_result: Option<RawToolResult>,
    is_new_turn: Option<bool>,
    limit_reached: Option<bool>,
    done: Option<bool>,
}

impl RawEvent {
    fn is_terminal(&self) -> bool {
        self.done == Some(true) || self.limit_reached == Some(true)
    }

    fn into_event(self) -> Option<AgentEvent> {
        if self.done == Some(true) {
            return Some(AgentEvent::Done);
        }
        if self.limit_reached == Some(true) {
            return Some(AgentEvent::LimitReached);
        }
        if let Some(result) = self.tool_result {
            return Some(AgentEvent::ToolResult {
                call_id: result.tool_call_id.map(ToolCallId::new),
                name: result.name.map(ToolName::new),
                output: result.result,
            });
        }
        if let Some(call) = self.tool_call {
            let mut full = ToolCallFull::new(call.name)
                .arguments(call.args.unwrap_or_else(|| Value::Object(Default::default())));
            full.call_id = call.id.map(ToolCallId::new);
            return Some(AgentEvent::ToolCallStart(full));
        }
        if self.is_new_turn == Some(true) {
            return Some(AgentEvent::NewTurn);
        }
        self.content.map(|content| AgentEvent::Text {
            content,
            narration: self.is_narration.unwrap_or(true),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    id: Option<String>,
    name: String,
    #[serde(alias = "arguments")]
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawToolResult {
    tool_call_id: Option<String>,
    #[serde(alias = "toolName")]
    name: Option<String>,
    #[serde(default)]
    result: ToolOutput,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_narration_defaults_to_buffered() {
        let actual = AgentEvent::decode(json!({"content": "Checking page"})).unwrap();
        let expected = AgentEvent::narration("Checking page");
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_decode_finished_text() {
        let actual =
            AgentEvent::decode(json!({"content": "All set", "isNarration": false})).unwrap();
        let expected = AgentEvent::message("All set");
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_decode_tool_call() {
        let fixture = json!({
            "toolCall": {"id": "t1", "name": "browser_navigate", "args": {"url": "https://example.com"}}
        });
        let actual = AgentEvent::decode(fixture).unwrap();
        let expected = AgentEvent::ToolCallStart(
            ToolCallFull::new("browser_navigate")
                .call_id(ToolCallId::new("t1"))
                .arguments(json!({"url": "https://example.com"})),
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_decode_tool_call_without_id_or_args() {
        let actual = AgentEvent::decode(json!({"toolCall": {"name": "browser_snapshot"}})).unwrap();
        let expected =
            AgentEvent::ToolCallStart(ToolCallFull::new("browser_snapshot").arguments(json!({})));
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_decode_tool_result() {
        let fixture = json!({
            "toolResult": {"toolCallId": "t1", "result": {"message": "Navigated"}}
        });
        let actual = AgentEvent::decode(fixture).unwrap();
        let expected = AgentEvent::ToolResult {
            call_id: Some(ToolCallId::new("t1")),
            name: None,
            output: ToolOutput::message("Navigated"),
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_decode_markers() {
        assert_eq!(AgentEvent::decode(json!({"isNewTurn": true})).unwrap(), AgentEvent::NewTurn);
        assert_eq!(
            AgentEvent::decode(json!({"limitReached": true})).unwrap(),
            AgentEvent::LimitReached
        );
        assert_eq!(AgentEvent::decode(json!({"done": true})).unwrap(), AgentEvent::Done);
    }

    #[test]
    fn test_decode_done_wins_over_content() {
        let actual = AgentEvent::decode(json!({"content": "bye", "done": true})).unwrap();
        assert_eq!(actual, AgentEvent::Done);
    }

    #[test]
    fn test_decode_all_keeps_text_on_done() {
        let actual =
            AgentEvent::decode_all(json!({"content": "bye", "isNarration": false, "done": true}))
                .unwrap();
        let expected = vec![AgentEvent::message("bye"), AgentEvent::Done];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_decode_all_keeps_narration_on_limit() {
        let actual =
            AgentEvent::decode_all(json!({"content": "Almost", "limitReached": true})).unwrap();
        let expected = vec![AgentEvent::narration("Almost"), AgentEvent::LimitReached];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_decode_all_single_event() {
        let actual = AgentEvent::decode_all(json!({"isNewTurn": true})).unwrap();
        assert_eq!(actual, vec![AgentEvent::NewTurn]);
    }

    #[test]
    fn test_decode_all_unrecognized() {
        let actual = AgentEvent::decode_all(json!({"heartbeat": 1}));
        assert!(matches!(actual, Err(Error::UnrecognizedEvent(_))));
    }

    #[test]
    fn test_decode_unrecognized() {
        let actual = AgentEvent::decode(json!({"done": false, "heartbeat": 1}));
        assert!(matches!(actual, Err(Error::UnrecognizedEvent(_))));
    }

    #[test]
    fn test_decode_rejects_malformed_tool_call() {
        let actual = AgentEvent::from_json(r#"{"toolCall": {"id": "t1"}}"#);
        assert!(matches!(actual, Err(Error::EventDecode(_))));
    }

    #[test]
    fn test_kind() {
        assert_eq!(AgentEvent::NewTurn.kind(), "new_turn");
        assert_eq!(AgentEvent::narration("x").kind(), "text");
    }
}
