use std::sync::Arc;

use chrono::{DateTime, Utc};
use pilot_domain::{
    Clock, LogRecord, ObservabilitySink, ToolCallFull, ToolCallId, ToolName, ToolOutput,
    ToolResult,
};
use serde_json::{Value, json};

/// Live view of a tool invocation that has started but not finished.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallHandle {
    pub call_id: ToolCallId,
    pub name: ToolName,
    pub arguments: Value,
    pub started_at: DateTime<Utc>,
}

/// How a result was matched to its call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The correlation id matched the key of an in-flight call.
    ById,
    /// No key matched; the oldest in-flight call with the same name was used.
    ByName,
    /// Nothing matched; an `unknown_tool` call was synthesized.
    Placeholder,
    /// The run completed while the call was still in flight.
    Abandoned,
}

/// A settled (call, result) pair ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCall {
    pub call: ToolCallFull,
    pub result: ToolResult,
    pub resolution: Resolution,
}

#[derive(Debug, Clone)]
struct InFlightCall {
    /// The producer's id when it sent one, the tool name otherwise.
    key: String,
    call: ToolCallFull,
    call_id: ToolCallId,
    started_at: DateTime<Utc>,
}

impl InFlightCall {
    fn handle(&self) -> ToolCallHandle {
        ToolCallHandle {
            call_id: self.call_id.clone(),
            name: self.call.name.clone(),
            arguments: self.call.arguments.clone(),
            started_at: self.started_at,
        }
    }
}

/// Tracks in-flight tool invocations for one run, in start order.
pub struct ToolCallTracker {
    in_flight: Vec<InFlightCall>,
    sink: Arc<dyn ObservabilitySink>,
    clock: Arc<dyn Clock>,
}

impl ToolCallTracker {
    pub fn new(sink: Arc<dyn ObservabilitySink>, clock: Arc<dyn Clock>) -> Self {
        Self { in_flight: Vec::new(), sink, clock }
    }

    /// Registers a started call. Calls without an id get a synthesized one
    /// but stay keyed by their name.
    pub fn on_start(&mut self, mut call: ToolCallFull) -> ToolCallHandle {
        let key = match &call.call_id {
            Some(id) => id.as_str().to_string(),
            None => call.name.as_str().to_string(),
        };
        let call_id = call.call_id.clone().unwrap_or_else(ToolCallId::synthesize);
        call.call_id = Some(call_id.clone());

        self.sink.record(LogRecord::tool(call.name.as_str()).data(json!({
            "id": call_id.as_str(),
            "args": call.arguments,
        })));

        let entry = InFlightCall { key, call, call_id, started_at: self.clock.now() };
        let handle = entry.handle();
        self.in_flight.push(entry);
        handle
    }

    /// Resolves a result to the call it belongs to and removes that call from
    /// the in-flight set. Never drops a result: when nothing matches, a
    /// placeholder `unknown_tool` call is synthesized for it.
    pub fn on_result(
        &mut self,
        correlation_id: Option<&ToolCallId>,
        name: Option<&ToolName>,
        output: ToolOutput,
    ) -> ResolvedCall {
        let resolved = match self.find(correlation_id, name) {
            Some((index, resolution)) => {
                let entry = self.in_flight.remove(index);
                let result = ToolResult::from(&entry.call).output(output);
                ResolvedCall { call: entry.call, result, resolution }
            }
            None => {
                let call_id = correlation_id.cloned().unwrap_or_else(ToolCallId::synthesize);
                let call = ToolCallFull::new(ToolName::unknown())
                    .call_id(call_id)
                    .arguments(json!({}));
                let result = ToolResult::from(&call).output(output);
                self.sink.record(
                    LogRecord::error("Tool result matched no in-flight call").data(json!({
                        "toolCallId": correlation_id.map(ToolCallId::as_str),
                        "name": name.map(ToolName::as_str),
                    })),
                );
                ResolvedCall { call, result, resolution: Resolution::Placeholder }
            }
        };

        if resolved.resolution == Resolution::ByName && correlation_id.is_some() {
            self.sink.record(
                LogRecord::error("Unmatched correlation id resolved by tool name").data(json!({
                    "toolCallId": correlation_id.map(ToolCallId::as_str),
                    "name": resolved.call.name.as_str(),
                })),
            );
        }

        self.sink
            .record(LogRecord::result(resolved.call.name.as_str()).data(json!({
                "id": resolved.call.call_id.as_ref().map(ToolCallId::as_str),
                "summary": resolved.result.output.summary(),
                "isError": resolved.result.is_error(),
            })));

        resolved
    }

    /// Matching policy: exact key first, then the oldest in-flight call with
    /// the same name. The name comes from the result, or failing that from the
    /// correlation id itself.
    fn find(
        &self,
        correlation_id: Option<&ToolCallId>,
        name: Option<&ToolName>,
    ) -> Option<(usize, Resolution)> {
        if let Some(id) = correlation_id
            && let Some(index) = self.in_flight.iter().position(|c| c.key == id.as_str())
        {
            return Some((index, Resolution::ById));
        }

        let name = name
            .map(ToolName::as_str)
            .or_else(|| correlation_id.map(ToolCallId::as_str))?;
        self.in_flight
            .iter()
            .position(|c| c.call.name.as_str() == name)
            .map(|index| (index, Resolution::ByName))
    }

    /// Settles every in-flight call as failed, oldest first.
    pub fn drain_unresolved(&mut self, error: &str) -> Vec<ResolvedCall> {
        self.in_flight
            .drain(..)
            .map(|entry| {
                let result = ToolResult::from(&entry.call).failure(error);
                ResolvedCall { call: entry.call, result, resolution: Resolution::Abandoned }
            })
            .collect()
    }

    /// Forgets every in-flight call without settling it. Returns how many
    /// were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.in_flight.len();
        self.in_flight.clear();
        dropped
    }

    pub fn handles(&self) -> Vec<ToolCallHandle> {
        self.in_flight.iter().map(InFlightCall::handle).collect()
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}
