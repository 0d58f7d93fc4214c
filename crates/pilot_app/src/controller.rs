// Tests for this module can be found in: tests/controller_*.rs
use std::collections::HashMap;
use std::sync::Arc;

use derive_setters::Setters;
use pilot_config::PilotConfig;
use pilot_domain::*;
use serde_json::json;
use tracing::{debug, info, trace, warn};

use crate::{
    ConversationStore, Flushed, NarrationBuffer, QuotaGate, TerminationMessage, ToolCallHandle,
    ToolCallTracker,
};

const AUTOMATED_RUN_TITLE: &str = "Automated run";
const DANGLING_CALL_ERROR: &str = "no result received before the run completed";

/// Request to start a run.
#[derive(Debug, Clone, Default, Setters)]
#[setters(into, strip_option)]
pub struct RunRequest {
    /// Conversation to continue. A new conversation is created when unset
    /// and for isolated runs.
    pub conversation_id: Option<ConversationId>,
    pub instruction: String,
    pub config: RunConfig,
    /// Title for a newly created conversation. Derived from the instruction
    /// when unset.
    pub title: Option<String>,
}

impl RunRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self { instruction: instruction.into(), ..Default::default() }
    }
}

/// What `handle_event` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event was folded into the run.
    Applied,
    /// The event belonged to a run that is no longer active.
    Ignored,
    /// `done` was received; the run is over.
    Completed,
    /// The daily allowance ran out; the run was torn down.
    LimitReached,
}

/// Snapshot of an active run for live display.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRun {
    pub token: RunToken,
    /// The utterance being spoken, not yet committed.
    pub narration: String,
    pub tools: Vec<ToolCallHandle>,
}

struct ActiveRun {
    token: RunToken,
    tracker: ToolCallTracker,
    narration: NarrationBuffer,
}

/// Folds agent event feeds into conversation transcripts.
///
/// Each conversation has a single run slot. The token returned by
/// [`StreamController::start_run`] owns that slot until the run completes or
/// is torn down; events presented with any other token are discarded.
pub struct StreamController<S> {
    services: Arc<S>,
    sink: Arc<dyn ObservabilitySink>,
    clock: Arc<dyn Clock>,
    store: ConversationStore,
    quota: QuotaGate,
    runs: HashMap<ConversationId, ActiveRun>,
    next_run_id: u64,
    workspace_id: WorkspaceId,
    title_max_chars: usize,
    dedup_prefix_chars: usize,
}

impl<S: AgentService> StreamController<S> {
    pub fn new(
        services: Arc<S>,
        sink: Arc<dyn ObservabilitySink>,
        clock: Arc<dyn Clock>,
        config: &PilotConfig,
    ) -> Self {
        Self {
            services,
            sink,
            store: ConversationStore::new(),
            quota: QuotaGate::new(config.quota.daily_action_limit, clock.clone()),
            clock,
            runs: HashMap::new(),
            next_run_id: 1,
            workspace_id: WorkspaceId::new(&config.workspace_id),
            title_max_chars: config.title_max_chars,
            dedup_prefix_chars: config.narration.dedup_prefix_chars,
        }
    }

    /// Starts a run and returns the token that owns it.
    ///
    /// Refusals happen before anything is written. A failed dispatch leaves
    /// a single assistant error message in the transcript and releases the
    /// run slot.
    ///
    /// # Errors
    /// - [`Error::RunInProgress`] if the conversation already has a run
    /// - [`Error::LimitReached`] if the daily allowance is used up
    /// - [`Error::NoModelConfigured`] if the request names no model
    /// - [`Error::ConversationNotFound`] for an unknown conversation
    /// - [`Error::DispatchFailed`] if the agent did not accept the run
    pub async fn start_run(&mut self, request: RunRequest) -> Result<RunToken> {
        let existing = match request.config.kind {
            RunKind::Isolated => None,
            RunKind::Interactive => request.conversation_id,
        };

        if let Some(id) = existing
            && self.runs.contains_key(&id)
        {
            return Err(Error::RunInProgress(id));
        }
        self.quota.pre_dispatch_check()?;
        if request.config.model.is_none() {
            return Err(Error::NoModelConfigured);
        }
        if let Some(id) = existing
            && !self.store.contains(&id)
        {
            return Err(Error::ConversationNotFound(id));
        }

        let conversation_id = match existing {
            Some(id) => id,
            None => self.create_conversation(&request),
        };
        self.store
            .append(&conversation_id, Message::user(&request.instruction))?;

        let token = RunToken::new(conversation_id, RunId::new(self.next_run_id));
        self.next_run_id += 1;
        self.runs.insert(
            conversation_id,
            ActiveRun {
                token,
                tracker: ToolCallTracker::new(self.sink.clone(), self.clock.clone()),
                narration: NarrationBuffer::new(self.dedup_prefix_chars),
            },
        );

        let messages = self.store.messages(&conversation_id).to_vec();
        let failure = match self
            .services
            .dispatch_run(&conversation_id, &messages, &request.config)
            .await
        {
            Ok(response) if response.success => None,
            Ok(response) => Some(
                response
                    .error
                    .unwrap_or_else(|| "the agent refused the run".to_string()),
            ),
            Err(error) => Some(format!("{error:#}")),
        };

        if let Some(error) = failure {
            warn!(conversation_id = %conversation_id, error = %error, "Dispatch failed");
            self.runs.remove(&conversation_id);
            self.store
                .append(&conversation_id, Message::assistant(format!("Error: {error}")))?;
            return Err(Error::DispatchFailed(error));
        }

        info!(
            conversation_id = %conversation_id,
            run = %token,
            kind = ?request.config.kind,
            "Run started"
        );
        Ok(token)
    }

    fn create_conversation(&mut self, request: &RunRequest) -> ConversationId {
        let title = request.title.clone().or_else(|| match request.config.kind {
            RunKind::Isolated => Some(AUTOMATED_RUN_TITLE.to_string()),
            RunKind::Interactive => {
                title_from_instruction(&request.instruction, self.title_max_chars)
            }
        });

        let mut conversation =
            Conversation::new(ConversationId::generate(), self.workspace_id.clone());
        conversation.title = title;
        let id = conversation.id;
        self.store.insert(conversation);
        debug!(conversation_id = %id, "Conversation created");
        id
    }

    /// Applies one decoded event to the run owning `token`.
    ///
    /// # Errors
    /// Returns an error only if the transcript could not be written
    pub fn handle_event(&mut self, token: &RunToken, event: AgentEvent) -> Result<EventOutcome> {
        if self.active_token(&token.conversation_id) != Some(*token) {
            trace!(run = %token, event = event.kind(), "Discarded stale event");
            self.sink.record(LogRecord::info("Discarded stale event").data(json!({
                "run": token.to_string(),
                "event": event.kind(),
            })));
            return Ok(EventOutcome::Ignored);
        }

        let id = token.conversation_id;
        match event {
            AgentEvent::Text { content, narration: true } => {
                if let Some(run) = self.runs.get_mut(&id) {
                    run.narration.append(&content);
                }
            }
            AgentEvent::Text { content, narration: false } => {
                self.flush_narration(&id, true)?;
                if !content.trim().is_empty() {
                    self.store.append(&id, Message::assistant(content))?;
                }
            }
            AgentEvent::ToolCallStart(call) => {
                if !self.quota.can_dispatch() {
                    self.stop_at_limit(&id);
                    return Ok(EventOutcome::LimitReached);
                }
                self.flush_narration(&id, true)?;
                self.quota.on_tool_dispatched();
                if let Some(run) = self.runs.get_mut(&id) {
                    let handle = run.tracker.on_start(call);
                    debug!(run = %token, tool = %handle.name, call_id = %handle.call_id, "Tool started");
                }
            }
            AgentEvent::ToolResult { call_id, name, output } => {
                if let Some(run) = self.runs.get_mut(&id) {
                    let resolved = run
                        .tracker
                        .on_result(call_id.as_ref(), name.as_ref(), output);
                    debug!(
                        run = %token,
                        tool = %resolved.call.name,
                        resolution = ?resolved.resolution,
                        "Tool resolved"
                    );
                    self.store
                        .append(&id, Message::tool_pair(resolved.call, resolved.result))?;
                    // The tool pair closed any checkpointed narration message.
                    run.narration.seal();
                }
            }
            AgentEvent::NewTurn => {
                self.flush_narration(&id, true)?;
                if let Some(run) = self.runs.get_mut(&id) {
                    run.narration.start_turn();
                }
            }
            AgentEvent::LimitReached => {
                self.stop_at_limit(&id);
                return Ok(EventOutcome::LimitReached);
            }
            AgentEvent::Done => {
                self.complete(&id)?;
                return Ok(EventOutcome::Completed);
            }
        }

        Ok(EventOutcome::Applied)
    }

    /// Commits the narration spoken so far without closing it, so fragments
    /// arriving later in the same turn extend the same message.
    ///
    /// Returns `false` for a stale token.
    ///
    /// # Errors
    /// Returns an error if the transcript could not be written
    pub fn checkpoint(&mut self, token: &RunToken) -> Result<bool> {
        if self.active_token(&token.conversation_id) != Some(*token) {
            return Ok(false);
        }
        self.flush_narration(&token.conversation_id, false)?;
        Ok(true)
    }

    /// Stops the active run of a conversation on user request. Returns
    /// `false` when nothing was running.
    pub fn cancel(&mut self, conversation_id: &ConversationId) -> bool {
        self.teardown(conversation_id, TerminationReason::Cancelled)
    }

    /// Same cleanup as [`Self::cancel`] for a feed that went away without
    /// `done`.
    pub fn force_terminate(&mut self, conversation_id: &ConversationId) -> bool {
        self.teardown(conversation_id, TerminationReason::FeedLost)
    }

    fn stop_at_limit(&mut self, conversation_id: &ConversationId) {
        let reason = TerminationReason::LimitReached { limit: self.quota.limit() };
        self.teardown(conversation_id, reason);
    }

    fn complete(&mut self, conversation_id: &ConversationId) -> Result<()> {
        self.flush_narration(conversation_id, true)?;

        if let Some(mut run) = self.runs.remove(conversation_id) {
            for dangling in run.tracker.drain_unresolved(DANGLING_CALL_ERROR) {
                self.sink.record(
                    LogRecord::error("Tool call unresolved at completion").data(json!({
                        "id": dangling.call.call_id.as_ref().map(ToolCallId::as_str),
                        "name": dangling.call.name.as_str(),
                    })),
                );
                self.store.append(
                    conversation_id,
                    Message::tool_pair(dangling.call, dangling.result),
                )?;
            }
            info!(conversation_id = %conversation_id, run = %run.token, "Run completed");
        }
        Ok(())
    }

    /// Flush, drop in-flight calls, mark the transcript, ask the agent to
    /// halt, release the slot. Local cleanup never waits on the agent.
    fn teardown(&mut self, conversation_id: &ConversationId, reason: TerminationReason) -> bool {
        let Some(run) = self.runs.get_mut(conversation_id) else {
            return false;
        };
        let token = run.token;

        if let Err(error) = commit_narration(
            &mut self.store,
            self.sink.as_ref(),
            conversation_id,
            &mut run.narration,
            true,
        ) {
            warn!(run = %token, error = %error, "Failed to flush narration during teardown");
        }

        let dropped = run.tracker.clear();
        if dropped > 0 {
            debug!(run = %token, dropped, "Dropped in-flight tool calls");
        }

        let marker = TerminationMessage::format(&reason).into_message();
        if let Err(error) = self.store.append(conversation_id, marker) {
            warn!(run = %token, error = %error, "Failed to append termination marker");
        }

        if let Err(error) = self.services.halt_run(conversation_id) {
            warn!(run = %token, error = %error, "Failed to request agent halt");
            self.sink.record(
                LogRecord::error("Halt request failed").data(json!({
                    "run": token.to_string(),
                    "error": format!("{error:#}"),
                })),
            );
        }

        self.runs.remove(conversation_id);
        info!(run = %token, reason = ?reason, "Run terminated");
        true
    }

    fn flush_narration(&mut self, conversation_id: &ConversationId, seal: bool) -> Result<()> {
        match self.runs.get_mut(conversation_id) {
            Some(run) => commit_narration(
                &mut self.store,
                self.sink.as_ref(),
                conversation_id,
                &mut run.narration,
                seal,
            ),
            None => Ok(()),
        }
    }

    pub fn live_view(&self, conversation_id: &ConversationId) -> Option<LiveRun> {
        self.runs.get(conversation_id).map(|run| LiveRun {
            token: run.token,
            narration: run.narration.current().to_string(),
            tools: run.tracker.handles(),
        })
    }

    pub fn active_token(&self, conversation_id: &ConversationId) -> Option<RunToken> {
        self.runs.get(conversation_id).map(|run| run.token)
    }

    pub fn is_running(&self, conversation_id: &ConversationId) -> bool {
        self.runs.contains_key(conversation_id)
    }

    pub fn conversation(&self, conversation_id: &ConversationId) -> Option<&Conversation> {
        self.store.get(conversation_id)
    }

    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.store.list()
    }

    pub fn quota(&self) -> &QuotaGate {
        &self.quota
    }

    pub fn quota_mut(&mut self) -> &mut QuotaGate {
        &mut self.quota
    }

    pub(crate) fn record(&self, record: LogRecord) {
        self.sink.record(record);
    }
}

fn commit_narration(
    store: &mut ConversationStore,
    sink: &dyn ObservabilitySink,
    conversation_id: &ConversationId,
    narration: &mut NarrationBuffer,
    seal: bool,
) -> Result<()> {
    match narration.flush() {
        Flushed::Text(text) => {
            store.merge(conversation_id, Message::assistant(text))?;
        }
        Flushed::Duplicate(text) => {
            sink.record(
                LogRecord::info("Suppressed duplicate narration").data(json!({ "text": text })),
            );
        }
        Flushed::Empty => {}
    }

    if seal {
        narration.seal();
        store.seal(conversation_id)?;
    }
    Ok(())
}
