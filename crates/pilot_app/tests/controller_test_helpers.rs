use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use derive_setters::Setters;
use pilot_app::{EventOutcome, RunRequest, StreamController};
use pilot_config::{PilotConfig, QuotaConfig};
use pilot_domain::{
    AgentEvent, AgentService, Clock, ConversationId, DispatchResponse, LogKind, LogRecord, Message,
    ModelId, ObservabilitySink, Role, RunConfig, RunToken, UsageCounter,
};
use serde_json::Value;

/// Agent double that records what the controller asked of it.
#[derive(Default)]
pub struct Trace {
    dispatches: Mutex<Vec<(ConversationId, Vec<Message>)>>,
    halts: Mutex<Vec<ConversationId>>,
    dispatch_failure: Option<String>,
    halt_fails: bool,
}

impl Trace {
    pub fn dispatches(&self) -> Vec<(ConversationId, Vec<Message>)> {
        self.dispatches.lock().unwrap().clone()
    }

    pub fn halts(&self) -> Vec<ConversationId> {
        self.halts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AgentService for Trace {
    async fn dispatch_run(
        &self,
        conversation_id: &ConversationId,
        messages: &[Message],
        _config: &RunConfig,
    ) -> anyhow::Result<DispatchResponse> {
        self.dispatches
            .lock()
            .unwrap()
            .push((*conversation_id, messages.to_vec()));
        Ok(match &self.dispatch_failure {
            Some(error) => DispatchResponse::failed(error),
            None => DispatchResponse::ok(),
        })
    }

    fn halt_run(&self, conversation_id: &ConversationId) -> anyhow::Result<()> {
        self.halts.lock().unwrap().push(*conversation_id);
        if self.halt_fails {
            anyhow::bail!("agent unreachable");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Recorder(Mutex<Vec<LogRecord>>);

impl Recorder {
    pub fn records(&self) -> Vec<LogRecord> {
        self.0.lock().unwrap().clone()
    }

    pub fn messages(&self, kind: LogKind) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|record| record.kind == kind)
            .map(|record| record.message)
            .collect()
    }
}

impl ObservabilitySink for Recorder {
    fn record(&self, record: LogRecord) {
        self.0.lock().unwrap().push(record);
    }
}

pub struct FixedClock(Mutex<NaiveDate>);

impl FixedClock {
    pub fn advance(&self) {
        let mut today = self.0.lock().unwrap();
        *today = today.succ_opt().unwrap();
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.0.lock().unwrap()
    }

    fn now(&self) -> DateTime<Utc> {
        self.today().and_hms_opt(9, 0, 0).unwrap().and_utc()
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 14).unwrap()
}

pub fn model_config() -> RunConfig {
    RunConfig::default().model(ModelId::new("gpt-4o"))
}

#[derive(Default, Setters)]
#[setters(into, strip_option)]
pub struct Setup {
    daily_limit: Option<u64>,
    used_today: u64,
    dispatch_failure: Option<String>,
    halt_fails: bool,
}

impl Setup {
    pub fn build(self) -> Harness {
        let services = Arc::new(Trace {
            dispatch_failure: self.dispatch_failure,
            halt_fails: self.halt_fails,
            ..Default::default()
        });
        let sink = Arc::new(Recorder::default());
        let clock = Arc::new(FixedClock(Mutex::new(today())));
        let config = PilotConfig::default()
            .quota(QuotaConfig::default().daily_action_limit(self.daily_limit));

        let mut controller =
            StreamController::new(services.clone(), sink.clone(), clock.clone(), &config);
        if self.used_today > 0 {
            controller
                .quota_mut()
                .reconcile(UsageCounter::with_actions(today(), self.used_today), 0);
        }

        Harness { controller, services, sink, clock }
    }
}

pub struct Harness {
    pub controller: StreamController<Trace>,
    pub services: Arc<Trace>,
    pub sink: Arc<Recorder>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    /// Starts an interactive run in a new conversation.
    pub async fn start(&mut self, instruction: &str) -> RunToken {
        self.controller
            .start_run(RunRequest::new(instruction).config(model_config()))
            .await
            .unwrap()
    }

    /// Decodes and applies wire events in order.
    pub fn feed(&mut self, token: &RunToken, events: Vec<Value>) -> Vec<EventOutcome> {
        events
            .into_iter()
            .flat_map(|value| AgentEvent::decode_all(value).unwrap())
            .map(|event| self.controller.handle_event(token, event).unwrap())
            .collect()
    }

    pub fn messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.controller
            .conversation(conversation_id)
            .map(|conversation| conversation.messages.clone())
            .unwrap_or_default()
    }

    /// One line per message: `role: text` for text messages and
    /// `tool name#id -> summary` for each tool pair.
    pub fn transcript(&self, conversation_id: &ConversationId) -> Vec<String> {
        self.messages(conversation_id).iter().map(describe).collect()
    }
}

fn describe(message: &Message) -> String {
    if message.has_tool_call() {
        let calls = message.tool_calls.as_deref().unwrap_or_default();
        let results = message.tool_results.as_deref().unwrap_or_default();
        return calls
            .iter()
            .map(|call| {
                let id = call.call_id.as_ref().map(|id| id.as_str()).unwrap_or("-");
                let summary = results
                    .iter()
                    .find(|result| result.call_id == call.call_id)
                    .map(|result| result.output.summary())
                    .unwrap_or_else(|| "<pending>".to_string());
                format!("tool {}#{id} -> {summary}", call.name)
            })
            .collect::<Vec<_>>()
            .join("; ");
    }

    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let first_line = message.content.lines().next().unwrap_or_default();
    format!("{role}: {first_line}")
}
