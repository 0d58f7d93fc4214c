use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::{ConversationId, DispatchResponse, LogRecord, Message, RunConfig};

/// The external agent process that executes runs and produces the event feed.
#[async_trait::async_trait]
pub trait AgentService: Send + Sync {
    /// Asks the agent to start a run over the given transcript.
    ///
    /// # Errors
    /// Returns an error if the request could not be delivered. A delivered
    /// request that the agent refused is reported through
    /// [`DispatchResponse::success`] instead.
    async fn dispatch_run(
        &self,
        conversation_id: &ConversationId,
        messages: &[Message],
        config: &RunConfig,
    ) -> anyhow::Result<DispatchResponse>;

    /// Requests that the agent stop the active run. Must not block; delivery
    /// is best effort.
    ///
    /// # Errors
    /// Returns an error if the request could not be handed off.
    fn halt_run(&self, conversation_id: &ConversationId) -> anyhow::Result<()>;
}

/// Receives operator facing log records.
pub trait ObservabilitySink: Send + Sync {
    fn record(&self, record: LogRecord);
}

/// Source of time: the calendar day for daily quota windows and instants for
/// tool call start times.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
