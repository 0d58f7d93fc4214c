use std::time::Duration;

use pilot_domain::{AgentEvent, AgentService, LogRecord, Result, RunToken};
use serde_json::{Value, json};
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{EventOutcome, StreamController};

/// How a driven feed ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    LimitReached,
    /// The feed closed or went quiet without a terminal event.
    FeedLost,
}

/// Pumps a raw event feed into the controller until the run ends.
///
/// Each item is decoded once into the [`AgentEvent`]s it carries. Items that fail to
/// decode are reported to the observability sink and skipped. A feed that
/// ends, or stays silent for `idle_timeout`, is force terminated. Triggering
/// `cancel` stops the run the same way a user stop does.
///
/// # Errors
/// Returns an error only if the transcript could not be written
pub async fn drive_feed<S, F>(
    controller: &mut StreamController<S>,
    token: RunToken,
    mut feed: F,
    idle_timeout: Duration,
    cancel: CancellationToken,
) -> Result<RunOutcome>
where
    S: AgentService,
    F: Stream<Item = anyhow::Result<Value>> + Unpin,
{
    let conversation_id = token.conversation_id;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                controller.cancel(&conversation_id);
                return Ok(RunOutcome::Cancelled);
            }
            next = tokio::time::timeout(idle_timeout, feed.next()) => next,
        };

        let value = match next {
            Ok(Some(Ok(value))) => value,
            Ok(Some(Err(error))) => {
                warn!(run = %token, error = %error, "Feed delivered an error");
                controller.record(LogRecord::error("Feed error").data(json!({
                    "run": token.to_string(),
                    "error": format!("{error:#}"),
                })));
                continue;
            }
            Ok(None) => {
                warn!(run = %token, "Feed closed without done");
                controller.force_terminate(&conversation_id);
                return Ok(RunOutcome::FeedLost);
            }
            Err(_) => {
                warn!(run = %token, timeout = ?idle_timeout, "Feed idle, terminating run");
                controller.force_terminate(&conversation_id);
                return Ok(RunOutcome::FeedLost);
            }
        };

        let events = match AgentEvent::decode_all(value) {
            Ok(events) => events,
            Err(error) => {
                controller.record(
                    LogRecord::error("Undecodable agent event").data(json!({
                        "run": token.to_string(),
                        "error": error.to_string(),
                    })),
                );
                continue;
            }
        };

        for event in events {
            debug!(run = %token, event = event.kind(), "Event received");
            match controller.handle_event(&token, event)? {
                EventOutcome::Applied | EventOutcome::Ignored => {}
                EventOutcome::Completed => return Ok(RunOutcome::Completed),
                EventOutcome::LimitReached => return Ok(RunOutcome::LimitReached),
            }
        }
    }
}
