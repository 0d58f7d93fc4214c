use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use pilot_app::{RunOutcome, RunRequest, StreamController, drive_feed};
use pilot_config::PilotConfig;
use pilot_domain::{
    AgentService, ConversationId, DispatchResponse, Message, ModelId, RunConfig, RunKind,
    SystemClock, render_conversation_markdown,
};
use pilot_tracker::TracingSink;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{OutputFormat, ReplayArgs};

/// Agent stand-in for recorded feeds: every dispatch is accepted and halt
/// requests are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayAgent;

#[async_trait::async_trait]
impl AgentService for ReplayAgent {
    async fn dispatch_run(
        &self,
        conversation_id: &ConversationId,
        messages: &[Message],
        config: &RunConfig,
    ) -> anyhow::Result<DispatchResponse> {
        info!(
            conversation_id = %conversation_id,
            messages = messages.len(),
            model = ?config.model,
            "Replaying recorded run"
        );
        Ok(DispatchResponse::ok())
    }

    fn halt_run(&self, conversation_id: &ConversationId) -> anyhow::Result<()> {
        info!(conversation_id = %conversation_id, "Halt requested for replay");
        Ok(())
    }
}

/// Reads a JSON lines feed. Blank lines are skipped; a malformed line becomes
/// an error item so the feed driver can report it and carry on.
pub async fn read_feed(path: &Path) -> anyhow::Result<Vec<anyhow::Result<Value>>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read feed {}", path.display()))?;

    Ok(content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<Value>(line)
                .with_context(|| format!("Invalid JSON on line {}", index + 1))
        })
        .collect())
}

/// Runs a recorded feed through a fresh controller and renders the
/// resulting conversation.
pub async fn replay(
    args: &ReplayArgs,
    mut config: PilotConfig,
    cancel: CancellationToken,
) -> anyhow::Result<String> {
    if let Some(limit) = args.daily_limit {
        config.quota.daily_action_limit = Some(limit);
    }

    let events = read_feed(&args.feed).await?;
    let mut controller = StreamController::new(
        Arc::new(ReplayAgent),
        Arc::new(TracingSink),
        Arc::new(SystemClock),
        &config,
    );

    let kind = if args.isolated { RunKind::Isolated } else { RunKind::Interactive };
    let request = RunRequest::new(&args.instruction)
        .config(RunConfig::default().model(ModelId::new(&args.model)).kind(kind));
    let token = controller.start_run(request).await?;

    let outcome = drive_feed(
        &mut controller,
        token,
        tokio_stream::iter(events),
        config.watchdog.idle_timeout(),
        cancel,
    )
    .await?;
    info!(run = %token, outcome = ?outcome, "Replay finished");

    let conversation = controller
        .conversation(&token.conversation_id)
        .context("Replayed conversation is missing")?;

    let mut output = match args.format {
        OutputFormat::Markdown => render_conversation_markdown(conversation)?,
        OutputFormat::Json => serde_json::to_string_pretty(conversation)?,
    };
    if outcome != RunOutcome::Completed && args.format == OutputFormat::Markdown {
        output.push_str(&format!("\n<!-- run ended: {outcome:?} -->\n"));
    }
    Ok(output)
}
