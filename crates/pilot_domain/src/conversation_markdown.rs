use serde::Serialize;

use crate::{Conversation, Message, Result, Role};

#[derive(Debug, Serialize)]
struct ConversationFrontmatter {
    id: String,
    title: Option<String>,
    workspace: String,
    created_at: String,
    updated_at: String,
    message_count: usize,
}

/// Renders a conversation as markdown with YAML frontmatter
///
/// # Errors
/// Returns an error if the frontmatter cannot be serialized
pub fn render_conversation_markdown(conversation: &Conversation) -> Result<String> {
    let frontmatter = ConversationFrontmatter {
        id: conversation.id.into_string(),
        title: conversation.title.clone(),
        workspace: conversation.workspace_id.as_str().to_string(),
        created_at: conversation.created_at.to_rfc3339(),
        updated_at: conversation.updated_at.to_rfc3339(),
        message_count: conversation.len(),
    };

    let frontmatter_yaml = serde_yml::to_string(&frontmatter)
        .map_err(|e| anyhow::anyhow!("Failed to serialize frontmatter: {}", e))?;

    let body = conversation
        .messages
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(format!("---\n{frontmatter_yaml}---\n\n{body}\n"))
}

fn render_message(message: &Message) -> String {
    let role = match message.role {
        Role::System => "System",
        Role::User => "User",
        Role::Assistant => "Assistant",
    };

    let mut output = format!("## {role}\n");

    if !message.content.is_empty() {
        output.push('\n');
        output.push_str(&message.content);
        output.push('\n');
    }

    for call in message.tool_calls.iter().flatten() {
        output.push_str(&format!("\n### Tool Call: {}\n\n", call.name));
        output.push_str("```json\n");
        output.push_str(&call.arguments.to_string());
        output.push_str("\n```\n");

        let result = message
            .tool_results
            .iter()
            .flatten()
            .find(|result| result.call_id == call.call_id);
        if let Some(result) = result {
            let label = if result.is_error() { "Error" } else { "Result" };
            output.push_str(&format!("\n**{label}:** {}\n", result.output.summary()));
        }
    }

    output.trim_end().to_string()
}
