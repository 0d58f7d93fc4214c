use indexmap::IndexMap;
use pilot_domain::{Conversation, ConversationId, Error, Message, MessageId, Result};

#[derive(Debug, Clone)]
struct Entry {
    conversation: Conversation,
    /// The message later merges may still extend. Cleared by any append and
    /// by turn boundaries.
    open: Option<MessageId>,
}

/// Authoritative in-memory log of conversations. Message order within a
/// conversation is commit order.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    entries: IndexMap<ConversationId, Entry>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a conversation, replacing any existing one with the same id.
    pub fn insert(&mut self, conversation: Conversation) {
        self.entries
            .insert(conversation.id, Entry { conversation, open: None });
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.entries.get(id).map(|entry| &entry.conversation)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn messages(&self, id: &ConversationId) -> &[Message] {
        self.get(id)
            .map(|conversation| conversation.messages.as_slice())
            .unwrap_or_default()
    }

    /// Conversations in creation order.
    pub fn list(&self) -> impl Iterator<Item = &Conversation> {
        self.entries.values().map(|entry| &entry.conversation)
    }

    /// Always creates a new transcript entry.
    ///
    /// # Errors
    /// Returns an error if the conversation does not exist
    pub fn append(&mut self, id: &ConversationId, message: Message) -> Result<MessageId> {
        let entry = self.entry_mut(id)?;
        let message_id = message.id;
        entry.conversation.push(message);
        entry.open = None;
        Ok(message_id)
    }

    /// Extends the open message when the most recent message is still open
    /// and has the same role; otherwise appends `partial` as a new open
    /// message.
    ///
    /// # Errors
    /// Returns an error if the conversation does not exist
    pub fn merge(&mut self, id: &ConversationId, partial: Message) -> Result<MessageId> {
        let entry = self.entry_mut(id)?;
        let open = entry.open;

        if let Some(last) = entry.conversation.last_message_mut()
            && Some(last.id) == open
            && last.role == partial.role
        {
            last.absorb(partial);
            let message_id = last.id;
            entry.conversation.updated_at = chrono::Utc::now();
            return Ok(message_id);
        }

        let message_id = partial.id;
        entry.conversation.push(partial);
        entry.open = Some(message_id);
        Ok(message_id)
    }

    /// Closes the open message so the next merge starts a new one.
    ///
    /// # Errors
    /// Returns an error if the conversation does not exist
    pub fn seal(&mut self, id: &ConversationId) -> Result<()> {
        self.entry_mut(id)?.open = None;
        Ok(())
    }

    fn entry_mut(&mut self, id: &ConversationId) -> Result<&mut Entry> {
        self.entries
            .get_mut(id)
            .ok_or(Error::ConversationNotFound(*id))
    }
}

#[cfg(test)]
mod tests {
    use pilot_domain::{Role, ToolCallFull, ToolCallId, ToolOutput, ToolResult, WorkspaceId};
    use pretty_assertions::assert_eq;

    use super::*;

    fn fixture() -> (ConversationStore, ConversationId) {
        let mut store = ConversationStore::new();
        let id = ConversationId::generate();
        store.insert(Conversation::new(id, WorkspaceId::new("ws")));
        (store, id)
    }

    fn contents(store: &ConversationStore, id: &ConversationId) -> Vec<String> {
        store.messages(id).iter().map(|m| m.content.clone()).collect()
    }

    #[test]
    fn test_append_always_creates_entry() {
        let (mut store, id) = fixture();
        store.append(&id, Message::assistant("a")).unwrap();
        store.append(&id, Message::assistant("a")).unwrap();
        assert_eq!(contents(&store, &id), vec!["a", "a"]);
    }

    #[test]
    fn test_merge_coalesces_open_message() {
        let (mut store, id) = fixture();
        let first = store.merge(&id, Message::assistant("Looking ")).unwrap();
        let second = store.merge(&id, Message::assistant("around")).unwrap();

        assert_eq!(first, second);
        assert_eq!(contents(&store, &id), vec!["Looking around"]);
    }

    #[test]
    fn test_merge_after_append_starts_new_message() {
        let (mut store, id) = fixture();
        store.merge(&id, Message::assistant("before")).unwrap();
        store.append(&id, Message::assistant("record")).unwrap();
        store.merge(&id, Message::assistant("after")).unwrap();

        assert_eq!(contents(&store, &id), vec!["before", "record", "after"]);
    }

    #[test]
    fn test_merge_after_seal_starts_new_message() {
        let (mut store, id) = fixture();
        store.merge(&id, Message::assistant("turn one")).unwrap();
        store.seal(&id).unwrap();
        store.merge(&id, Message::assistant("turn one")).unwrap();

        assert_eq!(contents(&store, &id), vec!["turn one", "turn one"]);
    }

    #[test]
    fn test_merge_with_different_role_appends() {
        let (mut store, id) = fixture();
        store.merge(&id, Message::assistant("text")).unwrap();
        store.merge(&id, Message::system("marker")).unwrap();

        let roles: Vec<_> = store.messages(&id).iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::System]);
    }

    #[test]
    fn test_merge_unions_tool_lists() {
        let (mut store, id) = fixture();
        let call = ToolCallFull::new("browser_click").call_id(ToolCallId::new("c1"));
        let result = ToolResult::from(&call).output(ToolOutput::message("ok"));

        store
            .merge(&id, Message::assistant("").tool_calls(vec![call.clone()]))
            .unwrap();
        store
            .merge(
                &id,
                Message::assistant("")
                    .tool_calls(vec![call])
                    .tool_results(vec![result]),
            )
            .unwrap();

        let actual = &store.messages(&id)[0];
        assert_eq!(store.messages(&id).len(), 1);
        assert_eq!(actual.tool_calls.as_ref().map(Vec::len), Some(1));
        assert!(actual.is_settled());
    }

    #[test]
    fn test_missing_conversation() {
        let mut store = ConversationStore::new();
        let id = ConversationId::generate();
        let actual = store.append(&id, Message::user("hi"));
        assert!(matches!(actual, Err(Error::ConversationNotFound(_))));
    }

    #[test]
    fn test_list_keeps_creation_order() {
        let mut store = ConversationStore::new();
        let first = ConversationId::generate();
        let second = ConversationId::generate();
        store.insert(Conversation::new(first, WorkspaceId::new("ws")));
        store.insert(Conversation::new(second, WorkspaceId::new("ws")));

        let actual: Vec<_> = store.list().map(|c| c.id).collect();
        assert_eq!(actual, vec![first, second]);
    }
}
