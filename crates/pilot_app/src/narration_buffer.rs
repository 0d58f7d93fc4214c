use std::collections::HashSet;

/// Outcome of flushing the narration buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flushed {
    /// Text to commit as one message.
    Text(String),
    /// The buffer was empty or whitespace only.
    Empty,
    /// An utterance whose key was already committed in this turn; dropped.
    Duplicate(String),
}

/// Accumulates narration fragments into the utterance currently being spoken.
///
/// An utterance may be flushed in several chunks before it is sealed. Only
/// the first chunk is checked against earlier utterances of the turn; later
/// chunks extend it. The key of the whole utterance is recorded on seal.
#[derive(Debug, Clone)]
pub struct NarrationBuffer {
    text: String,
    /// Chunks of the current utterance already handed out by `flush`.
    open: String,
    committed: HashSet<String>,
    prefix_chars: usize,
}

impl NarrationBuffer {
    pub fn new(prefix_chars: usize) -> Self {
        Self {
            text: String::new(),
            open: String::new(),
            committed: HashSet::new(),
            prefix_chars,
        }
    }

    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    /// The partial utterance for live display. Not committed.
    pub fn current(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Takes the buffered text. The buffer is empty afterwards whatever the
    /// outcome.
    pub fn flush(&mut self) -> Flushed {
        let text = std::mem::take(&mut self.text);
        if text.trim().is_empty() {
            return Flushed::Empty;
        }

        if self.open.is_empty() && self.committed.contains(&self.key(&text)) {
            return Flushed::Duplicate(text);
        }
        self.open.push_str(&text);
        Flushed::Text(text)
    }

    /// Closes the current utterance. Unflushed text stays buffered and starts
    /// the next one.
    pub fn seal(&mut self) {
        let utterance = std::mem::take(&mut self.open);
        if !utterance.trim().is_empty() {
            let key = self.key(&utterance);
            self.committed.insert(key);
        }
    }

    /// Starts a new turn: narration committed earlier no longer suppresses
    /// identical text.
    pub fn start_turn(&mut self) {
        self.committed.clear();
    }

    fn key(&self, text: &str) -> String {
        text.trim().chars().take(self.prefix_chars).collect()
    }
}
