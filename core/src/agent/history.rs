use crate::traits::{ChatMessage, Role};

/// Length of the history at a point in time. Truncating back to it undoes
/// every append made after it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<ChatMessage>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// The entry `n` positions before the last one (`0` is the last entry).
    pub fn nth_from_end(&self, n: usize) -> Option<&ChatMessage> {
        self.messages.iter().rev().nth(n)
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.messages.len())
    }

    /// Drops every entry appended after `checkpoint`, returning how many were
    /// removed.
    pub fn rollback(&mut self, checkpoint: Checkpoint) -> usize {
        let removed = self.messages.len().saturating_sub(checkpoint.0);
        self.messages.truncate(checkpoint.0);
        removed
    }

    /// Installs `content` as the leading system message, replacing an
    /// existing one.
    pub fn set_system_prompt(&mut self, content: impl Into<String>) {
        let message = ChatMessage::system(content);
        match self.messages.first_mut() {
            Some(first) if first.role == Role::System => *first = message,
            _ => self.messages.insert(0, message),
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Number of entries excluding the system prompt.
    pub fn turn_entries(&self) -> usize {
        self.messages.len() - usize::from(self.system_prompt().is_some())
    }

    pub fn clear(&mut self) {
        let system = self.messages.first().filter(|m| m.role == Role::System).cloned();
        self.messages.clear();
        self.messages.extend(system);
    }
}
