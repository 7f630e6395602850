//! Bounded chat history for the chatbot.

use uuid::Uuid;

use crate::llm::{ChatMessage, Role};

/// Rolling conversation history for one chat session.
///
/// Never holds more than `max_messages` turns; the oldest non-system turn
/// is dropped first.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    session_id: Uuid,
    turns: Vec<ChatMessage>,
    max_messages: usize,
}

impl ConversationMemory {
    /// Create an empty history. A limit of zero is raised to one.
    pub fn new(max_messages: usize) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            turns: Vec::new(),
            max_messages: max_messages.max(1),
        }
    }

    /// Append a turn, dropping the oldest ones past the limit.
    pub fn add(&mut self, turn: ChatMessage) {
        self.turns.push(turn);

        let overflow = self.turns.len().saturating_sub(self.max_messages);
        if overflow == 0 {
            return;
        }
        // A leading system turn is pinned unless it is all that fits.
        let pinned = usize::from(
            self.max_messages > 1 && self.turns.first().is_some_and(|t| t.role == Role::System),
        );
        self.turns.drain(pinned..pinned + overflow);
    }

    /// All turns, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.turns
    }

    /// The most recent `n` turns, oldest first.
    pub fn last_n(&self, n: usize) -> &[ChatMessage] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    /// Drop all turns and start a new session.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.session_id = Uuid::new_v4();
    }

    /// Id of the current session; changes on `clear`.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Number of turns held.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
