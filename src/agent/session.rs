use crate::llm::ConversationTurn;

/// Append-only conversation history of one user.
///
/// Only questions and final answers are recorded; intermediate reasoning
/// steps stay inside the loop that produced them.
#[derive(Debug, Clone, Default)]
pub struct Session {
    turns: Vec<ConversationTurn>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, question: &str, answer: &str) {
        self.turns.push(ConversationTurn::user(question));
        self.turns.push(ConversationTurn::assistant(answer));
    }

    /// The most recent `history_turns` exchanges.
    pub fn window(&self, history_turns: usize) -> &[ConversationTurn] {
        let keep = history_turns.saturating_mul(2);
        let start = self.turns.len().saturating_sub(keep);
        &self.turns[start..]
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
