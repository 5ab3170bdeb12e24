/// Scripted chat model for tests.
///
/// Replies are handed out in order; once the script runs out the last
/// reply repeats. An empty script fails every call. Every request is
/// recorded so tests can inspect what the model was shown.
use std::sync::Mutex;

use super::{ChatError, ChatModel, ConversationTurn};

pub struct ScriptedChat {
    replies: Vec<String>,
    requests: Mutex<Vec<(Vec<ConversationTurn>, f32)>>,
}

impl ScriptedChat {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model that always answers with `reply`.
    pub fn repeating(reply: &str) -> Self {
        Self::new([reply])
    }

    /// A model whose every call fails.
    pub fn failing() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Conversations sent so far, with their temperatures.
    pub fn requests(&self) -> Vec<(Vec<ConversationTurn>, f32)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl ChatModel for ScriptedChat {
    fn chat(
        &self,
        messages: &[ConversationTurn],
        temperature: f32,
    ) -> Result<ConversationTurn, ChatError> {
        let mut requests = self
            .requests
            .lock()
            .map_err(|e| ChatError::ServiceFailed(format!("lock poisoned: {e}")))?;
        let index = requests.len();
        requests.push((messages.to_vec(), temperature));

        let reply = self
            .replies
            .get(index)
            .or_else(|| self.replies.last())
            .ok_or_else(|| ChatError::ServiceFailed("scripted model unavailable".into()))?;

        Ok(ConversationTurn::assistant(reply.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replies_in_order_then_repeat_last() {
        let chat = ScriptedChat::new(["one", "two"]);
        let msgs = [ConversationTurn::user("q")];
        assert_eq!(chat.chat(&msgs, 0.0).unwrap().content, "one");
        assert_eq!(chat.chat(&msgs, 0.0).unwrap().content, "two");
        assert_eq!(chat.chat(&msgs, 0.0).unwrap().content, "two");
        assert_eq!(chat.call_count(), 3);
    }

    #[test]
    fn test_failing_model() {
        let chat = ScriptedChat::failing();
        assert!(chat.chat(&[ConversationTurn::user("q")], 0.7).is_err());
        assert_eq!(chat.requests()[0].1, 0.7);
    }
}
