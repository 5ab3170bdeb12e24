//! Chat-completion boundary.
//!
//! The language model is a black box that takes role-tagged turns plus a
//! temperature and returns one reply. No tool-calling API is assumed; the
//! reasoning loop communicates with the model through text markers only.

pub mod mock;
pub mod ollama;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("chat service failed: {0}")]
    ServiceFailed(String),

    #[error("chat service returned no message")]
    EmptyReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for chat-completion backends.
pub trait ChatModel: Send + Sync {
    /// Send the full conversation and return the model's reply.
    fn chat(
        &self,
        messages: &[ConversationTurn],
        temperature: f32,
    ) -> Result<ConversationTurn, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let turn = ConversationTurn::assistant("Final Answer: rest");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "Final Answer: rest");
    }

    #[test]
    fn test_turn_deserializes() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role": "user", "content": "fever"}"#).unwrap();
        assert_eq!(turn, ConversationTurn::user("fever"));
    }
}
