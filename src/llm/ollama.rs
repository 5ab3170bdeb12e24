/// Chat model backed by Ollama's `/api/chat` endpoint (non-streaming).
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ChatError, ChatModel, ConversationTurn};
use crate::config::OllamaConfig;
use crate::ollama::{OllamaClient, OllamaError};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ConversationTurn>,
}

pub struct OllamaChat {
    client: OllamaClient,
    model: String,
}

impl OllamaChat {
    pub fn new(config: &OllamaConfig) -> Result<Self, OllamaError> {
        let client = OllamaClient::new(config)?;
        info!("Chat model initialized: {}", config.chat_model);
        Ok(Self {
            client,
            model: config.chat_model.clone(),
        })
    }
}

impl ChatModel for OllamaChat {
    fn chat(
        &self,
        messages: &[ConversationTurn],
        temperature: f32,
    ) -> Result<ConversationTurn, ChatError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions { temperature },
        };

        debug!(
            "chat: {} messages, temperature {temperature}",
            messages.len()
        );
        let response: ChatResponse = self
            .client
            .post_json("/api/chat", &request)
            .map_err(|e| ChatError::ServiceFailed(e.to_string()))?;

        response.message.ok_or(ChatError::EmptyReply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let messages = vec![
            ConversationTurn::system("be careful"),
            ConversationTurn::user("fever"),
        ];
        let req = ChatRequest {
            model: "qwen2.5:7b",
            messages: &messages,
            stream: false,
            options: ChatOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "fever");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"model":"qwen2.5:7b","message":{"role":"assistant","content":"Action: Retrieve: fever"},"done":true}"#;
        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        let message = resp.message.unwrap();
        assert_eq!(message.content, "Action: Retrieve: fever");
    }

    #[test]
    fn test_response_without_message() {
        let resp: ChatResponse = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(resp.message.is_none());
    }
}
