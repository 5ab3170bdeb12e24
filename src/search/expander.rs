/// Query expansion: asks the chat model for professional search phrasings
/// of a colloquial question.
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{info, warn};

use crate::llm::{ChatModel, ConversationTurn};

/// Leading enumeration such as `1. `, `2、` or `3) `. ASCII delimiters need
/// a following space so decimals like `0.9%` survive.
static ENUMERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+\s*(?:[.)]\s+|[、）]\s*)").expect("valid regex")
});

pub struct QueryExpander {
    chat: Arc<dyn ChatModel>,
    prompt_template: String,
    temperature: f32,
}

impl QueryExpander {
    /// `prompt_template` must contain `{query}`; `{count}` is optional.
    pub fn new(chat: Arc<dyn ChatModel>, prompt_template: String, temperature: f32) -> Self {
        Self {
            chat,
            prompt_template,
            temperature,
        }
    }

    /// The original query followed by up to `count` model-generated variants.
    ///
    /// Any model failure degrades to just the original query.
    pub fn expand(&self, query: &str, count: usize) -> Vec<String> {
        let mut queries = vec![query.to_string()];
        if count == 0 {
            return queries;
        }

        let prompt = self
            .prompt_template
            .replace("{count}", &count.to_string())
            .replace("{query}", query);

        match self
            .chat
            .chat(&[ConversationTurn::user(prompt)], self.temperature)
        {
            Ok(reply) => {
                queries.extend(parse_variants(&reply.content).into_iter().take(count));
                info!("Query expansion: {query} -> {queries:?}");
            }
            Err(e) => warn!("Query expansion failed: {e}"),
        }
        queries
    }
}

fn parse_variants(reply: &str) -> Vec<String> {
    reply
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| ENUMERATION.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
