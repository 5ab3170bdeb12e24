//! Bounded reasoning loop that interleaves chat-model replies with
//! knowledge-base searches.
//!
//! Each step sends the whole conversation to the model, decodes the reply
//! with [`directive::decode`] and either runs a search (appending the
//! evidence as an observation) or terminates with an answer. When the step
//! budget runs out the last reply is used as a degraded answer.

pub mod directive;
pub mod session;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::llm::{ChatModel, ConversationTurn};
use crate::search::{SearchEngine, SearchResult};

pub use directive::Directive;
pub use session::Session;

pub const OBSERVATION_PREFIX: &str = "Observation: ";
pub const REPEATED_SEARCH_OBSERVATION: &str =
    "Observation: Already searched this term, no new information. Please summarize.";
pub const EMPTY_KEYWORD_OBSERVATION: &str =
    "Observation: No search keywords given. Put the keywords right after the retrieval marker.";
pub const NO_CONCLUSION_TEXT: &str =
    "Sorry, I could not find relevant material and cannot reach a clear conclusion.";

/// Last replies longer than this are returned as a forced answer.
const FORCED_ANSWER_MIN_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerStatus {
    Complete,
    CompleteDirect,
    Forced,
    NoConclusion,
}

impl AnswerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerStatus::Complete => "complete",
            AnswerStatus::CompleteDirect => "complete-direct",
            AnswerStatus::Forced => "forced",
            AnswerStatus::NoConclusion => "no-conclusion",
        }
    }
}

/// What happened at one step of the loop.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum StepEvent {
    Reply { step: usize, content: String },
    Search { step: usize, keyword: String, result: SearchResult },
    RepeatedSearch { step: usize, keyword: String },
    EmptyKeyword { step: usize },
    ChatFailed { step: usize, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub status: AnswerStatus,
    pub steps: usize,
    pub trace: Vec<StepEvent>,
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub system_prompt: String,
    pub max_steps: usize,
    pub history_turns: usize,
    pub temperature: f32,
}

impl From<&Config> for LoopSettings {
    fn from(config: &Config) -> Self {
        Self {
            system_prompt: config.prompts.system.clone(),
            max_steps: config.agent.max_steps,
            history_turns: config.agent.history_turns,
            temperature: config.agent.temperature_strict,
        }
    }
}

pub struct ReasoningLoop {
    chat: Arc<dyn ChatModel>,
    search: Arc<SearchEngine>,
    settings: LoopSettings,
}

impl ReasoningLoop {
    pub fn new(chat: Arc<dyn ChatModel>, search: Arc<SearchEngine>, settings: LoopSettings) -> Self {
        Self {
            chat,
            search,
            settings,
        }
    }

    /// Answer `question` in the context of `session`, then record the
    /// exchange in the session.
    pub fn run(&self, session: &mut Session, question: &str, debug_search: bool) -> Answer {
        let mut messages = Vec::with_capacity(2 + self.settings.history_turns * 2);
        messages.push(ConversationTurn::system(self.settings.system_prompt.as_str()));
        messages.extend_from_slice(session.window(self.settings.history_turns));
        messages.push(ConversationTurn::user(question));

        let mut trace = Vec::new();
        let mut last_action: Option<String> = None;
        let mut last_reply = String::new();
        let mut concluded: Option<(String, AnswerStatus)> = None;
        let mut steps = 0;

        for step in 1..=self.settings.max_steps {
            steps = step;
            let reply = match self.chat.chat(&messages, self.settings.temperature) {
                Ok(turn) => turn.content,
                Err(e) => {
                    warn!("Step {step}: chat failed: {e}");
                    trace.push(StepEvent::ChatFailed {
                        step,
                        error: e.to_string(),
                    });
                    break;
                }
            };
            debug!("Step {step} reply: {reply}");
            trace.push(StepEvent::Reply {
                step,
                content: reply.clone(),
            });
            messages.push(ConversationTurn::assistant(reply.as_str()));

            let directive = directive::decode(&reply);
            last_reply = reply;

            let final_text = match directive {
                Directive::Retrieve {
                    keyword,
                    final_answer,
                } => {
                    let observation =
                        self.observe(step, keyword, &mut last_action, debug_search, &mut trace);
                    messages.push(ConversationTurn::user(observation));
                    final_answer.map(|text| (text, AnswerStatus::Complete))
                }
                Directive::FinalAnswer(text) => Some((text, AnswerStatus::Complete)),
                Directive::DirectAnswer(text) => Some((text, AnswerStatus::CompleteDirect)),
                Directive::Continue => None,
            };

            if let Some((text, status)) = final_text {
                // An empty final answer still ends the loop but falls back
                if !text.is_empty() {
                    concluded = Some((text, status));
                }
                break;
            }
        }

        let (text, status) = concluded.unwrap_or_else(|| {
            if last_reply.chars().count() > FORCED_ANSWER_MIN_CHARS {
                (last_reply, AnswerStatus::Forced)
            } else {
                (NO_CONCLUSION_TEXT.to_string(), AnswerStatus::NoConclusion)
            }
        });

        info!("Reasoning finished after {steps} steps: {}", status.as_str());
        session.record(question, &text);

        Answer {
            text,
            status,
            steps,
            trace,
        }
    }

    /// Run (or skip) the search a reply asked for and build the observation.
    fn observe(
        &self,
        step: usize,
        keyword: String,
        last_action: &mut Option<String>,
        debug_search: bool,
        trace: &mut Vec<StepEvent>,
    ) -> String {
        if keyword.is_empty() {
            trace.push(StepEvent::EmptyKeyword { step });
            return EMPTY_KEYWORD_OBSERVATION.to_string();
        }

        if last_action.as_deref() == Some(keyword.as_str()) {
            info!("Step {step}: '{keyword}' already searched");
            trace.push(StepEvent::RepeatedSearch { step, keyword });
            return REPEATED_SEARCH_OBSERVATION.to_string();
        }

        info!("Step {step}: searching '{keyword}'");
        let result = self.search.search(&keyword, debug_search);
        let observation = format!("{OBSERVATION_PREFIX}{}", result.text);
        *last_action = Some(keyword.clone());
        trace.push(StepEvent::Search {
            step,
            keyword,
            result,
        });
        observation
    }
}
