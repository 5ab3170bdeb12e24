//! Decoder for the text protocol the chat model speaks.
//!
//! The model never calls tools directly; it writes a retrieval marker
//! followed by keywords, or a `Final Answer` marker followed by the answer.
//! Everything the reasoning loop needs to know about a reply is extracted
//! here in one place.

/// Retrieval markers, ASCII and full-width colon forms.
pub const RETRIEVAL_MARKERS: &[&str] = &["检索:", "检索：", "Retrieve:", "Retrieve："];

/// Bare retrieval words; a reply mentioning either is never a direct answer.
const RETRIEVAL_WORDS: &[&str] = &["检索", "Retrieve"];

pub const FINAL_ANSWER_MARKER: &str = "Final Answer";

/// Replies longer than this without any retrieval mention are direct answers.
pub const DIRECT_ANSWER_MIN_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Search for `keyword`. A reply may also carry a final answer after the
    /// search request; it is honored once the observation is appended.
    Retrieve {
        keyword: String,
        final_answer: Option<String>,
    },
    FinalAnswer(String),
    /// A substantive reply that never asked for retrieval.
    DirectAnswer(String),
    Continue,
}

pub fn decode(reply: &str) -> Directive {
    let final_answer = extract_final_answer(reply);

    if let Some(keyword) = extract_keyword(reply) {
        return Directive::Retrieve {
            keyword,
            final_answer,
        };
    }

    if let Some(answer) = final_answer {
        return Directive::FinalAnswer(answer);
    }

    let mentions_retrieval = RETRIEVAL_WORDS.iter().any(|w| reply.contains(w));
    if !mentions_retrieval && reply.chars().count() > DIRECT_ANSWER_MIN_CHARS {
        return Directive::DirectAnswer(reply.to_string());
    }

    Directive::Continue
}

/// Text after the last retrieval marker, up to the end of that line.
fn extract_keyword(reply: &str) -> Option<String> {
    let (pos, marker) = RETRIEVAL_MARKERS
        .iter()
        .filter_map(|m| reply.rfind(m).map(|pos| (pos, *m)))
        .max_by_key(|(pos, _)| *pos)?;

    let rest = &reply[pos + marker.len()..];
    let line = rest.split('\n').next().unwrap_or_default();
    Some(line.trim().to_string())
}

/// Text after the last `Final Answer`, without the leading colon.
fn extract_final_answer(reply: &str) -> Option<String> {
    let pos = reply.rfind(FINAL_ANSWER_MARKER)?;
    let rest = &reply[pos + FINAL_ANSWER_MARKER.len()..];
    Some(
        rest.trim_start()
            .trim_start_matches(':')
            .trim_start_matches('：')
            .trim()
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieve(keyword: &str) -> Directive {
        Directive::Retrieve {
            keyword: keyword.to_string(),
            final_answer: None,
        }
    }

    #[test]
    fn test_retrieve_english_marker() {
        let reply = "Thought: need facts.\nAction: Retrieve: fever with chills\n";
        assert_eq!(decode(reply), retrieve("fever with chills"));
    }

    #[test]
    fn test_retrieve_chinese_markers() {
        assert_eq!(decode("Action: 检索: 发热"), retrieve("发热"));
        assert_eq!(decode("Action: 检索：  咳嗽 \nmore"), retrieve("咳嗽"));
    }

    #[test]
    fn test_last_marker_wins() {
        let reply = "检索: first\nThen again\nAction: Retrieve: second";
        assert_eq!(decode(reply), retrieve("second"));

        let reply = "Retrieve: first\n检索：second";
        assert_eq!(decode(reply), retrieve("second"));
    }

    #[test]
    fn test_empty_keyword() {
        assert_eq!(decode("Action: Retrieve:\nwaiting"), retrieve(""));
    }

    #[test]
    fn test_final_answer() {
        assert_eq!(
            decode("Thought: done.\nFinal Answer: Rest and fluids."),
            Directive::FinalAnswer("Rest and fluids.".to_string())
        );
        assert_eq!(
            decode("Final Answer：多喝水"),
            Directive::FinalAnswer("多喝水".to_string())
        );
    }

    #[test]
    fn test_final_answer_uses_last_occurrence() {
        assert_eq!(
            decode("Final Answer: draft\nFinal Answer: revised"),
            Directive::FinalAnswer("revised".to_string())
        );
    }

    #[test]
    fn test_retrieve_with_final_answer() {
        let reply = "Action: Retrieve: anemia\nFinal Answer: Likely iron deficiency.";
        assert_eq!(
            decode(reply),
            Directive::Retrieve {
                keyword: "anemia".to_string(),
                final_answer: Some("Likely iron deficiency.".to_string()),
            }
        );
    }

    #[test]
    fn test_direct_answer() {
        let reply = "Influenza is a viral infection of the airways.";
        assert_eq!(decode(reply), Directive::DirectAnswer(reply.to_string()));
    }

    #[test]
    fn test_direct_answer_length_counts_chars() {
        // 25 characters, 75 bytes
        let reply = "流行性感冒是由流感病毒引起的一种急性呼吸道传染病。";
        assert!(reply.chars().count() > DIRECT_ANSWER_MIN_CHARS);
        assert_eq!(decode(reply), Directive::DirectAnswer(reply.to_string()));

        // Fewer than 21 chars even though the byte length is larger
        assert_eq!(decode("流感是病毒感染。"), Directive::Continue);
    }

    #[test]
    fn test_retrieval_mention_blocks_direct_answer() {
        let reply = "I should Retrieve more information before answering this.";
        assert_eq!(decode(reply), Directive::Continue);
    }

    #[test]
    fn test_short_reply_continues() {
        assert_eq!(decode("Thinking..."), Directive::Continue);
    }
}
