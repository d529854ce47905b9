//! Conversation-aware Query Reformulation
//!
//! Distills the conversation so far plus the new utterance into a single
//! standalone retrieval query, expressed in French (the mandated output
//! language) regardless of what language the user typed. Web search needs
//! this because follow-up questions ("et pour les femmes enceintes ?") are
//! meaningless out of context; other sources can opt into the same query via
//! configuration.

use crate::db::{Turn, TurnRole};
use crate::llm::{Generator, LLMError, Message};
use std::sync::Arc;
use tracing::debug;

const REFORMULATE_INSTRUCTIONS: &str = "\
You rewrite conversations into search queries. Given a conversation about \
Moroccan labor law and a new user question, produce ONE standalone web search \
query, in French, that captures what the user is asking now, resolving any \
references to earlier turns. Output only the query, on a single line, with no \
quotes and no explanation.";

/// Derives a retrieval-optimized query from the conversation state
///
/// Pure function of its inputs apart from generation-capability
/// nondeterminism. A generation failure here is a turn-level failure and
/// propagates.
pub struct QueryReformulator {
    generator: Arc<dyn Generator>,
}

impl QueryReformulator {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Reformulate the conversation into one standalone French query
    pub async fn reformulate(
        &self,
        history: &[Turn],
        utterance: &str,
    ) -> Result<String, LLMError> {
        let mut messages = vec![Message::system(REFORMULATE_INSTRUCTIONS)];

        let mut prompt = String::new();
        if !history.is_empty() {
            prompt.push_str("Conversation so far:\n");
            prompt.push_str(&render_transcript(history));
            prompt.push('\n');
        }
        prompt.push_str("New question:\n");
        prompt.push_str(utterance);
        messages.push(Message::user(prompt));

        let raw = self.generator.generate(&messages).await?;

        // Models occasionally wrap the query in quotes or add a second line;
        // keep the first non-empty line, unquoted.
        let query = raw
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
            .trim_matches('"')
            .to_string();

        if query.is_empty() {
            return Err(LLMError::ParseError(
                "Reformulation produced an empty query".to_string(),
            ));
        }

        debug!(query = %query, "Reformulated retrieval query");
        Ok(query)
    }
}

/// Render turns as a plain-text transcript for prompt context
pub fn render_transcript(history: &[Turn]) -> String {
    let mut out = String::new();
    for turn in history {
        let label = match turn.role {
            TurnRole::User => "Utilisateur",
            TurnRole::Assistant => "Assistant",
        };
        out.push_str(label);
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out
}
