//! Session Turn Controller
//!
//! Top-level entry point of the engine. One call per user utterance:
//! load history, reformulate, fan out to the retrieval sources, synthesize
//! under the grounding policy, persist the exchange, return the answer.
//!
//! A retrieval-source failure never fails a turn (it was absorbed into an
//! empty fragment upstream). A generation failure does, and the turn is then
//! not persisted: conversation state only ever contains completed exchanges.

use crate::answer::{policy, AnswerSynthesizer, GREETING_REPLY};
use crate::db::ConversationStore;
use crate::reformulator::QueryReformulator;
use crate::retrieval::Retriever;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Drives one conversational turn end to end
///
/// All collaborators are injected at construction; the controller holds no
/// mutable state and a single instance serves all sessions concurrently.
pub struct TurnController {
    store: ConversationStore,
    retriever: Arc<Retriever>,
    reformulator: QueryReformulator,
    synthesizer: AnswerSynthesizer,
    history_limit: usize,
}

impl TurnController {
    pub fn new(
        store: ConversationStore,
        retriever: Arc<Retriever>,
        reformulator: QueryReformulator,
        synthesizer: AnswerSynthesizer,
        history_limit: usize,
    ) -> Self {
        Self {
            store,
            retriever,
            reformulator,
            synthesizer,
            history_limit,
        }
    }

    /// Handle one utterance within a session and return the answer text
    pub async fn handle_turn(&self, session_id: &str, utterance: &str) -> Result<String> {
        let start = Instant::now();
        info!(session_id, "Handling turn");

        // Pure greetings are decided by rule alone: no reformulation call,
        // no retrieval fan-out, no generator
        if policy::is_greeting(utterance) {
            debug!(session_id, "Greeting turn, skipping retrieval");
            self.store
                .append_exchange(session_id, utterance, GREETING_REPLY)
                .await
                .context("Failed to persist turn")?;
            return Ok(GREETING_REPLY.to_string());
        }

        let history = self
            .store
            .recent(session_id, self.history_limit)
            .await
            .context("Failed to load conversation history")?;

        let web_query = self
            .reformulator
            .reformulate(&history, utterance)
            .await
            .context("Query reformulation failed")?;

        let ctx = self.retriever.retrieve_all(utterance, &web_query).await;

        let answer = self
            .synthesizer
            .answer(utterance, &history, &ctx)
            .await
            .context("Answer synthesis failed")?;

        self.store
            .append_exchange(session_id, utterance, &answer)
            .await
            .context("Failed to persist turn")?;

        debug!(
            session_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            history_turns = history.len(),
            "Turn completed"
        );

        Ok(answer)
    }
}
