//! Answer Synthesis under the Grounding/Refusal Policy
//!
//! Per-turn state machine, first match wins:
//!
//! 1. Pure greeting -> fixed neutral reply, grounding context ignored
//! 2. Out of scope -> fixed refusal, verbatim
//! 3. In scope but empty grounding -> fixed insufficient-information reply
//! 4. Answerable -> synthesis strictly from the non-empty fragments
//!
//! Classification is an explicit pre-step: the greeting and empty-grounding
//! checks are pure code, scope classification is one constrained generator
//! call, and only the answerable state invokes full synthesis. The fixed
//! strings never come out of the model. All four states reply in French
//! unconditionally.

use crate::db::Turn;
use crate::llm::{Generator, LLMError, Message};
use crate::reformulator::render_transcript;
use crate::retrieval::GroundingContext;
use std::sync::Arc;
use tracing::debug;

pub mod policy;

pub use policy::{GREETING_REPLY, INSUFFICIENT_REPLY, OUT_OF_SCOPE_REPLY};

use policy::Scope;

/// Produces the final answer for a turn from the fused grounding context
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Apply the policy state machine and produce the answer text
    ///
    /// Generator errors (scope classification or synthesis) propagate: they
    /// are turn-level failures, unlike retrieval-source failures which were
    /// already absorbed upstream.
    pub async fn answer(
        &self,
        utterance: &str,
        history: &[Turn],
        ctx: &GroundingContext,
    ) -> Result<String, LLMError> {
        // State 1: greeting. Decided by rule, never touches the context.
        if policy::is_greeting(utterance) {
            debug!("Utterance classified as greeting");
            return Ok(GREETING_REPLY.to_string());
        }

        // State 2: out of scope.
        if self.classify_scope(utterance).await? == Scope::OutOfScope {
            debug!("Utterance classified as out of scope");
            return Ok(OUT_OF_SCOPE_REPLY.to_string());
        }

        // State 3: in scope, nothing retrieved. No synthesis call is made.
        if ctx.is_empty() {
            debug!("Grounding context empty, answering insufficient");
            return Ok(INSUFFICIENT_REPLY.to_string());
        }

        // State 4: answerable.
        self.synthesize(utterance, history, ctx).await
    }

    async fn classify_scope(&self, utterance: &str) -> Result<Scope, LLMError> {
        let messages = [
            Message::system(policy::SCOPE_INSTRUCTIONS),
            Message::user(utterance),
        ];
        let reply = self.generator.generate(&messages).await?;
        Ok(policy::parse_scope(&reply))
    }

    async fn synthesize(
        &self,
        utterance: &str,
        history: &[Turn],
        ctx: &GroundingContext,
    ) -> Result<String, LLMError> {
        let mut instructions = String::from(policy::SYNTHESIS_INSTRUCTIONS);
        instructions.push_str("\n\n=== GRAPH ===\n");
        instructions.push_str(ctx.graph.text.trim());
        instructions.push_str("\n\n=== SEMANTIC ===\n");
        instructions.push_str(ctx.semantic.text.trim());
        instructions.push_str("\n\n=== WEB ===\n");
        instructions.push_str(ctx.web.text.trim());

        let mut messages = vec![Message::system(instructions)];
        if !history.is_empty() {
            messages.push(Message::system(format!(
                "Previous conversation:\n{}",
                render_transcript(history)
            )));
        }
        messages.push(Message::user(utterance));

        let reply = self.generator.generate(&messages).await?;
        let trimmed = reply.trim();

        // The model signals unsupported questions with a sentinel; the fixed
        // string is substituted here so it stays verbatim.
        if trimmed == policy::INSUFFICIENT_SENTINEL {
            return Ok(INSUFFICIENT_REPLY.to_string());
        }

        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{RetrievalFragment, SourceKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Generator returning scripted replies in order
    struct ScriptedGenerator {
        replies: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _messages: &[Message]) -> Result<String, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| LLMError::InvalidRequest("script exhausted".to_string()))
        }
    }

    fn ctx_with_graph(text: &str) -> GroundingContext {
        let mut ctx = GroundingContext::empty();
        ctx.graph = RetrievalFragment::complete(SourceKind::Graph, text);
        ctx
    }

    #[tokio::test]
    async fn test_greeting_ignores_context_and_generator() {
        let generator = ScriptedGenerator::new(&[]);
        let synthesizer = AnswerSynthesizer::new(Arc::clone(&generator) as Arc<dyn Generator>);

        let populated = ctx_with_graph("Article 9: ...");
        let empty = GroundingContext::empty();

        let a1 = synthesizer.answer("Bonjour", &[], &populated).await.unwrap();
        let a2 = synthesizer.answer("Bonjour", &[], &empty).await.unwrap();

        assert_eq!(a1, GREETING_REPLY);
        assert_eq!(a1, a2);
        // No generator call was made on either path
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_out_of_scope_returns_fixed_refusal() {
        let generator = ScriptedGenerator::new(&["OUT_OF_SCOPE"]);
        let synthesizer = AnswerSynthesizer::new(generator as Arc<dyn Generator>);

        let answer = synthesizer
            .answer(
                "What is the capital of France?",
                &[],
                &ctx_with_graph("irrelevant"),
            )
            .await
            .unwrap();

        assert_eq!(answer, OUT_OF_SCOPE_REPLY);
    }

    #[tokio::test]
    async fn test_empty_context_returns_insufficient_without_synthesis() {
        let generator = ScriptedGenerator::new(&["IN_SCOPE"]);
        let synthesizer = AnswerSynthesizer::new(Arc::clone(&generator) as Arc<dyn Generator>);

        let answer = synthesizer
            .answer("Quelle est la durée du préavis ?", &[], &GroundingContext::empty())
            .await
            .unwrap();

        assert_eq!(answer, INSUFFICIENT_REPLY);
        // Only the scope classification ran
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_answerable_returns_synthesis() {
        let generator = ScriptedGenerator::new(&[
            "IN_SCOPE",
            "Selon l'article 9 du Code du travail, ...",
        ]);
        let synthesizer = AnswerSynthesizer::new(generator as Arc<dyn Generator>);

        let answer = synthesizer
            .answer(
                "Que dit l'article 9 ?",
                &[],
                &ctx_with_graph("Article 9: interdiction de la discrimination"),
            )
            .await
            .unwrap();

        assert_eq!(answer, "Selon l'article 9 du Code du travail, ...");
        assert!(!answer.contains(INSUFFICIENT_REPLY));
    }

    #[tokio::test]
    async fn test_sentinel_maps_to_fixed_insufficient_reply() {
        let generator = ScriptedGenerator::new(&["IN_SCOPE", "INSUFFISANT"]);
        let synthesizer = AnswerSynthesizer::new(generator as Arc<dyn Generator>);

        let answer = synthesizer
            .answer(
                "Question pointue ?",
                &[],
                &ctx_with_graph("matériel sans rapport"),
            )
            .await
            .unwrap();

        assert_eq!(answer, INSUFFICIENT_REPLY);
    }

    #[tokio::test]
    async fn test_generator_failure_propagates() {
        // Script exhausted: the classification call itself errors
        let generator = ScriptedGenerator::new(&[]);
        let synthesizer = AnswerSynthesizer::new(generator as Arc<dyn Generator>);

        let result = synthesizer
            .answer("Quelle est la durée du préavis ?", &[], &GroundingContext::empty())
            .await;

        assert!(result.is_err());
    }
}
