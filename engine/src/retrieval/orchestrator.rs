//! Fan-out Retrieval Orchestrator
//!
//! Per turn, the three retrieval sources run as independent concurrent
//! operations joined at a single point before synthesis. No source's failure
//! or slowness affects the others: each fetch is internally time-bounded and
//! fail-soft, so `retrieve_all` is infallible by construction.

use super::{GroundingContext, SourceAdapter};
use crate::config::RetrievalConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Orchestrates the per-turn fan-out across all configured sources
///
/// Adapters are injected at construction time; the orchestrator owns no
/// ambient state and is shared freely across concurrent sessions.
pub struct Retriever {
    graph: Arc<dyn SourceAdapter>,
    semantic: Arc<dyn SourceAdapter>,
    web: Arc<dyn SourceAdapter>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        graph: Arc<dyn SourceAdapter>,
        semantic: Arc<dyn SourceAdapter>,
        web: Arc<dyn SourceAdapter>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            graph,
            semantic,
            web,
            config,
        }
    }

    /// Fan out to all sources and fuse their fragments
    ///
    /// The graph and semantic sources receive the raw utterance unless
    /// configured to use the reformulated query; web search always receives
    /// the reformulated query. Waits for all three to settle; a missing
    /// fragment is an empty one, never an absent key.
    pub async fn retrieve_all(&self, utterance: &str, web_query: &str) -> GroundingContext {
        let budget = Duration::from_secs(self.config.source_timeout_secs);

        let graph_query = if self.config.graph_uses_reformulated {
            web_query
        } else {
            utterance
        };
        let semantic_query = if self.config.semantic_uses_reformulated {
            web_query
        } else {
            utterance
        };

        let (graph, semantic, web) = tokio::join!(
            self.graph.fetch(graph_query, budget),
            self.semantic.fetch(semantic_query, budget),
            self.web.fetch(web_query, budget),
        );

        debug!(
            graph_len = graph.text.len(),
            graph_ok = graph.ok,
            semantic_len = semantic.text.len(),
            semantic_ok = semantic.ok,
            web_len = web.text.len(),
            web_ok = web.ok,
            "Fan-out retrieval settled"
        );

        GroundingContext {
            graph,
            semantic,
            web,
        }
    }
}
