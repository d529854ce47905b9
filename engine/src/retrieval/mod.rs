//! Retrieval Sources and Fan-out Orchestration
//!
//! This module provides the three retrieval sources backing an answer (legal
//! knowledge graph, semantic passage index, web search) and the orchestrator
//! that fans out to all of them per turn. The SourceAdapter trait defines the
//! fail-soft contract every source must honor: an internal error or timeout
//! degrades to an empty fragment and never crosses the adapter boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

pub mod graph;
pub mod orchestrator;
pub mod semantic;
pub mod web;

pub use graph::GraphQaClient;
pub use orchestrator::Retriever;
pub use semantic::SemanticSearchClient;
pub use web::WebSearchClient;

/// Separator between joined passages / web results in a fragment
pub const FRAGMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Errors internal to a source adapter
///
/// These never leave the adapter boundary: `SourceAdapter::fetch` converts
/// every variant into an empty fragment.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing API key: environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Which retrieval source produced a fragment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Structured legal knowledge graph
    Graph,

    /// Semantic passage index
    Semantic,

    /// External web search
    Web,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Graph => write!(f, "graph"),
            SourceKind::Semantic => write!(f, "semantic"),
            SourceKind::Web => write!(f, "web"),
        }
    }
}

/// One source's textual contribution for a single turn
///
/// `ok` records whether the adapter completed without an internal error.
/// Downstream consumers only read `text` (an empty successful result and a
/// failed one are deliberately interchangeable there), but the flag keeps the
/// distinction observable in logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalFragment {
    pub kind: SourceKind,
    pub text: String,
    pub ok: bool,
}

impl RetrievalFragment {
    /// Fragment from a source that completed normally (text may still be empty)
    pub fn complete(kind: SourceKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            ok: true,
        }
    }

    /// Empty fragment from a source that failed or timed out
    pub fn failed(kind: SourceKind) -> Self {
        Self {
            kind,
            text: String::new(),
            ok: false,
        }
    }

    /// True if the fragment carries no usable text
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// The fused retrieval output for one turn
///
/// Invariant: there is always exactly one fragment per configured source.
/// Partial failure empties a fragment's text, it never removes the entry.
/// Consumed once by the answer synthesizer, then discarded.
#[derive(Debug, Clone)]
pub struct GroundingContext {
    pub graph: RetrievalFragment,
    pub semantic: RetrievalFragment,
    pub web: RetrievalFragment,
}

impl GroundingContext {
    /// Context with every fragment empty, as if all sources had failed
    pub fn empty() -> Self {
        Self {
            graph: RetrievalFragment::failed(SourceKind::Graph),
            semantic: RetrievalFragment::failed(SourceKind::Semantic),
            web: RetrievalFragment::failed(SourceKind::Web),
        }
    }

    /// All fragments, in source order
    pub fn fragments(&self) -> [&RetrievalFragment; 3] {
        [&self.graph, &self.semantic, &self.web]
    }

    /// True when no fragment carries usable text
    pub fn is_empty(&self) -> bool {
        self.fragments().iter().all(|f| f.is_blank())
    }
}

/// Contract every retrieval source implements
///
/// `try_fetch` is the fallible upstream call; `fetch` is what the orchestrator
/// uses: it bounds the call with a wall-clock budget and converts any error or
/// timeout into an empty fragment. Adapter failure is data, not a pipeline
/// fault.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter wraps
    fn kind(&self) -> SourceKind;

    /// Perform the upstream call
    async fn try_fetch(&self, query: &str) -> Result<String, SourceError>;

    /// Fail-soft, time-bounded fetch
    async fn fetch(&self, query: &str, budget: Duration) -> RetrievalFragment {
        match timeout(budget, self.try_fetch(query)).await {
            Ok(Ok(text)) => RetrievalFragment::complete(self.kind(), text),
            Ok(Err(e)) => {
                warn!(source = %self.kind(), error = %e, "Retrieval source failed");
                RetrievalFragment::failed(self.kind())
            }
            Err(_) => {
                warn!(
                    source = %self.kind(),
                    budget_secs = budget.as_secs(),
                    "Retrieval source timed out"
                );
                RetrievalFragment::failed(self.kind())
            }
        }
    }
}

/// Collapse newlines and runs of whitespace into single spaces
///
/// Passages come back with arbitrary formatting noise; the grounding context
/// wants them on one line each.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
