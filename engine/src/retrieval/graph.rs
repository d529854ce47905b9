use super::{SourceAdapter, SourceError, SourceKind};
use crate::config::GraphConfig;
use async_trait::async_trait;
use serde_json::json;

/// Client for the legal knowledge-graph QA service
///
/// The graph is consumed as a black box: question text in, answer text out.
/// An empty structured result is a normal outcome, not an error.
pub struct GraphQaClient {
    config: GraphConfig,
    client: reqwest::Client,
}

impl GraphQaClient {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SourceAdapter for GraphQaClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Graph
    }

    async fn try_fetch(&self, query: &str) -> Result<String, SourceError> {
        let url = format!("{}/query", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "question": query }))
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Upstream { status, body });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let answer = data
            .get("answer")
            .and_then(|a| a.as_str())
            .unwrap_or_default();

        Ok(answer.trim().to_string())
    }
}
