use super::{SourceAdapter, SourceError, SourceKind, FRAGMENT_SEPARATOR};
use crate::config::WebSearchConfig;
use async_trait::async_trait;
use serde_json::json;

/// Client for the external web search capability (Tavily-compatible API)
///
/// Queries arrive already reformulated into standalone French search queries.
/// Each result is rendered as a tagged block carrying its source URL so the
/// synthesizer can tell web material apart from the legal corpus.
pub struct WebSearchClient {
    config: WebSearchConfig,
    client: reqwest::Client,
}

impl WebSearchClient {
    pub fn new(config: WebSearchConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> Result<String, SourceError> {
        std::env::var(&self.config.api_key_env)
            .map_err(|_| SourceError::MissingApiKey(self.config.api_key_env.clone()))
    }

    /// Render one search result as a tagged document block
    fn format_result(url: &str, content: &str) -> String {
        format!("<Document href=\"{}\"/>\n{}\n</Document>", url, content)
    }
}

#[async_trait]
impl SourceAdapter for WebSearchClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Web
    }

    async fn try_fetch(&self, query: &str) -> Result<String, SourceError> {
        let api_key = self.api_key()?;
        let url = format!("{}/search", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "api_key": api_key,
                "query": query,
                "max_results": self.config.max_results,
            }))
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

        let results = data
            .get("results")
            .and_then(|r| r.as_array())
            .ok_or_else(|| SourceError::Parse("No results array in response".to_string()))?;

        let blocks: Vec<String> = results
            .iter()
            .filter_map(|r| {
                let url = r.get("url").and_then(|u| u.as_str())?;
                let content = r.get("content").and_then(|c| c.as_str())?;
                Some(Self::format_result(url, content))
            })
            .collect();

        Ok(blocks.join(FRAGMENT_SEPARATOR))
    }
}
