use super::{collapse_whitespace, SourceAdapter, SourceError, SourceKind, FRAGMENT_SEPARATOR};
use crate::config::VectorConfig;
use async_trait::async_trait;
use serde_json::json;

/// Client for the semantic passage index
///
/// Retrieves the top-k passages nearest to the query, strips their formatting
/// noise, and joins them with an explicit separator. The index itself is an
/// already-built external service.
pub struct SemanticSearchClient {
    config: VectorConfig,
    client: reqwest::Client,
}

impl SemanticSearchClient {
    pub fn new(config: VectorConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SourceAdapter for SemanticSearchClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Semantic
    }

    async fn try_fetch(&self, query: &str) -> Result<String, SourceError> {
        let url = format!("{}/search", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "query": query, "k": self.config.top_k }))
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

        let passages = data
            .get("passages")
            .and_then(|p| p.as_array())
            .ok_or_else(|| SourceError::Parse("No passages array in response".to_string()))?;

        let cleaned: Vec<String> = passages
            .iter()
            .filter_map(|p| p.as_str())
            .map(collapse_whitespace)
            .filter(|p| !p.is_empty())
            .collect();

        Ok(cleaned.join(FRAGMENT_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SemanticSearchClient {
        SemanticSearchClient::new(VectorConfig {
            base_url: server.uri(),
            top_k: 2,
        })
    }

    #[tokio::test]
    async fn test_passages_are_cleaned_and_joined() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_json(serde_json::json!({ "query": "préavis", "k": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "passages": ["Article  43 :\n le délai de préavis", "La rupture\n\ndu contrat"]
            })))
            .mount(&server)
            .await;

        let text = client_for(&server).try_fetch("préavis").await.unwrap();
        assert_eq!(
            text,
            "Article 43 : le délai de préavis\n\n---\n\nLa rupture du contrat"
        );
    }

    #[tokio::test]
    async fn test_no_hits_yields_empty_string() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "passages": [] })),
            )
            .mount(&server)
            .await;

        let text = client_for(&server).try_fetch("x").await.unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_error_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server).try_fetch("x").await.unwrap_err();
        assert!(matches!(err, SourceError::Upstream { status: 500, .. }));
    }
}
