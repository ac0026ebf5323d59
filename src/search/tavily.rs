use crate::search::{SearchClient, SearchHit, SearchParams};
use crate::types::{AppError, Result};
use crate::utils::http_client;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Client for the Tavily `/search` API.
pub struct TavilyClient {
    http_client: reqwest::Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl TavilyClient {
    pub fn new(api_key: String, api_base: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: http_client(timeout)?,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(&self, params: &SearchParams) -> Result<Vec<SearchHit>> {
        let url = format!("{}/search", self.api_base);
        let body = json!({
            "query": params.query,
            "max_results": params.max_results,
            "search_depth": params.depth.as_str(),
            "include_images": params.include_images,
            "include_answer": false,
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::UpstreamSearch(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamSearch(format!(
                "Tavily request failed ({}): {}",
                status, text
            )));
        }

        let parsed: TavilyResponse = response.json().await.map_err(|e| {
            AppError::UpstreamSearch(format!("Failed to parse Tavily response: {}", e))
        })?;

        let mut hits = parsed.results;
        hits.truncate(params.max_results as usize);
        Ok(hits)
    }

    fn backend_name(&self) -> &'static str {
        "tavily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::config::SearchDepth;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params(query: &str) -> SearchParams {
        SearchParams {
            query: query.to_string(),
            max_results: 2,
            depth: SearchDepth::Advanced,
            include_images: false,
        }
    }

    fn client(server: &MockServer) -> TavilyClient {
        TavilyClient::new("tvly-test".into(), server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_search_maps_results() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer tvly-test"))
            .and(body_partial_json(json!({
                "query": "rust async",
                "max_results": 2,
                "search_depth": "advanced",
                "include_images": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "rust async",
                "results": [
                    {"title": "Async Book", "url": "https://rust-lang.github.io/async-book", "content": "Futures", "score": 0.9},
                    {"url": "https://tokio.rs", "content": "Runtime", "score": 0.8},
                    {"title": "Extra", "url": "https://extra", "content": "dropped", "score": 0.1}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let hits = client(&server).search(&params("rust async")).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Async Book");
        assert_eq!(hits[1].title, "");
        assert_eq!(hits[1].url, "https://tokio.rs");
    }

    #[tokio::test]
    async fn test_null_title_and_content_are_tolerated() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "x",
                "results": [
                    {"title": null, "url": "https://a.example", "content": "kept", "score": 0.7},
                    {"title": "B", "url": "https://b.example", "content": null, "score": 0.5}
                ]
            })))
            .mount(&server)
            .await;

        let hits = client(&server).search(&params("x")).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "");
        assert_eq!(hits[0].content, "kept");
        assert_eq!(hits[1].title, "B");
        assert_eq!(hits[1].content, "");
    }

    #[tokio::test]
    async fn test_missing_results_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"query": "x"})))
            .mount(&server)
            .await;

        let hits = client(&server).search(&params("x")).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_http_error_is_upstream_search() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let err = client(&server).search(&params("x")).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamSearch(_)));
        assert!(err.to_string().contains("401"));
    }
}
