use crate::llm::client::{GenerationRequest, LLMClient};
use crate::types::{AppError, Result};
use crate::utils::http_client;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for a local Ollama server's `/api/chat` endpoint.
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_body(request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": [{"role": "user", "content": request.prompt}],
            "stream": false,
            "options": {
                "temperature": request.temperature
            }
        });

        // Ollama takes the schema itself as `format`
        if let Some(schema) = &request.response_schema {
            body["format"] = schema.schema.clone();
        }

        body
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(model = %request.model, %url, "Ollama chat");

        let response = self
            .http_client
            .post(&url)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| AppError::UpstreamGeneration(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamGeneration(format!(
                "Ollama request failed ({}): {}",
                status, text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::UpstreamGeneration(format!("Failed to parse Ollama response: {}", e))
        })?;

        body["message"]["content"]
            .as_str()
            .filter(|content| !content.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::UpstreamGeneration("Empty response from Ollama".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}
