use crate::llm::client::{GenerationRequest, LLMClient};
use crate::types::{AppError, Result};
use crate::utils::http_client;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAIClient {
    http_client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: http_client(timeout)?,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn request_body(request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": [{"role": "user", "content": request.prompt}],
            "temperature": request.temperature,
        });

        if let Some(schema) = &request.response_schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                }
            });
        }

        body
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        tracing::debug!(model = %request.model, %url, "OpenAI chat completion");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| AppError::UpstreamGeneration(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamGeneration(format!(
                "OpenAI request failed ({}): {}",
                status, text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::UpstreamGeneration(format!("Failed to parse OpenAI response: {}", e))
        })?;

        body["choices"]
            .get(0)
            .and_then(|choice| choice["message"]["content"].as_str())
            .filter(|content| !content.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::UpstreamGeneration("No response from OpenAI".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
