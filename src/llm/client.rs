//! LLM client abstraction and provider selection
//!
//! The research nodes only ever see [`LLMClient`]. Two providers implement it:
//! - **OpenAI**: any OpenAI-compatible `/chat/completions` endpoint
//! - **Ollama**: a local Ollama server (`/api/chat`)

use crate::types::{AppError, Result};
use crate::utils::toml_config::LlmProviderConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// JSON schema the response must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    /// Schema title, sent where the provider wants a name
    pub name: String,
    pub schema: serde_json::Value,
}

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    /// When set, the provider is asked for JSON matching this schema
    pub response_schema: Option<ResponseSchema>,
}

impl GenerationRequest {
    pub fn text(model: impl Into<String>, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature,
            response_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// Generic LLM client trait for provider abstraction
///
/// Implementations make exactly one attempt per call. Retries belong to
/// [`crate::llm::structured`].
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion, returning the raw message text
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Provider name for logs
    fn provider_name(&self) -> &'static str;
}

/// Provider enum for runtime selection
///
/// # Supported Providers
///
/// | Provider | Structured output | Notes |
/// |----------|-------------------|-------|
/// | OpenAI | `response_format: json_schema` | Also OpenRouter, vLLM, Azure |
/// | Ollama | `format: <schema>` | Recommended for local |
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     timeout: Duration::from_secs(120),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        timeout: Duration,
    },

    /// Ollama local LLM provider
    Ollama { base_url: String, timeout: Duration },
}

impl Provider {
    /// Resolve a provider from the `[llm_provider]` table, reading the
    /// credential from the environment variable it names.
    pub fn from_config(config: &LlmProviderConfig) -> Result<Self> {
        match config {
            LlmProviderConfig::OpenAI {
                api_base,
                api_key_env,
                timeout_secs,
            } => {
                let api_key = std::env::var(api_key_env).map_err(|_| {
                    AppError::Configuration(format!(
                        "Environment variable '{}' for the OpenAI API key is not set",
                        api_key_env
                    ))
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    timeout: Duration::from_secs(*timeout_secs),
                })
            }
            LlmProviderConfig::Ollama {
                base_url,
                timeout_secs,
            } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                timeout: Duration::from_secs(*timeout_secs),
            }),
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the provider's feature is not
    /// compiled in, the credential is empty, or the HTTP client cannot be
    /// built.
    pub fn create_client(&self) -> Result<Arc<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                timeout,
            } => {
                if api_key.trim().is_empty() {
                    return Err(AppError::Configuration(
                        "OpenAI API key is empty".to_string(),
                    ));
                }
                Ok(Arc::new(super::openai::OpenAIClient::new(
                    api_key.clone(),
                    api_base.clone(),
                    *timeout,
                )?))
            }

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, timeout } => Ok(Arc::new(
                super::ollama::OllamaClient::new(base_url.clone(), *timeout)?,
            )),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} support is not compiled in; rebuild with the '{}' feature",
                other.name(),
                other.feature()
            ))),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    fn feature(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "openai",
            Provider::Ollama { .. } => "ollama",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name() {
        let openai = Provider::OpenAI {
            api_key: "".to_string(),
            api_base: "".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(openai.name(), "OpenAI");

        let ollama = Provider::Ollama {
            base_url: "".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(ollama.name(), "Ollama");
    }

    #[test]
    fn test_from_config_requires_api_key_env() {
        let config = LlmProviderConfig::OpenAI {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "DELVE_TEST_UNSET_OPENAI_KEY".to_string(),
            timeout_secs: 30,
        };

        let err = Provider::from_config(&config).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
        assert!(err.to_string().contains("DELVE_TEST_UNSET_OPENAI_KEY"));
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_empty_api_key_is_rejected() {
        let provider = Provider::OpenAI {
            api_key: "  ".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(1),
        };

        let result = provider.create_client();
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[cfg(feature = "ollama")]
    #[test]
    fn test_ollama_client_creation() {
        let provider = Provider::from_config(&LlmProviderConfig::Ollama {
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 30,
        })
        .unwrap();

        let client = provider.create_client().unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_generation_request_builder() {
        let request = GenerationRequest::text("gpt-4o", "hello", 0.5).with_schema(ResponseSchema {
            name: "Answer".to_string(),
            schema: serde_json::json!({"type": "object"}),
        });

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.response_schema.unwrap().name, "Answer");
    }
}
