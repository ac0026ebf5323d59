//! Typed generation on top of [`LLMClient`].
//!
//! [`generate_structured`] asks the provider for JSON matching the schema of
//! `T` (derived with `schemars`), pulls the JSON object out of whatever text
//! comes back and deserializes it. A failed call or an unparseable reply is
//! retried up to `max_retries` more times with exponential backoff; once the
//! budget is spent the last failure surfaces as
//! [`AppError::UpstreamGeneration`].

use crate::llm::client::{GenerationRequest, LLMClient, ResponseSchema};
use crate::types::{AppError, Result};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::time::Duration;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Model, temperature and retry budget for one logical LLM call.
#[derive(Debug, Clone, Copy)]
pub struct CallSettings<'a> {
    pub model: &'a str,
    pub temperature: f32,
    /// Extra attempts after the first
    pub max_retries: u32,
}

/// Schema sent to the provider for `T`.
pub fn response_schema<T: JsonSchema>() -> ResponseSchema {
    let schema = schemars::schema_for!(T);
    ResponseSchema {
        name: T::schema_name().to_string(),
        schema: schema.as_value().clone(),
    }
}

/// Generate a value of type `T`.
pub async fn generate_structured<T>(
    client: &dyn LLMClient,
    settings: CallSettings<'_>,
    prompt: &str,
) -> Result<T>
where
    T: DeserializeOwned + JsonSchema,
{
    let request = GenerationRequest::text(settings.model, prompt, settings.temperature)
        .with_schema(response_schema::<T>());

    let request = &request;
    with_retries(settings.max_retries, move || async move {
        let raw = client.generate(request).await?;
        parse_json_reply::<T>(&raw)
    })
    .await
}

/// Generate free-form text.
pub async fn generate_text(
    client: &dyn LLMClient,
    settings: CallSettings<'_>,
    prompt: &str,
) -> Result<String> {
    let request = GenerationRequest::text(settings.model, prompt, settings.temperature);
    let request = &request;
    with_retries(settings.max_retries, move || client.generate(request)).await
}

async fn with_retries<T, F, Fut>(max_retries: u32, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut failures = 0u32;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if failures < max_retries => {
                let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(failures);
                failures += 1;
                tracing::debug!(
                    attempt = failures,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "LLM call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(match e {
                    AppError::UpstreamGeneration(_) => e,
                    other => AppError::UpstreamGeneration(other.to_string()),
                })
            }
        }
    }
}

/// Deserialize the JSON object embedded in a model reply.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let json = extract_json(raw).ok_or_else(|| {
        AppError::UpstreamGeneration(format!("No JSON object in reply: {}", preview(raw)))
    })?;

    serde_json::from_str(json).map_err(|e| {
        AppError::UpstreamGeneration(format!(
            "Reply does not match the requested schema: {} ({})",
            e,
            preview(raw)
        ))
    })
}

/// The outermost `{...}` in `raw`, ignoring code fences and chatter around it.
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn preview(raw: &str) -> String {
    const MAX: usize = 120;
    if raw.chars().count() <= MAX {
        raw.to_string()
    } else {
        let head: String = raw.chars().take(MAX).collect();
        format!("{}...", head)
    }
}
