//! Web search collaborators
//!
//! Web research workers call [`SearchClient::search`] once per task. Two
//! backends are available:
//! - [`tavily::TavilyClient`] - the Tavily search API (needs a key)
//! - `duckduckgo::DuckDuckGoSearch` - keyless DuckDuckGo search through
//!   `daedra` (feature `duckduckgo`)

use crate::research::config::SearchDepth;
use crate::types::{AppError, Result};
use crate::utils::toml_config::SearchProviderConfig;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "duckduckgo")]
pub mod duckduckgo;
pub mod tavily;

/// One search call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub query: String,
    pub max_results: u32,
    pub depth: SearchDepth,
    pub include_images: bool,
}

/// One ranked result. Missing or `null` fields read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Results in rank order. An empty list is a valid answer.
    async fn search(&self, params: &SearchParams) -> Result<Vec<SearchHit>>;

    fn backend_name(&self) -> &'static str;
}

/// Build the search client named by the `[search_provider]` table.
pub fn create_search_client(config: &SearchProviderConfig) -> Result<Arc<dyn SearchClient>> {
    match config {
        SearchProviderConfig::Tavily {
            api_base,
            api_key_env,
            timeout_secs,
        } => {
            let api_key = std::env::var(api_key_env)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    AppError::Configuration(format!(
                        "Environment variable '{}' for the Tavily API key is not set",
                        api_key_env
                    ))
                })?;
            Ok(Arc::new(tavily::TavilyClient::new(
                api_key,
                api_base.clone(),
                Duration::from_secs(*timeout_secs),
            )?))
        }

        #[cfg(feature = "duckduckgo")]
        SearchProviderConfig::DuckDuckGo => Ok(Arc::new(duckduckgo::DuckDuckGoSearch::new())),

        #[cfg(not(feature = "duckduckgo"))]
        SearchProviderConfig::DuckDuckGo => Err(AppError::Configuration(
            "DuckDuckGo search is not compiled in; rebuild with the 'duckduckgo' feature"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_hit_fields_default_to_empty() {
        let hit: SearchHit = serde_json::from_str(r#"{"url":"https://a"}"#).unwrap();
        assert_eq!(hit.url, "https://a");
        assert!(hit.title.is_empty());
        assert!(hit.content.is_empty());
    }

    #[test]
    fn test_search_hit_null_fields_read_as_empty() {
        let hit: SearchHit =
            serde_json::from_str(r#"{"url":"https://a","title":null,"content":null}"#).unwrap();
        assert_eq!(hit.url, "https://a");
        assert_eq!(hit.title, "");
        assert_eq!(hit.content, "");
    }

    #[test]
    fn test_tavily_requires_key() {
        let config = SearchProviderConfig::Tavily {
            api_base: "https://api.tavily.com".to_string(),
            api_key_env: "DELVE_TEST_UNSET_TAVILY_KEY".to_string(),
            timeout_secs: 10,
        };

        let result = create_search_client(&config);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[cfg(feature = "duckduckgo")]
    #[test]
    fn test_duckduckgo_needs_no_key() {
        let client = create_search_client(&SearchProviderConfig::DuckDuckGo).unwrap();
        assert_eq!(client.backend_name(), "duckduckgo");
    }
}
