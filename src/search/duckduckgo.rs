//! Keyless web search via daedra
//!
//! daedra scrapes DuckDuckGo, so search depth and image results are not
//! available; both parameters are ignored.

use crate::search::{SearchClient, SearchHit, SearchParams};
use crate::types::{AppError, Result};
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct DuckDuckGoSearch;

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SearchClient for DuckDuckGoSearch {
    async fn search(&self, params: &SearchParams) -> Result<Vec<SearchHit>> {
        tracing::debug!(
            query = %params.query,
            depth = params.depth.as_str(),
            include_images = params.include_images,
            "DuckDuckGo search ignores depth and image options"
        );

        let search_args = daedra::SearchArgs {
            query: params.query.clone(),
            options: Some(daedra::SearchOptions {
                num_results: params.max_results as usize,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::UpstreamSearch(format!("DuckDuckGo search failed: {}", e)))?;

        let hits = response
            .data
            .iter()
            .take(params.max_results as usize)
            .map(|r| to_hit(&r.title, &r.url, &r.description))
            .collect();

        Ok(hits)
    }

    fn backend_name(&self) -> &'static str {
        "duckduckgo"
    }
}

/// daedra calls the snippet a description.
fn to_hit(title: impl ToString, url: impl ToString, description: impl ToString) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        title: title.to_string(),
        content: description.to_string(),
    }
}
