//! Mock collaborators for the research graph.
//!
//! [`ScriptedLlm`] answers each stage from a script, keyed on the schema the
//! request asks for. [`MockSearch`] serves canned hits per query, with
//! optional per-query latency and failures. Both record every call.

#![allow(dead_code)]

use async_trait::async_trait;
use delve::llm::{GenerationRequest, LLMClient};
use delve::search::{SearchClient, SearchHit, SearchParams};
use delve::types::{AppError, Result};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub const QUERY_SCHEMA: &str = "SearchQueryList";
pub const REFLECTION_SCHEMA: &str = "ReflectionOutcome";

/// LLM that plays query writer, reflector and answer writer.
pub struct ScriptedLlm {
    queries: Vec<String>,
    reflections: Mutex<VecDeque<serde_json::Value>>,
    answer: String,
    fail_answer: bool,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedLlm {
    /// Generates `queries`, always reports a knowledge gap with no
    /// follow-ups, and answers with `answer`.
    pub fn new(queries: &[&str], answer: &str) -> Self {
        Self {
            queries: queries.iter().map(|q| q.to_string()).collect(),
            reflections: Mutex::new(VecDeque::new()),
            answer: answer.to_string(),
            fail_answer: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reflection reply. Replies are used in order; once the queue
    /// is empty the default gap reply is used.
    pub fn with_reflection(self, is_sufficient: bool, follow_ups: &[&str]) -> Self {
        self.reflections.lock().push_back(json!({
            "is_sufficient": is_sufficient,
            "knowledge_gap": if is_sufficient { "" } else { "more detail needed" },
            "follow_up_queries": follow_ups,
        }));
        self
    }

    pub fn failing_answer(mut self) -> Self {
        self.fail_answer = true;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Requests that asked for `schema`, or free text when `None`.
    pub fn calls_for(&self, schema: Option<&str>) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.response_schema.as_ref().map(|s| s.name.as_str()) == schema)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LLMClient for ScriptedLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().push(request.clone());

        match request.response_schema.as_ref().map(|s| s.name.as_str()) {
            Some(QUERY_SCHEMA) => Ok(json!({
                "rationale": "cover the question from several angles",
                "queries": self.queries,
            })
            .to_string()),
            Some(REFLECTION_SCHEMA) => {
                let reply = self.reflections.lock().pop_front().unwrap_or_else(|| {
                    json!({
                        "is_sufficient": false,
                        "knowledge_gap": "more detail needed",
                        "follow_up_queries": [],
                    })
                });
                Ok(reply.to_string())
            }
            Some(other) => Err(AppError::UpstreamGeneration(format!(
                "unexpected schema {}",
                other
            ))),
            None if self.fail_answer => {
                Err(AppError::UpstreamGeneration("answer model down".to_string()))
            }
            None => Ok(self.answer.clone()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

enum Scripted {
    Hits(Vec<SearchHit>),
    Fail(String),
}

/// Search backend with canned results per query.
///
/// Queries with no script get one hit whose url is derived from the query.
pub struct MockSearch {
    scripts: HashMap<String, Scripted>,
    delays: HashMap<String, Duration>,
    pub calls: Mutex<Vec<SearchParams>>,
    /// Queries in the order their searches finished
    pub completed: Mutex<Vec<String>>,
}

impl Default for MockSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSearch {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.scripts.insert(query.to_string(), Scripted::Hits(hits));
        self
    }

    pub fn with_failure(mut self, query: &str, reason: &str) -> Self {
        self.scripts
            .insert(query.to_string(), Scripted::Fail(reason.to_string()));
        self
    }

    pub fn with_delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn searched_queries(&self) -> Vec<String> {
        self.calls.lock().iter().map(|p| p.query.clone()).collect()
    }
}

#[async_trait]
impl SearchClient for MockSearch {
    async fn search(&self, params: &SearchParams) -> Result<Vec<SearchHit>> {
        self.calls.lock().push(params.clone());

        if let Some(delay) = self.delays.get(&params.query) {
            tokio::time::sleep(*delay).await;
        }

        let result = match self.scripts.get(&params.query) {
            Some(Scripted::Hits(hits)) => Ok(hits.clone()),
            Some(Scripted::Fail(reason)) => Err(AppError::UpstreamSearch(reason.clone())),
            None => Ok(vec![hit(
                &format!("About {}", params.query),
                &format!("https://search.example/{}", params.query.replace(' ', "-")),
            )]),
        };

        self.completed.lock().push(params.query.clone());
        result
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

pub fn hit(title: &str, url: &str) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        title: title.to_string(),
        content: format!("Snippet for {}", title),
    }
}
