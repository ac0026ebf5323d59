use crate::research::state::{SourceRecord, Turn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

// ============= API Request/Response Types =============

/// Body of `POST /api/research`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResearchRequest {
    /// Conversation so far; must contain at least one user turn
    pub messages: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_search_query_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_research_loops: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_model: Option<String>,
    /// Per-run overrides keyed by configuration field name
    #[serde(default)]
    #[schema(value_type = Object)]
    pub overrides: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResearchResponse {
    /// The cited answer (also the last assistant turn of `messages`)
    pub answer: String,
    pub messages: Vec<Turn>,
    pub sources: Vec<SourceRecord>,
    /// Markers that were substituted into `answer`
    pub cited_markers: Vec<String>,
    pub research_loop_count: u32,
    pub duration_ms: u64,
}

// ============= Error Types =============

/// Label of the stage a run failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    QueryGeneration,
    WebResearch,
    Reflection,
    Finalization,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::QueryGeneration => "generate_query",
            NodeKind::WebResearch => "web_research",
            NodeKind::Reflection => "reflection",
            NodeKind::Finalization => "finalize_answer",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing credential or endpoint for a collaborator. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The LLM collaborator could not produce a usable result.
    #[error("Generation error: {0}")]
    UpstreamGeneration(String),

    #[error("Search error: {0}")]
    UpstreamSearch(String),

    /// A router saw a state with no way forward.
    #[error("Routing exhausted: {0}")]
    RoutingExhaustion(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: NodeKind,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Attach the failing stage label, unless one is already attached.
    pub fn in_stage(self, stage: NodeKind) -> Self {
        match self {
            AppError::Stage { .. } => self,
            other => AppError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage label, if this error came out of a research node.
    pub fn stage(&self) -> Option<NodeKind> {
        match self {
            AppError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error with stage labels peeled off.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match self.root() {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamGeneration(_) | AppError::UpstreamSearch(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Configuration(_)
            | AppError::RoutingExhaustion(_)
            | AppError::Internal(_)
            | AppError::Stage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "stage": self.stage().map(|s| s.as_str()),
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
