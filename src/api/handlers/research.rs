use crate::{
    research::coordinator::RunRequest,
    types::{ResearchRequest, ResearchResponse, Result},
    AppState,
};
use axum::{extract::State, Json};
use std::time::Instant;
use tracing::info;

/// Run one research session to completion
#[utoipa::path(
    post,
    path = "/api/research",
    request_body = ResearchRequest,
    responses(
        (status = 200, description = "Research completed", body = ResearchResponse),
        (status = 400, description = "Invalid input"),
        (status = 502, description = "LLM or search backend failed"),
        (status = 500, description = "Internal error")
    ),
    tag = "research"
)]
pub async fn research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>> {
    let start = Instant::now();

    // One snapshot per run; a hot reload mid-run does not leak in
    let snapshot = state.config_manager.config();
    let request = RunRequest {
        conversation: payload.messages,
        requested_query_count: payload.initial_search_query_count,
        max_loops: payload.max_research_loops,
        reasoning_model: payload.reasoning_model,
        overrides: payload.overrides,
    };

    let output = state.coordinator.run(&snapshot.defaults, request).await?;

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(run_id = %output.run_id, duration_ms, "Research request served");

    Ok(Json(ResearchResponse {
        answer: output.answer,
        messages: output.conversation,
        sources: output.sources,
        cited_markers: output.cited_markers,
        research_loop_count: output.loop_count,
        duration_ms,
    }))
}
