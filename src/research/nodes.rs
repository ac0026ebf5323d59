//! The four research stages.
//!
//! Each node reads the run state (or, for a worker, its own task) and
//! returns a [`StateUpdate`]; none of them mutate shared state. Stage labels
//! are attached to their errors by the coordinator.

use crate::llm::{generate_structured, generate_text, CallSettings, LLMClient};
use crate::research::citation::{self, CitationTable, Substitution};
use crate::research::config::EffectiveConfig;
use crate::research::prompts;
use crate::research::state::{RunState, SourceRecord, StateUpdate, TaskState, Turn};
use crate::search::{SearchClient, SearchParams};
use crate::types::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a node needs besides the run state. Built once per run.
pub struct RunContext {
    pub config: EffectiveConfig,
    pub llm: Arc<dyn LLMClient>,
    pub search: Arc<dyn SearchClient>,
    /// Date shown to every prompt of the run
    pub date: String,
}

impl RunContext {
    pub fn new(
        config: EffectiveConfig,
        llm: Arc<dyn LLMClient>,
        search: Arc<dyn SearchClient>,
    ) -> Self {
        Self {
            config,
            llm,
            search,
            date: prompts::current_date(),
        }
    }

    fn settings<'a>(&self, model: &'a str, temperature: f32) -> CallSettings<'a> {
        CallSettings {
            model,
            temperature,
            max_retries: self.config.llm.max_retries,
        }
    }
}

/// Structured output of query generation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchQueryList {
    /// Search queries, one aspect of the question each
    #[serde(alias = "query")]
    pub queries: Vec<String>,
    /// Why these queries cover the question
    #[serde(default)]
    pub rationale: String,
}

/// Structured output of reflection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReflectionOutcome {
    /// Whether the findings already answer the question
    pub is_sufficient: bool,
    /// What is missing, empty when sufficient
    #[serde(default)]
    pub knowledge_gap: String,
    /// Queries that would close the gap, empty when sufficient
    #[serde(default)]
    pub follow_up_queries: Vec<String>,
}

/// Ask the LLM for the initial batch of search queries.
pub async fn generate_queries(state: &RunState, ctx: &RunContext) -> Result<StateUpdate> {
    let target = state
        .requested_query_count
        .unwrap_or(ctx.config.research.initial_query_count);

    let topic = prompts::research_topic(&state.conversation);
    let prompt = prompts::query_writer(&topic, &ctx.date, target);
    let model = &ctx.config.model.query_generator_model;

    debug!(%model, target, "Generating search queries");
    let generated: SearchQueryList = generate_structured(
        ctx.llm.as_ref(),
        ctx.settings(model, ctx.config.llm.query_generation_temperature),
        &prompt,
    )
    .await?;

    let queries: Vec<String> = generated
        .queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    debug!(count = queries.len(), rationale = %generated.rationale, "Queries generated");

    Ok(StateUpdate {
        queries,
        requested_query_count: Some(target),
        ..Default::default()
    })
}

/// Run one search task and turn its results into findings and sources.
///
/// Zero results is not an error: the task contributes its query and
/// nothing else.
pub async fn web_research(task: TaskState, ctx: &RunContext) -> Result<StateUpdate> {
    let params = SearchParams {
        query: task.query.clone(),
        max_results: ctx.config.search.max_results,
        depth: ctx.config.search.depth,
        include_images: ctx.config.search.include_images,
    };

    let hits = ctx.search.search(&params).await?;
    debug!(results = hits.len(), backend = ctx.search.backend_name(), "Search finished");

    let mut sources = Vec::with_capacity(hits.len());
    let mut block = String::new();

    for (index, hit) in hits.into_iter().enumerate() {
        let marker = citation::mint_marker(task.task_id, index);
        block.push_str(&citation::format_finding(
            &marker,
            &hit.title,
            &hit.content,
            &hit.url,
        ));
        sources.push(SourceRecord {
            marker,
            url: hit.url,
            title: hit.title,
            snippet: hit.content,
        });
    }

    let findings = if block.is_empty() {
        Vec::new()
    } else {
        vec![block]
    };

    Ok(StateUpdate {
        queries: vec![task.query],
        findings,
        sources,
        ..Default::default()
    })
}

/// Ask whether the findings suffice. Always advances the loop counter and
/// pins the reasoning model.
pub async fn reflect(
    state: &RunState,
    ctx: &RunContext,
) -> Result<(StateUpdate, ReflectionOutcome)> {
    let model = state
        .reasoning_model
        .clone()
        .unwrap_or_else(|| ctx.config.model.reflection_model.clone());

    let topic = prompts::research_topic(&state.conversation);
    let summaries = state.findings.join(prompts::REFLECTION_SEPARATOR);
    let prompt = prompts::reflection(&topic, &ctx.date, &summaries);

    debug!(%model, findings = state.findings.len(), "Reflecting on findings");
    let outcome: ReflectionOutcome = generate_structured(
        ctx.llm.as_ref(),
        ctx.settings(&model, ctx.config.llm.reflection_temperature),
        &prompt,
    )
    .await?;

    let update = StateUpdate {
        loop_count: Some(state.loop_count + 1),
        reasoning_model: Some(model),
        ..Default::default()
    };

    Ok((update, outcome))
}

/// Write the answer and swap its citation markers for links.
pub async fn finalize(state: &RunState, ctx: &RunContext) -> Result<(StateUpdate, Substitution)> {
    let model = state
        .reasoning_model
        .as_deref()
        .unwrap_or(&ctx.config.model.answer_model);

    let topic = prompts::research_topic(&state.conversation);
    let summaries = state.findings.join(prompts::ANSWER_SEPARATOR);
    let prompt = prompts::answer(&topic, &ctx.date, &summaries);

    debug!(%model, sources = state.sources.len(), "Writing final answer");
    let draft = generate_text(
        ctx.llm.as_ref(),
        ctx.settings(model, ctx.config.llm.answer_generation_temperature),
        &prompt,
    )
    .await?;

    let table = CitationTable::from_sources(&state.sources, ctx.config.citation.title_max_length);
    let substitution = table.substitute(&draft);

    if !substitution.unresolved.is_empty() {
        warn!(
            markers = ?substitution.unresolved,
            "Answer cites markers with no matching source; left as-is"
        );
    }

    let update = StateUpdate {
        conversation: vec![Turn::assistant(substitution.text.clone())],
        ..Default::default()
    };

    Ok((update, substitution))
}
