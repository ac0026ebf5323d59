use crate::{
    llm::{LLMClient, Provider},
    research::{
        config::{BatchFailurePolicy, EffectiveConfig, Overrides},
        nodes::{self, RunContext},
        router::{Route, RouteInput, RouterKind},
        state::{Role, RunState, SourceRecord, StateUpdate, TaskState, Turn},
    },
    search::{create_search_client, SearchClient},
    types::{AppError, NodeKind, Result},
    utils::toml_config::DelveConfig,
};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Input of one research run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Must contain at least one non-empty user turn
    pub conversation: Vec<Turn>,
    pub requested_query_count: Option<u32>,
    pub max_loops: Option<u32>,
    pub reasoning_model: Option<String>,
    pub overrides: Overrides,
}

impl RunRequest {
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            conversation: vec![Turn::user(question)],
            ..Default::default()
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_id: Uuid,
    /// Input conversation with the cited answer appended
    pub conversation: Vec<Turn>,
    pub sources: Vec<SourceRecord>,
    /// The cited answer text
    pub answer: String,
    /// Markers substituted into `answer`, in order of first use
    pub cited_markers: Vec<String>,
    /// Marker-shaped tokens in the answer that matched no source
    pub unresolved_markers: Vec<String>,
    pub queries: Vec<String>,
    pub loop_count: u32,
}

/// Stage labels the run loop moves through.
enum Step {
    GenerateQueries,
    FanOut(Vec<TaskState>),
    Reflect,
    Finalize,
}

/// Drives one run through query generation, search fan-out, reflection
/// loops and finalization.
///
/// The coordinator is the only writer of [`RunState`]: nodes return partial
/// updates and the coordinator applies them one at a time. Search workers
/// run concurrently on a [`JoinSet`]; their updates are applied in
/// completion order, and reflection only starts once the whole batch has
/// finished.
pub struct ResearchCoordinator {
    llm: Arc<dyn LLMClient>,
    search: Arc<dyn SearchClient>,
}

impl ResearchCoordinator {
    pub fn new(llm: Arc<dyn LLMClient>, search: Arc<dyn SearchClient>) -> Self {
        Self { llm, search }
    }

    /// Build the configured LLM and search backends.
    ///
    /// Fails with [`AppError::Configuration`] when a credential is missing,
    /// so a misconfigured process stops before serving any run.
    pub fn from_config(config: &DelveConfig) -> Result<Self> {
        let llm = Provider::from_config(&config.llm_provider)?.create_client()?;
        let search = create_search_client(&config.search_provider)?;

        info!(
            llm = llm.provider_name(),
            search = search.backend_name(),
            "Research backends ready"
        );
        Ok(Self::new(llm, search))
    }

    /// Execute a research run against a snapshot of the defaults.
    pub async fn run(&self, defaults: &EffectiveConfig, request: RunRequest) -> Result<RunOutput> {
        validate_conversation(&request.conversation)?;
        let config = defaults.resolve(&request.overrides)?;

        let run_id = Uuid::new_v4();
        let span = info_span!("research_run", %run_id);

        self.execute(run_id, config, request).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        config: EffectiveConfig,
        request: RunRequest,
    ) -> Result<RunOutput> {
        let ctx = Arc::new(RunContext::new(
            config,
            Arc::clone(&self.llm),
            Arc::clone(&self.search),
        ));

        let mut state = RunState::new(
            request.conversation,
            request.requested_query_count,
            request.max_loops,
            request.reasoning_model,
        );
        let mut step = Step::GenerateQueries;

        info!(
            max_loops = ctx.config.max_loops(state.max_loops),
            strategy = ?ctx.config.research.follow_up_strategy,
            "Research run started"
        );

        loop {
            step = match step {
                Step::GenerateQueries => {
                    let batch_start = state.queries.len();
                    let update = nodes::generate_queries(&state, &ctx)
                        .await
                        .map_err(|e| e.in_stage(NodeKind::QueryGeneration))?;
                    state.apply(update);
                    info!(queries = state.queries.len() - batch_start, "Queries generated");

                    let input = RouteInput {
                        state: &state,
                        config: &ctx.config,
                        batch_start,
                        reflection: None,
                    };
                    let route = RouterKind::PostGeneration
                        .route(&input)
                        .map_err(|e| e.in_stage(NodeKind::QueryGeneration))?;
                    next_step(route)
                }

                Step::FanOut(tasks) => {
                    info!(
                        tasks = tasks.len(),
                        loop_count = state.loop_count,
                        "Fanning out web research"
                    );
                    self.run_batch(&mut state, tasks, &ctx)
                        .await
                        .map_err(|e| e.in_stage(NodeKind::WebResearch))?;
                    Step::Reflect
                }

                Step::Reflect => {
                    let (update, outcome) = nodes::reflect(&state, &ctx)
                        .await
                        .map_err(|e| e.in_stage(NodeKind::Reflection))?;
                    state.apply(update);
                    info!(
                        loop_count = state.loop_count,
                        is_sufficient = outcome.is_sufficient,
                        follow_ups = outcome.follow_up_queries.len(),
                        "Reflection finished"
                    );

                    let input = RouteInput {
                        state: &state,
                        config: &ctx.config,
                        batch_start: state.queries.len(),
                        reflection: Some(&outcome),
                    };
                    let route = RouterKind::PostReflection
                        .route(&input)
                        .map_err(|e| e.in_stage(NodeKind::Reflection))?;
                    next_step(route)
                }

                Step::Finalize => {
                    let (update, substitution) = nodes::finalize(&state, &ctx)
                        .await
                        .map_err(|e| e.in_stage(NodeKind::Finalization))?;
                    state.apply(update);
                    info!(
                        sources = state.sources.len(),
                        cited = substitution.cited.len(),
                        loop_count = state.loop_count,
                        "Research run finished"
                    );

                    return Ok(RunOutput {
                        run_id,
                        answer: substitution.text,
                        cited_markers: substitution.cited,
                        unresolved_markers: substitution.unresolved,
                        conversation: state.conversation,
                        sources: state.sources,
                        queries: state.queries,
                        loop_count: state.loop_count,
                    });
                }
            };
        }
    }

    /// Run one batch of search tasks to completion and fold in their updates.
    async fn run_batch(
        &self,
        state: &mut RunState,
        tasks: Vec<TaskState>,
        ctx: &Arc<RunContext>,
    ) -> Result<()> {
        let mut set = JoinSet::new();

        for task in tasks {
            let ctx = Arc::clone(ctx);
            let span = info_span!("web_research", task_id = task.task_id, query = %task.query);
            set.spawn(
                async move {
                    let query = task.query.clone();
                    let result = nodes::web_research(task, &ctx).await;
                    (query, result)
                }
                .instrument(span),
            );
        }

        while let Some(joined) = set.join_next().await {
            let (query, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    set.abort_all();
                    return Err(AppError::Internal(format!(
                        "Web research task did not complete: {}",
                        e
                    )));
                }
            };

            match (result, ctx.config.research.batch_failure_policy) {
                (Ok(update), _) => state.apply(update),
                (Err(AppError::UpstreamSearch(reason)), BatchFailurePolicy::Degrade) => {
                    warn!(%query, %reason, "Search failed; continuing with no results");
                    state.apply(StateUpdate {
                        queries: vec![query],
                        ..Default::default()
                    });
                }
                (Err(e), _) => {
                    set.abort_all();
                    return Err(e);
                }
            }
        }

        let violations = state.citation_violations();
        if !violations.is_empty() {
            let details: Vec<String> = violations.iter().map(ToString::to_string).collect();
            return Err(AppError::Internal(format!(
                "Citation bookkeeping broken: {}",
                details.join("; ")
            )));
        }

        Ok(())
    }
}

fn next_step(route: Route) -> Step {
    match route {
        Route::Finalize => Step::Finalize,
        Route::FanOut(tasks) => Step::FanOut(tasks),
    }
}

fn validate_conversation(conversation: &[Turn]) -> Result<()> {
    let has_question = conversation
        .iter()
        .any(|turn| turn.role == Role::User && !turn.content.trim().is_empty());

    if has_question {
        Ok(())
    } else {
        Err(AppError::InvalidInput(
            "conversation must contain at least one non-empty user turn".to_string(),
        ))
    }
}
