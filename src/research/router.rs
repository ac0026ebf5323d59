//! Routing after query generation and after reflection.

use crate::research::config::{EffectiveConfig, FollowUpStrategy};
use crate::research::nodes::ReflectionOutcome;
use crate::research::state::{RunState, TaskState};
use crate::types::{AppError, Result};

/// Where the run goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Finalize,
    FanOut(Vec<TaskState>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterKind {
    PostGeneration,
    PostReflection,
}

/// Inputs a router may look at.
pub struct RouteInput<'a> {
    pub state: &'a RunState,
    pub config: &'a EffectiveConfig,
    /// Length of `queries` before the generation update was applied
    pub batch_start: usize,
    pub reflection: Option<&'a ReflectionOutcome>,
}

impl RouterKind {
    pub fn route(self, input: &RouteInput<'_>) -> Result<Route> {
        match self {
            RouterKind::PostGeneration => route_after_generation(input.state, input.batch_start),
            RouterKind::PostReflection => {
                let fallback = ReflectionOutcome::default();
                let outcome = input.reflection.unwrap_or(&fallback);
                route_after_reflection(input.state, input.config, outcome)
            }
        }
    }
}

/// One task per query added by generation, ids counted from `batch_start`.
/// No new queries means straight to finalization.
pub fn route_after_generation(state: &RunState, batch_start: usize) -> Result<Route> {
    let Some(new_queries) = state.queries.get(batch_start..) else {
        return Err(AppError::RoutingExhaustion(format!(
            "batch starts at {} but only {} queries exist",
            batch_start,
            state.queries.len()
        )));
    };

    if new_queries.is_empty() {
        return Ok(Route::Finalize);
    }

    Ok(Route::FanOut(tasks_from(new_queries, batch_start)))
}

/// Finalize once the loop budget is spent; otherwise pick the next batch
/// according to the configured follow-up strategy.
///
/// Task ids start at the current length of `queries`, which only grows, so
/// they never repeat within a run.
pub fn route_after_reflection(
    state: &RunState,
    config: &EffectiveConfig,
    outcome: &ReflectionOutcome,
) -> Result<Route> {
    let max_loops = config.max_loops(state.max_loops);
    if state.loop_count >= max_loops {
        return Ok(Route::Finalize);
    }

    let limit = config.research.max_follow_up_queries as usize;
    let next_id = state.queries.len();

    match config.research.follow_up_strategy {
        FollowUpStrategy::TrailingQueries => {
            if state.queries.is_empty() {
                return Err(AppError::RoutingExhaustion(
                    "no issued queries to continue from".to_string(),
                ));
            }
            let start = state.queries.len().saturating_sub(limit);
            Ok(Route::FanOut(tasks_from(&state.queries[start..], next_id)))
        }
        FollowUpStrategy::Reflection => {
            if outcome.is_sufficient {
                return Ok(Route::Finalize);
            }

            let follow_ups: Vec<String> = outcome
                .follow_up_queries
                .iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .take(limit)
                .collect();

            if follow_ups.is_empty() {
                return Ok(Route::Finalize);
            }
            Ok(Route::FanOut(tasks_from(&follow_ups, next_id)))
        }
    }
}

fn tasks_from(queries: &[String], first_id: usize) -> Vec<TaskState> {
    queries
        .iter()
        .enumerate()
        .map(|(i, query)| TaskState {
            query: query.clone(),
            task_id: first_id + i,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn state_with(queries: &[&str], loop_count: u32, max_loops: Option<u32>) -> RunState {
        RunState {
            queries: queries.iter().map(|q| q.to_string()).collect(),
            loop_count,
            max_loops,
            ..Default::default()
        }
    }

    fn ids(route: &Route) -> Vec<usize> {
        match route {
            Route::FanOut(tasks) => tasks.iter().map(|t| t.task_id).collect(),
            Route::Finalize => vec![],
        }
    }

    fn gap(queries: &[&str]) -> ReflectionOutcome {
        ReflectionOutcome {
            is_sufficient: false,
            knowledge_gap: "missing".into(),
            follow_up_queries: queries.iter().map(|q| q.to_string()).collect(),
        }
    }

    #[test]
    fn test_generation_fans_out_new_queries() {
        let state = state_with(&["a", "b", "c"], 0, None);

        let route = route_after_generation(&state, 0).unwrap();

        assert_eq!(ids(&route), vec![0, 1, 2]);
        let Route::FanOut(tasks) = route else {
            panic!("expected fan-out")
        };
        assert_eq!(tasks[2].query, "c");
    }

    #[test]
    fn test_generation_with_no_queries_finalizes() {
        let state = state_with(&[], 0, None);
        assert_eq!(route_after_generation(&state, 0).unwrap(), Route::Finalize);
    }

    #[test]
    fn test_generation_with_bad_batch_start_is_exhaustion() {
        let state = state_with(&["a"], 0, None);
        let result = route_after_generation(&state, 2);
        assert!(matches!(result, Err(AppError::RoutingExhaustion(_))));
    }

    #[rstest]
    #[case(0, Some(0), true)]
    #[case(1, Some(0), true)]
    #[case(1, Some(1), true)]
    #[case(1, Some(2), false)]
    #[case(1, None, false)]
    #[case(2, None, true)]
    fn test_reflection_loop_limit(
        #[case] loop_count: u32,
        #[case] max_loops: Option<u32>,
        #[case] finalizes: bool,
    ) {
        let state = state_with(&["a", "b", "c", "a", "b", "c"], loop_count, max_loops);
        let route =
            route_after_reflection(&state, &EffectiveConfig::default(), &gap(&["x"])).unwrap();
        assert_eq!(route == Route::Finalize, finalizes);
    }

    #[test]
    fn test_trailing_strategy_reuses_last_queries() {
        // Reflection proposed "new", but the trailing strategy ignores it
        let state = state_with(&["a", "b", "c", "d", "e"], 1, Some(3));
        let route =
            route_after_reflection(&state, &EffectiveConfig::default(), &gap(&["new"])).unwrap();

        let Route::FanOut(tasks) = route else {
            panic!("expected fan-out")
        };
        let queries: Vec<&str> = tasks.iter().map(|t| t.query.as_str()).collect();
        assert_eq!(queries, vec!["c", "d", "e"]);
        assert_eq!(tasks.iter().map(|t| t.task_id).collect::<Vec<_>>(), vec![5, 6, 7]);
    }

    #[test]
    fn test_trailing_strategy_without_queries_is_exhaustion() {
        let state = state_with(&[], 1, Some(3));
        let result = route_after_reflection(&state, &EffectiveConfig::default(), &gap(&[]));
        assert!(matches!(result, Err(AppError::RoutingExhaustion(_))));
    }

    #[test]
    fn test_reflection_strategy_uses_follow_ups() {
        let mut config = EffectiveConfig::default();
        config.research.follow_up_strategy = FollowUpStrategy::Reflection;
        config.research.max_follow_up_queries = 2;
        let state = state_with(&["a", "a"], 1, Some(3));

        let route = route_after_reflection(&state, &config, &gap(&["x", " ", "y", "z"])).unwrap();

        let Route::FanOut(tasks) = route else {
            panic!("expected fan-out")
        };
        assert_eq!(tasks[0].query, "x");
        assert_eq!(tasks[1].query, "y");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].task_id, 2);
    }

    #[test]
    fn test_reflection_strategy_stops_when_sufficient_or_empty() {
        let mut config = EffectiveConfig::default();
        config.research.follow_up_strategy = FollowUpStrategy::Reflection;
        let state = state_with(&["a"], 1, Some(5));

        let sufficient = ReflectionOutcome {
            is_sufficient: true,
            ..Default::default()
        };
        assert_eq!(
            route_after_reflection(&state, &config, &sufficient).unwrap(),
            Route::Finalize
        );
        assert_eq!(
            route_after_reflection(&state, &config, &gap(&[])).unwrap(),
            Route::Finalize
        );
    }

    #[test]
    fn test_router_kind_dispatch() {
        let state = state_with(&["a", "b"], 0, None);
        let config = EffectiveConfig::default();
        let input = RouteInput {
            state: &state,
            config: &config,
            batch_start: 1,
            reflection: None,
        };

        assert_eq!(ids(&RouterKind::PostGeneration.route(&input).unwrap()), vec![1]);
        assert_eq!(
            ids(&RouterKind::PostReflection.route(&input).unwrap()),
            vec![2, 3]
        );
    }
}
