//! Run state and its merge rules.
//!
//! [`RunState`] is owned by the coordinator for the lifetime of one run.
//! Nodes never mutate it; they return a [`StateUpdate`] and the coordinator
//! folds it in with [`RunState::apply`], one update at a time, using the
//! per-field [`Reducer`] listed in [`StateField::reducer`].

use crate::research::citation;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A search result that was shown to the answer writer under `marker`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SourceRecord {
    pub marker: String,
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Input of one web research worker.
///
/// `task_id` is `len(queries)` at fan-out time plus the task's index in the
/// batch, so ids never repeat within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskState {
    pub query: String,
    pub task_id: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub conversation: Vec<Turn>,
    pub queries: Vec<String>,
    pub findings: Vec<String>,
    pub sources: Vec<SourceRecord>,
    pub requested_query_count: Option<u32>,
    pub max_loops: Option<u32>,
    pub loop_count: u32,
    pub reasoning_model: Option<String>,
}

/// Partial update returned by a node. Empty lists and `None` mean "no change".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub conversation: Vec<Turn>,
    pub queries: Vec<String>,
    pub findings: Vec<String>,
    pub sources: Vec<SourceRecord>,
    pub requested_query_count: Option<u32>,
    pub max_loops: Option<u32>,
    pub loop_count: Option<u32>,
    pub reasoning_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Concatenate incoming items after the current ones.
    Append,
    /// Keep the current value once set; later `None`s never clear it.
    FirstNonNull,
    /// Keep the larger of current and incoming.
    Max,
}

impl Reducer {
    /// List fields are append-only; the table never gives them another reducer.
    pub fn fold_list<T>(self, current: &mut Vec<T>, incoming: Vec<T>) {
        debug_assert_eq!(self, Reducer::Append, "list fields only append");
        current.extend(incoming);
    }

    pub fn fold<T: Ord>(self, current: Option<T>, incoming: Option<T>) -> Option<T> {
        match self {
            Reducer::FirstNonNull => current.or(incoming),
            Reducer::Max => match (current, incoming) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            },
            // Appending a scalar means the newest value is kept
            Reducer::Append => incoming.or(current),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    Conversation,
    Queries,
    Findings,
    Sources,
    RequestedQueryCount,
    MaxLoops,
    LoopCount,
    ReasoningModel,
}

impl StateField {
    pub const ALL: [StateField; 8] = [
        StateField::Conversation,
        StateField::Queries,
        StateField::Findings,
        StateField::Sources,
        StateField::RequestedQueryCount,
        StateField::MaxLoops,
        StateField::LoopCount,
        StateField::ReasoningModel,
    ];

    /// The reducer table.
    pub fn reducer(self) -> Reducer {
        match self {
            StateField::Conversation
            | StateField::Queries
            | StateField::Findings
            | StateField::Sources => Reducer::Append,
            StateField::RequestedQueryCount
            | StateField::MaxLoops
            | StateField::ReasoningModel => Reducer::FirstNonNull,
            StateField::LoopCount => Reducer::Max,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StateField::Conversation => "conversation",
            StateField::Queries => "queries",
            StateField::Findings => "findings",
            StateField::Sources => "sources",
            StateField::RequestedQueryCount => "requested_query_count",
            StateField::MaxLoops => "max_loops",
            StateField::LoopCount => "loop_count",
            StateField::ReasoningModel => "reasoning_model",
        }
    }
}

/// Broken citation bookkeeping found by [`RunState::citation_violations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationViolation {
    DuplicateMarker(String),
    UnknownMarker(String),
}

impl std::fmt::Display for CitationViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CitationViolation::DuplicateMarker(m) => write!(f, "marker {} minted twice", m),
            CitationViolation::UnknownMarker(m) => {
                write!(f, "marker {} appears in findings without a source", m)
            }
        }
    }
}

impl RunState {
    pub fn new(
        conversation: Vec<Turn>,
        requested_query_count: Option<u32>,
        max_loops: Option<u32>,
        reasoning_model: Option<String>,
    ) -> Self {
        Self {
            conversation,
            requested_query_count,
            max_loops,
            reasoning_model,
            ..Default::default()
        }
    }

    /// Fold a node's partial update into the state, field by field.
    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate {
            mut conversation,
            mut queries,
            mut findings,
            mut sources,
            requested_query_count,
            max_loops,
            loop_count,
            mut reasoning_model,
        } = update;

        for field in StateField::ALL {
            let reducer = field.reducer();
            match field {
                StateField::Conversation => {
                    let incoming = std::mem::take(&mut conversation);
                    reducer.fold_list(&mut self.conversation, incoming)
                }
                StateField::Queries => {
                    reducer.fold_list(&mut self.queries, std::mem::take(&mut queries))
                }
                StateField::Findings => {
                    reducer.fold_list(&mut self.findings, std::mem::take(&mut findings))
                }
                StateField::Sources => {
                    reducer.fold_list(&mut self.sources, std::mem::take(&mut sources))
                }
                StateField::RequestedQueryCount => {
                    self.requested_query_count =
                        reducer.fold(self.requested_query_count, requested_query_count)
                }
                StateField::MaxLoops => self.max_loops = reducer.fold(self.max_loops, max_loops),
                StateField::LoopCount => {
                    self.loop_count = reducer
                        .fold(Some(self.loop_count), loop_count)
                        .unwrap_or(self.loop_count)
                }
                StateField::ReasoningModel => {
                    self.reasoning_model =
                        reducer.fold(self.reasoning_model.take(), reasoning_model.take())
                }
            }
        }
    }

    /// Duplicate markers in `sources`, and markers in `findings` with no source.
    pub fn citation_violations(&self) -> Vec<CitationViolation> {
        let mut violations = Vec::new();
        let mut seen = HashSet::new();

        for source in &self.sources {
            if !seen.insert(source.marker.as_str()) {
                violations.push(CitationViolation::DuplicateMarker(source.marker.clone()));
            }
        }

        let mut reported = HashSet::new();
        for finding in &self.findings {
            for marker in citation::find_markers(finding) {
                if !seen.contains(marker) && reported.insert(marker) {
                    violations.push(CitationViolation::UnknownMarker(marker.to_string()));
                }
            }
        }

        violations
    }

    pub fn last_assistant_turn(&self) -> Option<&Turn> {
        self.conversation
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant)
    }
}
