//! Effective per-run configuration.
//!
//! [`EffectiveConfig`] is built once per run from the process-wide defaults
//! (the `[defaults.*]` tables of `delve.toml`) and the run's overrides, then
//! passed by reference to every node. The defaults themselves are never
//! modified.
//!
//! # Override resolution
//!
//! Overrides are a flat `field name -> value` map. Each key is matched
//! against the sections in a fixed order, `model`, `research`, `llm`,
//! `search`, `citation`, and applied to the first section that declares a
//! field with that name. Keys matching no section are ignored.
//!
//! Known limitation: if two sections ever declare the same field name, only
//! the one in the earlier section can be overridden.

use crate::types::{AppError, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Per-run overrides keyed by field name.
pub type Overrides = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub query_generator_model: String,
    pub reflection_model: String,
    pub answer_model: String,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            query_generator_model: "gpt-4o".to_string(),
            reflection_model: "gpt-4o".to_string(),
            answer_model: "gpt-4o".to_string(),
        }
    }
}

/// What the post-reflection router searches next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStrategy {
    /// Re-search the last `max_follow_up_queries` issued queries. Reflection
    /// output only advances the loop counter.
    #[default]
    TrailingQueries,
    /// Search the reflection's follow-up queries and stop early once it
    /// reports the findings as sufficient.
    Reflection,
}

/// What happens to a fan-out batch when one of its workers fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFailurePolicy {
    /// Abort the rest of the batch and fail the run.
    #[default]
    FailFast,
    /// Treat a failed search as zero results and keep going.
    Degrade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSection {
    pub initial_query_count: u32,
    pub max_research_loops: u32,
    pub max_follow_up_queries: u32,
    pub follow_up_strategy: FollowUpStrategy,
    pub batch_failure_policy: BatchFailurePolicy,
}

impl Default for ResearchSection {
    fn default() -> Self {
        Self {
            initial_query_count: 3,
            max_research_loops: 2,
            max_follow_up_queries: 3,
            follow_up_strategy: FollowUpStrategy::default(),
            batch_failure_policy: BatchFailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub query_generation_temperature: f32,
    pub reflection_temperature: f32,
    pub answer_generation_temperature: f32,
    /// Extra attempts after the first failed LLM call
    pub max_retries: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            query_generation_temperature: 1.0,
            reflection_temperature: 1.0,
            answer_generation_temperature: 0.0,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    #[default]
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub max_results: u32,
    pub depth: SearchDepth,
    pub include_images: bool,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            max_results: 5,
            depth: SearchDepth::Advanced,
            include_images: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationSection {
    pub title_max_length: usize,
}

impl Default for CitationSection {
    fn default() -> Self {
        Self {
            title_max_length: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectiveConfig {
    pub model: ModelSection,
    pub research: ResearchSection,
    pub llm: LlmSection,
    pub search: SearchSection,
    pub citation: CitationSection,
}

/// Shortest displayed title that still fits one character and `...`.
pub const MIN_TITLE_LENGTH: usize = 4;

/// Section names in override resolution order.
pub const SECTION_ORDER: [&str; 5] = ["model", "research", "llm", "search", "citation"];

impl EffectiveConfig {
    /// Apply `overrides` on top of `self` and return the result.
    ///
    /// Unknown keys are ignored. A known key whose value does not fit the
    /// field's type, or that breaks a limit of [`check_limits`](Self::check_limits),
    /// is rejected with [`AppError::InvalidInput`].
    pub fn resolve(&self, overrides: &Overrides) -> Result<EffectiveConfig> {
        if overrides.is_empty() {
            return Ok(self.clone());
        }

        let mut claimed = HashSet::new();
        let resolved = EffectiveConfig {
            model: override_section("model", &self.model, overrides, &mut claimed)?,
            research: override_section("research", &self.research, overrides, &mut claimed)?,
            llm: override_section("llm", &self.llm, overrides, &mut claimed)?,
            search: override_section("search", &self.search, overrides, &mut claimed)?,
            citation: override_section("citation", &self.citation, overrides, &mut claimed)?,
        };

        resolved
            .check_limits()
            .map_err(|reason| AppError::InvalidInput(format!("Override rejected: {}", reason)))?;
        Ok(resolved)
    }

    /// Range checks shared by `delve.toml` validation and override
    /// resolution. The error names the offending `section.field`.
    pub fn check_limits(&self) -> std::result::Result<(), String> {
        for (field, model) in [
            ("query_generator_model", &self.model.query_generator_model),
            ("reflection_model", &self.model.reflection_model),
            ("answer_model", &self.model.answer_model),
        ] {
            if model.trim().is_empty() {
                return Err(format!("model.{} must not be empty", field));
            }
        }

        for (field, value) in [
            ("research.initial_query_count", self.research.initial_query_count),
            ("research.max_follow_up_queries", self.research.max_follow_up_queries),
            ("search.max_results", self.search.max_results),
        ] {
            if value == 0 {
                return Err(format!("{} must be at least 1", field));
            }
        }

        for (field, value) in [
            ("query_generation_temperature", self.llm.query_generation_temperature),
            ("reflection_temperature", self.llm.reflection_temperature),
            ("answer_generation_temperature", self.llm.answer_generation_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(format!(
                    "llm.{} must be between 0.0 and 2.0, got {}",
                    field, value
                ));
            }
        }

        // Room for at least one character plus the ellipsis
        if self.citation.title_max_length < MIN_TITLE_LENGTH {
            return Err(format!(
                "citation.title_max_length must be at least {}",
                MIN_TITLE_LENGTH
            ));
        }

        Ok(())
    }

    /// Every field name an override can target, with its owning section,
    /// in resolution order.
    pub fn override_keys(&self) -> Vec<(&'static str, String)> {
        let sections = [
            serde_json::to_value(&self.model),
            serde_json::to_value(&self.research),
            serde_json::to_value(&self.llm),
            serde_json::to_value(&self.search),
            serde_json::to_value(&self.citation),
        ];

        let mut keys = Vec::new();
        for (name, value) in SECTION_ORDER.iter().zip(sections) {
            if let Ok(serde_json::Value::Object(fields)) = value {
                keys.extend(fields.keys().map(|k| (*name, k.clone())));
            }
        }
        keys
    }

    /// Override keys that no section declares. For callers that want to
    /// reject typos instead of silently ignoring them.
    pub fn unknown_keys(&self, overrides: &Overrides) -> Vec<String> {
        let known: HashSet<String> = self.override_keys().into_iter().map(|(_, k)| k).collect();
        let mut unknown: Vec<String> = overrides
            .keys()
            .filter(|k| !known.contains(*k))
            .cloned()
            .collect();
        unknown.sort();
        unknown
    }

    /// Loop limit for a run: the run-level value if set, else the default.
    pub fn max_loops(&self, run_level: Option<u32>) -> u32 {
        run_level.unwrap_or(self.research.max_research_loops)
    }
}

fn override_section<S>(
    name: &str,
    section: &S,
    overrides: &Overrides,
    claimed: &mut HashSet<String>,
) -> Result<S>
where
    S: Serialize + DeserializeOwned + Clone,
{
    let mut value = serde_json::to_value(section)
        .map_err(|e| AppError::Internal(format!("Failed to serialize '{}': {}", name, e)))?;

    let Some(fields) = value.as_object_mut() else {
        return Ok(section.clone());
    };

    let mut touched = false;
    for (key, override_value) in overrides {
        if claimed.contains(key) || !fields.contains_key(key) {
            continue;
        }
        fields.insert(key.clone(), override_value.clone());
        claimed.insert(key.clone());
        touched = true;
    }

    if !touched {
        return Ok(section.clone());
    }

    serde_json::from_value(value).map_err(|e| {
        AppError::InvalidInput(format!("Invalid override for section '{}': {}", name, e))
    })
}
