//! `delve ask` helpers: override parsing and result rendering.

use super::output::Output;
use crate::research::config::Overrides;
use crate::research::RunOutput;
use crate::types::{AppError, Result};
use serde_json::{json, Value};

/// Parse repeated `KEY=VALUE` flags into an override map.
///
/// Values are read as JSON when they parse (`3`, `true`, `"x"`), and as a
/// plain string otherwise, so `depth=basic` needs no quoting.
pub fn parse_overrides(pairs: &[String]) -> Result<Overrides> {
    let mut overrides = Overrides::new();

    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            return Err(AppError::InvalidInput(format!(
                "override '{}' must look like KEY=VALUE",
                pair
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "override '{}' has an empty key",
                pair
            )));
        }

        let value = serde_json::from_str(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.trim().to_string()));
        overrides.insert(key.to_string(), value);
    }

    Ok(overrides)
}

/// Print the answer and the sources it cites.
pub fn print_run(output: &Output, run: &RunOutput) {
    output.header("Answer");
    output.newline();
    output.body(&run.answer);

    let cited: Vec<_> = run
        .sources
        .iter()
        .filter(|s| run.cited_markers.contains(&s.marker))
        .collect();

    if !cited.is_empty() {
        output.subheader("Sources");
        for source in cited {
            output.source(&source.marker, &source.title, &source.url);
        }
    }

    output.subheader("Run");
    output.kv("run id", &run.run_id.to_string());
    output.kv("queries", &run.queries.len().to_string());
    output.kv("research loops", &run.loop_count.to_string());
    output.kv(
        "sources",
        &format!("{} found, {} cited", run.sources.len(), run.cited_markers.len()),
    );

    if !run.unresolved_markers.is_empty() {
        output.warning(&format!(
            "Answer contains markers with no source: {}",
            run.unresolved_markers.join(", ")
        ));
    }
}

/// JSON rendering of a run for `--json`.
pub fn run_json(run: &RunOutput) -> Value {
    json!({
        "run_id": run.run_id,
        "answer": run.answer,
        "messages": run.conversation,
        "sources": run.sources,
        "cited_markers": run.cited_markers,
        "unresolved_markers": run.unresolved_markers,
        "queries": run.queries,
        "research_loop_count": run.loop_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::{SourceRecord, Turn};
    use rstest::rstest;
    use uuid::Uuid;

    #[rstest]
    #[case("max_results=3", "max_results", json!(3))]
    #[case("depth=basic", "depth", json!("basic"))]
    #[case("include_images=true", "include_images", json!(true))]
    #[case("answer_model=\"gpt-4o-mini\"", "answer_model", json!("gpt-4o-mini"))]
    #[case(" reflection_temperature = 0.5 ", "reflection_temperature", json!(0.5))]
    #[case("answer_model=a=b", "answer_model", json!("a=b"))]
    fn test_parse_overrides(#[case] pair: &str, #[case] key: &str, #[case] expected: Value) {
        let overrides = parse_overrides(&[pair.to_string()]).unwrap();
        assert_eq!(overrides.get(key), Some(&expected));
    }

    #[rstest]
    #[case("no_equals_sign")]
    #[case("=3")]
    fn test_parse_overrides_rejects_malformed(#[case] pair: &str) {
        assert!(matches!(
            parse_overrides(&[pair.to_string()]),
            Err(AppError::InvalidInput(_))
        ));
    }

    fn sample_run() -> RunOutput {
        RunOutput {
            run_id: Uuid::new_v4(),
            conversation: vec![Turn::user("q"), Turn::assistant("See [a](https://a.example).")],
            sources: vec![SourceRecord {
                marker: "⟦0-1⟧".into(),
                url: "https://a.example".into(),
                title: "A".into(),
                snippet: "a".into(),
            }],
            answer: "See [a](https://a.example).".into(),
            cited_markers: vec!["⟦0-1⟧".into()],
            unresolved_markers: vec!["⟦9-9⟧".into()],
            queries: vec!["q".into()],
            loop_count: 1,
        }
    }

    #[test]
    fn test_run_json_shape() {
        let value = run_json(&sample_run());

        assert_eq!(value["research_loop_count"], 1);
        assert_eq!(value["sources"][0]["marker"], "⟦0-1⟧");
        assert_eq!(value["messages"][1]["role"], "assistant");
        assert_eq!(value["unresolved_markers"][0], "⟦9-9⟧");
    }

    #[test]
    fn test_print_run_no_panic() {
        print_run(&Output::no_color(), &sample_run());
    }
}
