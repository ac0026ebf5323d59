//! Prompt templates for each research stage.

use crate::research::state::{Role, Turn};
use chrono::Local;

/// Separator between findings in the reflection prompt.
pub const REFLECTION_SEPARATOR: &str = "\n\n---\n\n";
/// Separator between findings in the answer prompt.
pub const ANSWER_SEPARATOR: &str = "\n---\n\n";

/// Current date in a readable form, e.g. "October 16, 2026".
pub fn current_date() -> String {
    Local::now().format("%B %d, %Y").to_string()
}

/// The research topic as seen by every prompt.
///
/// A single turn is used verbatim. Longer conversations become a transcript
/// of user and assistant turns; system turns are left out.
pub fn research_topic(conversation: &[Turn]) -> String {
    if let [only] = conversation {
        return only.content.clone();
    }

    conversation
        .iter()
        .filter(|turn| turn.role != Role::System)
        .map(|turn| format!("{}: {}\n", turn.role.label(), turn.content))
        .collect()
}

pub fn query_writer(topic: &str, date: &str, number_queries: u32) -> String {
    format!(
        r#"Your goal is to generate sophisticated and diverse web search queries. These queries are intended for an advanced automated web research tool capable of analyzing complex results, following links, and synthesizing information.

Instructions:
- Always prefer a single search query, only add another query if the original question requests multiple aspects or elements and one query is not enough.
- Each query should focus on one specific aspect of the original question.
- Don't produce more than {number_queries} queries.
- Queries should be diverse, if the topic is broad, generate more than 1 query.
- Don't generate multiple similar queries, 1 is enough.
- Query should ensure that the most current information is gathered. The current date is {date}.

Format:
- Format your response as a JSON object with these exact keys:
   - "rationale": Brief explanation of why these queries are relevant
   - "queries": A list of search queries

Example:

Topic: What revenue grew more last year apple stock or the number of people buying an iphone
```json
{{
    "rationale": "To answer this comparative growth question accurately, we need specific data points on Apple's stock performance and iPhone sales metrics. These queries target the precise financial information needed: company revenue trends, product-specific unit sales figures, and stock price movement over the same fiscal period for direct comparison.",
    "queries": ["Apple total revenue growth fiscal year 2024", "iPhone unit sales growth fiscal year 2024", "Apple stock price growth fiscal year 2024"]
}}
```

Context: {topic}"#
    )
}

pub fn reflection(topic: &str, date: &str, summaries: &str) -> String {
    format!(
        r#"You are an expert research assistant analyzing summaries about "{topic}".

Instructions:
- Identify knowledge gaps or areas that need deeper exploration and generate a follow-up query (1 or multiple).
- If provided summaries are sufficient to answer the user's question, don't generate a follow-up query.
- If there is a knowledge gap, generate a follow-up query that would help expand your understanding.
- Focus on technical details, implementation specifics, or emerging trends that weren't fully covered.
- The current date is {date}.

Requirements:
- Ensure the follow-up query is self-contained and includes necessary context for web search.

Output Format:
- Format your response as a JSON object with these exact keys:
   - "is_sufficient": true or false
   - "knowledge_gap": Describe what information is missing or needs clarification
   - "follow_up_queries": Write a specific question to address this gap

Example:
```json
{{
    "is_sufficient": true, // or false
    "knowledge_gap": "The summary lacks information about performance metrics and benchmarks", // "" if is_sufficient is true
    "follow_up_queries": ["What are typical performance benchmarks and metrics used to evaluate [specific technology]?"] // [] if is_sufficient is true
}}
```

Reflect carefully on the Summaries to identify knowledge gaps and produce a follow-up query. Then, produce your output following this JSON format:

Summaries:
{summaries}"#
    )
}

pub fn answer(topic: &str, date: &str, summaries: &str) -> String {
    format!(
        r#"Generate a high-quality answer to the user's question based on the provided summaries.

Instructions:
- The current date is {date}.
- You are the final step of a multi-step research process, don't mention that you are the final step.
- You have access to all the information gathered from the previous steps.
- You have access to the user's question.
- Generate a high-quality answer to the user's question based on the provided summaries and the user's question.

CRITICAL CITATION REQUIREMENTS:
- You MUST include citation markers exactly as they appear in the summaries (e.g. ⟦0-1⟧, ⟦0-2⟧, ⟦1-1⟧, etc.)
- These citation markers will be automatically converted to proper links later
- Place citation markers immediately after the relevant information that comes from that source
- Use multiple citation markers when referencing multiple sources for the same fact
- Every factual claim should be backed by at least one citation marker
- DO NOT create your own citation markers - only use the ones that appear in the summaries below

EXAMPLE:
"Renewable energy capacity increased by 15% in 2023 ⟦0-1⟧. Solar power specifically grew by 23% ⟦0-2⟧, while wind power expanded by 18% ⟦1-1⟧."

User Question: {topic}

Research Summaries with Citation Markers:
{summaries}

Generate your comprehensive answer below, ensuring every fact is properly cited with the markers from the summaries:"#
    )
}
