//! Citation markers.
//!
//! Every search result gets a marker `⟦<task_id>-<n>⟧` (`n` is one-based
//! within its task) when the web research worker formats it. The answer
//! writer is told to copy markers verbatim; finalization then swaps each
//! known marker for a markdown link in a single left-to-right pass.

use crate::research::state::SourceRecord;
use std::borrow::Cow;
use std::collections::HashMap;

pub const MARKER_OPEN: char = '⟦';
pub const MARKER_CLOSE: char = '⟧';

const ELLIPSIS: &str = "...";

/// Marker for the `index`-th (zero-based) result of task `task_id`.
pub fn mint_marker(task_id: usize, index: usize) -> String {
    format!("{}{}-{}{}", MARKER_OPEN, task_id, index + 1, MARKER_CLOSE)
}

/// Swap marker glyphs in text the run did not write for plain brackets, so
/// only minted markers ever carry them.
pub fn neutralize_glyphs(text: &str) -> Cow<'_, str> {
    if text.contains([MARKER_OPEN, MARKER_CLOSE]) {
        Cow::Owned(
            text.chars()
                .map(|c| match c {
                    MARKER_OPEN => '[',
                    MARKER_CLOSE => ']',
                    other => other,
                })
                .collect(),
        )
    } else {
        Cow::Borrowed(text)
    }
}

/// The block the answer writer sees for one search result.
pub fn format_finding(marker: &str, title: &str, content: &str, url: &str) -> String {
    let title = if title.is_empty() {
        Cow::Borrowed("Untitled")
    } else {
        neutralize_glyphs(title)
    };
    let content = if content.is_empty() {
        Cow::Borrowed("No content")
    } else {
        neutralize_glyphs(content)
    };
    let url = neutralize_glyphs(url);

    format!(
        "Source {marker}:\nTitle: {title}\nContent: {content}\nURL: {url}\n\n\
         When citing this source, always use {marker}.\n\n"
    )
}

/// Shorten `title` to exactly `max_len` characters ending in `...` when it is
/// longer than `max_len`. Counts characters, not bytes.
pub fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        return title.to_string();
    }

    let keep = max_len.saturating_sub(ELLIPSIS.len());
    let mut shortened: String = title.chars().take(keep).collect();
    shortened.push_str(ELLIPSIS);
    shortened
}

/// Every `⟦...⟧` token in `text`, in order of appearance.
pub fn find_markers(text: &str) -> impl Iterator<Item = &str> + '_ {
    MarkerScanner { text, pos: 0 }.filter_map(|piece| match piece {
        Piece::Marker(m) => Some(m),
        Piece::Text(_) => None,
    })
}

enum Piece<'a> {
    Text(&'a str),
    Marker(&'a str),
}

/// Splits text into plain runs and bracketed marker tokens.
struct MarkerScanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for MarkerScanner<'a> {
    type Item = Piece<'a>;

    fn next(&mut self) -> Option<Piece<'a>> {
        let rest = &self.text[self.pos..];
        if rest.is_empty() {
            return None;
        }

        let Some(open) = rest.find(MARKER_OPEN) else {
            self.pos = self.text.len();
            return Some(Piece::Text(rest));
        };

        if open > 0 {
            self.pos += open;
            return Some(Piece::Text(&rest[..open]));
        }

        // `rest` starts at an opening glyph
        let after_open = MARKER_OPEN.len_utf8();
        let close = rest[after_open..].find(MARKER_CLOSE);
        let reopen = rest[after_open..].find(MARKER_OPEN);

        match close {
            Some(c) if reopen.is_none_or(|r| c < r) => {
                let end = after_open + c + MARKER_CLOSE.len_utf8();
                self.pos += end;
                Some(Piece::Marker(&rest[..end]))
            }
            _ => {
                // Unterminated, or another opening glyph comes first
                self.pos += after_open;
                Some(Piece::Text(&rest[..after_open]))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkTarget {
    display_title: String,
    url: String,
}

/// Marker -> markdown link table built from the run's sources.
#[derive(Debug, Clone, Default)]
pub struct CitationTable {
    links: HashMap<String, LinkTarget>,
}

/// Result of [`CitationTable::substitute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub text: String,
    /// Distinct markers that were replaced, in order of first use
    pub cited: Vec<String>,
    /// Distinct marker-shaped tokens with no table entry, left as-is
    pub unresolved: Vec<String>,
}

impl CitationTable {
    pub fn from_sources(sources: &[SourceRecord], title_max_length: usize) -> Self {
        let mut links = HashMap::with_capacity(sources.len());
        for source in sources {
            // Markers are unique per run; keep the first entry if that ever breaks
            links
                .entry(source.marker.clone())
                .or_insert_with(|| LinkTarget {
                    display_title: truncate_title(
                        &neutralize_glyphs(&source.title),
                        title_max_length,
                    ),
                    url: source.url.clone(),
                });
        }
        Self { links }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// The markdown link a marker turns into.
    pub fn link_for(&self, marker: &str) -> Option<String> {
        self.links
            .get(marker)
            .map(|target| format!("[{}]({})", target.display_title, target.url))
    }

    /// Replace every known marker in `text` with its markdown link.
    ///
    /// Matching is literal. Inserted links are never rescanned, so a title
    /// that itself contains marker glyphs cannot trigger a second
    /// replacement. Unknown markers stay in the text and are reported.
    pub fn substitute(&self, text: &str) -> Substitution {
        let mut out = String::with_capacity(text.len());
        let mut cited: Vec<String> = Vec::new();
        let mut unresolved: Vec<String> = Vec::new();

        for piece in (MarkerScanner { text, pos: 0 }) {
            match piece {
                Piece::Text(t) => out.push_str(t),
                Piece::Marker(m) => match self.link_for(m) {
                    Some(link) => {
                        out.push_str(&link);
                        if !cited.iter().any(|c| c == m) {
                            cited.push(m.to_string());
                        }
                    }
                    None => {
                        out.push_str(m);
                        if !unresolved.iter().any(|u| u == m) {
                            unresolved.push(m.to_string());
                        }
                    }
                },
            }
        }

        Substitution {
            text: out,
            cited,
            unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn source(marker: &str, title: &str, url: &str) -> SourceRecord {
        SourceRecord {
            marker: marker.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            snippet: String::new(),
        }
    }

    #[test]
    fn test_mint_marker_is_one_based() {
        assert_eq!(mint_marker(0, 0), "⟦0-1⟧");
        assert_eq!(mint_marker(12, 4), "⟦12-5⟧");
    }

    #[test]
    fn test_format_finding_repeats_marker() {
        let block = format_finding("⟦3-2⟧", "Rust", "Fast and safe", "https://rust-lang.org");
        assert!(block.starts_with("Source ⟦3-2⟧:"));
        assert!(block.contains("Title: Rust"));
        assert!(block.contains("URL: https://rust-lang.org"));
        assert!(block.contains("always use ⟦3-2⟧"));
        assert_eq!(find_markers(&block).count(), 2);
    }

    #[test]
    fn test_format_finding_neutralizes_foreign_glyphs() {
        let block = format_finding(
            "⟦0-1⟧",
            "Notation ⟦x⟧",
            "The meaning function ⟦e⟧ maps terms",
            "https://example.com/⟦a⟧",
        );
        assert!(block.contains("Title: Notation [x]"));
        assert!(block.contains("The meaning function [e] maps terms"));
        let markers: Vec<&str> = find_markers(&block).collect();
        assert_eq!(markers, vec!["⟦0-1⟧", "⟦0-1⟧"]);
    }

    #[test]
    fn test_link_title_neutralizes_foreign_glyphs() {
        let table = CitationTable::from_sources(&[source("⟦0-1⟧", "Sets ⟦S⟧", "https://a")], 50);
        assert_eq!(table.link_for("⟦0-1⟧").as_deref(), Some("[Sets [S]](https://a)"));
        assert!(matches!(neutralize_glyphs("plain"), Cow::Borrowed("plain")));
    }

    #[rstest]
    #[case("short", 50, "short")]
    #[case("exactly ten", 11, "exactly ten")]
    #[case("this title is too long", 10, "this ti...")]
    #[case("日本語のタイトルです", 6, "日本語...")]
    fn test_truncate_title(#[case] title: &str, #[case] max: usize, #[case] expected: &str) {
        let shown = truncate_title(title, max);
        assert_eq!(shown, expected);
        assert!(shown.chars().count() <= max);
    }

    #[test]
    fn test_truncated_title_has_exact_length() {
        let title = "a".repeat(80);
        let shown = truncate_title(&title, 50);
        assert_eq!(shown.chars().count(), 50);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn test_find_markers_skips_broken_tokens() {
        let text = "a ⟦0-1⟧ b ⟦unterminated ⟦1-2⟧ c ⟧ d";
        let markers: Vec<&str> = find_markers(text).collect();
        assert_eq!(markers, vec!["⟦0-1⟧", "⟦1-2⟧"]);
    }

    #[test]
    fn test_substitute_known_markers() {
        let table = CitationTable::from_sources(
            &[
                source("⟦0-1⟧", "Alpha", "https://a.example"),
                source("⟦1-1⟧", "Beta", "https://b.example"),
            ],
            50,
        );

        let result = table.substitute("One ⟦0-1⟧, two ⟦1-1⟧ and again ⟦0-1⟧.");
        assert_eq!(
            result.text,
            "One [Alpha](https://a.example), two [Beta](https://b.example) \
             and again [Alpha](https://a.example)."
        );
        assert_eq!(result.cited, vec!["⟦0-1⟧", "⟦1-1⟧"]);
        assert!(result.unresolved.is_empty());
        assert_eq!(find_markers(&result.text).count(), 0);
    }

    #[test]
    fn test_unknown_markers_are_left_in_place() {
        let table = CitationTable::from_sources(&[source("⟦0-1⟧", "Alpha", "https://a")], 50);

        let result = table.substitute("Known ⟦0-1⟧, invented ⟦9-9⟧.");
        assert_eq!(result.text, "Known [Alpha](https://a), invented ⟦9-9⟧.");
        assert_eq!(result.unresolved, vec!["⟦9-9⟧"]);
    }

    #[test]
    fn test_markers_do_not_collide_by_prefix() {
        let table = CitationTable::from_sources(
            &[
                source("⟦1-1⟧", "One", "https://1"),
                source("⟦11-1⟧", "Eleven", "https://11"),
            ],
            50,
        );

        let result = table.substitute("⟦11-1⟧ ⟦1-1⟧");
        assert_eq!(result.text, "[Eleven](https://11) [One](https://1)");
    }

    #[test]
    fn test_substitution_is_idempotent() {
        let table = CitationTable::from_sources(
            &[source("⟦0-1⟧", "A very long title that needs shortening", "https://a")],
            20,
        );

        let once = table.substitute("Fact ⟦0-1⟧.");
        let twice = table.substitute(&once.text);
        assert_eq!(once.text, "Fact [A very long title...](https://a).");
        assert_eq!(twice.text, once.text);
        assert!(twice.cited.is_empty());
    }

    #[test]
    fn test_title_with_marker_glyphs_is_not_rescanned() {
        let table = CitationTable::from_sources(
            &[
                source("⟦0-1⟧", "See ⟦0-2⟧", "https://a"),
                source("⟦0-2⟧", "Other", "https://b"),
            ],
            50,
        );

        let result = table.substitute("⟦0-1⟧");
        assert_eq!(result.text, "[See ⟦0-2⟧](https://a)");
        assert_eq!(result.cited, vec!["⟦0-1⟧"]);
    }
}
