//! Context formatting for a downstream generation prompt or direct display.
//!
//! Renders a [`FusedResult`] as numbered `[i] title\nsnippet\n` entries and,
//! separately, as an HTML-escaped variant with `<br>` line breaks. Both
//! renderings are total: missing fields degrade to placeholders.

use serde_json::Value;

use crate::types::{Candidate, FusedResult, Payload};

/// Title used when a candidate carries no recognisable title.
pub const NO_TITLE: &str = "[No Title]";

/// Maximum characters of the fallback JSON rendering used as a snippet.
const FALLBACK_SNIPPET_CHARS: usize = 200;

/// Nested payload sections that hold paper fields, in preference order.
const SECTION_KEYS: &[&str] = &["metadata", "source"];

/// Fields tried, in order, for the snippet.
const SNIPPET_KEYS: &[&str] = &["abstract", "summary"];

/// The title and snippet extracted from one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Display title, or [`NO_TITLE`].
    pub title: String,
    /// Abstract, summary, or a truncated JSON rendering.
    pub snippet: String,
}

/// Extract a title and snippet from `candidate`.
///
/// Looks inside the `metadata` object, else the `source` object. With
/// neither present, the title is [`NO_TITLE`] and the snippet is the whole
/// payload rendered as JSON and cut to 200 characters.
pub fn entry_for(candidate: &Candidate) -> Entry {
    let payload = &candidate.raw_payload;
    match section(payload) {
        Some(fields) => Entry {
            title: text_field(fields, "title").unwrap_or_else(|| NO_TITLE.to_owned()),
            snippet: SNIPPET_KEYS
                .iter()
                .find_map(|key| text_field(fields, key))
                .unwrap_or_else(|| truncated_json(fields)),
        },
        None => Entry {
            title: NO_TITLE.to_owned(),
            snippet: truncated_json(payload),
        },
    }
}

/// Render `fused` as the plain-text generation context.
///
/// Entries are numbered from 1 and separated by a blank line. An empty
/// result renders as an empty string.
pub fn format_context(fused: &FusedResult) -> String {
    fused
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let entry = entry_for(candidate);
            format!("[{}] {}\n{}\n", i + 1, entry.title, entry.snippet)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render `fused` as HTML-safe display text with `<br>` line breaks.
pub fn format_context_html(fused: &FusedResult) -> String {
    to_html(&format_context(fused))
}

/// Escape `text` for HTML and turn newlines into `<br>`.
pub fn to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br>"),
            other => out.push(other),
        }
    }
    out
}

fn section(payload: &Payload) -> Option<&Payload> {
    SECTION_KEYS.iter().find_map(|key| match payload.get(*key) {
        Some(Value::Object(fields)) if !fields.is_empty() => Some(fields),
        _ => None,
    })
}

fn text_field(fields: &Payload, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truncated_json(fields: &Payload) -> String {
    let rendered = serde_json::to_string(fields).unwrap_or_default();
    rendered.chars().take(FALLBACK_SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;
    use serde_json::json;

    fn candidate(source: Source, value: Value) -> Candidate {
        match value {
            Value::Object(map) => Candidate::new(source, map),
            _ => Candidate::new(source, Payload::new()),
        }
    }

    #[test]
    fn metadata_section_preferred() {
        let c = candidate(
            Source::Vector,
            json!({
                "index": 4,
                "metadata": {"title": "Attention", "abstract": "We propose..."},
                "source": {"title": "Ignored"}
            }),
        );
        let entry = entry_for(&c);
        assert_eq!(entry.title, "Attention");
        assert_eq!(entry.snippet, "We propose...");
    }

    #[test]
    fn source_section_used_when_no_metadata() {
        let c = candidate(
            Source::Keyword,
            json!({"id": "x", "source": {"title": "BERT", "summary": "Bidirectional"}}),
        );
        let entry = entry_for(&c);
        assert_eq!(entry.title, "BERT");
        assert_eq!(entry.snippet, "Bidirectional");
    }

    #[test]
    fn missing_title_uses_placeholder() {
        let c = candidate(Source::Keyword, json!({"source": {"abstract": "Only text"}}));
        assert_eq!(entry_for(&c).title, NO_TITLE);
    }

    #[test]
    fn section_without_snippet_renders_section_json() {
        let c = candidate(Source::Vector, json!({"metadata": {"title": "T", "year": 2020}}));
        let entry = entry_for(&c);
        assert_eq!(entry.snippet, r#"{"title":"T","year":2020}"#);
    }

    #[test]
    fn no_section_falls_back_to_truncated_payload() {
        let long = "x".repeat(500);
        let c = candidate(Source::Relational, json!({"title": "Row", "abstract": long}));
        let entry = entry_for(&c);
        assert_eq!(entry.title, NO_TITLE);
        assert_eq!(entry.snippet.chars().count(), 200);
        assert!(entry.snippet.starts_with("{\"abstract\":\"xxx"));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let c = candidate(Source::Graph, json!({"p": "é".repeat(300)}));
        let entry = entry_for(&c);
        assert_eq!(entry.snippet.chars().count(), 200);
    }

    #[test]
    fn context_numbered_from_one() {
        let fused = FusedResult::new(vec![
            candidate(Source::Vector, json!({"metadata": {"title": "A", "abstract": "a"}})),
            candidate(Source::Keyword, json!({"source": {"title": "B", "abstract": "b"}})),
        ]);
        assert_eq!(format_context(&fused), "[1] A\na\n\n[2] B\nb\n");
    }

    #[test]
    fn empty_fused_result_renders_empty() {
        assert_eq!(format_context(&FusedResult::default()), "");
        assert_eq!(format_context_html(&FusedResult::default()), "");
    }

    #[test]
    fn fieldless_candidate_still_renders_placeholder() {
        let fused = FusedResult::new(vec![Candidate::new(Source::Graph, Payload::new())]);
        let text = format_context(&fused);
        assert!(!text.is_empty());
        assert!(text.contains(NO_TITLE));
        assert_eq!(text, "[1] [No Title]\n{}\n");
    }

    #[test]
    fn non_object_sections_are_ignored() {
        let c = candidate(Source::Keyword, json!({"metadata": "oops", "source": null}));
        let entry = entry_for(&c);
        assert_eq!(entry.title, NO_TITLE);
        assert!(entry.snippet.contains("oops"));
    }

    #[test]
    fn html_escapes_markup_and_breaks_lines() {
        assert_eq!(
            to_html("[1] <b>\"Q&A\"</b>\nit's"),
            "[1] &lt;b&gt;&quot;Q&amp;A&quot;&lt;/b&gt;<br>it&#39;s"
        );
    }

    #[test]
    fn html_variant_matches_plain_structure() {
        let fused = FusedResult::new(vec![candidate(
            Source::Vector,
            json!({"metadata": {"title": "A<B", "abstract": "x"}}),
        )]);
        assert_eq!(format_context_html(&fused), "[1] A&lt;B<br>x<br>");
    }
}
