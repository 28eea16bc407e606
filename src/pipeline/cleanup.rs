//! Deterministic cleanup of model-generated text.
//!
//! Models wrap JSON in code fences, open summaries with chatty preambles
//! ("Here is a summary: …") and sprinkle zero-width characters into
//! transcriptions. The rules here undo those quirks without touching content.
//! Each rule is a pure `&str → String` function and is tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;

// ── Code fences ──────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*\n(.*?)\n?```\s*$").unwrap());

/// Remove one pair of outer ```` ``` ```` fences, with or without a language tag.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Summary preambles ────────────────────────────────────────────────────────

/// Strip a "Here is a summary…" / "Summary:" preamble and collapse whitespace.
///
/// A "here is a summary" opener is cut at the first blank line when there is
/// one, otherwise at the first colon.
///
/// ```
/// use edgequake_docflow::pipeline::cleanup::clean_summary_text;
/// assert_eq!(
///     clean_summary_text("Here is a summary: The quick brown fox."),
///     "The quick brown fox."
/// );
/// ```
pub fn clean_summary_text(text: &str) -> String {
    let mut cleaned = text.trim();
    let lowered = cleaned.to_lowercase();

    if lowered.starts_with("here is a summary") {
        if let Some((_, rest)) = cleaned.split_once("\n\n") {
            cleaned = rest.trim();
        } else if let Some((_, rest)) = cleaned.split_once(':') {
            cleaned = rest.trim();
        }
    }
    if lowered.starts_with("summary:") {
        if let Some((_, rest)) = cleaned.split_once(':') {
            cleaned = rest.trim();
        }
    }

    collapse_whitespace(cleaned)
}

/// Join whitespace-separated tokens with single spaces.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of whitespace-delimited, non-empty tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

// ── Transcription text ───────────────────────────────────────────────────────

/// Normalise line endings, drop invisible characters and trailing spaces.
pub fn clean_transcript(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    s.trim_matches('\n').to_string()
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' // zero-width space
                | '\u{200C}' // zero-width non-joiner
                | '\u{200D}' // zero-width joiner
                | '\u{FEFF}' // BOM
                | '\u{00AD}' // soft hyphen
                | '\u{2060}' // word joiner
            )
        })
        .collect()
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
