//! Text pipeline nodes: summarize → translate → count.
//!
//! These nodes never record errors. An analyzer that is missing or fails is
//! replaced by a local fallback so the run always produces output.

use super::cleanup::{clean_summary_text, word_count};
use super::graph::Edge;
use super::{normalize, route, StepContext};
use crate::analyzer::Capability;
use crate::state::{FinalCount, LlmStatus, RunState, SummaryData, TranslatedData};
use serde_json::Value;
use tracing::{debug, warn};

/// Summarize the input text.
///
/// Empty input finishes the run on the spot with an empty summary.
pub async fn summarize(ctx: &StepContext<'_>, state: &mut RunState) -> Edge {
    let input = route::input_text(state);
    if input.is_empty() {
        debug!("No input text; finishing with an empty summary");
        state.summary_data = Some(SummaryData::default());
        ctx.emitter.emit(state, LlmStatus::Completed).await;
        return Edge::Halt;
    }

    ctx.emitter.emit(state, LlmStatus::Processing).await;
    ctx.emitter.emit(state, LlmStatus::Thinking).await;
    ctx.emitter.emit(state, LlmStatus::Summarizing).await;

    let fallback_chars = ctx.config.summary_fallback_chars;
    let summary = match ctx.analyzers.get(Capability::Summarize) {
        Some(analyzer) => match analyzer.run(Value::String(input.clone())).await {
            Ok(reply) => normalize::summary(reply, &input, fallback_chars),
            Err(e) => {
                warn!("Summarizer failed, using truncated input: {}", e);
                normalize::fallback_summary(&input, fallback_chars)
            }
        },
        None => {
            warn!("Summarizer not configured, using truncated input");
            normalize::fallback_summary(&input, fallback_chars)
        }
    };

    state.summary_data = Some(summary);
    ctx.emitter.emit(state, LlmStatus::Translating).await;
    Edge::Success
}

/// The text translation and counting operate on: the summary, or the input
/// when the summary is empty.
fn working_text(state: &RunState) -> String {
    match state.summary_data.as_ref().map(|s| s.summary.as_str()) {
        Some(summary) if !summary.trim().is_empty() => summary.to_string(),
        _ => route::input_text(state),
    }
}

/// Translate the summary into the configured target language.
pub async fn translate(ctx: &StepContext<'_>, state: &mut RunState) -> Edge {
    let source = working_text(state);

    let translated = if source.trim().is_empty() {
        TranslatedData::default()
    } else {
        match ctx.analyzers.get(Capability::Translate) {
            Some(analyzer) => match analyzer.run(Value::String(source.clone())).await {
                Ok(reply) => normalize::translation(reply, &source),
                Err(e) => {
                    warn!("Translator failed, keeping untranslated text: {}", e);
                    TranslatedData {
                        translated_text: source,
                    }
                }
            },
            None => {
                warn!("Translator not configured, keeping untranslated text");
                TranslatedData {
                    translated_text: source,
                }
            }
        }
    };

    state.translated_data = Some(translated);
    ctx.emitter.emit(state, LlmStatus::Counting).await;
    Edge::Success
}

/// Count the words of the cleaned summary.
pub async fn count(ctx: &StepContext<'_>, state: &mut RunState) -> Edge {
    let text = clean_summary_text(&working_text(state));
    let words = word_count(&text);
    debug!("Counted {} words", words);

    state.final_count = Some(FinalCount { word_count: words });
    ctx.emitter.emit(state, LlmStatus::Completed).await;
    Edge::Success
}
