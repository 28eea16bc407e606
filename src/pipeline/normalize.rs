//! Normalise analyzer replies into the typed output records.
//!
//! Every reply is first classified into an [`AnalyzerOutput`]; each output
//! type then has exactly one function mapping the three cases to a record.
//! Fallbacks when the reply matches no known layout:
//!
//! | Output        | `Structured`              | `Text`                        | `Unrecognized`              |
//! |---------------|---------------------------|-------------------------------|-----------------------------|
//! | quality       | fields, missing = 0 / []  | text becomes the single issue | all zero, no issues         |
//! | enhancement   | fields                    | text becomes `instructions`   | empty instructions          |
//! | preprocess    | fields, total from pages  | default                       | `0`, `[]`                   |
//! | extraction    | fields, pages 1 if text   | `raw_text`, one page          | `""`, `0`                   |
//! | grounding     | fields, entity map → list | `normalized_text`             | raw text + note             |
//! | summary       | needs `summary` key       | cleaned text, no key points   | truncated input             |
//! | translation   | `translated_text`/`text`  | text                          | untranslated source         |
//!
//! Structured replies are read field by field: a null or mistyped field takes
//! its own default without discarding the others. Numbers may arrive as
//! floats or numeric strings. An `Unrecognized` reply is logged as a shape
//! mismatch and never recorded as a step error.

use super::cleanup::{clean_summary_text, clean_transcript, strip_code_fences, truncate_chars};
use crate::analyzer::Capability;
use crate::error::StepError;
use crate::state::{
    EnhancedData, Entity, ExtractedData, FileQuality, GroundedData, PreprocessData, SummaryData,
    TranslatedData,
};
use serde_json::{Map, Value};
use tracing::warn;

/// Note attached when grounding could not structure the text.
pub const UNGROUNDED_NOTE: &str =
    "Grounding unavailable; normalized text is the unmodified extraction.";

/// Tagged view of an analyzer reply.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerOutput {
    /// A JSON object, or a string containing one.
    Structured(Map<String, Value>),
    /// Non-blank prose.
    Text(String),
    /// Anything else: null, numbers, arrays, blank strings.
    Unrecognized(Value),
}

impl AnalyzerOutput {
    pub fn classify(reply: Value) -> Self {
        match reply {
            Value::Object(map) => AnalyzerOutput::Structured(map),
            Value::String(s) => {
                if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&strip_code_fences(&s)) {
                    return AnalyzerOutput::Structured(map);
                }
                if s.trim().is_empty() {
                    AnalyzerOutput::Unrecognized(Value::String(s))
                } else {
                    AnalyzerOutput::Text(s)
                }
            }
            other => AnalyzerOutput::Unrecognized(other),
        }
    }
}

fn shape_mismatch(capability: Capability) {
    warn!(
        "{}",
        StepError::OutputShapeMismatch {
            capability: capability.purpose().to_string()
        }
    );
}

fn str_field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| map.get(*k).and_then(Value::as_str))
}

/// Note a present-but-unusable field; the caller substitutes its default.
fn bad_field(capability: Capability, key: &str, value: &Value) {
    warn!("{}: ignoring field {} = {}", capability.step_name(), key, value);
}

fn number(value: &Value) -> Option<f64> {
    let n: f64 = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn count(value: &Value) -> Option<u32> {
    number(value)
        .filter(|n| *n >= 0.0 && *n <= u32::MAX as f64)
        .map(|n| n.round() as u32)
}

fn f64_field(capability: Capability, map: &Map<String, Value>, key: &str) -> f64 {
    match map.get(key) {
        None | Some(Value::Null) => 0.0,
        Some(v) => number(v).unwrap_or_else(|| {
            bad_field(capability, key, v);
            0.0
        }),
    }
}

fn count_field(capability: Capability, map: &Map<String, Value>, key: &str) -> Option<u32> {
    match map.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => {
            let n = count(v);
            if n.is_none() {
                bad_field(capability, key, v);
            }
            n
        }
    }
}

fn text_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn count_list(capability: Capability, map: &Map<String, Value>, key: &str) -> Vec<u32> {
    match map.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(count).collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(v) => {
            bad_field(capability, key, v);
            Vec::new()
        }
    }
}

pub fn quality(reply: Value) -> FileQuality {
    const CAP: Capability = Capability::Quality;
    match AnalyzerOutput::classify(reply) {
        AnalyzerOutput::Structured(map) => FileQuality {
            blur_score: f64_field(CAP, &map, "blur_score"),
            skew_angle: f64_field(CAP, &map, "skew_angle"),
            lighting_variance: f64_field(CAP, &map, "lighting_variance"),
            issues: text_list(&map, "issues"),
            image_count: count_field(CAP, &map, "image_count").unwrap_or(0),
        },
        AnalyzerOutput::Text(text) => FileQuality {
            issues: vec![text.trim().to_string()],
            ..Default::default()
        },
        AnalyzerOutput::Unrecognized(_) => {
            shape_mismatch(CAP);
            FileQuality::default()
        }
    }
}

pub fn enhancement(reply: Value) -> EnhancedData {
    match AnalyzerOutput::classify(reply) {
        AnalyzerOutput::Structured(map) => EnhancedData {
            instructions: str_field(&map, &["instructions"])
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            enhanced_base64: str_field(&map, &["enhanced_base64"])
                .filter(|s| !s.is_empty())
                .map(String::from),
        },
        AnalyzerOutput::Text(text) => EnhancedData {
            instructions: text.trim().to_string(),
            enhanced_base64: None,
        },
        AnalyzerOutput::Unrecognized(_) => {
            shape_mismatch(Capability::Enhance);
            EnhancedData::default()
        }
    }
}

pub fn preprocess(reply: Value) -> PreprocessData {
    const CAP: Capability = Capability::Preprocess;
    match AnalyzerOutput::classify(reply) {
        AnalyzerOutput::Structured(map) => {
            let boxes_per_page = count_list(CAP, &map, "boxes_per_page");
            let total_boxes = count_field(CAP, &map, "total_boxes")
                .unwrap_or_else(|| boxes_per_page.iter().sum());
            PreprocessData {
                total_boxes,
                boxes_per_page,
            }
        }
        AnalyzerOutput::Text(_) | AnalyzerOutput::Unrecognized(_) => {
            shape_mismatch(CAP);
            PreprocessData::default()
        }
    }
}

pub fn extraction(reply: Value) -> ExtractedData {
    const CAP: Capability = Capability::Extract;
    match AnalyzerOutput::classify(reply) {
        AnalyzerOutput::Structured(map) => {
            let raw_text = clean_transcript(str_field(&map, &["raw_text", "text"]).unwrap_or_default());
            if raw_text.is_empty() {
                shape_mismatch(CAP);
            }
            ExtractedData {
                page_count: count_field(CAP, &map, "page_count")
                    .unwrap_or(u32::from(!raw_text.is_empty())),
                raw_text,
            }
        }
        AnalyzerOutput::Text(text) => ExtractedData {
            raw_text: clean_transcript(&text),
            page_count: 1,
        },
        AnalyzerOutput::Unrecognized(_) => {
            shape_mismatch(CAP);
            ExtractedData::default()
        }
    }
}

/// Grounding result for `raw_text` when no grounder could structure it.
pub fn ungrounded(raw_text: &str, note: impl Into<String>) -> GroundedData {
    GroundedData {
        normalized_text: raw_text.to_string(),
        entities: Vec::new(),
        notes: Some(note.into()),
    }
}

/// Entities arrive either as `[{key, value}]` or as a flat `{key: value}` map.
fn entities(value: Option<&Value>) -> Vec<Entity> {
    let scalar = |v: &Value| match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let key = item.get("key")?.as_str()?.to_string();
                let value = item.get("value").map(scalar).unwrap_or_default();
                Some(Entity { key, value })
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| Entity {
                key: k.clone(),
                value: scalar(v),
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub fn grounding(reply: Value, raw_text: &str) -> GroundedData {
    match AnalyzerOutput::classify(reply) {
        AnalyzerOutput::Structured(map) => GroundedData {
            normalized_text: str_field(&map, &["normalized_text", "text"])
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| raw_text.to_string()),
            entities: entities(map.get("entities")),
            notes: str_field(&map, &["notes"]).map(String::from),
        },
        AnalyzerOutput::Text(text) => GroundedData {
            normalized_text: text.trim().to_string(),
            entities: Vec::new(),
            notes: None,
        },
        AnalyzerOutput::Unrecognized(_) => {
            shape_mismatch(Capability::Ground);
            ungrounded(raw_text, "Unrecognized grounding response; text left as extracted.")
        }
    }
}

/// Summary used when the summarizer fails or answers nonsense.
pub fn fallback_summary(input: &str, max_chars: usize) -> SummaryData {
    SummaryData {
        summary: truncate_chars(input, max_chars),
        key_points: Vec::new(),
    }
}

pub fn summary(reply: Value, input: &str, fallback_chars: usize) -> SummaryData {
    match AnalyzerOutput::classify(reply) {
        AnalyzerOutput::Structured(map) if map.get("summary").is_some_and(Value::is_string) => {
            let summary = str_field(&map, &["summary"]).unwrap_or_default().to_string();
            let key_points = map
                .get("key_points")
                .and_then(Value::as_array)
                .map(|points| {
                    points
                        .iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            SummaryData { summary, key_points }
        }
        AnalyzerOutput::Text(text) => SummaryData {
            summary: clean_summary_text(&text),
            key_points: Vec::new(),
        },
        AnalyzerOutput::Structured(_) | AnalyzerOutput::Unrecognized(_) => {
            shape_mismatch(Capability::Summarize);
            fallback_summary(input, fallback_chars)
        }
    }
}

pub fn translation(reply: Value, source: &str) -> TranslatedData {
    let translated_text = match AnalyzerOutput::classify(reply) {
        AnalyzerOutput::Structured(map) => {
            match str_field(&map, &["translated_text", "text", "translation"]) {
                Some(text) => text.trim().to_string(),
                None => {
                    shape_mismatch(Capability::Translate);
                    source.to_string()
                }
            }
        }
        AnalyzerOutput::Text(text) => text.trim().to_string(),
        AnalyzerOutput::Unrecognized(_) => {
            shape_mismatch(Capability::Translate);
            source.to_string()
        }
    };
    TranslatedData { translated_text }
}
