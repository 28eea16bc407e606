//! Run state: the single record threaded through every workflow node.
//!
//! One [`RunState`] exists per run. The engine owns it for the duration of
//! the run, each node writes only its own output field, and every status
//! emission publishes a snapshot of it. All fields serialise with serde so the
//! same shape serves checkpoints, status events and `--json` CLI output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mutable state of one pipeline execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Caller-supplied text. Required for the text pipeline unless a user
    /// message carries the text instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,

    /// Conversation turns supplied by the caller, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<FileRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_quality: Option<FileQuality>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_data: Option<EnhancedData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocess_data: Option<PreprocessData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<ExtractedData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounded_data: Option<GroundedData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_data: Option<SummaryData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_data: Option<TranslatedData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_count: Option<FinalCount>,

    /// Failures recorded by file-pipeline nodes. Non-empty means the run
    /// terminates at the next routing decision.
    #[serde(default)]
    pub file_errors: Vec<String>,

    /// Most recent status label. Overwritten on every emission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_status: Option<LlmStatus>,
}

impl RunState {
    /// Start a run from plain input text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            input_text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Start a run from a conversation.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Whether any file-pipeline step has recorded a failure.
    pub fn has_errors(&self) -> bool {
        !self.file_errors.is_empty()
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// `user`/`human` for caller turns; anything else is ignored for input
    /// resolution. Older producers send this key as `type`.
    #[serde(alias = "type")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self.role.as_str(), "user" | "human")
    }
}

/// Reference to an upload, as carried by a `FILE_UPLOAD::` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Output of the quality-assessment step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileQuality {
    pub blur_score: f64,
    pub skew_angle: f64,
    pub lighting_variance: f64,
    pub issues: Vec<String>,
    pub image_count: u32,
}

/// Output of the enhancement step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedData {
    pub instructions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_base64: Option<String>,
}

/// Output of the handwriting-region preprocessing step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessData {
    pub total_boxes: u32,
    pub boxes_per_page: Vec<u32>,
}

/// Output of the handwriting-extraction step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedData {
    pub raw_text: String,
    pub page_count: u32,
}

/// One key/value entity pulled out by the grounding step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub key: String,
    pub value: String,
}

/// Output of the grounding step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundedData {
    pub normalized_text: String,
    pub entities: Vec<Entity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Output of the summarize step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryData {
    pub summary: String,
    pub key_points: Vec<String>,
}

/// Output of the translate step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatedData {
    pub translated_text: String,
}

/// Output of the count step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalCount {
    pub word_count: usize,
}

/// Fixed status vocabulary published on the event stream.
///
/// `Completed` means *terminated*, not *succeeded*: a run that stopped on a
/// recorded error also ends with `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LlmStatus {
    Processing,
    Thinking,
    Summarizing,
    Translating,
    Counting,
    Assessing,
    Enhancing,
    Preprocessing,
    Extracting,
    Grounding,
    Completed,
}

impl LlmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmStatus::Processing => "Processing",
            LlmStatus::Thinking => "Thinking",
            LlmStatus::Summarizing => "Summarizing",
            LlmStatus::Translating => "Translating",
            LlmStatus::Counting => "Counting",
            LlmStatus::Assessing => "Assessing",
            LlmStatus::Enhancing => "Enhancing",
            LlmStatus::Preprocessing => "Preprocessing",
            LlmStatus::Extracting => "Extracting",
            LlmStatus::Grounding => "Grounding",
            LlmStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for LlmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
