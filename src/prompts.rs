//! Instructions and output schemas for every analyzer capability.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing what a step asks the model for
//!    requires editing exactly one place, never the workflow nodes.
//!
//! 2. **Testability**: unit tests can import and inspect prompts directly
//!    without spinning up a real model, making prompt regressions easy to catch.
//!
//! Schemas are descriptive JSON sketches appended to the system prompt; the
//! workflow tolerates replies that ignore them (see
//! [`crate::pipeline::normalize`]).

use crate::analyzer::Capability;

pub const QUALITY_INSTRUCTIONS: &str = "You assess scanned-document image quality. \
You receive a document (image, TIFF or PDF) as base64 together with its metadata. \
Assess skew, blur and lighting variance. Return numeric scores and a list of issues. \
If exact metrics cannot be computed, estimate from visible cues and state your \
assumptions in the issues list.";

pub const ENHANCE_INSTRUCTIONS: &str = "You plan image enhancement for handwriting recognition. \
You receive the document base64 and its quality assessment. Describe the enhancement steps \
(deskew, denoise, contrast, binarization). If you can produce an enhanced image or PDF, \
return it base64-encoded; otherwise return instructions only.";

pub const PREPROCESS_INSTRUCTIONS: &str = "You locate handwriting regions. \
You receive the document base64 and any enhancement guidance. Identify regions likely to \
contain handwritten text. Return the total number of bounding boxes and the count per page. \
Estimate when exact detection is not possible.";

pub const EXTRACT_INSTRUCTIONS: &str = "You transcribe handwriting. \
You receive the document base64 plus any preprocessing and enhancement hints. Extract the \
handwritten text verbatim. Return the raw extracted text and the page count.";

pub const GROUND_INSTRUCTIONS: &str = "You ground transcribed handwriting. \
Normalize and structure the extracted text. Return concise normalized text and the \
key/value entities it mentions (names, dates, amounts, identifiers).";

pub const SUMMARIZE_INSTRUCTIONS: &str = "Summarize the text you are given. \
Return a short summary and the main topics as key points. Do not add a preamble.";

/// Schema sketch for each capability's reply. `None` means plain text.
pub fn output_schema(capability: Capability) -> Option<&'static str> {
    match capability {
        Capability::Quality => Some(
            r#"{"blur_score": number, "skew_angle": number, "lighting_variance": number, "issues": [string], "image_count": integer}"#,
        ),
        Capability::Enhance => Some(r#"{"instructions": string, "enhanced_base64": string | null}"#),
        Capability::Preprocess => Some(r#"{"total_boxes": integer, "boxes_per_page": [integer]}"#),
        Capability::Extract => Some(r#"{"raw_text": string, "page_count": integer}"#),
        Capability::Ground => Some(
            r#"{"normalized_text": string, "entities": [{"key": string, "value": string}], "notes": string | null}"#,
        ),
        Capability::Summarize => Some(r#"{"summary": string, "key_points": [string]}"#),
        Capability::Translate => None,
    }
}

/// Instruction text for a capability. Translation depends on the target language.
pub fn instructions(capability: Capability, target_language: &str) -> String {
    match capability {
        Capability::Quality => QUALITY_INSTRUCTIONS.to_string(),
        Capability::Enhance => ENHANCE_INSTRUCTIONS.to_string(),
        Capability::Preprocess => PREPROCESS_INSTRUCTIONS.to_string(),
        Capability::Extract => EXTRACT_INSTRUCTIONS.to_string(),
        Capability::Ground => GROUND_INSTRUCTIONS.to_string(),
        Capability::Summarize => SUMMARIZE_INSTRUCTIONS.to_string(),
        Capability::Translate => translate_instructions(target_language),
    }
}

pub fn translate_instructions(target_language: &str) -> String {
    format!(
        "Translate the following text to {target_language}. \
Output only the translation, with no commentary."
    )
}

/// Full system prompt: instructions plus the schema contract, if any.
pub fn system_prompt(capability: Capability, target_language: &str) -> String {
    let base = instructions(capability, target_language);
    match output_schema(capability) {
        Some(schema) => format!(
            "{base}\n\nRespond with a single JSON object matching this schema and nothing else:\n{schema}"
        ),
        None => base,
    }
}
