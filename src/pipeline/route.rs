//! Entry routing: decide between the text and file pipelines.
//!
//! A file-backed run is signalled by a user message of the form
//! `FILE_UPLOAD::{"file_id": "...", ...}`. Anything else, including a
//! malformed body or a body without a string `file_id`, is text.

use super::graph::Node;
use crate::state::{FileRef, RunState};
use crate::upload::UploadRecord;
use serde_json::{json, Value};

/// Prefix marking a message as a file reference.
pub const FILE_UPLOAD_PREFIX: &str = "FILE_UPLOAD::";

/// Parse a `FILE_UPLOAD::` message into a [`FileRef`].
pub fn parse_file_upload(text: &str) -> Option<FileRef> {
    let body = text.strip_prefix(FILE_UPLOAD_PREFIX)?.trim();
    let value: Value = serde_json::from_str(body).ok()?;
    let obj = value.as_object()?;
    let file_id = obj.get("file_id")?.as_str()?;
    if file_id.trim().is_empty() {
        return None;
    }

    Some(FileRef {
        file_id: file_id.to_string(),
        filename: obj.get("filename").and_then(Value::as_str).map(String::from),
        content_type: obj
            .get("content_type")
            .and_then(Value::as_str)
            .map(String::from),
        size: obj.get("size").and_then(Value::as_u64),
    })
}

/// Build the message a caller sends to start a file run.
pub fn encode_file_upload(record: &UploadRecord) -> String {
    let body = json!({
        "file_id": record.file_id,
        "filename": record.filename,
        "content_type": record.content_type,
        "size": record.size,
    });
    format!("{FILE_UPLOAD_PREFIX}{body}")
}

/// The text a run works on: `input_text` if non-blank, else the latest
/// non-blank user message. Empty when neither exists.
pub fn input_text(state: &RunState) -> String {
    if let Some(text) = state.input_text.as_deref() {
        if !text.trim().is_empty() {
            return text.to_string();
        }
    }
    state
        .messages
        .iter()
        .rev()
        .find(|m| m.is_user() && !m.content.trim().is_empty())
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

/// The file reference driving a run, if any.
pub fn file_reference(state: &RunState) -> Option<FileRef> {
    if let Some(file_ref) = &state.file_ref {
        return Some(file_ref.clone());
    }
    parse_file_upload(&input_text(state))
}

/// First node of a fresh run.
pub fn route(state: &RunState) -> Node {
    if file_reference(state).is_some() {
        Node::Quality
    } else {
        Node::Summarize
    }
}
