//! Error types for the edgequake-docflow library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocflowError`]: **Fatal**: the library call cannot proceed at all
//!   (bad configuration, unreadable upload directory, no checkpoint to resume
//!   from). Returned as `Err(DocflowError)` from constructors, stores and
//!   [`crate::Workflow::resume`].
//!
//! * [`StepError`]: **Non-fatal**: a single workflow step could not produce
//!   its output. Step errors never cross a node boundary as `Err`; the file
//!   pipeline records their `Display` text in
//!   [`crate::state::RunState::file_errors`] and the router short-circuits to
//!   termination, while the text pipeline substitutes a degraded result.
//!
//! A run therefore always yields a [`crate::state::RunState`]; callers inspect
//! `file_errors` to tell a successful run from a terminated one.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docflow library.
///
/// Step-level failures use [`StepError`] and are stored in the run state
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum DocflowError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Upload errors ─────────────────────────────────────────────────────
    /// Neither the declared MIME type nor the file extension is allowed.
    #[error("Unsupported file type for '{filename}' ({content_type})\nAllowed: PNG, JPEG, WebP, GIF, TIFF, PDF.")]
    UnsupportedType {
        filename: String,
        content_type: String,
    },

    /// No upload is stored under this identifier.
    #[error("Upload '{file_id}' not found")]
    UploadNotFound { file_id: String },

    /// Reading or writing the upload store failed.
    #[error("Upload store I/O failed at '{path}': {source}")]
    UploadIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Checkpoint errors ─────────────────────────────────────────────────
    /// `resume` was called for a run that never checkpointed.
    #[error("No checkpoint found for run '{run_id}'")]
    CheckpointNotFound { run_id: String },

    /// Reading or writing a checkpoint failed.
    #[error("Checkpoint I/O failed at '{path}': {source}")]
    CheckpointIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored checkpoint or upload metadata file could not be (de)serialised.
    #[error("Malformed record '{path}': {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A non-fatal error for a single workflow step.
///
/// The `Display` text is exactly what lands in `file_errors`, so the wording
/// is part of the observable contract with callers.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum StepError {
    /// No file reference could be resolved from the run state.
    #[error("No file reference found")]
    MissingInput,

    /// The referenced upload id has no stored bytes.
    #[error("Uploaded file not found")]
    ResourceNotFound,

    /// The analyzer backing this step is not configured.
    #[error("Vertex AI credentials not configured for {purpose}")]
    CapabilityUnavailable { purpose: String },

    /// The analyzer call raised or timed out after its own retries.
    #[error("{step} failed: {detail}")]
    CapabilityInvocationFailure { step: String, detail: String },

    /// The analyzer answered with a shape that matches no known layout.
    ///
    /// Never stored in `file_errors`: normalization substitutes the documented
    /// default and only logs this.
    #[error("Unrecognized {capability} response shape; using default")]
    OutputShapeMismatch { capability: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_messages_match_file_errors_wording() {
        assert_eq!(StepError::MissingInput.to_string(), "No file reference found");
        assert_eq!(StepError::ResourceNotFound.to_string(), "Uploaded file not found");
        let e = StepError::CapabilityUnavailable {
            purpose: "quality assessment".into(),
        };
        assert_eq!(
            e.to_string(),
            "Vertex AI credentials not configured for quality assessment"
        );
    }

    #[test]
    fn invocation_failure_display() {
        let e = StepError::CapabilityInvocationFailure {
            step: "Handwriting extraction".into(),
            detail: "timed out after 60s".into(),
        };
        assert_eq!(e.to_string(), "Handwriting extraction failed: timed out after 60s");
    }

    #[test]
    fn unsupported_type_display() {
        let e = DocflowError::UnsupportedType {
            filename: "notes.docx".into(),
            content_type: "application/msword".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.docx"), "got: {msg}");
        assert!(msg.contains("application/msword"), "got: {msg}");
    }

    #[test]
    fn checkpoint_not_found_display() {
        let e = DocflowError::CheckpointNotFound {
            run_id: "run-7".into(),
        };
        assert!(e.to_string().contains("run-7"));
    }
}
