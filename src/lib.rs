//! # edgequake-docflow
//!
//! Route free text or scanned documents through LLM-backed analysis
//! pipelines, streaming a status label for every step.
//!
//! ## Pipelines
//!
//! ```text
//! text ─▶ Summarize ─▶ Translate ─▶ Count
//!
//! file ─▶ Quality ─▶ Enhance ─▶ Preprocess ─▶ Extract ─▶ Ground
//!            └───────────┴────────────┴───────────┴─────────┴─▶ stop on first error
//! ```
//!
//! A run takes the file pipeline when its latest user message is
//! `FILE_UPLOAD::{"file_id": "…"}` (see [`pipeline::route`]) and the text
//! pipeline otherwise. Text steps always produce output, substituting local
//! fallbacks when a model is missing or fails. File steps record the first
//! failure in [`RunState::file_errors`] and end the run there.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docflow::{MemoryUploadStore, RunState, Workflow, WorkflowConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Providers auto-detected from OPENAI_API_KEY / GEMINI_API_KEY / …
//!     let config = WorkflowConfig::builder().target_language("Hindi").build()?;
//!     let workflow = Workflow::from_config(config, Arc::new(MemoryUploadStore::new()));
//!
//!     let state = workflow
//!         .execute(RunState::from_text("A long report…"), &Workflow::new_run_id())
//!         .await;
//!     println!("{:?}", state.translated_data);
//!     Ok(())
//! }
//! ```
//!
//! ## Status Events
//!
//! [`Workflow::execute_stream`] returns a stream of [`StatusEvent`]s, each
//! carrying the label and a snapshot of the run state. `Completed` means the
//! run terminated, not that it succeeded: check `file_errors`.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docflow` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyzer;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod prompts;
pub mod state;
pub mod status;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyzer::{Analyzer, AnalyzerError, AnalyzerSet, Capability, FixedAnalyzer, LlmAnalyzer};
pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use config::{WorkflowConfig, WorkflowConfigBuilder};
pub use error::{DocflowError, StepError};
pub use pipeline::engine::{StatusStream, Workflow};
pub use pipeline::graph::{Edge, Node};
pub use pipeline::route::{encode_file_upload, FILE_UPLOAD_PREFIX};
pub use state::{LlmStatus, Message, RunState};
pub use status::{StatusEmitter, StatusEvent};
pub use upload::{DirUploadStore, MemoryUploadStore, UploadRecord, UploadResolver};
