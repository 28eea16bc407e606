//! The workflow engine: routing, nodes and the executor.
//!
//! ## Data Flow
//!
//! ```text
//! RunState ──▶ route ──▶ node ──▶ graph::next ──▶ node ──▶ … ──▶ RunState
//!                         │ ▲
//!                analyzer ┘ └ normalize
//! ```
//!
//! 1. [`route`]    : pick the first node from the input (file vs. text)
//! 2. [`graph`]    : `Node`/`Edge` enums and the transition table
//! 3. [`text`]     : summarize, translate, count
//! 4. [`file`]     : quality, enhance, preprocess, extract, ground
//! 5. [`normalize`]: map analyzer replies onto typed records
//! 6. [`cleanup`]  : deterministic text cleanup shared by the above
//! 7. [`engine`]   : drive a run node by node, emit status, checkpoint

pub mod cleanup;
pub mod engine;
pub mod file;
pub mod graph;
pub mod normalize;
pub mod route;
pub mod text;

use crate::analyzer::AnalyzerSet;
use crate::config::WorkflowConfig;
use crate::status::StatusEmitter;
use crate::upload::UploadResolver;

/// Everything a node may touch besides the run state.
pub struct StepContext<'a> {
    pub analyzers: &'a AnalyzerSet,
    pub uploads: &'a dyn UploadResolver,
    pub emitter: &'a StatusEmitter,
    pub config: &'a WorkflowConfig,
}
