//! Node graph and transition table for both pipelines.
//!
//! ```text
//! text:  START ─▶ Summarize ─▶ Translate ─▶ Count ─▶ END
//!                   └─(empty input: Halt)───────────▶ END
//!
//! file:  START ─▶ Quality ─▶ Enhance ─▶ Preprocess ─▶ Extract ─▶ Ground ─▶ END
//!                   │          │            │            │          │
//!                   └──────────┴────────────┴────────────┴──────────┴─(Error)─▶ END
//! ```
//!
//! `ERROR` and `END` are both represented as `None`: the run simply stops.

use crate::state::RunState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Summarize,
    Translate,
    Count,
    Quality,
    Enhance,
    Preprocess,
    Extract,
    Ground,
}

/// Outcome of a node as seen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Continue to the next node in sequence.
    Success,
    /// A file node recorded an error: short-circuit to ERROR.
    Error,
    /// The node finished the run by itself (empty text input).
    Halt,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Summarize => "summarize",
            Node::Translate => "translate",
            Node::Count => "count",
            Node::Quality => "quality",
            Node::Enhance => "enhance",
            Node::Preprocess => "preprocess",
            Node::Extract => "extract",
            Node::Ground => "ground",
        }
    }

    /// Whether the node belongs to the file pipeline.
    pub fn is_file_node(&self) -> bool {
        !matches!(self, Node::Summarize | Node::Translate | Node::Count)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table. `None` means the run terminates.
pub fn next(node: Node, edge: Edge) -> Option<Node> {
    match (node, edge) {
        (_, Edge::Halt) => None,

        (Node::Summarize, Edge::Success) => Some(Node::Translate),
        (Node::Translate, Edge::Success) => Some(Node::Count),
        (Node::Count, Edge::Success) => None,

        (Node::Quality, Edge::Success) => Some(Node::Enhance),
        (Node::Enhance, Edge::Success) => Some(Node::Preprocess),
        (Node::Preprocess, Edge::Success) => Some(Node::Extract),
        (Node::Extract, Edge::Success) => Some(Node::Ground),
        (Node::Ground, Edge::Success) => None,

        (_, Edge::Error) => None,
    }
}

/// Routing decision after a file node: any recorded error short-circuits.
pub fn route_after(state: &RunState) -> Edge {
    if state.has_errors() {
        Edge::Error
    } else {
        Edge::Success
    }
}
