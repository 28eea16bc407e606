//! Analyzer capabilities: the pluggable model backends behind each step.
//!
//! Every workflow node that needs a model goes through the same two-method
//! [`Analyzer`] contract: `available()` says whether the backend is
//! configured, `run()` maps a JSON request to a JSON reply or fails. Prompt
//! text and output schema are bound into the analyzer when it is built, so the
//! workflow never sees them.
//!
//! ```text
//! Capability ──▶ AnalyzerSet::get ──▶ Arc<dyn Analyzer>
//!                                       ├─ LlmAnalyzer    (edgequake-llm provider)
//!                                       └─ FixedAnalyzer  (canned reply, offline/tests)
//! ```
//!
//! A missing or unavailable slot is not an error here; each node decides
//! what "not configured" means for its pipeline.

pub mod fixed;
pub mod llm;
pub mod provider;

pub use fixed::FixedAnalyzer;
pub use llm::LlmAnalyzer;

use crate::config::WorkflowConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// The steps that can be backed by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Quality,
    Enhance,
    Preprocess,
    Extract,
    Ground,
    Summarize,
    Translate,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::Quality,
        Capability::Enhance,
        Capability::Preprocess,
        Capability::Extract,
        Capability::Ground,
        Capability::Summarize,
        Capability::Translate,
    ];

    /// Lower-case purpose used in "not configured for …" messages.
    pub fn purpose(&self) -> &'static str {
        match self {
            Capability::Quality => "quality assessment",
            Capability::Enhance => "image enhancement",
            Capability::Preprocess => "preprocessing",
            Capability::Extract => "handwriting extraction",
            Capability::Ground => "grounding",
            Capability::Summarize => "summarization",
            Capability::Translate => "translation",
        }
    }

    /// Capitalised step name used in invocation-failure messages.
    pub fn step_name(&self) -> &'static str {
        match self {
            Capability::Quality => "Quality assessment",
            Capability::Enhance => "Image enhancement",
            Capability::Preprocess => "Preprocessing",
            Capability::Extract => "Handwriting extraction",
            Capability::Ground => "Grounding",
            Capability::Summarize => "Summarization",
            Capability::Translate => "Translation",
        }
    }

    /// File-pipeline capabilities read document images and use the vision provider.
    pub fn is_vision(&self) -> bool {
        matches!(
            self,
            Capability::Quality | Capability::Enhance | Capability::Preprocess | Capability::Extract
        )
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.purpose())
    }
}

/// Failure of a single analyzer invocation, after the analyzer's own retries.
#[derive(Debug, Clone, Error)]
pub enum AnalyzerError {
    /// Every attempt exceeded the per-call timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider rejected or failed the call on every attempt.
    #[error("provider error after {attempts} attempt(s): {message}")]
    Provider { attempts: u32, message: String },

    /// The request could not be turned into a model call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A model-backed step implementation.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Whether the backend is configured. Unavailable analyzers are never run.
    fn available(&self) -> bool {
        true
    }

    /// Map a request payload to a reply.
    ///
    /// The reply may be a JSON object, a plain string, or anything else; the
    /// workflow normalises it.
    async fn run(&self, request: Value) -> Result<Value, AnalyzerError>;
}

/// One optional analyzer per [`Capability`].
#[derive(Clone, Default)]
pub struct AnalyzerSet {
    slots: HashMap<Capability, Arc<dyn Analyzer>>,
}

impl fmt::Debug for AnalyzerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut configured: Vec<_> = self
            .slots
            .iter()
            .filter(|(_, a)| a.available())
            .map(|(c, _)| c.purpose())
            .collect();
        configured.sort_unstable();
        f.debug_struct("AnalyzerSet")
            .field("configured", &configured)
            .finish()
    }
}

impl AnalyzerSet {
    /// An empty set: every capability is unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the analyzer for `capability`.
    pub fn with(mut self, capability: Capability, analyzer: Arc<dyn Analyzer>) -> Self {
        self.slots.insert(capability, analyzer);
        self
    }

    pub fn insert(&mut self, capability: Capability, analyzer: Arc<dyn Analyzer>) {
        self.slots.insert(capability, analyzer);
    }

    /// The analyzer for `capability`, if installed and available.
    pub fn get(&self, capability: Capability) -> Option<Arc<dyn Analyzer>> {
        self.slots
            .get(&capability)
            .filter(|a| a.available())
            .map(Arc::clone)
    }

    pub fn is_available(&self, capability: Capability) -> bool {
        self.get(capability).is_some()
    }

    /// Build LLM-backed analyzers from configuration.
    ///
    /// The text provider backs Summarize/Translate/Ground; the vision provider
    /// backs the four image steps. A provider that cannot be resolved leaves
    /// its capabilities unset; the run then reports them as not configured.
    pub fn from_config(config: &WorkflowConfig) -> Self {
        let mut set = Self::new();

        let text = match provider::resolve_text_provider(config) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("Text analyzers unavailable: {}", e);
                None
            }
        };
        let vision = match provider::resolve_vision_provider(config) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("Vision analyzers unavailable: {}", e);
                None
            }
        };

        for capability in Capability::ALL {
            let backend = if capability.is_vision() { &vision } else { &text };
            if let Some(p) = backend {
                set.insert(
                    capability,
                    Arc::new(LlmAnalyzer::for_capability(Arc::clone(p), capability, config)),
                );
            }
        }

        info!("Analyzers configured: {:?}", set);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unavailable_analyzers_are_hidden() {
        let set = AnalyzerSet::new()
            .with(Capability::Quality, Arc::new(FixedAnalyzer::unavailable()))
            .with(Capability::Summarize, Arc::new(FixedAnalyzer::new(json!("ok"))));

        assert!(!set.is_available(Capability::Quality));
        assert!(set.is_available(Capability::Summarize));
        assert!(!set.is_available(Capability::Translate));
        assert_eq!(format!("{set:?}"), r#"AnalyzerSet { configured: ["summarization"] }"#);
    }

    #[test]
    fn vision_split() {
        assert!(Capability::Extract.is_vision());
        assert!(!Capability::Ground.is_vision());
        assert!(!Capability::Summarize.is_vision());
    }

    #[test]
    fn error_display() {
        assert_eq!(AnalyzerError::Timeout { secs: 60 }.to_string(), "timed out after 60s");
    }
}
