//! Deterministic analyzer that replies with a canned value.
//!
//! Useful for offline dry runs of a pipeline and for tests that need to
//! assert which steps were invoked and with what payload.

use super::{Analyzer, AnalyzerError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Reply {
    Value(Value),
    Fail(String),
}

/// Analyzer with a fixed reply that records every request it receives.
#[derive(Debug)]
pub struct FixedAnalyzer {
    reply: Reply,
    available: bool,
    requests: Mutex<Vec<Value>>,
}

impl FixedAnalyzer {
    /// Always succeed with `reply`.
    pub fn new(reply: Value) -> Self {
        Self {
            reply: Reply::Value(reply),
            available: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always fail with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Reply::Fail(message.into()),
            available: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Report itself as not configured.
    pub fn unavailable() -> Self {
        Self {
            reply: Reply::Fail("not configured".into()),
            available: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of times `run` was called.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Analyzer for FixedAnalyzer {
    fn available(&self) -> bool {
        self.available
    }

    async fn run(&self, request: Value) -> Result<Value, AnalyzerError> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request);
        }
        match &self.reply {
            Reply::Value(v) => Ok(v.clone()),
            Reply::Fail(message) => Err(AnalyzerError::Provider {
                attempts: 1,
                message: message.clone(),
            }),
        }
    }
}
