//! LLM-backed analyzer: one capability bound to one provider.
//!
//! The request JSON becomes a system + user message pair; any base64 file
//! body in it is lifted out and sent as an image attachment. Prompt text
//! comes from [`crate::prompts`].
//!
//! ## Retries
//!
//! Each attempt is bounded by `api_timeout_secs`. Failed attempts back off
//! exponentially (`retry_backoff_ms * 2^(attempt-1)`): with the defaults of
//! 500 ms and 2 retries the waits are 500 ms then 1 s. The workflow only
//! sees the final outcome.

use super::{Analyzer, AnalyzerError, Capability};
use crate::config::WorkflowConfig;
use crate::pipeline::cleanup::strip_code_fences;
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Analyzer that asks an [`LLMProvider`] to answer a fixed instruction.
pub struct LlmAnalyzer {
    provider: Arc<dyn LLMProvider>,
    label: &'static str,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout: Duration,
}

impl std::fmt::Debug for LlmAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAnalyzer")
            .field("label", &self.label)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl LlmAnalyzer {
    /// Analyzer for `capability` using the prompts in [`crate::prompts`].
    pub fn for_capability(
        provider: Arc<dyn LLMProvider>,
        capability: Capability,
        config: &WorkflowConfig,
    ) -> Self {
        let temperature = if capability.is_vision() || capability == Capability::Ground {
            config.vision_temperature
        } else {
            config.text_temperature
        };
        Self {
            provider,
            label: capability.step_name(),
            system_prompt: prompts::system_prompt(capability, &config.target_language),
            temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout: config.api_timeout(),
        }
    }

    /// Wait before retry number `attempt` (1-based), saturating on overflow.
    fn backoff_ms(&self, attempt: u32) -> u64 {
        self.retry_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

/// Split a request into prompt text and an optional document attachment.
///
/// File payloads appear either at the top level (quality step) or under
/// `"file"` (later steps). The base64 body is lifted into an [`ImageData`]
/// and replaced by a marker so it is not sent twice.
fn build_messages(system_prompt: &str, request: &Value) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_prompt)];

    let mut context = request.clone();
    let nested = context.get("file").is_some_and(Value::is_object);
    let file = if nested {
        context.get_mut("file")
    } else if context.get("base64").is_some() {
        Some(&mut context)
    } else {
        None
    };

    let image = file.and_then(|f| {
        let mime = f
            .get("content_type")
            .and_then(Value::as_str)
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = f.get_mut("base64")?;
        let b64 = data.as_str()?.to_string();
        *data = Value::String("<attached>".into());
        Some(ImageData::new(b64, mime).with_detail("high"))
    });

    let text = match &context {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => format!("Document metadata and context:\n{other}"),
    };

    match image {
        Some(img) => messages.push(ChatMessage::user_with_images(&text, vec![img])),
        None => messages.push(ChatMessage::user(&text)),
    }
    messages
}

/// Parse the reply as JSON when it is JSON, otherwise keep it as text.
fn parse_reply(content: &str) -> Value {
    let body = strip_code_fences(content);
    match serde_json::from_str::<Value>(body.trim()) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => v,
        _ => Value::String(content.trim().to_string()),
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    async fn run(&self, request: Value) -> Result<Value, AnalyzerError> {
        let start = Instant::now();
        let messages = build_messages(&self.system_prompt, &request);
        let options = self.build_options();

        let mut last_err: Option<String> = None;
        let mut timeouts = 0u32;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.backoff_ms(attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    self.label, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match tokio::time::timeout(self.timeout, self.provider.chat(&messages, Some(&options)))
                .await
            {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        self.label,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(parse_reply(&response.content));
                }
                Ok(Err(e)) => {
                    let err_msg = format!("{}", e);
                    warn!("{}: attempt {} failed: {}", self.label, attempt.saturating_add(1), err_msg);
                    last_err = Some(err_msg);
                }
                Err(_) => {
                    warn!(
                        "{}: attempt {} timed out after {}s",
                        self.label,
                        attempt.saturating_add(1),
                        self.timeout.as_secs()
                    );
                    timeouts += 1;
                }
            }
        }

        let attempts = self.max_retries.saturating_add(1);
        match last_err {
            Some(message) => Err(AnalyzerError::Provider { attempts, message }),
            None if timeouts > 0 => Err(AnalyzerError::Timeout {
                secs: self.timeout.as_secs(),
            }),
            None => Err(AnalyzerError::Provider {
                attempts,
                message: "Unknown error".to_string(),
            }),
        }
    }
}
