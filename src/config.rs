//! Configuration types for workflow runs.
//!
//! All run behaviour is controlled through [`WorkflowConfig`], built via its
//! [`WorkflowConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across concurrent runs and to log exactly what a
//! given run was started with.

use crate::error::DocflowError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default vision model when neither the config nor `GEMINI_MODEL` names one.
pub const DEFAULT_VISION_MODEL: &str = "gemini-2.5-flash";

/// Default vision provider for the file pipeline analyzers.
pub const DEFAULT_VISION_PROVIDER: &str = "gemini";

/// Configuration for a workflow.
///
/// Built via [`WorkflowConfig::builder()`] or using
/// [`WorkflowConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docflow::WorkflowConfig;
///
/// let config = WorkflowConfig::builder()
///     .status_pacing_ms(0)
///     .target_language("French")
///     .build()
///     .unwrap();
/// assert_eq!(config.target_language, "French");
/// ```
#[derive(Clone)]
pub struct WorkflowConfig {
    /// Minimum pause after each status emission, in milliseconds. Default: 500.
    ///
    /// Gives a slow consumer time to render each status before the next one
    /// arrives. Ordering never depends on it; set 0 in tests.
    pub status_pacing_ms: u64,

    /// Capacity of the per-run status channel. Default: 64.
    pub event_buffer: usize,

    /// Characters of input kept when the summarizer fails. Default: 300.
    pub summary_fallback_chars: usize,

    /// Language the translate step targets. Default: "Hindi".
    pub target_language: String,

    /// Provider name for the text pipeline (e.g. "openai", "ollama").
    pub text_provider_name: Option<String>,

    /// Model for the text pipeline. If None, uses provider default.
    pub text_model: Option<String>,

    /// Pre-constructed text provider. Takes precedence over `text_provider_name`.
    pub text_provider: Option<Arc<dyn LLMProvider>>,

    /// Provider name for the file pipeline. Default: "gemini".
    pub vision_provider_name: Option<String>,

    /// Model for the file pipeline. Falls back to `GEMINI_MODEL`, then
    /// [`DEFAULT_VISION_MODEL`].
    pub vision_model: Option<String>,

    /// Pre-constructed vision provider. Takes precedence over `vision_provider_name`.
    pub vision_provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for summarize/translate. Default: 0.0.
    pub text_temperature: f32,

    /// Sampling temperature for the file analyzers. Default: 0.2.
    pub vision_temperature: f32,

    /// Maximum tokens an analyzer may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a failed analyzer call. Default: 2.
    ///
    /// Retries belong to the analyzer; the workflow only sees the final
    /// success or failure.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-analyzer-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            status_pacing_ms: 500,
            event_buffer: 64,
            summary_fallback_chars: 300,
            target_language: "Hindi".to_string(),
            text_provider_name: None,
            text_model: None,
            text_provider: None,
            vision_provider_name: None,
            vision_model: None,
            vision_provider: None,
            text_temperature: 0.0,
            vision_temperature: 0.2,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("status_pacing_ms", &self.status_pacing_ms)
            .field("event_buffer", &self.event_buffer)
            .field("summary_fallback_chars", &self.summary_fallback_chars)
            .field("target_language", &self.target_language)
            .field("text_provider_name", &self.text_provider_name)
            .field("text_model", &self.text_model)
            .field("text_provider", &self.text_provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("vision_provider_name", &self.vision_provider_name)
            .field("vision_model", &self.vision_model)
            .field("vision_provider", &self.vision_provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("text_temperature", &self.text_temperature)
            .field("vision_temperature", &self.vision_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl WorkflowConfig {
    /// Create a new builder for `WorkflowConfig`.
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder {
            config: Self::default(),
        }
    }

    /// Pause applied after each status emission.
    pub fn status_pacing(&self) -> Duration {
        Duration::from_millis(self.status_pacing_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Vision model after applying the `GEMINI_MODEL` fallback.
    pub fn resolved_vision_model(&self) -> String {
        self.vision_model
            .clone()
            .or_else(|| std::env::var("GEMINI_MODEL").ok().filter(|m| !m.is_empty()))
            .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string())
    }
}

/// Builder for [`WorkflowConfig`].
#[derive(Debug)]
pub struct WorkflowConfigBuilder {
    config: WorkflowConfig,
}

impl WorkflowConfigBuilder {
    pub fn status_pacing_ms(mut self, ms: u64) -> Self {
        self.config.status_pacing_ms = ms;
        self
    }

    pub fn event_buffer(mut self, n: usize) -> Self {
        self.config.event_buffer = n.max(1);
        self
    }

    pub fn summary_fallback_chars(mut self, n: usize) -> Self {
        self.config.summary_fallback_chars = n;
        self
    }

    pub fn target_language(mut self, language: impl Into<String>) -> Self {
        self.config.target_language = language.into();
        self
    }

    pub fn text_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.text_provider_name = Some(name.into());
        self
    }

    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.config.text_model = Some(model.into());
        self
    }

    pub fn text_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.text_provider = Some(provider);
        self
    }

    pub fn vision_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.vision_provider_name = Some(name.into());
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = Some(model.into());
        self
    }

    pub fn vision_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.vision_provider = Some(provider);
        self
    }

    pub fn text_temperature(mut self, t: f32) -> Self {
        self.config.text_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn vision_temperature(mut self, t: f32) -> Self {
        self.config.vision_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkflowConfig, DocflowError> {
        let c = &self.config;
        if c.target_language.trim().is_empty() {
            return Err(DocflowError::InvalidConfig(
                "Target language must not be empty".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocflowError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(DocflowError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
