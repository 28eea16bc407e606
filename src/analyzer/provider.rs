//! LLM provider resolution for the text and vision analyzers.
//!
//! Both resolvers walk a fallback chain from most- to least-specific so
//! library users and CLI users each set only what they need:
//!
//! 1. **Pre-built provider** in the config: used as-is.
//! 2. **Named provider** (+ optional model): built with
//!    [`ProviderFactory::create_llm_provider`], which reads the matching API
//!    key from the environment.
//! 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
//! 4. Text only: **full auto-detection** via [`ProviderFactory::from_env`].
//!
//! The vision chain stops at a Gemini default instead of auto-detecting, so a
//! text-only key (say an Ollama endpoint) never gets handed document images.

use crate::config::{WorkflowConfig, DEFAULT_VISION_PROVIDER};
use crate::error::DocflowError;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;

/// Default text model when a provider is named without one.
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4.1-nano";

/// Instantiate a named provider with the given model.
pub fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DocflowError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocflowError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set and non-empty.
fn env_pair() -> Option<(String, String)> {
    match (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        (Ok(p), Ok(m)) if !p.is_empty() && !m.is_empty() => Some((p, m)),
        _ => None,
    }
}

/// Provider for summarize, translate and ground.
pub fn resolve_text_provider(
    config: &WorkflowConfig,
) -> Result<Arc<dyn LLMProvider>, DocflowError> {
    if let Some(ref provider) = config.text_provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.text_provider_name {
        let model = config.text_model.as_deref().unwrap_or(DEFAULT_TEXT_MODEL);
        return create_provider(name, model);
    }

    if let Some((prov, model)) = env_pair() {
        return create_provider(&prov, &model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocflowError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Provider for the four document-image steps.
pub fn resolve_vision_provider(
    config: &WorkflowConfig,
) -> Result<Arc<dyn LLMProvider>, DocflowError> {
    if let Some(ref provider) = config.vision_provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.vision_provider_name {
        return create_provider(name, &config.resolved_vision_model());
    }

    if let Some((prov, model)) = env_pair() {
        return create_provider(&prov, &model);
    }

    create_provider(DEFAULT_VISION_PROVIDER, &config.resolved_vision_model())
}
