//! File pipeline nodes: quality → enhance → preprocess → extract → ground.
//!
//! Every node follows the same order of checks, and only the first failure
//! is recorded:
//!
//! 1. resolve the upload (`No file reference found` / `Uploaded file not found`)
//! 2. resolve the analyzer (`Vertex AI credentials not configured for …`)
//! 3. invoke it (`<Step> failed: <detail>`)
//!
//! A recorded failure lands in `file_errors`, the node emits `Completed` and
//! the router sends the run to ERROR. On success the node writes its field
//! and emits the label of the step that follows.

use super::graph::{route_after, Edge};
use super::{normalize, route, StepContext};
use crate::analyzer::{Analyzer, Capability};
use crate::error::{DocflowError, StepError};
use crate::state::{FileRef, LlmStatus, RunState};
use crate::upload::StoredUpload;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Record `error`, mark the run finished and route to ERROR.
async fn fail(ctx: &StepContext<'_>, state: &mut RunState, error: StepError) -> Edge {
    warn!(run_id = %ctx.emitter.run_id(), "{}", error);
    state.file_errors.push(error.to_string());
    ctx.emitter.emit(state, LlmStatus::Completed).await;
    route_after(state)
}

/// Write-back and status after a successful node.
async fn advance(ctx: &StepContext<'_>, state: &mut RunState, next: LlmStatus) -> Edge {
    ctx.emitter.emit(state, next).await;
    route_after(state)
}

async fn load_upload(
    ctx: &StepContext<'_>,
    file_ref: Option<&FileRef>,
) -> Result<StoredUpload, StepError> {
    let file_ref = file_ref.ok_or(StepError::MissingInput)?;
    ctx.uploads
        .load(&file_ref.file_id)
        .await
        .map_err(|e| match e {
            DocflowError::UploadNotFound { .. } => StepError::ResourceNotFound,
            other => {
                warn!("Reading upload {} failed: {}", file_ref.file_id, other);
                StepError::ResourceNotFound
            }
        })
}

fn analyzer_for(
    ctx: &StepContext<'_>,
    capability: Capability,
) -> Result<Arc<dyn Analyzer>, StepError> {
    ctx.analyzers
        .get(capability)
        .ok_or_else(|| StepError::CapabilityUnavailable {
            purpose: capability.purpose().to_string(),
        })
}

async fn invoke(
    analyzer: &dyn Analyzer,
    capability: Capability,
    request: Value,
) -> Result<Value, StepError> {
    analyzer
        .run(request)
        .await
        .map_err(|e| StepError::CapabilityInvocationFailure {
            step: capability.step_name().to_string(),
            detail: e.to_string(),
        })
}

/// Prior step output as JSON, `null` when absent.
fn prior<T: Serialize>(value: &Option<T>) -> Value {
    value
        .as_ref()
        .and_then(|v| serde_json::to_value(v).ok())
        .unwrap_or(Value::Null)
}

/// Load the upload, then call `capability` with the payload built from it.
async fn run_file_step(
    ctx: &StepContext<'_>,
    state: &RunState,
    capability: Capability,
    build: impl FnOnce(Value, &RunState) -> Value,
) -> Result<Value, StepError> {
    let upload = load_upload(ctx, state.file_ref.as_ref()).await?;
    let analyzer = analyzer_for(ctx, capability)?;
    let request = build(upload.to_payload(), state);
    invoke(analyzer.as_ref(), capability, request).await
}

// ── Nodes ────────────────────────────────────────────────────────────────

/// Assess scan quality. Also pins `file_ref` for the rest of the run.
pub async fn quality(ctx: &StepContext<'_>, state: &mut RunState) -> Edge {
    ctx.emitter.emit(state, LlmStatus::Processing).await;
    ctx.emitter.emit(state, LlmStatus::Assessing).await;

    let Some(file_ref) = route::file_reference(state) else {
        return fail(ctx, state, StepError::MissingInput).await;
    };
    state.file_ref = Some(file_ref.clone());

    let upload = match load_upload(ctx, Some(&file_ref)).await {
        Ok(upload) => upload,
        Err(e) => return fail(ctx, state, e).await,
    };
    info!(
        "Processing upload {} ({}, {} bytes)",
        upload.record.file_id, upload.record.content_type, upload.record.size
    );
    state.file_ref = Some(FileRef {
        file_id: upload.record.file_id.clone(),
        filename: Some(upload.record.filename.clone()),
        content_type: Some(upload.record.content_type.clone()),
        size: Some(upload.record.size),
    });

    let analyzer = match analyzer_for(ctx, Capability::Quality) {
        Ok(a) => a,
        Err(e) => return fail(ctx, state, e).await,
    };
    match invoke(analyzer.as_ref(), Capability::Quality, upload.to_payload()).await {
        Ok(reply) => {
            state.file_quality = Some(normalize::quality(reply));
            advance(ctx, state, LlmStatus::Enhancing).await
        }
        Err(e) => fail(ctx, state, e).await,
    }
}

pub async fn enhance(ctx: &StepContext<'_>, state: &mut RunState) -> Edge {
    let outcome = run_file_step(ctx, state, Capability::Enhance, |file, s| {
        json!({ "file": file, "quality": prior(&s.file_quality) })
    })
    .await;
    match outcome {
        Ok(reply) => {
            state.enhanced_data = Some(normalize::enhancement(reply));
            advance(ctx, state, LlmStatus::Preprocessing).await
        }
        Err(e) => fail(ctx, state, e).await,
    }
}

pub async fn preprocess(ctx: &StepContext<'_>, state: &mut RunState) -> Edge {
    let outcome = run_file_step(ctx, state, Capability::Preprocess, |file, s| {
        json!({ "file": file, "enhancement": prior(&s.enhanced_data) })
    })
    .await;
    match outcome {
        Ok(reply) => {
            state.preprocess_data = Some(normalize::preprocess(reply));
            advance(ctx, state, LlmStatus::Extracting).await
        }
        Err(e) => fail(ctx, state, e).await,
    }
}

pub async fn extract(ctx: &StepContext<'_>, state: &mut RunState) -> Edge {
    let outcome = run_file_step(ctx, state, Capability::Extract, |file, s| {
        json!({
            "file": file,
            "preprocess": prior(&s.preprocess_data),
            "enhancement": prior(&s.enhanced_data),
        })
    })
    .await;
    match outcome {
        Ok(reply) => {
            state.extracted_data = Some(normalize::extraction(reply));
            advance(ctx, state, LlmStatus::Grounding).await
        }
        Err(e) => fail(ctx, state, e).await,
    }
}

/// Ground the extracted text.
///
/// Without a configured grounder the extraction passes through unchanged,
/// with a note, and no error is recorded.
pub async fn ground(ctx: &StepContext<'_>, state: &mut RunState) -> Edge {
    let raw_text = state
        .extracted_data
        .as_ref()
        .map(|x| x.raw_text.clone())
        .unwrap_or_default();

    let grounded = match analyzer_for(ctx, Capability::Ground) {
        Err(e) => {
            warn!("{}; passing extracted text through", e);
            normalize::ungrounded(&raw_text, normalize::UNGROUNDED_NOTE)
        }
        Ok(analyzer) => {
            match invoke(analyzer.as_ref(), Capability::Ground, Value::String(raw_text.clone()))
                .await
            {
                Ok(reply) => normalize::grounding(reply, &raw_text),
                Err(e) => return fail(ctx, state, e).await,
            }
        }
    };

    state.grounded_data = Some(grounded);
    advance(ctx, state, LlmStatus::Completed).await
}
