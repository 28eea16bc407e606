//! Workflow executor: drive a run from its entry node to termination.
//!
//! [`Workflow`] owns the long-lived collaborators (analyzers, upload store,
//! optional checkpoint store, configuration). Each call to
//! [`Workflow::execute`] creates a fresh per-run [`StepContext`] and
//! [`StatusEmitter`], so concurrent runs share nothing mutable.
//!
//! ## Streaming
//!
//! [`Workflow::execute_stream`] spawns the run on the tokio runtime and
//! hands back the event stream plus the task handle. Dropping the stream
//! does not cancel the run: the task keeps going and its remaining events
//! are discarded.

use super::graph::{self, Node};
use super::{file, route, text, StepContext};
use crate::analyzer::AnalyzerSet;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::WorkflowConfig;
use crate::error::DocflowError;
use crate::state::RunState;
use crate::status::{StatusEmitter, StatusEvent};
use crate::upload::UploadResolver;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Status events of one run, in emission order.
pub type StatusStream = ReceiverStream<StatusEvent>;

/// The document workflow: both pipelines plus their collaborators.
#[derive(Clone)]
pub struct Workflow {
    analyzers: AnalyzerSet,
    uploads: Arc<dyn UploadResolver>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    config: WorkflowConfig,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("analyzers", &self.analyzers)
            .field("checkpoints", &self.checkpoints.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Workflow {
    pub fn new(
        analyzers: AnalyzerSet,
        uploads: Arc<dyn UploadResolver>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            analyzers,
            uploads,
            checkpoints: None,
            config,
        }
    }

    /// Build LLM-backed analyzers from `config` (see [`AnalyzerSet::from_config`]).
    pub fn from_config(config: WorkflowConfig, uploads: Arc<dyn UploadResolver>) -> Self {
        let analyzers = AnalyzerSet::from_config(&config);
        Self::new(analyzers, uploads, config)
    }

    /// Save a checkpoint after every node.
    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// A fresh run id.
    pub fn new_run_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Run to termination without a status subscriber.
    ///
    /// Never fails: step failures are recorded in the returned state
    /// (`file_errors`) or replaced by fallbacks.
    pub async fn execute(&self, initial: RunState, run_id: &str) -> RunState {
        let emitter = StatusEmitter::new(run_id, None, self.config.status_pacing());
        let entry = route::route(&initial);
        self.drive(Some(entry), initial, &emitter).await
    }

    /// Run to termination, publishing every status transition on `events`.
    pub async fn execute_with_events(
        &self,
        initial: RunState,
        run_id: &str,
        events: mpsc::Sender<StatusEvent>,
    ) -> RunState {
        let emitter = StatusEmitter::new(run_id, Some(events), self.config.status_pacing());
        let entry = route::route(&initial);
        self.drive(Some(entry), initial, &emitter).await
    }

    /// Spawn the run and return its event stream and task handle.
    pub fn execute_stream(
        &self,
        initial: RunState,
        run_id: impl Into<String>,
    ) -> (StatusStream, JoinHandle<RunState>) {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let workflow = self.clone();
        let run_id = run_id.into();
        let handle = tokio::spawn(async move {
            workflow.execute_with_events(initial, &run_id, tx).await
        });
        (ReceiverStream::new(rx), handle)
    }

    /// Continue a checkpointed run from the node after its last completed one.
    ///
    /// A run whose checkpoint says it already finished is returned as stored.
    pub async fn resume(&self, run_id: &str) -> Result<RunState, DocflowError> {
        self.resume_inner(run_id, None).await
    }

    /// [`Workflow::resume`] with a status subscriber.
    pub async fn resume_with_events(
        &self,
        run_id: &str,
        events: mpsc::Sender<StatusEvent>,
    ) -> Result<RunState, DocflowError> {
        self.resume_inner(run_id, Some(events)).await
    }

    async fn resume_inner(
        &self,
        run_id: &str,
        events: Option<mpsc::Sender<StatusEvent>>,
    ) -> Result<RunState, DocflowError> {
        let store = self.checkpoints.as_ref().ok_or_else(|| {
            DocflowError::InvalidConfig("resume requires a checkpoint store".to_string())
        })?;
        let checkpoint = store
            .load(run_id)
            .await?
            .ok_or_else(|| DocflowError::CheckpointNotFound {
                run_id: run_id.to_string(),
            })?;

        if checkpoint.is_finished() {
            info!("Run {} already finished; nothing to resume", run_id);
            return Ok(checkpoint.state);
        }

        info!("Resuming run {} at {:?}", run_id, checkpoint.next_node);
        let emitter = StatusEmitter::new(run_id, events, self.config.status_pacing());
        Ok(self
            .drive(checkpoint.next_node, checkpoint.state, &emitter)
            .await)
    }

    async fn step(&self, node: Node, ctx: &StepContext<'_>, state: &mut RunState) -> graph::Edge {
        match node {
            Node::Summarize => text::summarize(ctx, state).await,
            Node::Translate => text::translate(ctx, state).await,
            Node::Count => text::count(ctx, state).await,
            Node::Quality => file::quality(ctx, state).await,
            Node::Enhance => file::enhance(ctx, state).await,
            Node::Preprocess => file::preprocess(ctx, state).await,
            Node::Extract => file::extract(ctx, state).await,
            Node::Ground => file::ground(ctx, state).await,
        }
    }

    async fn drive(
        &self,
        start: Option<Node>,
        mut state: RunState,
        emitter: &StatusEmitter,
    ) -> RunState {
        let run_id = emitter.run_id();
        let started = Instant::now();
        info!(run_id, entry = ?start, "Run started");

        let ctx = StepContext {
            analyzers: &self.analyzers,
            uploads: self.uploads.as_ref(),
            emitter,
            config: &self.config,
        };

        let mut current = start;
        while let Some(node) = current {
            debug!(run_id, %node, "Entering node");
            let edge = self.step(node, &ctx, &mut state).await;
            current = graph::next(node, edge);
            debug!(run_id, %node, ?edge, next = ?current, "Node finished");
            self.checkpoint(run_id, current, &state).await;
        }

        info!(
            run_id,
            errors = state.file_errors.len(),
            "Run finished in {:.2}s",
            started.elapsed().as_secs_f64()
        );
        state
    }

    async fn checkpoint(&self, run_id: &str, next: Option<Node>, state: &RunState) {
        let Some(store) = self.checkpoints.as_ref() else {
            return;
        };
        let checkpoint = Checkpoint::new(run_id, next, state.clone());
        if let Err(e) = store.save(&checkpoint).await {
            warn!(run_id, "Checkpoint not saved: {}", e);
        }
    }
}
