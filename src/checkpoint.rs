//! Run checkpoints: persist the run state after every node.
//!
//! A [`Checkpoint`] records the state as it stood after a node finished and
//! the node that would run next (`None` once the run has terminated).
//! [`crate::Workflow::resume`] restarts a run at that node. A node that was
//! interrupted mid-call is simply re-run from its start.

use crate::error::DocflowError;
use crate::pipeline::graph::Node;
use crate::state::RunState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Snapshot of a run between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    /// Node to run on resume. `None` when the run is finished.
    pub next_node: Option<Node>,
    pub state: RunState,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(run_id: impl Into<String>, next_node: Option<Node>, state: RunState) -> Self {
        Self {
            run_id: run_id.into(),
            next_node,
            state,
            saved_at: Utc::now(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.next_node.is_none()
    }
}

/// Storage for checkpoints, keyed by run id. Later saves replace earlier ones.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), DocflowError>;

    /// The latest checkpoint for `run_id`, or `None` if there is none.
    async fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, DocflowError>;

    /// Remove a run's checkpoint. Returns whether one existed.
    async fn remove(&self, run_id: &str) -> Result<bool, DocflowError>;
}

// ── In-memory ────────────────────────────────────────────────────────────

/// Process-local store, shared between concurrent runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: DashMap<String, Checkpoint>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), DocflowError> {
        self.entries
            .insert(checkpoint.run_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, DocflowError> {
        Ok(self.entries.get(run_id).map(|c| c.value().clone()))
    }

    async fn remove(&self, run_id: &str) -> Result<bool, DocflowError> {
        Ok(self.entries.remove(run_id).is_some())
    }
}

// ── On disk ──────────────────────────────────────────────────────────────

/// One pretty-printed JSON file per run: `<root>/<run_id>.json`.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Open (and create if needed) the directory at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, DocflowError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| DocflowError::CheckpointIo {
                path: root.clone(),
                source: e,
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, run_id: &str) -> Result<PathBuf, DocflowError> {
        if !is_valid_run_id(run_id) {
            return Err(DocflowError::InvalidConfig(format!(
                "run id {run_id:?} may only contain letters, digits, '-', '_' and '.'"
            )));
        }
        Ok(self.root.join(format!("{run_id}.json")))
    }
}

/// Run ids become file names, so path separators and `..` are rejected.
fn is_valid_run_id(run_id: &str) -> bool {
    !run_id.is_empty()
        && !run_id.starts_with('.')
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), DocflowError> {
        let path = self.path_for(&checkpoint.run_id)?;
        let body =
            serde_json::to_vec_pretty(checkpoint).map_err(|e| DocflowError::Serialization {
                path: path.clone(),
                source: e,
            })?;

        // Write to a sibling temp file, then rename over the target.
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &body)
            .await
            .map_err(|e| DocflowError::CheckpointIo {
                path: tmp_path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| DocflowError::CheckpointIo {
                path: path.clone(),
                source: e,
            })?;

        debug!(
            "Checkpoint {} saved (next: {:?})",
            checkpoint.run_id, checkpoint.next_node
        );
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, DocflowError> {
        let path = self.path_for(run_id)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DocflowError::CheckpointIo { path, source: e }),
        };
        let checkpoint =
            serde_json::from_slice(&raw).map_err(|e| DocflowError::Serialization { path, source: e })?;
        Ok(Some(checkpoint))
    }

    async fn remove(&self, run_id: &str) -> Result<bool, DocflowError> {
        let path = self.path_for(run_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DocflowError::CheckpointIo { path, source: e }),
        }
    }
}
