//! Step status emitter: publish per-step status labels for a run.
//!
//! Each run gets its own bounded `tokio::sync::mpsc` channel. A node calls
//! [`StatusEmitter::emit`], which stamps the label into
//! [`RunState::llm_status`], sends a [`StatusEvent`] carrying a full state
//! snapshot and then pauses for the configured pacing interval.
//!
//! # Ordering
//!
//! `emit` awaits the send, so an event is in the channel before the node
//! continues and events arrive in emission order. The pacing pause is only a
//! courtesy for slow renderers (a UI that wants to show each word); consumers
//! must rely on ordering, never on wall-clock spacing.
//!
//! # Cancellation
//!
//! Dropping the receiver does **not** stop the run. Sends to a closed channel
//! are ignored and the run continues to completion.

use crate::state::{LlmStatus, RunState};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// One status transition, as seen by a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub run_id: String,
    pub llm_status: LlmStatus,
    /// Snapshot of the run state at the moment of emission; its
    /// `llm_status` equals the field above.
    pub state: RunState,
}

/// Publishes status events for a single run.
#[derive(Debug, Clone)]
pub struct StatusEmitter {
    run_id: String,
    sender: Option<mpsc::Sender<StatusEvent>>,
    pacing: Duration,
}

impl StatusEmitter {
    pub fn new(
        run_id: impl Into<String>,
        sender: Option<mpsc::Sender<StatusEvent>>,
        pacing: Duration,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            sender,
            pacing,
        }
    }

    /// An emitter with no subscriber. Emission only updates `llm_status`.
    pub fn detached(run_id: impl Into<String>) -> Self {
        Self::new(run_id, None, Duration::ZERO)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Record `status` on the state and publish a snapshot.
    pub async fn emit(&self, state: &mut RunState, status: LlmStatus) {
        state.llm_status = Some(status);

        let Some(tx) = self.sender.as_ref() else {
            return;
        };

        let event = StatusEvent {
            run_id: self.run_id.clone(),
            llm_status: status,
            state: state.clone(),
        };

        debug!(run_id = %self.run_id, %status, "emitting status");
        if tx.send(event).await.is_err() {
            debug!(run_id = %self.run_id, %status, "status subscriber gone; continuing run");
            return;
        }

        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }
}
