//! Checkpoint data model
//!
//! A [`Checkpoint`] is a snapshot of an in-flight run taken *before* a node
//! runs: `current_node_id` is the node that will execute first when the run is
//! resumed. It carries everything needed to rebuild the run's context:
//!
//! ```text
//! Checkpoint
//! ├── id / run_id / graph_id     - identity
//! ├── current_node_id            - where execution continues
//! ├── state + state_version      - the run's key/value store
//! ├── metadata                   - accumulated side-channel metadata
//! ├── external_context           - tenant/user supplied by the caller
//! ├── pending_interaction        - set when the run paused for a human
//! ├── steps_completed            - nodes completed so far in the run
//! └── reason / ts                - why and when it was written
//! ```
//!
//! Checkpoints are a recovery and pause mechanism, not history: the runner
//! keeps one active checkpoint per run and deletes it once the run succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::interaction::{ExternalContext, HumanInteraction};

/// Checkpoint ID type
pub type CheckpointId = String;

/// Why a checkpoint was written
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointReason {
    /// Periodic checkpoint after every N completed nodes
    Cadence,
    /// Written just before a failure was surfaced
    Error,
    /// Written when the run paused for human input
    Interrupt,
}

/// Snapshot of a run, positioned just before `current_node_id` executes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The version of the checkpoint format
    pub v: i32,

    /// Unique ID of this checkpoint
    pub id: CheckpointId,

    /// Run this checkpoint belongs to
    pub run_id: String,

    /// Graph the run executes
    pub graph_id: String,

    /// Node that runs first on resume
    pub current_node_id: String,

    /// Run state values at the time of the checkpoint
    pub state: HashMap<String, Value>,

    /// Write counter of the run state
    #[serde(default)]
    pub state_version: u64,

    /// Accumulated run metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_context: Option<ExternalContext>,

    /// Present when the run is paused waiting for a human
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_interaction: Option<HumanInteraction>,

    /// Number of nodes completed before this checkpoint
    #[serde(default)]
    pub steps_completed: usize,

    pub reason: CheckpointReason,

    pub ts: DateTime<Utc>,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const CURRENT_VERSION: i32 = 1;

    /// Create a new checkpoint with a fresh id and empty state
    pub fn new(
        run_id: impl Into<String>,
        graph_id: impl Into<String>,
        current_node_id: impl Into<String>,
        reason: CheckpointReason,
    ) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            graph_id: graph_id.into(),
            current_node_id: current_node_id.into(),
            state: HashMap::new(),
            state_version: 0,
            metadata: HashMap::new(),
            external_context: None,
            pending_interaction: None,
            steps_completed: 0,
            reason,
            ts: Utc::now(),
        }
    }

    /// Set the state snapshot and its version
    pub fn with_state(mut self, state: HashMap<String, Value>, version: u64) -> Self {
        self.state = state;
        self.state_version = version;
        self
    }

    /// Set the metadata snapshot
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_external_context(mut self, context: Option<ExternalContext>) -> Self {
        self.external_context = context;
        self
    }

    /// Mark this checkpoint as a pause point
    pub fn with_pending_interaction(mut self, interaction: HumanInteraction) -> Self {
        self.pending_interaction = Some(interaction);
        self
    }

    pub fn with_steps_completed(mut self, steps: usize) -> Self {
        self.steps_completed = steps;
        self
    }

    /// Whether the run is waiting for human input
    pub fn is_paused(&self) -> bool {
        self.pending_interaction.is_some()
    }
}
