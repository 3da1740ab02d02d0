//! Run outcome reporting
//!
//! Every run, whether it succeeds, fails or pauses, returns a [`RunReport`].
//! Failures are reported, not thrown: the report carries the error together
//! with everything the run produced up to that point.

use flowgraph_checkpoint::HumanInteraction;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::GraphError;

/// Terminal status of a run invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    /// Waiting for human input; continue with `resume_with_human_response`
    Paused,
}

/// Outcome of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Success,
    Failed,
    Skipped,
}

/// Execution record of one node, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecutionReport {
    pub node_id: String,
    pub status: NodeStatus,
    pub output: Value,
    pub duration_ms: u64,
    /// Number of invocations, including retries
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a run invocation produced
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub graph_id: String,
    pub status: RunStatus,

    /// Data of the last node on success, the pending interaction when paused
    pub result: Value,

    pub node_reports: Vec<NodeExecutionReport>,

    /// Checkpoint to resume from, when one was written
    pub checkpoint_id: Option<String>,

    pub error: Option<GraphError>,

    /// Final run state
    pub state: HashMap<String, Value>,

    /// Accumulated run metadata
    pub metadata: HashMap<String, Value>,

    /// Wall time of this invocation
    pub duration_ms: u64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    pub fn is_paused(&self) -> bool {
        self.status == RunStatus::Paused
    }

    /// The interaction a paused run is waiting on
    pub fn pending_interaction(&self) -> Option<HumanInteraction> {
        if !self.is_paused() {
            return None;
        }
        serde_json::from_value(self.result.clone()).ok()
    }

    /// Report of the most recent execution of `node_id`
    pub fn node_report(&self, node_id: &str) -> Option<&NodeExecutionReport> {
        self.node_reports.iter().rev().find(|r| r.node_id == node_id)
    }

    /// Ids of executed nodes, in order
    pub fn executed_nodes(&self) -> Vec<&str> {
        self.node_reports.iter().map(|r| r.node_id.as_str()).collect()
    }
}
