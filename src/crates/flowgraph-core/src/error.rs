//! Error types and error handling for graph operations
//!
//! This module defines every error that can occur while building a graph or
//! running it. All errors implement `std::error::Error` via the `thiserror`
//! crate.
//!
//! # Error Hierarchy
//!
//! ```text
//! GraphError
//! ├── Validation           - Graph structure errors (build time only)
//! ├── NodeExecution        - A node returned an error
//! ├── NodePanicked         - A node panicked; caught and normalized
//! ├── RetryExhausted       - Retry ceiling reached, carries the last error
//! ├── BranchFailed         - A parallel branch failed under fail-fast
//! ├── Interrupted          - Pause signal for human input (not a failure)
//! ├── CheckpointNotFound   - resume() with an unknown checkpoint id
//! ├── Checkpoint           - Persistence errors
//! ├── InvalidHumanResponse - Response does not answer the pending question
//! ├── StepLimitExceeded    - Run executed more nodes than allowed
//! ├── Timeout              - Node exceeded its time budget
//! ├── Cancelled            - Work cancelled before completion
//! ├── State                - Missing or malformed run state
//! ├── Configuration        - Invalid runner configuration
//! └── Serialization / Io   - Wrapped library errors
//! ```
//!
//! # Where errors surface
//!
//! Construction errors come out of [`GraphBuilder::build`](crate::GraphBuilder::build)
//! and never at run time. Errors raised while a node runs are first offered to
//! the middleware chain (`on_error`), which decides whether to retry, skip or
//! propagate. Only a propagated error (or retry exhaustion) fails the run, and
//! even then the caller receives the full [`RunReport`](crate::RunReport) with
//! the error attached.
//!
//! ```rust
//! use flowgraph_core::{GraphError, RunStatus};
//!
//! fn describe(err: &GraphError) -> String {
//!     match err {
//!         GraphError::RetryExhausted { node, attempts, .. } => {
//!             format!("'{}' gave up after {} attempts", node, attempts)
//!         }
//!         GraphError::Interrupted(interaction) => {
//!             format!("waiting for a human at '{}'", interaction.node_id)
//!         }
//!         other => other.to_string(),
//!     }
//! }
//! # let _ = RunStatus::Failed;
//! ```

use flowgraph_checkpoint::{CheckpointError, HumanInteraction};
use thiserror::Error;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur during graph construction and execution
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph validation error
    ///
    /// Returned by `GraphBuilder::build` when the structure is invalid:
    /// missing entry point, dangling edge endpoints, duplicate node ids,
    /// a merge node paired with an unknown parallel node.
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// Node execution error
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution { node: String, error: String },

    /// A node panicked while running
    #[error("Node '{node}' panicked: {message}")]
    NodePanicked { node: String, message: String },

    /// The retry ceiling was reached; `last_error` is the final failure
    #[error("Node '{node}' failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        node: String,
        attempts: u32,
        last_error: Box<GraphError>,
    },

    /// A branch of a fail-fast parallel node failed
    #[error("Branch '{branch}' of parallel node '{node}' failed: {error}")]
    BranchFailed {
        node: String,
        branch: String,
        error: String,
    },

    /// The run must pause until a human answers the interaction
    ///
    /// This is a control signal rather than a failure: the runner persists a
    /// checkpoint and returns a `Paused` report. It bypasses middleware
    /// `on_error`.
    #[error("Run paused at node '{}' awaiting human input", .0.node_id)]
    Interrupted(HumanInteraction),

    /// No checkpoint with the given id exists
    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// Checkpoint persistence error
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A human response does not answer the pending interaction
    #[error("Invalid human response: {0}")]
    InvalidHumanResponse(String),

    /// The run executed more nodes than `max_steps` allows
    #[error("Step limit of {max_steps} exceeded at node '{node}'")]
    StepLimitExceeded { node: String, max_steps: usize },

    /// Node exceeded its time budget
    #[error("Node '{node}' timed out after {duration_ms}ms")]
    Timeout { node: String, duration_ms: u64 },

    /// Work was cancelled before it completed
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Missing or malformed run state
    #[error("State error: {0}")]
    State(String),

    /// Invalid runner configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Create a node execution error
    ///
    /// ```rust
    /// use flowgraph_core::GraphError;
    ///
    /// let err = GraphError::node_execution("fetch", "upstream returned 503");
    /// assert_eq!(err.to_string(), "Node 'fetch' execution failed: upstream returned 503");
    /// ```
    pub fn node_execution(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.into(),
        }
    }

    /// Create a state error
    pub fn state(error: impl Into<String>) -> Self {
        Self::State(error.into())
    }

    /// Create a validation error
    pub fn validation(error: impl Into<String>) -> Self {
        Self::Validation(error.into())
    }

    /// Create a pause signal for the given interaction
    pub fn interrupted(interaction: HumanInteraction) -> Self {
        Self::Interrupted(interaction)
    }

    /// Whether this error is a pause signal rather than a failure
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
