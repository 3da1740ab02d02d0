//! Middleware chain around node execution
//!
//! Middleware wraps every node call of a run and decides what happens when a
//! node fails. Registration order matters: the first middleware registered on
//! the graph is the outermost layer of the call chain and the first one asked
//! about an error.
//!
//! ```text
//!   runner ──► logging.on_node ──► timeout.on_node ──► Node::run
//!                                                          │
//!   runner ◄── logging (after) ◄── timeout (after) ◄───────┘
//!
//!   on failure:  logging.on_error → None
//!                retry.on_error   → Some(Retry)   ← first Some wins
//!                skip.on_error      (not asked)
//! ```
//!
//! # Hooks
//!
//! | Hook | Purpose | Default |
//! |------|---------|---------|
//! | `on_node` | wrap the call, may short-circuit | call `next` |
//! | `on_error` | choose an [`ErrorAction`] | `None` |
//! | `on_run_start` | observe run start | no-op |
//! | `on_run_end` | observe the final report | no-op |
//!
//! When every middleware answers `None` the error propagates. Pause signals
//! (`GraphError::Interrupted`) are never offered to `on_error`.
//!
//! # Writing a middleware
//!
//! ```rust
//! use async_trait::async_trait;
//! use flowgraph_core::middleware::{Middleware, Next, NodeRequest};
//! use flowgraph_core::{NodeResult, Result};
//! use serde_json::json;
//!
//! /// Tags every node result with the node that produced it
//! struct Provenance;
//!
//! #[async_trait]
//! impl Middleware for Provenance {
//!     fn name(&self) -> &str {
//!         "provenance"
//!     }
//!
//!     async fn on_node<'a>(&self, request: NodeRequest<'a>, next: Next<'a>) -> Result<NodeResult> {
//!         let node = request.node_id.to_string();
//!         let result = next.run(request).await?;
//!         Ok(result.with_metadata("produced_by", json!(node)))
//!     }
//! }
//! ```

mod logging;
mod retry;
mod skip;
mod timeout;

pub use logging::LoggingMiddleware;
pub use retry::RetryMiddleware;
pub use skip::SkipMiddleware;
pub use timeout::TimeoutMiddleware;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::node::Node;
use crate::node_result::NodeResult;
use crate::report::RunReport;
use crate::state::NodeContext;

/// What the runner does with a failed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorAction {
    /// Invoke the same node again
    Retry,
    /// Record the node as skipped and continue with an empty result
    Skip,
    /// Fail the run
    Propagate,
}

impl ErrorAction {
    /// Alias of [`ErrorAction::Skip`]
    pub const CONTINUE: ErrorAction = ErrorAction::Skip;
}

/// Where a failure happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub run_id: String,
    pub graph_id: String,
    pub node_id: String,
    /// 1-based number of the attempt that failed
    pub attempt: u32,
    /// Retries the runner allows per node
    pub max_retries: u32,
}

impl ErrorContext {
    /// Whether a `Retry` answer would still be honored
    pub fn retries_left(&self) -> bool {
        self.attempt <= self.max_retries
    }
}

/// Identity of a run invocation, passed to the run lifecycle hooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub run_id: String,
    pub graph_id: String,
    /// Node this invocation starts at
    pub start_node: String,
    /// Whether this invocation continues from a checkpoint
    pub resumed: bool,
}

/// One node invocation travelling down the chain
pub struct NodeRequest<'a> {
    pub node_id: &'a str,
    /// 1-based attempt number
    pub attempt: u32,
    pub ctx: &'a mut NodeContext,
}

/// The remainder of the chain, ending in the node itself
pub struct Next<'a> {
    node: &'a dyn Node,
    chain: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(node: &'a dyn Node, chain: &'a [Arc<dyn Middleware>]) -> Self {
        Self { node, chain }
    }

    /// Pass the request to the next middleware, or to the node
    pub fn run(self, request: NodeRequest<'a>) -> BoxFuture<'a, Result<NodeResult>> {
        match self.chain.split_first() {
            Some((head, rest)) => head.on_node(request, Next::new(self.node, rest)),
            None => self.node.run(request.ctx),
        }
    }
}

/// Hooks around node execution and run lifecycle
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str {
        "middleware"
    }

    /// Wrap a node call
    async fn on_node<'a>(&self, request: NodeRequest<'a>, next: Next<'a>) -> Result<NodeResult> {
        next.run(request).await
    }

    /// Decide what to do with a failed node; `None` defers to the next middleware
    async fn on_error(&self, _error: &GraphError, _ctx: &ErrorContext) -> Option<ErrorAction> {
        None
    }

    async fn on_run_start(&self, _info: &RunInfo) {}

    async fn on_run_end(&self, _info: &RunInfo, _report: &RunReport) {}
}

/// Ask the chain what to do with `error`; the first answer wins
pub(crate) async fn decide(
    chain: &[Arc<dyn Middleware>],
    error: &GraphError,
    ctx: &ErrorContext,
) -> ErrorAction {
    for middleware in chain {
        if let Some(action) = middleware.on_error(error, ctx).await {
            tracing::debug!(
                middleware = middleware.name(),
                node = %ctx.node_id,
                action = ?action,
                "Error action decided"
            );
            return action;
        }
    }
    ErrorAction::Propagate
}
