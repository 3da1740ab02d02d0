//! The node abstraction
//!
//! A node is one unit of work in a graph. It receives the run's
//! [`NodeContext`] mutably, may read and write the shared state, and returns a
//! [`NodeResult`]. The id a node is registered under is not part of the node
//! itself; the runner exposes it as `ctx.node_id` while the node runs.
//!
//! # Function nodes
//!
//! Most compute steps are closures wrapped in a [`FunctionNode`]:
//!
//! ```rust
//! use flowgraph_core::{FunctionNode, NodeResult};
//! use serde_json::json;
//!
//! // async closure: box the future
//! let fetch = FunctionNode::new(|ctx| {
//!     Box::pin(async move {
//!         let query = ctx.input().cloned().unwrap_or_default();
//!         ctx.state.set("query", query.clone());
//!         Ok(NodeResult::new(json!({ "hits": [query] })))
//!     })
//! });
//!
//! // synchronous closure
//! let count = FunctionNode::sync(|ctx| {
//!     let n = ctx.state.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
//!     ctx.state.set("n", json!(n + 1));
//!     Ok(NodeResult::new(json!(n + 1)))
//! });
//! # let _ = (fetch, count);
//! ```

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::node_result::NodeResult;
use crate::state::NodeContext;

/// Node ID type
pub type NodeId = String;

/// Boxed future returned by node closures
pub type NodeFuture<'a> = BoxFuture<'a, Result<NodeResult>>;

/// A unit of work in a graph
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute the node against the run context
    async fn run(&self, ctx: &mut NodeContext) -> Result<NodeResult>;

    /// Short label for logs and reports
    fn kind(&self) -> &'static str {
        "custom"
    }

    /// For fan-in nodes, the id of the parallel node whose results they read
    fn merge_source(&self) -> Option<&str> {
        None
    }
}

type NodeFn = dyn for<'a> Fn(&'a mut NodeContext) -> NodeFuture<'a> + Send + Sync;

/// Node backed by a closure
#[derive(Clone)]
pub struct FunctionNode {
    func: Arc<NodeFn>,
}

impl FunctionNode {
    /// Wrap an async closure returning a boxed future
    pub fn new<F>(func: F) -> Self
    where
        F: for<'a> Fn(&'a mut NodeContext) -> NodeFuture<'a> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Wrap a synchronous closure
    pub fn sync<F>(func: F) -> Self
    where
        F: Fn(&mut NodeContext) -> Result<NodeResult> + Send + Sync + 'static,
    {
        Self::new(move |ctx| {
            let result = func(ctx);
            Box::pin(async move { result })
        })
    }
}

impl fmt::Debug for FunctionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionNode").finish_non_exhaustive()
    }
}

#[async_trait]
impl Node for FunctionNode {
    async fn run(&self, ctx: &mut NodeContext) -> Result<NodeResult> {
        (self.func)(ctx).await
    }

    fn kind(&self) -> &'static str {
        "function"
    }
}
