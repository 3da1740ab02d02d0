//! Per-node time budgets

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use super::{Middleware, Next, NodeRequest};
use crate::error::{GraphError, Result};
use crate::node_result::NodeResult;

/// Bounds each node call with `tokio::time::timeout`
///
/// Expiry becomes `GraphError::Timeout`, which flows through `on_error` like
/// any other failure; register a [`RetryMiddleware`](super::RetryMiddleware)
/// after this one to retry timed-out nodes.
#[derive(Debug, Clone)]
pub struct TimeoutMiddleware {
    default: Duration,
    per_node: HashMap<String, Duration>,
}

impl TimeoutMiddleware {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            per_node: HashMap::new(),
        }
    }

    /// Override the budget for one node
    pub fn with_node_timeout(mut self, node: impl Into<String>, timeout: Duration) -> Self {
        self.per_node.insert(node.into(), timeout);
        self
    }

    fn budget_for(&self, node: &str) -> Duration {
        self.per_node.get(node).copied().unwrap_or(self.default)
    }
}

#[async_trait]
impl Middleware for TimeoutMiddleware {
    fn name(&self) -> &str {
        "timeout"
    }

    async fn on_node<'a>(&self, request: NodeRequest<'a>, next: Next<'a>) -> Result<NodeResult> {
        let node = request.node_id.to_string();
        let budget = self.budget_for(&node);

        match tokio::time::timeout(budget, next.run(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(node = %node, timeout_ms = budget.as_millis() as u64, "Node timed out");
                Err(GraphError::Timeout {
                    node,
                    duration_ms: budget.as_millis() as u64,
                })
            }
        }
    }
}
