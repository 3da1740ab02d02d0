//! Retry failed nodes with exponential backoff

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::{ErrorAction, ErrorContext, Middleware};
use crate::error::GraphError;
use crate::retry::RetryPolicy;

type ErrorPredicate = Arc<dyn Fn(&GraphError) -> bool + Send + Sync>;

/// Answers `Retry` for matching failures after sleeping the backoff delay
///
/// The number of retries is capped by the runner's `max_retries`; once the
/// cap is reached this middleware stops sleeping and the runner converts the
/// failure into `GraphError::RetryExhausted`.
///
/// ```rust
/// use flowgraph_core::middleware::RetryMiddleware;
/// use flowgraph_core::retry::RetryPolicy;
/// use flowgraph_core::GraphError;
///
/// let retry = RetryMiddleware::new(RetryPolicy::default())
///     .for_nodes(["fetch", "summarize"])
///     .when(|e| matches!(e, GraphError::Timeout { .. } | GraphError::NodeExecution { .. }));
/// # let _ = retry;
/// ```
#[derive(Clone, Default)]
pub struct RetryMiddleware {
    policy: RetryPolicy,
    nodes: Option<HashSet<String>>,
    predicate: Option<ErrorPredicate>,
}

impl RetryMiddleware {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            nodes: None,
            predicate: None,
        }
    }

    /// Only retry these nodes
    pub fn for_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes = Some(nodes.into_iter().map(Into::into).collect());
        self
    }

    /// Only retry errors matching `predicate`
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&GraphError) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn applies_to(&self, error: &GraphError, node_id: &str) -> bool {
        let node_matches = self.nodes.as_ref().map_or(true, |n| n.contains(node_id));
        let error_matches = self.predicate.as_ref().map_or(true, |p| p(error));
        node_matches && error_matches
    }
}

impl fmt::Debug for RetryMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryMiddleware")
            .field("policy", &self.policy)
            .field("nodes", &self.nodes)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    fn name(&self) -> &str {
        "retry"
    }

    async fn on_error(&self, error: &GraphError, ctx: &ErrorContext) -> Option<ErrorAction> {
        if !self.applies_to(error, &ctx.node_id) {
            return None;
        }

        if ctx.retries_left() {
            let delay = self.policy.calculate_delay(ctx.attempt.saturating_sub(1));
            tracing::warn!(
                node = %ctx.node_id,
                attempt = ctx.attempt,
                max_retries = ctx.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Node failed, retrying after delay"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Some(ErrorAction::Retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(node: &str, attempt: u32) -> ErrorContext {
        ErrorContext {
            run_id: "r".to_string(),
            graph_id: "g".to_string(),
            node_id: node.to_string(),
            attempt,
            max_retries: 3,
        }
    }

    #[tokio::test]
    async fn test_retries_every_node_by_default() {
        let retry = RetryMiddleware::new(RetryPolicy::immediate());
        let err = GraphError::node_execution("a", "boom");
        assert_eq!(retry.on_error(&err, &ctx("a", 1)).await, Some(ErrorAction::Retry));
    }

    #[tokio::test]
    async fn test_node_filter() {
        let retry = RetryMiddleware::new(RetryPolicy::immediate()).for_nodes(["a"]);
        let err = GraphError::node_execution("b", "boom");
        assert_eq!(retry.on_error(&err, &ctx("b", 1)).await, None);
    }

    #[tokio::test]
    async fn test_error_predicate() {
        let retry = RetryMiddleware::new(RetryPolicy::immediate())
            .when(|e| matches!(e, GraphError::Timeout { .. }));

        let permanent = GraphError::validation("bad input");
        assert_eq!(retry.on_error(&permanent, &ctx("a", 1)).await, None);

        let transient = GraphError::Timeout { node: "a".to_string(), duration_ms: 10 };
        assert_eq!(retry.on_error(&transient, &ctx("a", 1)).await, Some(ErrorAction::Retry));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_backoff_delay() {
        let retry = RetryMiddleware::new(
            RetryPolicy::default()
                .with_initial_interval(2.0)
                .with_jitter(false),
        );
        let err = GraphError::node_execution("a", "boom");

        let started = tokio::time::Instant::now();
        retry.on_error(&err, &ctx("a", 2)).await;
        // second attempt failed: 2.0 * 2^1
        assert_eq!(started.elapsed().as_secs(), 4);
    }
}
