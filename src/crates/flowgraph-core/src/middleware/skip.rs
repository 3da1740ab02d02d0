//! Skip failed nodes and keep going

use async_trait::async_trait;
use std::collections::HashSet;

use super::{ErrorAction, ErrorContext, Middleware};
use crate::error::GraphError;

/// Answers `Skip` for failures of the selected nodes (or of every node)
///
/// A skipped node is recorded as `skipped` in the report and edge resolution
/// continues with an empty result, so only unconditional edges (or conditions
/// that accept null data) fire after it.
#[derive(Debug, Clone, Default)]
pub struct SkipMiddleware {
    nodes: Option<HashSet<String>>,
}

impl SkipMiddleware {
    /// Skip any failing node
    pub fn all() -> Self {
        Self::default()
    }

    /// Skip only these nodes when they fail
    pub fn nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: Some(nodes.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl Middleware for SkipMiddleware {
    fn name(&self) -> &str {
        "skip"
    }

    async fn on_error(&self, error: &GraphError, ctx: &ErrorContext) -> Option<ErrorAction> {
        let selected = self.nodes.as_ref().map_or(true, |n| n.contains(&ctx.node_id));
        if !selected {
            return None;
        }
        tracing::info!(node = %ctx.node_id, error = %error, "Skipping failed node");
        Some(ErrorAction::Skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(node: &str) -> ErrorContext {
        ErrorContext {
            run_id: "r".to_string(),
            graph_id: "g".to_string(),
            node_id: node.to_string(),
            attempt: 1,
            max_retries: 3,
        }
    }

    #[tokio::test]
    async fn test_skip_selected_nodes_only() {
        let skip = SkipMiddleware::nodes(["optional"]);
        let err = GraphError::node_execution("x", "boom");

        assert_eq!(skip.on_error(&err, &ctx("optional")).await, Some(ErrorAction::Skip));
        assert_eq!(skip.on_error(&err, &ctx("required")).await, None);
        assert_eq!(
            SkipMiddleware::all().on_error(&err, &ctx("required")).await,
            Some(ErrorAction::CONTINUE)
        );
    }
}
