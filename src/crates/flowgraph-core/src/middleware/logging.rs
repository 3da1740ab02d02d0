//! Structured `tracing` events for runs and nodes

use async_trait::async_trait;
use std::time::Instant;

use super::{ErrorAction, ErrorContext, Middleware, Next, NodeRequest, RunInfo};
use crate::error::{GraphError, Result};
use crate::node_result::NodeResult;
use crate::report::RunReport;

/// Emits one event per run start/end and per node start/finish/error
///
/// Never changes the outcome: `on_error` always answers `None`. Register it
/// first so node timings include the rest of the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_node<'a>(&self, request: NodeRequest<'a>, next: Next<'a>) -> Result<NodeResult> {
        let node = request.node_id.to_string();
        let attempt = request.attempt;
        let run_id = request.ctx.run_id.clone();
        let started = Instant::now();

        tracing::debug!(run_id = %run_id, node = %node, attempt, "Node started");
        let result = next.run(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => tracing::debug!(run_id = %run_id, node = %node, attempt, elapsed_ms, "Node finished"),
            Err(GraphError::Interrupted(_)) => {
                tracing::info!(run_id = %run_id, node = %node, "Node requested human input")
            }
            Err(e) => tracing::debug!(run_id = %run_id, node = %node, attempt, elapsed_ms, error = %e, "Node returned error"),
        }
        result
    }

    async fn on_error(&self, error: &GraphError, ctx: &ErrorContext) -> Option<ErrorAction> {
        tracing::error!(
            run_id = %ctx.run_id,
            node = %ctx.node_id,
            attempt = ctx.attempt,
            error = %error,
            "Node failed"
        );
        None
    }

    async fn on_run_start(&self, info: &RunInfo) {
        tracing::info!(
            run_id = %info.run_id,
            graph_id = %info.graph_id,
            start_node = %info.start_node,
            resumed = info.resumed,
            "Run started"
        );
    }

    async fn on_run_end(&self, info: &RunInfo, report: &RunReport) {
        tracing::info!(
            run_id = %info.run_id,
            graph_id = %info.graph_id,
            status = ?report.status,
            nodes = report.node_reports.len(),
            duration_ms = report.duration_ms,
            checkpoint_id = ?report.checkpoint_id,
            "Run finished"
        );
    }
}
