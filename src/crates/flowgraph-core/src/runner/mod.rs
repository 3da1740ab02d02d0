//! Graph runner - walks a graph from its entry point to a terminal outcome
//!
//! The runner is the only place that drives nodes. For each step it:
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │ current node                                                     │
//!   │   │                                                              │
//!   │   ├─ middleware chain ─► Node::run(&mut ctx)   (panics caught)   │
//!   │   │                                                              │
//!   │   ├─ Ok(result)        record Success, merge metadata            │
//!   │   ├─ Err(Interrupted)  checkpoint, return Paused                 │
//!   │   └─ Err(error)        ask middleware on_error                   │
//!   │          ├─ Retry      invoke again (up to max_retries)          │
//!   │          ├─ Skip       record Skipped, continue with empty result│
//!   │          └─ Propagate  record Failed, return Failed              │
//!   │                                                                  │
//!   └─ resolve next edge ─► none: Success   some: cadence checkpoint   │
//!                                                 then loop            │
//! ```
//!
//! Failures never escape as `Err`: every invocation returns a [`RunReport`].
//! Only `resume*` return `Err`, and only when the checkpoint itself cannot be
//! used (unknown id, wrong graph, invalid human response).
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::{FunctionNode, Graph, GraphRunner, NodeResult};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! # async fn example() -> flowgraph_core::Result<()> {
//! let mut builder = Graph::builder("greeter");
//! builder
//!     .add_node("greet", FunctionNode::sync(|ctx| {
//!         let name = ctx.input().and_then(|v| v.as_str()).unwrap_or("world").to_string();
//!         Ok(NodeResult::new(json!(format!("hello, {}", name))))
//!     }))
//!     .set_entry_point("greet");
//! let graph = builder.build()?;
//!
//! let report = GraphRunner::default()
//!     .run(&graph, HashMap::from([("input".to_string(), json!("ada"))]))
//!     .await;
//! assert!(report.is_success());
//! assert_eq!(report.result, json!("hello, ada"));
//! # Ok(())
//! # }
//! ```

mod checkpointing;

use flowgraph_checkpoint::{
    Checkpoint, CheckpointError, CheckpointReason, CheckpointStore, ExternalContext,
    HumanInteraction, HumanResponse,
};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::{CheckpointPolicy, RunnerConfig};
use crate::error::{panic_message, GraphError, Result};
use crate::graph::Graph;
use crate::middleware::{decide, ErrorAction, ErrorContext, Next, NodeRequest, RunInfo};
use crate::node::Node;
use crate::node_result::NodeResult;
use crate::nodes::validate_response;
use crate::report::{NodeExecutionReport, NodeStatus, RunReport, RunStatus};
use crate::state::{NodeContext, RunState, HUMAN_RESPONSE_KEY};

use checkpointing::Checkpointer;

/// Executes graphs and produces run reports
#[derive(Debug, Clone, Default)]
pub struct GraphRunner {
    config: RunnerConfig,
}

/// How one node step ended, after retries
enum Step {
    Completed(NodeResult),
    Skipped(GraphError),
    Paused(HumanInteraction),
    Failed(GraphError),
}

/// How the run loop ended
enum Outcome {
    Completed,
    Paused { node: String, interaction: HumanInteraction },
    Failed { node: String, error: GraphError },
}

/// Position to start or continue a run from
struct Start {
    ctx: NodeContext,
    node: String,
    steps_completed: usize,
    resumed: bool,
}

impl GraphRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run `graph` from its entry point without checkpointing
    pub async fn run(&self, graph: &Graph, input: HashMap<String, Value>) -> RunReport {
        self.start(graph, input, None, Checkpointer::disabled()).await
    }

    /// Run with caller-supplied tenant and user identity
    pub async fn run_with_context(
        &self,
        graph: &Graph,
        input: HashMap<String, Value>,
        external_context: ExternalContext,
    ) -> RunReport {
        self.start(graph, input, Some(external_context), Checkpointer::disabled())
            .await
    }

    /// Run with checkpoints written to `store` according to `policy`
    ///
    /// Pauses are always checkpointed when a store is attached.
    pub async fn run_with_checkpoint(
        &self,
        graph: &Graph,
        input: HashMap<String, Value>,
        store: Arc<dyn CheckpointStore>,
        policy: CheckpointPolicy,
    ) -> RunReport {
        self.start(graph, input, None, Checkpointer::new(store, policy, None))
            .await
    }

    /// Continue a run from a checkpoint
    ///
    /// A checkpoint that is waiting for human input pauses again at the same
    /// node; use [`resume_with_human_response`](Self::resume_with_human_response)
    /// to answer it.
    #[tracing::instrument(skip(self, graph, store), fields(graph_id = %graph.id()))]
    pub async fn resume(
        &self,
        graph: &Graph,
        checkpoint_id: &str,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<RunReport> {
        let checkpoint = load_checkpoint(graph, checkpoint_id, store.as_ref()).await?;
        let start = Start::from_checkpoint(&checkpoint);
        let checkpointer = Checkpointer::new(store, self.config.checkpoint.clone(), Some(checkpoint.id));
        Ok(self.execute(graph, start, checkpointer).await)
    }

    /// Answer a paused run's pending interaction and continue it
    #[tracing::instrument(skip(self, graph, response, store), fields(graph_id = %graph.id()))]
    pub async fn resume_with_human_response(
        &self,
        graph: &Graph,
        checkpoint_id: &str,
        response: HumanResponse,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<RunReport> {
        let checkpoint = load_checkpoint(graph, checkpoint_id, store.as_ref()).await?;
        let interaction = checkpoint.pending_interaction.as_ref().ok_or_else(|| {
            GraphError::InvalidHumanResponse(format!(
                "checkpoint '{}' is not waiting for human input",
                checkpoint_id
            ))
        })?;
        validate_response(interaction, &response)?;

        let mut start = Start::from_checkpoint(&checkpoint);
        start
            .ctx
            .state
            .set(HUMAN_RESPONSE_KEY, serde_json::to_value(&response)?);

        tracing::info!(
            run_id = %checkpoint.run_id,
            node = %checkpoint.current_node_id,
            "Human response accepted"
        );

        let checkpointer = Checkpointer::new(store, self.config.checkpoint.clone(), Some(checkpoint.id));
        Ok(self.execute(graph, start, checkpointer).await)
    }

    #[tracing::instrument(
        skip(self, graph, input, external_context, checkpointer),
        fields(graph_id = %graph.id(), node_count = graph.node_count())
    )]
    async fn start(
        &self,
        graph: &Graph,
        input: HashMap<String, Value>,
        external_context: Option<ExternalContext>,
        checkpointer: Checkpointer,
    ) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let mut ctx = NodeContext::new(graph.id(), run_id).with_external_context(external_context);

        if let Err(error) = ctx.seed(input) {
            tracing::error!(run_id = %ctx.run_id, error = %error, "Run input rejected");
            return RunReport {
                run_id: ctx.run_id.clone(),
                graph_id: ctx.graph_id.clone(),
                status: RunStatus::Failed,
                result: Value::Null,
                node_reports: Vec::new(),
                checkpoint_id: None,
                error: Some(error),
                state: ctx.state.snapshot(),
                metadata: ctx.metadata.clone(),
                duration_ms: 0,
            };
        }

        let start = Start {
            ctx,
            node: graph.entry_point().to_string(),
            steps_completed: 0,
            resumed: false,
        };
        self.execute(graph, start, checkpointer).await
    }

    async fn execute(&self, graph: &Graph, start: Start, mut checkpointer: Checkpointer) -> RunReport {
        let started = Instant::now();
        let Start {
            mut ctx,
            node: mut current,
            mut steps_completed,
            resumed,
        } = start;

        let info = RunInfo {
            run_id: ctx.run_id.clone(),
            graph_id: ctx.graph_id.clone(),
            start_node: current.clone(),
            resumed,
        };
        for middleware in graph.middleware() {
            middleware.on_run_start(&info).await;
        }
        tracing::info!(run_id = %info.run_id, start_node = %current, resumed, "Graph run started");

        let mut node_reports = Vec::new();
        let mut last_data = Value::Null;
        let mut steps = 0usize;

        let outcome = loop {
            if steps >= self.config.max_steps {
                break Outcome::Failed {
                    error: GraphError::StepLimitExceeded {
                        node: current.clone(),
                        max_steps: self.config.max_steps,
                    },
                    node: current,
                };
            }
            steps += 1;

            let Some(node) = graph.node(&current).cloned() else {
                break Outcome::Failed {
                    error: GraphError::state(format!("node '{}' is not part of the graph", current)),
                    node: current,
                };
            };

            ctx.node_id = current.clone();
            let node_started = Instant::now();
            let (step, attempts) = self.run_step(graph, node.as_ref(), &current, &mut ctx).await;
            let duration_ms = node_started.elapsed().as_millis() as u64;

            let next = match step {
                Step::Completed(result) => {
                    node_reports.push(NodeExecutionReport {
                        node_id: current.clone(),
                        status: NodeStatus::Success,
                        output: result.data.clone(),
                        duration_ms,
                        attempts,
                        error: None,
                    });
                    ctx.merge_metadata(result.metadata.clone());
                    let next = graph.next_node(&current, &result).map(str::to_string);
                    last_data = result.data;
                    next
                }
                Step::Skipped(error) => {
                    tracing::warn!(run_id = %ctx.run_id, node = %current, error = %error, "Node skipped after failure");
                    node_reports.push(NodeExecutionReport {
                        node_id: current.clone(),
                        status: NodeStatus::Skipped,
                        output: Value::Null,
                        duration_ms,
                        attempts,
                        error: Some(error.to_string()),
                    });
                    last_data = Value::Null;
                    graph
                        .next_node(&current, &NodeResult::empty())
                        .map(str::to_string)
                }
                Step::Paused(interaction) => {
                    break Outcome::Paused {
                        node: current,
                        interaction,
                    };
                }
                Step::Failed(error) => {
                    node_reports.push(NodeExecutionReport {
                        node_id: current.clone(),
                        status: NodeStatus::Failed,
                        output: Value::Null,
                        duration_ms,
                        attempts,
                        error: Some(error.to_string()),
                    });
                    break Outcome::Failed { node: current, error };
                }
            };

            steps_completed += 1;
            let Some(next) = next else {
                break Outcome::Completed;
            };

            if checkpointer.cadence_due(steps_completed) {
                if let Err(error) = checkpointer
                    .save(&ctx, &next, CheckpointReason::Cadence, steps_completed, None)
                    .await
                {
                    break Outcome::Failed { node: next, error };
                }
            }
            current = next;
        };

        let (status, result, checkpoint_id, error) = match outcome {
            Outcome::Completed => {
                checkpointer.clear().await;
                (RunStatus::Success, last_data, None, None)
            }
            Outcome::Paused { node, interaction } => {
                let result = serde_json::to_value(&interaction).unwrap_or(Value::Null);
                match checkpointer
                    .save(
                        &ctx,
                        &node,
                        CheckpointReason::Interrupt,
                        steps_completed,
                        Some(interaction),
                    )
                    .await
                {
                    Ok(checkpoint_id) => {
                        if checkpoint_id.is_none() {
                            tracing::warn!(run_id = %ctx.run_id, node = %node, "Run paused without a checkpoint store");
                        }
                        (RunStatus::Paused, result, checkpoint_id, None)
                    }
                    Err(error) => (RunStatus::Failed, Value::Null, None, Some(error)),
                }
            }
            Outcome::Failed { node, error } => {
                let mut checkpoint_id = None;
                if checkpointer.on_error() {
                    match checkpointer
                        .save(&ctx, &node, CheckpointReason::Error, steps_completed, None)
                        .await
                    {
                        Ok(id) => checkpoint_id = id,
                        Err(e) => {
                            tracing::error!(run_id = %ctx.run_id, node = %node, error = %e, "Failed to write error checkpoint")
                        }
                    }
                }
                (RunStatus::Failed, Value::Null, checkpoint_id, Some(error))
            }
        };

        let report = RunReport {
            run_id: ctx.run_id.clone(),
            graph_id: ctx.graph_id.clone(),
            status,
            result,
            node_reports,
            checkpoint_id,
            error,
            state: ctx.state.snapshot(),
            metadata: ctx.metadata.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        match &report.error {
            Some(error) => tracing::error!(
                run_id = %report.run_id,
                status = ?report.status,
                error = %error,
                "Graph run failed"
            ),
            None => tracing::info!(
                run_id = %report.run_id,
                status = ?report.status,
                nodes = report.node_reports.len(),
                duration_ms = report.duration_ms,
                "Graph run finished"
            ),
        }

        for middleware in graph.middleware() {
            middleware.on_run_end(&info, &report).await;
        }
        report
    }

    /// Invoke one node until it succeeds, pauses, or the chain gives up on it
    async fn run_step(
        &self,
        graph: &Graph,
        node: &dyn Node,
        node_id: &str,
        ctx: &mut NodeContext,
    ) -> (Step, u32) {
        let mut attempt = 1;
        loop {
            let error = match invoke(graph, node, node_id, attempt, ctx).await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!(node = %node_id, attempts = attempt, "Node succeeded after retry");
                    }
                    return (Step::Completed(result), attempt);
                }
                Err(GraphError::Interrupted(interaction)) => {
                    return (Step::Paused(interaction), attempt);
                }
                Err(error) => error,
            };

            let error_ctx = ErrorContext {
                run_id: ctx.run_id.clone(),
                graph_id: ctx.graph_id.clone(),
                node_id: node_id.to_string(),
                attempt,
                max_retries: self.config.max_retries,
            };

            let decision = AssertUnwindSafe(decide(graph.middleware(), &error, &error_ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    tracing::error!(
                        node = %node_id,
                        panic = %panic_message(payload.as_ref()),
                        "Middleware panicked while handling a node failure"
                    );
                    ErrorAction::Propagate
                });

            match decision {
                ErrorAction::Retry if error_ctx.retries_left() => {
                    tracing::warn!(
                        node = %node_id,
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %error,
                        "Node failed, retrying"
                    );
                    attempt += 1;
                }
                ErrorAction::Retry => {
                    tracing::error!(node = %node_id, attempts = attempt, error = %error, "Node failed after all retry attempts");
                    let exhausted = GraphError::RetryExhausted {
                        node: node_id.to_string(),
                        attempts: attempt,
                        last_error: Box::new(error),
                    };
                    return (Step::Failed(exhausted), attempt);
                }
                ErrorAction::Skip => return (Step::Skipped(error), attempt),
                ErrorAction::Propagate => return (Step::Failed(error), attempt),
            }
        }
    }
}

/// One pass through the middleware chain with panics turned into errors
async fn invoke(
    graph: &Graph,
    node: &dyn Node,
    node_id: &str,
    attempt: u32,
    ctx: &mut NodeContext,
) -> Result<NodeResult> {
    let request = NodeRequest { node_id, attempt, ctx };
    let call = Next::new(node, graph.middleware()).run(request);
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(node = %node_id, panic = %message, "Node panicked");
            Err(GraphError::NodePanicked {
                node: node_id.to_string(),
                message,
            })
        }
    }
}

/// Fetch a checkpoint and check that it can continue on `graph`
async fn load_checkpoint(
    graph: &Graph,
    checkpoint_id: &str,
    store: &dyn CheckpointStore,
) -> Result<Checkpoint> {
    let checkpoint = store
        .get(checkpoint_id)
        .await?
        .ok_or_else(|| GraphError::CheckpointNotFound(checkpoint_id.to_string()))?;

    if checkpoint.graph_id != graph.id() {
        return Err(CheckpointError::Invalid(format!(
            "checkpoint '{}' belongs to graph '{}', not '{}'",
            checkpoint_id,
            checkpoint.graph_id,
            graph.id()
        ))
        .into());
    }
    if !graph.contains_node(&checkpoint.current_node_id) {
        return Err(CheckpointError::Invalid(format!(
            "checkpoint '{}' continues at unknown node '{}'",
            checkpoint_id, checkpoint.current_node_id
        ))
        .into());
    }

    Ok(checkpoint)
}

impl Start {
    fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        let mut ctx = NodeContext::new(&checkpoint.graph_id, &checkpoint.run_id)
            .with_external_context(checkpoint.external_context.clone());
        ctx.state = RunState::from_snapshot(checkpoint.state.clone(), checkpoint.state_version);
        ctx.metadata = checkpoint.metadata.clone();

        Self {
            ctx,
            node: checkpoint.current_node_id.clone(),
            steps_completed: checkpoint.steps_completed,
            resumed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{Middleware, SkipMiddleware};
    use crate::node::FunctionNode;
    use async_trait::async_trait;
    use flowgraph_checkpoint::InMemoryCheckpointStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn constant(value: Value) -> FunctionNode {
        FunctionNode::sync(move |_| Ok(NodeResult::new(value.clone())))
    }

    struct AlwaysRetry;

    #[async_trait]
    impl Middleware for AlwaysRetry {
        async fn on_error(&self, _error: &GraphError, _ctx: &ErrorContext) -> Option<ErrorAction> {
            Some(ErrorAction::Retry)
        }
    }

    #[derive(Default)]
    struct Lifecycle {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Middleware for Lifecycle {
        async fn on_run_start(&self, info: &RunInfo) {
            self.events.lock().unwrap().push(format!("start:{}", info.start_node));
        }

        async fn on_run_end(&self, _info: &RunInfo, report: &RunReport) {
            self.events.lock().unwrap().push(format!("end:{:?}", report.status));
        }
    }

    #[tokio::test]
    async fn test_metadata_accumulates_and_shadows() {
        let mut builder = Graph::builder("meta");
        builder
            .add_node(
                "a",
                FunctionNode::sync(|_| {
                    Ok(NodeResult::new(json!(1))
                        .with_metadata("k", json!("a"))
                        .with_metadata("only_a", json!(true)))
                }),
            )
            .add_node(
                "b",
                FunctionNode::sync(|_| Ok(NodeResult::new(json!(2)).with_metadata("k", json!("b")))),
            )
            .add_edge("a", "b")
            .set_entry_point("a");
        let graph = builder.build().unwrap();

        let report = GraphRunner::default().run(&graph, HashMap::new()).await;
        assert!(report.is_success());
        assert_eq!(report.metadata.get("k"), Some(&json!("b")));
        assert_eq!(report.metadata.get("only_a"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_retry_ceiling_counts_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut builder = Graph::builder("retry");
        builder
            .add_node(
                "flaky",
                FunctionNode::sync(move |ctx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GraphError::node_execution(&ctx.node_id, "down"))
                }),
            )
            .set_entry_point("flaky")
            .add_middleware(AlwaysRetry);
        let graph = builder.build().unwrap();

        let runner = GraphRunner::new(RunnerConfig::default().with_max_retries(1));
        let report = runner.run(&graph, HashMap::new()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(report.is_failed());
        assert!(matches!(
            report.error,
            Some(GraphError::RetryExhausted { attempts: 2, .. })
        ));
        assert_eq!(report.node_report("flaky").unwrap().attempts, 2);
    }

    struct PanickyHandler;

    #[async_trait]
    impl Middleware for PanickyHandler {
        async fn on_error(&self, _error: &GraphError, _ctx: &ErrorContext) -> Option<ErrorAction> {
            panic!("handler bug")
        }
    }

    #[tokio::test]
    async fn test_panicking_error_handler_propagates_original_error() {
        let mut builder = Graph::builder("handler");
        builder
            .add_node("a", FunctionNode::sync(|ctx| Err(GraphError::node_execution(&ctx.node_id, "down"))))
            .set_entry_point("a")
            .add_middleware(PanickyHandler)
            .add_middleware(AlwaysRetry);
        let graph = builder.build().unwrap();

        let report = GraphRunner::default().run(&graph, HashMap::new()).await;

        assert!(report.is_failed());
        assert!(matches!(report.error, Some(GraphError::NodeExecution { .. })));
        let node = report.node_report("a").unwrap();
        assert_eq!(node.status, NodeStatus::Failed);
        assert_eq!(node.attempts, 1);
    }

    #[tokio::test]
    async fn test_skipped_terminal_node_yields_null_result() {
        let mut builder = Graph::builder("skip");
        builder
            .add_node("a", constant(json!("ok")))
            .add_node("b", FunctionNode::sync(|ctx| Err(GraphError::node_execution(&ctx.node_id, "x"))))
            .add_edge("a", "b")
            .set_entry_point("a")
            .add_middleware(SkipMiddleware::all());
        let graph = builder.build().unwrap();

        let report = GraphRunner::default().run(&graph, HashMap::new()).await;
        assert!(report.is_success());
        assert_eq!(report.result, Value::Null);
        assert_eq!(report.node_report("b").unwrap().status, NodeStatus::Skipped);
    }

    #[tokio::test]
    async fn test_lifecycle_hooks_see_every_invocation() {
        let lifecycle = Arc::new(Lifecycle::default());
        let mut builder = Graph::builder("hooks");
        builder
            .add_node("only", constant(json!(1)))
            .set_entry_point("only")
            .add_shared_middleware(lifecycle.clone());
        let graph = builder.build().unwrap();

        GraphRunner::default().run(&graph, HashMap::new()).await;
        assert_eq!(
            *lifecycle.events.lock().unwrap(),
            vec!["start:only".to_string(), "end:Success".to_string()]
        );
    }

    #[tokio::test]
    async fn test_bad_input_response_fails_without_running_nodes() {
        let mut builder = Graph::builder("input");
        builder.add_node("only", constant(json!(1))).set_entry_point("only");
        let graph = builder.build().unwrap();

        let input = HashMap::from([("input_response".to_string(), json!("not an object"))]);
        let report = GraphRunner::default().run(&graph, input).await;

        assert!(report.is_failed());
        assert!(report.node_reports.is_empty());
        assert!(matches!(report.error, Some(GraphError::State(_))));
    }

    #[tokio::test]
    async fn test_resume_rejects_checkpoint_of_other_graph() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let checkpoint = Checkpoint::new("r", "other", "only", CheckpointReason::Cadence);
        store.save(&checkpoint).await.unwrap();

        let mut builder = Graph::builder("mine");
        builder.add_node("only", constant(json!(1))).set_entry_point("only");
        let graph = builder.build().unwrap();

        let err = GraphRunner::default()
            .resume(&graph, &checkpoint.id, store)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Checkpoint(CheckpointError::Invalid(_))));
    }
}
