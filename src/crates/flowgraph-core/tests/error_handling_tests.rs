//! Failure handling through the middleware chain: retry, skip, propagate

mod common;

use async_trait::async_trait;
use common::{constant, flaky, init_tracing};
use flowgraph_core::middleware::{RetryMiddleware, SkipMiddleware};
use flowgraph_core::{
    ErrorAction, ErrorContext, FunctionNode, Graph, GraphError, GraphRunner, Middleware, NodeStatus,
    RetryPolicy, RunnerConfig,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

fn retrying() -> RetryMiddleware {
    RetryMiddleware::new(RetryPolicy::immediate())
}

#[tokio::test]
async fn test_retry_succeeds_on_fourth_attempt() {
    init_tracing();

    let calls = Arc::new(AtomicU32::new(0));
    let mut builder = Graph::builder("retry");
    builder
        .add_node("fetch", flaky(3, calls.clone(), json!("payload")))
        .set_entry_point("fetch")
        .add_middleware(retrying());
    let graph = builder.build().unwrap();

    let report = GraphRunner::default().run(&graph, HashMap::new()).await;

    assert!(report.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.result, json!("payload"));

    let fetch = report.node_report("fetch").unwrap();
    assert_eq!(fetch.status, NodeStatus::Success);
    assert_eq!(fetch.attempts, 4);
}

#[tokio::test]
async fn test_retry_exhausted_after_four_attempts() {
    init_tracing();

    let calls = Arc::new(AtomicU32::new(0));
    let mut builder = Graph::builder("retry");
    builder
        .add_node("fetch", flaky(u32::MAX, calls.clone(), json!(null)))
        .set_entry_point("fetch")
        .add_middleware(retrying());
    let graph = builder.build().unwrap();

    let report = GraphRunner::default().run(&graph, HashMap::new()).await;

    assert!(report.is_failed());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    match &report.error {
        Some(GraphError::RetryExhausted {
            node,
            attempts,
            last_error,
        }) => {
            assert_eq!(node, "fetch");
            assert_eq!(*attempts, 4);
            assert!(last_error.to_string().contains("transient failure 4"));
        }
        other => panic!("expected RetryExhausted, got {:?}", other),
    }
    assert_eq!(report.node_report("fetch").unwrap().attempts, 4);
}

#[tokio::test]
async fn test_retry_ceiling_comes_from_config() {
    init_tracing();

    let config =
        RunnerConfig::from_toml_str("max_retries = 1\n[retry]\ninitial_interval = 0.0\njitter = false")
            .unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let mut builder = Graph::builder("retry");
    builder
        .add_node("fetch", flaky(u32::MAX, calls.clone(), json!(null)))
        .set_entry_point("fetch")
        .add_middleware(config.retry_middleware());
    let graph = builder.build().unwrap();

    let report = GraphRunner::new(config).run(&graph, HashMap::new()).await;

    assert!(report.is_failed());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retry_filter_leaves_other_nodes_alone() {
    init_tracing();

    let calls = Arc::new(AtomicU32::new(0));
    let mut builder = Graph::builder("filtered");
    builder
        .add_node("fragile", flaky(1, calls.clone(), json!("ok")))
        .set_entry_point("fragile")
        .add_middleware(retrying().for_nodes(["somewhere-else"]));
    let graph = builder.build().unwrap();

    let report = GraphRunner::default().run(&graph, HashMap::new()).await;

    assert!(report.is_failed());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(report.error, Some(GraphError::NodeExecution { .. })));
}

#[tokio::test]
async fn test_skip_continues_along_unconditional_edge() {
    init_tracing();

    let mut builder = Graph::builder("skip");
    builder
        .add_node(
            "enrich",
            FunctionNode::sync(|ctx| Err(GraphError::node_execution(&ctx.node_id, "lookup failed"))),
        )
        .add_node("finish", constant(json!("done")))
        .add_edge("enrich", "finish")
        .set_entry_point("enrich")
        .add_middleware(SkipMiddleware::nodes(["enrich"]));
    let graph = builder.build().unwrap();

    let report = GraphRunner::default().run(&graph, HashMap::new()).await;

    assert!(report.is_success());
    assert_eq!(report.result, json!("done"));

    let enrich = report.node_report("enrich").unwrap();
    assert_eq!(enrich.status, NodeStatus::Skipped);
    assert!(enrich.error.as_deref().unwrap_or_default().contains("lookup failed"));
    assert_eq!(report.node_report("finish").unwrap().status, NodeStatus::Success);
}

#[tokio::test]
async fn test_skip_resolves_edges_against_empty_result() {
    init_tracing();

    let mut builder = Graph::builder("skip-conditional");
    builder
        .add_node(
            "classify",
            FunctionNode::sync(|ctx| Err(GraphError::node_execution(&ctx.node_id, "model down"))),
        )
        .add_node("urgent", constant(json!("urgent")))
        .add_node("fallback", constant(json!("fallback")))
        .add_conditional_edge("classify", "urgent", |r| r.data == json!("urgent"))
        .add_conditional_edge("classify", "fallback", |r| r.data.is_null())
        .set_entry_point("classify")
        .add_middleware(SkipMiddleware::all());
    let graph = builder.build().unwrap();

    let report = GraphRunner::default().run(&graph, HashMap::new()).await;

    assert_eq!(report.executed_nodes(), vec!["classify", "fallback"]);
}

#[tokio::test]
async fn test_propagate_stops_the_run() {
    init_tracing();

    let mut builder = Graph::builder("propagate");
    builder
        .add_node("a", constant(json!(1)))
        .add_node(
            "b",
            FunctionNode::sync(|ctx| Err(GraphError::node_execution(&ctx.node_id, "fatal"))),
        )
        .add_node("c", constant(json!(3)))
        .add_edge("a", "b")
        .add_edge("b", "c")
        .set_entry_point("a");
    let graph = builder.build().unwrap();

    let report = GraphRunner::default().run(&graph, HashMap::new()).await;

    assert!(report.is_failed());
    assert_eq!(report.executed_nodes(), vec!["a", "b"]);
    assert_eq!(report.node_report("b").unwrap().status, NodeStatus::Failed);
    assert!(report.checkpoint_id.is_none());
}

/// Records every error context it sees and defers
#[derive(Default)]
struct Observer {
    seen: Mutex<Vec<(String, u32)>>,
}

#[async_trait]
impl Middleware for Observer {
    async fn on_error(&self, _error: &GraphError, ctx: &ErrorContext) -> Option<ErrorAction> {
        self.seen.lock().unwrap().push((ctx.node_id.clone(), ctx.attempt));
        None
    }
}

#[tokio::test]
async fn test_first_answer_in_registration_order_wins() {
    init_tracing();

    let observer = Arc::new(Observer::default());
    let calls = Arc::new(AtomicU32::new(0));

    let mut builder = Graph::builder("order");
    builder
        .add_node("fetch", flaky(2, calls.clone(), json!("ok")))
        .set_entry_point("fetch")
        .add_shared_middleware(observer.clone())
        .add_middleware(SkipMiddleware::all())
        .add_middleware(retrying());
    let graph = builder.build().unwrap();

    let report = GraphRunner::default().run(&graph, HashMap::new()).await;

    assert!(report.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.node_report("fetch").unwrap().status, NodeStatus::Skipped);
    assert_eq!(*observer.seen.lock().unwrap(), vec![("fetch".to_string(), 1)]);
}

#[test]
fn test_continue_is_skip() {
    assert_eq!(ErrorAction::CONTINUE, ErrorAction::Skip);
}
