//! Common test utilities and setup

#![allow(dead_code)]

use flowgraph_core::{FunctionNode, GraphError, NodeResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber filtered by `RUST_LOG` (default `warn`)
///
/// ```bash
/// RUST_LOG=flowgraph_core=debug cargo test -p flowgraph-core -- --nocapture
/// ```
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Run input with only `input` set
pub fn input(value: Value) -> HashMap<String, Value> {
    HashMap::from([("input".to_string(), value)])
}

/// Node that always returns `value`
pub fn constant(value: Value) -> FunctionNode {
    FunctionNode::sync(move |_| Ok(NodeResult::new(value.clone())))
}

/// Node that appends its own id to `state["trail"]` and returns it
pub fn trail() -> FunctionNode {
    FunctionNode::sync(|ctx| {
        let mut trail = match ctx.state.get("trail") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        trail.push(Value::String(ctx.node_id.clone()));
        ctx.state.set("trail", Value::Array(trail));
        Ok(NodeResult::new(Value::String(ctx.node_id.clone())))
    })
}

/// Node failing its first `failures` invocations, counting every invocation
pub fn flaky(failures: u32, calls: Arc<AtomicU32>, value: Value) -> FunctionNode {
    FunctionNode::sync(move |ctx| {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= failures {
            Err(GraphError::node_execution(
                &ctx.node_id,
                format!("transient failure {}", call),
            ))
        } else {
            Ok(NodeResult::new(value.clone()))
        }
    })
}
