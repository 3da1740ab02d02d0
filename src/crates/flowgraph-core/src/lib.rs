//! # flowgraph-core - Interruptible Graph Workflows
//!
//! Build a directed graph of nodes, run it against an input, and get back a
//! [`RunReport`]. Runs can pause for human input and resume later from a
//! persisted checkpoint without re-running completed work.
//!
//! ## Overview
//!
//! - **Graph model** - nodes keyed by id, ordered plain and conditional edges,
//!   an entry point and a middleware chain, validated once by [`GraphBuilder::build`]
//! - **Shared run state** - a versioned [`RunState`] plus a metadata side-channel,
//!   both carried in the [`NodeContext`] every node receives as `&mut`
//! - **Middleware** - wraps every node call and decides what happens on failure:
//!   retry, skip, or propagate
//! - **Parallel branches** - [`ParallelNode`](parallel::ParallelNode) fans out to
//!   concurrent tokio tasks, [`MergeNode`](parallel::MergeNode) reduces the results
//! - **Checkpoint / resume** - snapshots in any [`CheckpointStore`], human-in-the-loop
//!   pauses through [`HumanNode`](nodes::HumanNode)
//!
//! ## Execution Flow
//!
//! ```text
//!  input ─► NodeContext::seed ─► entry node
//!                                    │
//!            ┌───────────────────────┘
//!            ▼
//!     middleware chain ─► Node::run(&mut ctx) ─► NodeResult
//!            │                                        │
//!       on_error:                              first matching edge
//!       Retry / Skip / Propagate                      │
//!                                      ┌──────────────┴──────────┐
//!                                   next node                no edge
//!                                 (loop again)           RunStatus::Success
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use flowgraph_core::{FunctionNode, Graph, GraphRunner, NodeResult};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! # #[tokio::main]
//! # async fn main() -> flowgraph_core::Result<()> {
//! let mut builder = Graph::builder("scoring");
//! builder
//!     .add_node("score", FunctionNode::sync(|ctx| {
//!         let text = ctx.input().and_then(|v| v.as_str()).unwrap_or_default();
//!         Ok(NodeResult::new(json!(text.len())))
//!     }))
//!     .add_node("high", FunctionNode::sync(|_| Ok(NodeResult::new(json!("long")))))
//!     .add_node("low", FunctionNode::sync(|_| Ok(NodeResult::new(json!("short")))))
//!     .add_conditional_edge("score", "high", |r| r.data.as_u64().unwrap_or(0) > 10)
//!     .add_edge("score", "low")
//!     .set_entry_point("score");
//! let graph = builder.build()?;
//!
//! let input = HashMap::from([("input".to_string(), json!("hello"))]);
//! let report = GraphRunner::default().run(&graph, input).await;
//!
//! assert!(report.is_success());
//! assert_eq!(report.result, json!("short"));
//! assert_eq!(report.executed_nodes(), vec!["score", "low"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Human-in-the-Loop
//!
//! ```rust
//! use flowgraph_core::nodes::HumanNode;
//! use flowgraph_core::{
//!     CheckpointPolicy, CheckpointStore, Graph, GraphRunner, HumanResponse, InMemoryCheckpointStore,
//! };
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> flowgraph_core::Result<()> {
//! let mut builder = Graph::builder("approval");
//! builder
//!     .add_node("review", HumanNode::new("Ship it?").with_options(["yes", "no"]))
//!     .set_entry_point("review");
//! let graph = builder.build()?;
//!
//! let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
//! let runner = GraphRunner::default();
//!
//! let paused = runner
//!     .run_with_checkpoint(&graph, HashMap::new(), store.clone(), CheckpointPolicy::none())
//!     .await;
//! assert!(paused.is_paused());
//!
//! let checkpoint_id = paused.checkpoint_id.clone().unwrap_or_default();
//! let done = runner
//!     .resume_with_human_response(&graph, &checkpoint_id, HumanResponse::select("review", "yes"), store)
//!     .await?;
//! assert!(done.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`graph`] | [`Graph`], [`GraphBuilder`] |
//! | [`node`] / [`nodes`] | the [`Node`] trait and built-in node kinds |
//! | [`edge`] | edges and first-match resolution |
//! | [`state`] | [`NodeContext`], [`RunState`], reserved state keys |
//! | [`middleware`] | the chain and shipped retry / skip / timeout / logging middleware |
//! | [`parallel`] | fan-out, merge policies, fan-in |
//! | [`runner`] | [`GraphRunner`] |
//! | [`config`] | [`RunnerConfig`], [`CheckpointPolicy`] |
//! | [`report`] | [`RunReport`] and per-node reports |

pub mod config;
pub mod edge;
pub mod error;
pub mod graph;
pub mod middleware;
pub mod node;
pub mod node_result;
pub mod nodes;
pub mod parallel;
pub mod report;
pub mod retry;
pub mod runner;
pub mod state;

pub use config::{CheckpointPolicy, RunnerConfig};
pub use edge::{Edge, EdgeCondition};
pub use error::{GraphError, Result};
pub use graph::{Graph, GraphBuilder};
pub use middleware::{ErrorAction, ErrorContext, Middleware, Next, NodeRequest, RunInfo};
pub use node::{FunctionNode, Node, NodeFuture, NodeId};
pub use node_result::NodeResult;
pub use report::{NodeExecutionReport, NodeStatus, RunReport, RunStatus};
pub use retry::RetryPolicy;
pub use runner::GraphRunner;
pub use state::{
    NodeContext, RunState, HUMAN_RESPONSE_KEY, INPUT_KEY, INPUT_METADATA_KEY, INPUT_RESPONSE_KEY,
    PREVIOUS_RESPONSE_KEY,
};

pub use flowgraph_checkpoint::{
    Checkpoint, CheckpointError, CheckpointId, CheckpointReason, CheckpointStore, ExternalContext,
    FileCheckpointStore, HumanInteraction, HumanResponse, InMemoryCheckpointStore,
};
