//! Parallel fan-out and fan-in
//!
//! A [`ParallelNode`] runs several branch nodes concurrently, each on its own
//! copy of the run context, and collects their outcomes. A paired
//! [`MergeNode`] later reduces those outcomes into a single value.
//!
//! ```text
//!                 ┌──► branch "fast"   ──┐
//!   ParallelNode ─┼──► branch "strict" ──┼──► BranchResults ──► MergeNode
//!   "review"      └──► branch "cheap"  ──┘    state["review"]   (vote, average, ...)
//! ```
//!
//! # Concurrency
//!
//! Branches are tokio tasks in a `JoinSet` sharing one `CancellationToken`.
//! The parallel node always waits for every task before it returns. Branch
//! writes to their context copy are discarded; only their results are kept.
//! Branches are called directly, outside the graph's middleware chain.
//!
//! # Failure
//!
//! | `fail_fast` | a branch fails |
//! |-------------|----------------|
//! | `true` | siblings are cancelled, the node fails with `GraphError::BranchFailed` |
//! | `false` | the failure is recorded in that branch's slot, the others run on |
//!
//! # Output
//!
//! The node's `data` is an object keyed by branch name in declaration order,
//! each value a serialized [`BranchOutcome`]. The same object is stored at
//! `state[<parallel node id>]`. Branch metadata is merged into the node's
//! metadata according to its [`MergePolicy`].

mod merge;
mod merge_node;

pub use merge::{aggregate, Aggregation, BranchOutcome, BranchResults, MergePolicy};
pub use merge_node::{MergeNode, MergeStrategies, Reducer};

use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{panic_message, GraphError, Result};
use crate::node::Node;
use crate::node_result::NodeResult;
use crate::state::NodeContext;

/// Runs branch nodes concurrently and collects their outcomes
#[derive(Clone)]
pub struct ParallelNode {
    branches: Vec<(String, Arc<dyn Node>)>,
    merge_policy: MergePolicy,
    fail_fast: bool,
}

impl ParallelNode {
    /// Create a parallel node; branch names must be unique and non-empty
    pub fn new(branches: Vec<(String, Arc<dyn Node>)>) -> Result<Self> {
        if branches.is_empty() {
            return Err(GraphError::validation("parallel node needs at least one branch"));
        }

        let mut seen = HashSet::new();
        for (name, _) in &branches {
            if name.is_empty() {
                return Err(GraphError::validation("parallel branch names must not be empty"));
            }
            if !seen.insert(name.as_str()) {
                return Err(GraphError::validation(format!(
                    "parallel branch '{}' is declared more than once",
                    name
                )));
            }
        }

        Ok(Self {
            branches,
            merge_policy: MergePolicy::default(),
            fail_fast: false,
        })
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Cancel the remaining branches as soon as one fails
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Branch names in declaration order
    pub fn branch_names(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(|(name, _)| name.as_str())
    }

    pub fn merge_policy(&self) -> &MergePolicy {
        &self.merge_policy
    }

    pub fn is_fail_fast(&self) -> bool {
        self.fail_fast
    }

    fn spawn_branches(
        &self,
        ctx: &NodeContext,
        token: &CancellationToken,
    ) -> JoinSet<(usize, Result<NodeResult>)> {
        let mut join_set = JoinSet::new();

        for (index, (name, node)) in self.branches.iter().enumerate() {
            let mut branch_ctx = ctx.clone();
            branch_ctx.node_id = format!("{}.{}", ctx.node_id, name);
            let branch_id = branch_ctx.node_id.clone();
            let node = node.clone();
            let token = token.clone();

            join_set.spawn(async move {
                let outcome = tokio::select! {
                    _ = token.cancelled() => {
                        Err(GraphError::Cancelled(format!("branch '{}' cancelled", branch_id)))
                    }
                    result = AssertUnwindSafe(node.run(&mut branch_ctx)).catch_unwind() => {
                        result.unwrap_or_else(|payload| {
                            Err(GraphError::NodePanicked {
                                node: branch_id.clone(),
                                message: panic_message(payload.as_ref()),
                            })
                        })
                    }
                };
                (index, outcome)
            });
        }

        join_set
    }
}

impl fmt::Debug for ParallelNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelNode")
            .field("branches", &self.branch_names().collect::<Vec<_>>())
            .field("merge_policy", &self.merge_policy)
            .field("fail_fast", &self.fail_fast)
            .finish()
    }
}

#[async_trait]
impl Node for ParallelNode {
    async fn run(&self, ctx: &mut NodeContext) -> Result<NodeResult> {
        let parallel_id = ctx.node_id.clone();
        let token = CancellationToken::new();
        let mut join_set = self.spawn_branches(ctx, &token);

        tracing::debug!(
            node = %parallel_id,
            branches = self.branches.len(),
            fail_fast = self.fail_fast,
            "Parallel branches started"
        );

        let mut outcomes: Vec<Option<BranchOutcome>> = vec![None; self.branches.len()];
        let mut first_failure: Option<(String, String)> = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, Ok(result))) => {
                    outcomes[index] = Some(BranchOutcome::Success {
                        data: result.data,
                        metadata: result.metadata,
                    });
                }
                Ok((index, Err(error))) => {
                    let branch = &self.branches[index].0;
                    let cancelled = matches!(error, GraphError::Cancelled(_));
                    if !cancelled {
                        tracing::warn!(node = %parallel_id, branch = %branch, error = %error, "Parallel branch failed");
                    }
                    if self.fail_fast && !cancelled && first_failure.is_none() {
                        first_failure = Some((branch.clone(), error.to_string()));
                        token.cancel();
                    }
                    outcomes[index] = Some(BranchOutcome::Failed {
                        error: error.to_string(),
                    });
                }
                Err(join_error) => {
                    tracing::error!(node = %parallel_id, error = %join_error, "Parallel branch task aborted");
                    if self.fail_fast && first_failure.is_none() {
                        first_failure = Some(("<unknown>".to_string(), join_error.to_string()));
                        token.cancel();
                    }
                }
            }
        }

        if let Some((branch, error)) = first_failure {
            return Err(GraphError::BranchFailed {
                node: parallel_id,
                branch,
                error,
            });
        }

        let mut results = BranchResults::new();
        for ((name, _), outcome) in self.branches.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| BranchOutcome::Failed {
                error: "branch task aborted".to_string(),
            });
            results.push(name.clone(), outcome);
        }

        let data = results.to_value()?;
        let metadata = self.merge_policy.merge(&parallel_id, &results);
        ctx.state.set(parallel_id.clone(), data.clone());

        tracing::debug!(
            node = %parallel_id,
            succeeded = results.successes().count(),
            failed = results.len() - results.successes().count(),
            "Parallel branches finished"
        );

        Ok(NodeResult {
            data,
            metadata,
            next_edge_hints: None,
        })
    }

    fn kind(&self) -> &'static str {
        "parallel"
    }
}
