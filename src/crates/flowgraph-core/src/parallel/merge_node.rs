//! Fan-in node and stock reducers

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::merge::{vote, BranchOutcome, BranchResults};
use crate::error::{GraphError, Result};
use crate::node::Node;
use crate::node_result::NodeResult;
use crate::state::NodeContext;

/// Reduces branch results to a single value
pub type Reducer = Arc<dyn Fn(&BranchResults) -> Result<Value> + Send + Sync>;

/// Reads the branch results of a parallel node from state and reduces them
///
/// ```rust
/// use flowgraph_core::parallel::{MergeNode, MergeStrategies};
///
/// let merge = MergeNode::new("review", MergeStrategies::vote());
/// # let _ = merge;
/// ```
#[derive(Clone)]
pub struct MergeNode {
    parallel_node_id: String,
    reducer: Reducer,
}

impl MergeNode {
    pub fn new<F>(parallel_node_id: impl Into<String>, reducer: F) -> Self
    where
        F: Fn(&BranchResults) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            parallel_node_id: parallel_node_id.into(),
            reducer: Arc::new(reducer),
        }
    }

    pub fn parallel_node_id(&self) -> &str {
        &self.parallel_node_id
    }
}

impl fmt::Debug for MergeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeNode")
            .field("parallel_node_id", &self.parallel_node_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Node for MergeNode {
    async fn run(&self, ctx: &mut NodeContext) -> Result<NodeResult> {
        let raw = ctx.state.get(&self.parallel_node_id).ok_or_else(|| {
            GraphError::state(format!(
                "no branch results for parallel node '{}' in state",
                self.parallel_node_id
            ))
        })?;
        let results = BranchResults::from_value(raw)?;

        let data = (self.reducer)(&results)?;
        ctx.state.set(ctx.node_id.clone(), data.clone());
        Ok(NodeResult::new(data))
    }

    fn kind(&self) -> &'static str {
        "merge"
    }

    fn merge_source(&self) -> Option<&str> {
        Some(&self.parallel_node_id)
    }
}

/// Stock reducers over the `data` of successful branches
pub struct MergeStrategies;

impl MergeStrategies {
    /// Most common branch data; ties go to the earliest declared branch
    pub fn vote() -> impl Fn(&BranchResults) -> Result<Value> + Send + Sync + 'static {
        |results| {
            vote(results.successes().map(|(_, data, _)| data))
                .ok_or_else(|| GraphError::state("no successful branch to vote on"))
        }
    }

    /// Mean of numeric branch data
    pub fn average() -> impl Fn(&BranchResults) -> Result<Value> + Send + Sync + 'static {
        |results| {
            let numbers: Vec<f64> = results
                .successes()
                .filter_map(|(_, data, _)| data.as_f64())
                .collect();
            if numbers.is_empty() {
                return Err(GraphError::state("no numeric branch data to average"));
            }
            Ok(Value::from(numbers.iter().sum::<f64>() / numbers.len() as f64))
        }
    }

    /// Data of one named branch, which must have succeeded
    pub fn select(branch: impl Into<String>) -> impl Fn(&BranchResults) -> Result<Value> + Send + Sync + 'static {
        let branch = branch.into();
        move |results| match results.get(&branch) {
            Some(BranchOutcome::Success { data, .. }) => Ok(data.clone()),
            Some(BranchOutcome::Failed { error }) => Err(GraphError::state(format!(
                "selected branch '{}' failed: {}",
                branch, error
            ))),
            None => Err(GraphError::state(format!("no branch named '{}'", branch))),
        }
    }

    /// Array of successful branch data in declaration order
    pub fn collect() -> impl Fn(&BranchResults) -> Result<Value> + Send + Sync + 'static {
        |results| {
            Ok(Value::Array(
                results.successes().map(|(_, data, _)| data.clone()).collect(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn results() -> BranchResults {
        let mut results = BranchResults::new();
        for (name, data) in [("a", json!(0.9)), ("b", json!(0.7)), ("c", json!(0.7))] {
            results.push(
                name,
                BranchOutcome::Success {
                    data,
                    metadata: HashMap::new(),
                },
            );
        }
        results.push("d", BranchOutcome::Failed { error: "boom".to_string() });
        results
    }

    #[test]
    fn test_stock_reducers() {
        let r = results();
        assert_eq!(MergeStrategies::vote()(&r).unwrap(), json!(0.7));
        let avg = MergeStrategies::average()(&r).unwrap().as_f64().unwrap();
        assert!((avg - 0.7667).abs() < 1e-3);
        assert_eq!(MergeStrategies::select("a")(&r).unwrap(), json!(0.9));
        assert!(MergeStrategies::select("d")(&r).is_err());
        assert!(MergeStrategies::select("zzz")(&r).is_err());
        assert_eq!(MergeStrategies::collect()(&r).unwrap(), json!([0.9, 0.7, 0.7]));
    }

    #[tokio::test]
    async fn test_merge_node_reads_state() {
        let node = MergeNode::new("fan", MergeStrategies::collect());
        let mut ctx = NodeContext::new("g", "r");
        ctx.node_id = "join".to_string();

        assert!(matches!(node.run(&mut ctx).await, Err(GraphError::State(_))));

        ctx.state.set("fan", results().to_value().unwrap());
        let result = node.run(&mut ctx).await.unwrap();
        assert_eq!(result.data, json!([0.9, 0.7, 0.7]));
        assert_eq!(ctx.state.get("join"), Some(&json!([0.9, 0.7, 0.7])));
        assert_eq!(node.merge_source(), Some("fan"));
    }
}
