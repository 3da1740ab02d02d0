//! Final output shaping

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::node::Node;
use crate::node_result::NodeResult;
use crate::state::NodeContext;

type OutputTransform = Arc<dyn Fn(&NodeContext) -> Result<Value> + Send + Sync>;

/// Produces the run result from the accumulated state
///
/// Typically the last node of a graph, so its data becomes the run result.
///
/// ```rust
/// use flowgraph_core::nodes::OutputNode;
/// use serde_json::json;
///
/// let output = OutputNode::new(|ctx| {
///     Ok(json!({
///         "answer": ctx.state.get("answer").cloned(),
///         "run": ctx.run_id,
///     }))
/// });
/// # let _ = output;
/// ```
#[derive(Clone)]
pub struct OutputNode {
    transform: OutputTransform,
}

impl OutputNode {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(&NodeContext) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            transform: Arc::new(transform),
        }
    }

    /// Output the value stored under `key`; missing keys are a state error
    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(move |ctx| {
            ctx.state
                .get(&key)
                .cloned()
                .ok_or_else(|| GraphError::state(format!("output key '{}' is not set", key)))
        })
    }
}

impl fmt::Debug for OutputNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputNode").finish_non_exhaustive()
    }
}

#[async_trait]
impl Node for OutputNode {
    async fn run(&self, ctx: &mut NodeContext) -> Result<NodeResult> {
        let data = (self.transform)(ctx)?;
        Ok(NodeResult::new(data))
    }

    fn kind(&self) -> &'static str {
        "output"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_from_key() {
        let node = OutputNode::from_key("answer");
        let mut ctx = NodeContext::new("g", "r");
        ctx.state.set("answer", json!(42));

        assert_eq!(node.run(&mut ctx).await.unwrap().data, json!(42));

        ctx.state.remove("answer");
        assert!(matches!(node.run(&mut ctx).await, Err(GraphError::State(_))));
    }
}
