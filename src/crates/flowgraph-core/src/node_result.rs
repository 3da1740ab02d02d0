//! Node execution result types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// What a node produced
///
/// `data` is the node's output and becomes the run result when the node is
/// the last one executed. `metadata` is merged into the run metadata.
/// `next_edge_hints`, when present, restricts edge resolution to edges whose
/// target is listed.
///
/// ```rust
/// use flowgraph_core::NodeResult;
/// use serde_json::json;
///
/// let result = NodeResult::new(json!({"score": 0.9}))
///     .with_metadata("model", json!("small"))
///     .with_next_edge_hints(["publish"]);
/// assert_eq!(result.next_edge_hints.as_deref(), Some(&["publish".to_string()][..]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub data: Value,

    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_edge_hints: Option<Vec<String>>,
}

impl NodeResult {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            metadata: HashMap::new(),
            next_edge_hints: None,
        }
    }

    /// Result with null data, used when a failed node is skipped
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Only consider edges leading to these targets
    pub fn with_next_edge_hints<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.next_edge_hints = Some(targets.into_iter().map(Into::into).collect());
        self
    }
}

impl From<Value> for NodeResult {
    fn from(value: Value) -> Self {
        NodeResult::new(value)
    }
}
