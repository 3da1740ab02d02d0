//! Tool collaborator and the node that calls it

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::node::Node;
use crate::node_result::NodeResult;
use crate::state::{NodeContext, INPUT_KEY, PREVIOUS_RESPONSE_KEY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub run_id: String,
    pub node_id: String,
    pub input: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub data: Value,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ToolResponse {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// An opaque callable side effect (search, lookup, API call)
#[async_trait]
pub trait Tool: Send + Sync {
    async fn call(&self, request: ToolRequest) -> Result<ToolResponse>;
}

/// Calls a [`Tool`] with a value read from state
///
/// Stores the response like [`AgentNode`](super::AgentNode) does.
#[derive(Clone)]
pub struct ToolNode {
    tool: Arc<dyn Tool>,
    input_key: String,
}

impl ToolNode {
    pub fn new(tool: impl Tool + 'static) -> Self {
        Self::from_shared(Arc::new(tool))
    }

    pub fn from_shared(tool: Arc<dyn Tool>) -> Self {
        Self {
            tool,
            input_key: INPUT_KEY.to_string(),
        }
    }

    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }
}

impl fmt::Debug for ToolNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolNode")
            .field("input_key", &self.input_key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Node for ToolNode {
    async fn run(&self, ctx: &mut NodeContext) -> Result<NodeResult> {
        let request = ToolRequest {
            run_id: ctx.run_id.clone(),
            node_id: ctx.node_id.clone(),
            input: ctx.state.get(&self.input_key).cloned().unwrap_or(Value::Null),
        };

        let response = self.tool.call(request).await?;

        ctx.state.set(ctx.node_id.clone(), response.data.clone());
        ctx.state
            .set(PREVIOUS_RESPONSE_KEY, serde_json::to_value(&response)?);

        Ok(NodeResult {
            data: response.data,
            metadata: response.metadata,
            next_edge_hints: None,
        })
    }

    fn kind(&self) -> &'static str {
        "tool"
    }
}
