//! Agent collaborator and the node that calls it

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

/// What an agent is asked to handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub run_id: String,
    pub node_id: String,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Run metadata at the time of the call
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// What an agent answered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub data: Value,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl AgentResponse {
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

/// An opaque decision-making collaborator
#[async_trait]
pub trait Agent: Send + Sync {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse>;
}

/// Calls an [`Agent`] with a value read from state
///
/// The response `data` is stored at `state[<node id>]` and the whole response
/// at `state[PREVIOUS_RESPONSE_KEY]`.
#[derive(Clone)]
pub struct AgentNode {
    agent: Arc<dyn Agent>,
    input_key: String,
}

impl AgentNode {
    pub fn new(agent: impl Agent + 'static) -> Self {
        Self::from_shared(Arc::new(agent))
    }

    pub fn from_shared(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            input_key: INPUT_KEY.to_string(),
        }
    }

    /// Read the request input from another state key
    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }
}

impl fmt::Debug for AgentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentNode")
            .field("input_key", &self.input_key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Node for AgentNode {
    async fn run(&self, ctx: &mut NodeContext) -> Result<NodeResult> {
        let request = AgentRequest {
            run_id: ctx.run_id.clone(),
            node_id: ctx.node_id.clone(),
            input: ctx.state.get(&self.input_key).cloned().unwrap_or(Value::Null),
            tenant_id: ctx.tenant_id().map(str::to_string),
            user_id: ctx.user_id().map(str::to_string),
            metadata: ctx.metadata.clone(),
        };

        let response = self.agent.invoke(request).await?;

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
        "agent"
    }
}
