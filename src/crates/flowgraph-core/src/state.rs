//! Run state and node execution context
//!
//! Every run owns exactly one [`NodeContext`]. The runner lends it as
//! `&mut NodeContext` to each node in turn, so a write made by one node is
//! visible to every node that runs after it, including after the run has
//! been checkpointed and resumed.
//!
//! ```text
//! NodeContext
//! ├── graph_id / run_id / node_id   - where we are
//! ├── state: RunState               - versioned key/value store
//! ├── metadata                      - side channel accumulated from NodeResult
//! └── external_context              - caller supplied tenant/user/attributes
//! ```
//!
//! # Run input
//!
//! A run is started from a plain `HashMap<String, Value>`. Keys are copied
//! into the state as-is, except two reserved keys that are consumed:
//!
//! | Key | Effect |
//! |-----|--------|
//! | [`INPUT_METADATA_KEY`] | object whose entries seed `metadata` |
//! | [`INPUT_RESPONSE_KEY`] | `{data, metadata}`; `data` becomes `state[INPUT_KEY]` and `metadata` seeds `metadata`. Takes priority over the two above |

use flowgraph_checkpoint::ExternalContext;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{GraphError, Result};

/// Initial payload of a run
pub const INPUT_KEY: &str = "input";

/// Optional object seeding the run metadata
pub const INPUT_METADATA_KEY: &str = "input_metadata";

/// Optional `{data, metadata}` object seeding both input and metadata
pub const INPUT_RESPONSE_KEY: &str = "input_response";

/// Serialized `HumanResponse` waiting to be consumed by a human node
pub const HUMAN_RESPONSE_KEY: &str = "human_response";

/// Full response of the most recent agent or tool node
pub const PREVIOUS_RESPONSE_KEY: &str = "previous_response";

/// Versioned key/value store scoped to one run
///
/// `version` counts writes (set and remove) and never decreases, including
/// across a checkpoint round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    values: HashMap<String, Value>,
    version: u64,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a state from a checkpoint snapshot
    pub fn from_snapshot(values: HashMap<String, Value>, version: u64) -> Self {
        Self { values, version }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Deserialize a value into a concrete type
    ///
    /// Returns `Ok(None)` when the key is absent and a `State` error when the
    /// stored value has the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| GraphError::state(format!("state key '{}': {}", key, e))),
            None => Ok(None),
        }
    }

    /// Set a value, returning the previous one
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.version += 1;
        self.values.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.version += 1;
        }
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Monotonic write counter
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Copy of all values, for checkpoints and reports
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values.clone()
    }
}

/// Execution context handed to every node of a run
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub graph_id: String,
    pub run_id: String,

    /// Id of the node currently executing
    pub node_id: String,

    pub state: RunState,

    /// Side-channel metadata accumulated from node results
    pub metadata: HashMap<String, Value>,

    pub external_context: Option<ExternalContext>,
}

impl NodeContext {
    /// Create an empty context for a run
    pub fn new(graph_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
            run_id: run_id.into(),
            node_id: String::new(),
            state: RunState::new(),
            metadata: HashMap::new(),
            external_context: None,
        }
    }

    pub fn with_external_context(mut self, context: Option<ExternalContext>) -> Self {
        self.external_context = context;
        self
    }

    /// Seed state and metadata from run input
    pub fn seed(&mut self, input: HashMap<String, Value>) -> Result<()> {
        let mut input = input;
        let input_metadata = input.remove(INPUT_METADATA_KEY);
        let input_response = input.remove(INPUT_RESPONSE_KEY);

        for (key, value) in input {
            self.state.set(key, value);
        }

        match input_response {
            Some(Value::Object(mut response)) => {
                let data = response.remove("data").unwrap_or(Value::Null);
                self.state.set(INPUT_KEY, data);
                if let Some(metadata) = response.remove("metadata") {
                    self.merge_metadata_value(INPUT_RESPONSE_KEY, metadata)?;
                }
            }
            Some(other) => {
                return Err(GraphError::state(format!(
                    "'{}' must be an object with data and metadata, got {}",
                    INPUT_RESPONSE_KEY, other
                )))
            }
            None => {
                if let Some(metadata) = input_metadata {
                    self.merge_metadata_value(INPUT_METADATA_KEY, metadata)?;
                }
            }
        }

        Ok(())
    }

    fn merge_metadata_value(&mut self, key: &str, value: Value) -> Result<()> {
        match value {
            Value::Object(map) => {
                self.merge_metadata(map);
                Ok(())
            }
            Value::Null => Ok(()),
            other => Err(GraphError::state(format!(
                "'{}' metadata must be an object, got {}",
                key, other
            ))),
        }
    }

    /// Merge metadata entries; later keys shadow earlier ones
    pub fn merge_metadata<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.metadata.extend(entries);
    }

    /// The run's initial payload
    pub fn input(&self) -> Option<&Value> {
        self.state.get(INPUT_KEY)
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.external_context
            .as_ref()
            .and_then(|c| c.tenant_id.as_deref())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.external_context
            .as_ref()
            .and_then(|c| c.user_id.as_deref())
    }

    /// Metadata as a JSON object, for reports
    pub fn metadata_value(&self) -> Value {
        Value::Object(
            self.metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        )
    }
}
