//! Human-in-the-loop descriptors carried by paused checkpoints
//!
//! When a run reaches a human node it stops and persists a [`HumanInteraction`]
//! describing what the human is being asked. The caller answers later with a
//! [`HumanResponse`], which the runner injects into the run state before
//! resuming.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A pending question for a human, produced when a human node is reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanInteraction {
    /// Node that is waiting for the answer
    pub node_id: String,

    /// Text shown to the human
    pub prompt: String,

    /// Allowed choices; empty means free text is expected
    #[serde(default)]
    pub options: Vec<String>,
}

impl HumanInteraction {
    /// Create a new interaction descriptor
    pub fn new(node_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            prompt: prompt.into(),
            options: Vec::new(),
        }
    }

    /// Set the allowed options
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// The human's answer to a [`HumanInteraction`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanResponse {
    /// Node the answer is addressed to
    pub node_id: String,

    /// One of the offered options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,

    /// Free-form answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_text: Option<String>,
}

impl HumanResponse {
    /// Answer by picking one of the offered options
    pub fn select(node_id: impl Into<String>, option: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            selected_option: Some(option.into()),
            free_text: None,
        }
    }

    /// Answer with free text
    pub fn text(node_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            selected_option: None,
            free_text: Some(text.into()),
        }
    }

    /// The answer as a JSON value: the selected option wins over free text
    pub fn answer(&self) -> Value {
        self.selected_option
            .as_ref()
            .or(self.free_text.as_ref())
            .map(|s| Value::String(s.clone()))
            .unwrap_or(Value::Null)
    }
}

/// Caller-supplied ambient context for a run (tenant, user, extras)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Additional caller attributes
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl ExternalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}
