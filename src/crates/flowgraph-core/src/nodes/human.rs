//! Human-in-the-loop nodes
//!
//! A human node asks a question and pauses the run until it is answered:
//!
//! ```text
//! first visit:   no response in state  ──► Err(Interrupted(interaction))
//!                                           runner checkpoints, returns Paused
//!
//! resume:        state[HUMAN_RESPONSE_KEY] addressed to this node
//!                ──► consume it, state[<node id>] = answer, data = answer
//! ```
//!
//! The answer can also be supplied up front by putting a serialized
//! `HumanResponse` under [`HUMAN_RESPONSE_KEY`] in the run input; the node
//! then completes without pausing.

use async_trait::async_trait;
use flowgraph_checkpoint::{HumanInteraction, HumanResponse};
use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::node::Node;
use crate::node_result::NodeResult;
use crate::state::{NodeContext, HUMAN_RESPONSE_KEY};

/// Check that `response` answers `interaction`
pub fn validate_response(interaction: &HumanInteraction, response: &HumanResponse) -> Result<()> {
    if response.node_id != interaction.node_id {
        return Err(GraphError::InvalidHumanResponse(format!(
            "response is addressed to '{}' but '{}' is waiting",
            response.node_id, interaction.node_id
        )));
    }

    if let Some(selected) = &response.selected_option {
        if !interaction.options.is_empty() && !interaction.options.contains(selected) {
            return Err(GraphError::InvalidHumanResponse(format!(
                "'{}' is not one of the offered options {:?}",
                selected, interaction.options
            )));
        }
    }

    if response.selected_option.is_none() && response.free_text.is_none() {
        return Err(GraphError::InvalidHumanResponse(
            "response carries neither a selected option nor free text".to_string(),
        ));
    }

    Ok(())
}

/// Consume a pending answer for this node, or pause with `interaction`
fn answer_or_pause(ctx: &mut NodeContext, interaction: HumanInteraction) -> Result<NodeResult> {
    let response = match ctx.state.get_as::<HumanResponse>(HUMAN_RESPONSE_KEY)? {
        Some(response) if response.node_id == ctx.node_id => response,
        _ => return Err(GraphError::Interrupted(interaction)),
    };

    validate_response(&interaction, &response)?;
    ctx.state.remove(HUMAN_RESPONSE_KEY);

    let answer = response.answer();
    ctx.state.set(ctx.node_id.clone(), answer.clone());

    let mut result = NodeResult::new(answer);
    if let Some(text) = response.free_text {
        result = result.with_metadata("human_free_text", Value::String(text));
    }
    Ok(result)
}

/// Pauses with a fixed prompt until a human answers
#[derive(Debug, Clone)]
pub struct HumanNode {
    prompt: String,
    options: Vec<String>,
}

impl HumanNode {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: Vec::new(),
        }
    }

    /// Restrict the answer to these options
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl Node for HumanNode {
    async fn run(&self, ctx: &mut NodeContext) -> Result<NodeResult> {
        let interaction = HumanInteraction::new(ctx.node_id.clone(), self.prompt.clone())
            .with_options(self.options.clone());
        answer_or_pause(ctx, interaction)
    }

    fn kind(&self) -> &'static str {
        "human"
    }
}

/// Pauses with a prompt read from state at the time of the pause
///
/// Falls back to the default prompt when the state key is absent.
#[derive(Debug, Clone)]
pub struct DynamicHumanNode {
    prompt_key: String,
    default_prompt: String,
    options: Vec<String>,
}

impl DynamicHumanNode {
    pub fn new(prompt_key: impl Into<String>, default_prompt: impl Into<String>) -> Self {
        Self {
            prompt_key: prompt_key.into(),
            default_prompt: default_prompt.into(),
            options: Vec::new(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    fn resolve_prompt(&self, ctx: &NodeContext) -> String {
        match ctx.state.get(&self.prompt_key) {
            Some(Value::String(prompt)) => prompt.clone(),
            Some(Value::Null) | None => self.default_prompt.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[async_trait]
impl Node for DynamicHumanNode {
    async fn run(&self, ctx: &mut NodeContext) -> Result<NodeResult> {
        let interaction = HumanInteraction::new(ctx.node_id.clone(), self.resolve_prompt(ctx))
            .with_options(self.options.clone());
        answer_or_pause(ctx, interaction)
    }

    fn kind(&self) -> &'static str {
        "human"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_at(node: &str) -> NodeContext {
        let mut ctx = NodeContext::new("g", "r");
        ctx.node_id = node.to_string();
        ctx
    }

    #[tokio::test]
    async fn test_pauses_without_response() {
        let node = HumanNode::new("Approve?").with_options(["yes", "no"]);
        let mut ctx = ctx_at("review");

        match node.run(&mut ctx).await {
            Err(GraphError::Interrupted(interaction)) => {
                assert_eq!(interaction.node_id, "review");
                assert_eq!(interaction.prompt, "Approve?");
                assert_eq!(interaction.options, vec!["yes", "no"]);
            }
            other => panic!("expected pause, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_consumes_response_addressed_to_it() {
        let node = HumanNode::new("Approve?").with_options(["yes", "no"]);
        let mut ctx = ctx_at("review");
        ctx.state.set(
            HUMAN_RESPONSE_KEY,
            serde_json::to_value(HumanResponse::select("review", "yes")).unwrap(),
        );

        let result = node.run(&mut ctx).await.unwrap();
        assert_eq!(result.data, json!("yes"));
        assert_eq!(ctx.state.get("review"), Some(&json!("yes")));
        assert!(!ctx.state.contains(HUMAN_RESPONSE_KEY));
    }

    #[tokio::test]
    async fn test_ignores_response_for_other_node() {
        let node = HumanNode::new("Approve?");
        let mut ctx = ctx_at("review");
        ctx.state.set(
            HUMAN_RESPONSE_KEY,
            serde_json::to_value(HumanResponse::text("legal", "fine")).unwrap(),
        );

        assert!(matches!(node.run(&mut ctx).await, Err(GraphError::Interrupted(_))));
        assert!(ctx.state.contains(HUMAN_RESPONSE_KEY));
    }

    #[tokio::test]
    async fn test_rejects_option_not_offered() {
        let node = HumanNode::new("Approve?").with_options(["yes", "no"]);
        let mut ctx = ctx_at("review");
        ctx.state.set(
            HUMAN_RESPONSE_KEY,
            serde_json::to_value(HumanResponse::select("review", "maybe")).unwrap(),
        );

        assert!(matches!(
            node.run(&mut ctx).await,
            Err(GraphError::InvalidHumanResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_dynamic_prompt_from_state_with_fallback() {
        let node = DynamicHumanNode::new("question", "Anything else?");

        let mut ctx = ctx_at("ask");
        match node.run(&mut ctx).await {
            Err(GraphError::Interrupted(i)) => assert_eq!(i.prompt, "Anything else?"),
            other => panic!("expected pause, got {:?}", other),
        }

        ctx.state.set("question", json!("Ship to Lyon?"));
        match node.run(&mut ctx).await {
            Err(GraphError::Interrupted(i)) => assert_eq!(i.prompt, "Ship to Lyon?"),
            other => panic!("expected pause, got {:?}", other),
        }
    }
}
