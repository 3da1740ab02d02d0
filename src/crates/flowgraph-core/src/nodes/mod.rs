//! Built-in node kinds
//!
//! | Node | Does |
//! |------|------|
//! | [`FunctionNode`](crate::FunctionNode) | runs a closure |
//! | [`AgentNode`] | calls an [`Agent`] with a value from state |
//! | [`ToolNode`] | calls a [`Tool`] with a value from state |
//! | [`OutputNode`] | shapes the final result from state |
//! | [`HumanNode`] / [`DynamicHumanNode`] | pauses for a human answer |
//! | [`ParallelNode`](crate::parallel::ParallelNode) | fans out to concurrent branches |
//! | [`MergeNode`](crate::parallel::MergeNode) | reduces the branch results of a parallel node |

mod agent;
mod human;
mod output;
mod tool;

pub use agent::{Agent, AgentNode, AgentRequest, AgentResponse};
pub use human::{validate_response, DynamicHumanNode, HumanNode};
pub use output::OutputNode;
pub use tool::{Tool, ToolNode, ToolRequest, ToolResponse};
