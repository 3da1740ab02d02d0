//! Edges and next-node resolution
//!
//! After a node completes, the runner looks at the edges leaving it in the
//! order they were declared and takes the first one that matches:
//!
//! ```text
//!             ┌── cond: score > 0.8 ──► publish     (checked first)
//!   review ───┼── cond: score > 0.5 ──► revise
//!             └── (no condition) ─────► reject      (fallback)
//! ```
//!
//! An edge without a condition always matches. When nothing matches, the run
//! ends successfully at that node. If the result carries `next_edge_hints`,
//! only edges whose target is listed are considered; an empty hint list
//! therefore ends the run.

use std::fmt;
use std::sync::Arc;

use crate::node::NodeId;
use crate::node_result::NodeResult;

/// Predicate deciding whether a conditional edge is taken
pub type EdgeCondition = Arc<dyn Fn(&NodeResult) -> bool + Send + Sync>;

/// A directed connection between two nodes
#[derive(Clone)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub condition: Option<EdgeCondition>,
}

impl Edge {
    /// Unconditional edge
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
        }
    }

    /// Edge taken only when `condition` holds for the source node's result
    pub fn conditional<F>(from: impl Into<NodeId>, to: impl Into<NodeId>, condition: F) -> Self
    where
        F: Fn(&NodeResult) -> bool + Send + Sync + 'static,
    {
        Self {
            from: from.into(),
            to: to.into(),
            condition: Some(Arc::new(condition)),
        }
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Whether this edge fires for `result`, ignoring hints
    pub fn matches(&self, result: &NodeResult) -> bool {
        self.condition.as_ref().map_or(true, |cond| cond(result))
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("conditional", &self.is_conditional())
            .finish()
    }
}

/// Pick the next node after `from` completed with `result`
pub fn resolve_next<'e>(edges: &'e [Edge], from: &str, result: &NodeResult) -> Option<&'e Edge> {
    let hints = result.next_edge_hints.as_deref();
    edges
        .iter()
        .filter(|edge| edge.from == from)
        .filter(|edge| hints.map_or(true, |targets| targets.iter().any(|t| *t == edge.to)))
        .find(|edge| edge.matches(result))
}
