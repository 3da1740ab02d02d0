//! Graph model and validating builder
//!
//! A [`Graph`] is the immutable description of a workflow: its nodes, the
//! edges between them, the node execution starts at, and the middleware that
//! wraps every node call. Graphs are built once with a [`GraphBuilder`] and
//! then shared by any number of runs; cloning a graph is cheap because the
//! internals sit behind an `Arc`.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Graph "support-triage"                               │
//! │                                                      │
//! │  entry ─► classify ──(urgent)──► escalate            │
//! │               │                     │                │
//! │               └──(otherwise)──► answer ─► format     │
//! │                                                      │
//! │  middleware: [logging, retry, timeout]               │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Building
//!
//! ```rust
//! use flowgraph_core::{FunctionNode, GraphBuilder, NodeResult};
//! use serde_json::json;
//!
//! let mut builder = GraphBuilder::new("triage");
//! builder
//!     .add_node("classify", FunctionNode::sync(|_| Ok(NodeResult::new(json!("urgent")))))
//!     .add_node("escalate", FunctionNode::sync(|_| Ok(NodeResult::new(json!("paged")))))
//!     .add_node("answer", FunctionNode::sync(|_| Ok(NodeResult::new(json!("faq")))))
//!     .add_conditional_edge("classify", "escalate", |r| r.data == json!("urgent"))
//!     .add_edge("classify", "answer")
//!     .set_entry_point("classify");
//!
//! let graph = builder.build().unwrap();
//! assert_eq!(graph.entry_point(), "classify");
//! ```
//!
//! # Validation
//!
//! `build()` rejects, with [`GraphError::Validation`]:
//! - a graph without nodes
//! - a missing entry point, or one that names an unknown node
//! - an edge whose source or target is unknown
//! - a node id registered twice
//! - a merge node whose paired parallel node is not in the graph

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::edge::{resolve_next, Edge};
use crate::error::{GraphError, Result};
use crate::middleware::Middleware;
use crate::node::{Node, NodeId};
use crate::node_result::NodeResult;

struct GraphInner {
    id: String,
    nodes: HashMap<NodeId, Arc<dyn Node>>,
    node_order: Vec<NodeId>,
    edges: Vec<Edge>,
    entry_point: NodeId,
    middleware: Vec<Arc<dyn Middleware>>,
}

/// Immutable, validated workflow graph
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

impl Graph {
    /// Start building a graph
    pub fn builder(id: impl Into<String>) -> GraphBuilder {
        GraphBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn entry_point(&self) -> &str {
        &self.inner.entry_point
    }

    pub fn node(&self, id: &str) -> Option<&Arc<dyn Node>> {
        self.inner.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.inner.nodes.contains_key(id)
    }

    /// Node ids in registration order
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.inner.node_order.iter().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.len()
    }

    /// All edges in declaration order
    pub fn edges(&self) -> &[Edge] {
        &self.inner.edges
    }

    /// Edges leaving `from`, in declaration order
    pub fn edges_from<'a>(&'a self, from: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.inner.edges.iter().filter(move |e| e.from == from)
    }

    /// Middleware in registration order
    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.inner.middleware
    }

    /// The node to run after `from` completed with `result`, if any
    pub fn next_node(&self, from: &str, result: &NodeResult) -> Option<&str> {
        resolve_next(&self.inner.edges, from, result).map(|edge| edge.to.as_str())
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.inner.id)
            .field("nodes", &self.inner.node_order)
            .field("edges", &self.inner.edges)
            .field("entry_point", &self.inner.entry_point)
            .field("middleware", &self.inner.middleware.len())
            .finish()
    }
}

/// Builder that validates the graph structure on [`build`](GraphBuilder::build)
pub struct GraphBuilder {
    id: String,
    nodes: HashMap<NodeId, Arc<dyn Node>>,
    node_order: Vec<NodeId>,
    duplicates: Vec<NodeId>,
    edges: Vec<Edge>,
    entry_point: Option<NodeId>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: HashMap::new(),
            node_order: Vec::new(),
            duplicates: Vec::new(),
            edges: Vec::new(),
            entry_point: None,
            middleware: Vec::new(),
        }
    }

    /// Register a node under `id`
    pub fn add_node(&mut self, id: impl Into<NodeId>, node: impl Node + 'static) -> &mut Self {
        self.add_shared_node(id, Arc::new(node))
    }

    /// Register an already shared node under `id`
    pub fn add_shared_node(&mut self, id: impl Into<NodeId>, node: Arc<dyn Node>) -> &mut Self {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            self.duplicates.push(id);
            return self;
        }
        self.node_order.push(id.clone());
        self.nodes.insert(id, node);
        self
    }

    /// Add an unconditional edge
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        self.edges.push(Edge::new(from, to));
        self
    }

    /// Add an edge taken only when `condition` holds
    pub fn add_conditional_edge<F>(
        &mut self,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        condition: F,
    ) -> &mut Self
    where
        F: Fn(&NodeResult) -> bool + Send + Sync + 'static,
    {
        self.edges.push(Edge::conditional(from, to, condition));
        self
    }

    pub fn set_entry_point(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.entry_point = Some(node.into());
        self
    }

    /// Append a middleware; the first registered is the outermost
    pub fn add_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn add_shared_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Validate and freeze the graph
    pub fn build(self) -> Result<Graph> {
        self.validate()?;

        let entry_point = self
            .entry_point
            .ok_or_else(|| GraphError::validation("entry point is not set"))?;

        tracing::debug!(
            graph_id = %self.id,
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            middleware = self.middleware.len(),
            "Graph built"
        );

        Ok(Graph {
            inner: Arc::new(GraphInner {
                id: self.id,
                nodes: self.nodes,
                node_order: self.node_order,
                edges: self.edges,
                entry_point,
                middleware: self.middleware,
            }),
        })
    }

    fn validate(&self) -> Result<()> {
        if let Some(id) = self.duplicates.first() {
            return Err(GraphError::validation(format!(
                "node '{}' is registered more than once",
                id
            )));
        }

        if self.nodes.is_empty() {
            return Err(GraphError::validation(format!(
                "graph '{}' has no nodes",
                self.id
            )));
        }

        match &self.entry_point {
            None => return Err(GraphError::validation("entry point is not set")),
            Some(entry) if !self.nodes.contains_key(entry) => {
                return Err(GraphError::validation(format!(
                    "entry point '{}' does not exist",
                    entry
                )))
            }
            Some(_) => {}
        }

        for edge in &self.edges {
            if !self.nodes.contains_key(&edge.from) {
                return Err(GraphError::validation(format!(
                    "edge source '{}' does not exist",
                    edge.from
                )));
            }
            if !self.nodes.contains_key(&edge.to) {
                return Err(GraphError::validation(format!(
                    "edge target '{}' does not exist",
                    edge.to
                )));
            }
        }

        let parallel_ids: HashSet<&str> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.kind() == "parallel")
            .map(|(id, _)| id.as_str())
            .collect();

        for id in &self.node_order {
            let Some(source) = self.nodes.get(id).and_then(|n| n.merge_source()) else {
                continue;
            };
            if !parallel_ids.contains(source) {
                return Err(GraphError::validation(format!(
                    "merge node '{}' reads from '{}', which is not a parallel node in this graph",
                    id, source
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("id", &self.id)
            .field("nodes", &self.node_order)
            .field("edges", &self.edges.len())
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FunctionNode;
    use serde_json::json;

    fn noop() -> FunctionNode {
        FunctionNode::sync(|_| Ok(NodeResult::empty()))
    }

    fn expect_invalid(builder: GraphBuilder, needle: &str) {
        match builder.build() {
            Err(GraphError::Validation(msg)) => assert!(msg.contains(needle), "{}", msg),
            other => panic!("expected validation error, got {:?}", other.map(|g| g.id().to_string())),
        }
    }

    #[test]
    fn test_build_valid_graph() {
        let mut builder = GraphBuilder::new("g");
        builder
            .add_node("a", noop())
            .add_node("b", noop())
            .add_edge("a", "b")
            .set_entry_point("a");

        let graph = builder.build().unwrap();
        assert_eq!(graph.id(), "g");
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(graph.next_node("a", &NodeResult::new(json!(1))), Some("b"));
        assert_eq!(graph.next_node("b", &NodeResult::new(json!(1))), None);
    }

    #[test]
    fn test_empty_graph_rejected() {
        let mut builder = GraphBuilder::new("g");
        builder.set_entry_point("a");
        expect_invalid(builder, "no nodes");
    }

    #[test]
    fn test_missing_entry_point_rejected() {
        let mut builder = GraphBuilder::new("g");
        builder.add_node("a", noop());
        expect_invalid(builder, "entry point is not set");

        let mut builder = GraphBuilder::new("g");
        builder.add_node("a", noop()).set_entry_point("zzz");
        expect_invalid(builder, "'zzz' does not exist");
    }

    #[test]
    fn test_dangling_edges_rejected() {
        let mut builder = GraphBuilder::new("g");
        builder.add_node("a", noop()).add_edge("a", "ghost").set_entry_point("a");
        expect_invalid(builder, "edge target 'ghost'");

        let mut builder = GraphBuilder::new("g");
        builder.add_node("a", noop()).add_edge("ghost", "a").set_entry_point("a");
        expect_invalid(builder, "edge source 'ghost'");
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut builder = GraphBuilder::new("g");
        builder.add_node("a", noop()).add_node("a", noop()).set_entry_point("a");
        expect_invalid(builder, "more than once");
    }

    #[test]
    fn test_graph_clone_shares_structure() {
        let mut builder = GraphBuilder::new("g");
        builder.add_node("a", noop()).set_entry_point("a");
        let graph = builder.build().unwrap();
        let copy = graph.clone();
        assert!(Arc::ptr_eq(&graph.inner, &copy.inner));
    }
}
