// SPDX-License-Identifier: MIT

//! Workflow graphs and the builder that validates them.
//!
//! A [Graph] is immutable once built; all structural invariants (unique
//! node names, resolvable edge endpoints, a set entry node, parseable
//! conditions) are checked in [GraphBuilder::build], so routing failures
//! at run time indicate logic defects, never configuration defects.

use crate::adk::error::ConfigError;
use crate::relay::workflow::condition::{self, Expr};
use crate::relay::workflow::node::Node;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Predicate attached to an edge
#[derive(Debug, Clone)]
pub enum EdgePredicate {
    /// Unconditional edge; always matches
    Always,
    /// Matches when the expression evaluates true against state
    When(Expr),
}

impl std::fmt::Display for EdgePredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgePredicate::Always => write!(f, "always"),
            EdgePredicate::When(expr) => write!(f, "when {expr}"),
        }
    }
}

/// Where an edge leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeTarget {
    Node(String),
    /// Finish marker; taking this edge completes the run
    End,
}

/// A directed, optionally conditional transition between nodes
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub to: EdgeTarget,
    pub predicate: EdgePredicate,
}

/// An immutable, validated workflow graph
pub struct Graph {
    name: String,
    nodes: HashMap<String, Arc<dyn Node>>,
    node_order: Vec<String>,
    edges: Vec<Edge>,
    entry: String,
    terminal: HashSet<String>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("node_order", &self.node_order)
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .field("terminal", &self.terminal)
            .finish()
    }
}

impl Graph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn node(&self, name: &str) -> Option<&Arc<dyn Node>> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Outgoing edges of a node, in declaration order
    pub fn edges_from<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.from == name)
    }

    /// Whether exhausting this node's edges completes the run instead of
    /// failing it
    pub fn is_terminal(&self, name: &str) -> bool {
        self.terminal.contains(name)
    }

    /// Text rendering of the graph structure for display
    pub fn visualize(&self) -> String {
        let mut lines = vec![format!("Workflow: {}", self.name), String::new()];

        lines.push("Nodes:".to_string());
        for name in &self.node_order {
            let mut markers = String::new();
            if name == &self.entry {
                markers.push_str(" (entry)");
            }
            if self.terminal.contains(name) {
                markers.push_str(" (terminal)");
            }
            let kind = self.nodes[name].kind();
            lines.push(format!("  [{name}]{markers} - {kind}"));
        }

        lines.push(String::new());
        lines.push("Edges:".to_string());
        for edge in &self.edges {
            let target = match &edge.to {
                EdgeTarget::Node(n) => n.clone(),
                EdgeTarget::End => "[done]".to_string(),
            };
            match &edge.predicate {
                EdgePredicate::Always => lines.push(format!("  {} -> {}", edge.from, target)),
                EdgePredicate::When(expr) => {
                    lines.push(format!("  {} -> {} when {}", edge.from, target, expr))
                }
            }
        }

        lines.join("\n")
    }
}

struct PendingEdge {
    from: String,
    to: String,
    condition: Option<String>,
}

/// Incremental graph construction with deferred validation.
///
/// Mirrors the fluent style the workflows are written in:
///
/// ```ignore
/// let graph = GraphBuilder::new("review_loop")
///     .add_node("spec", spec_node)
///     .add_node("implement", impl_node)
///     .add_edge("spec", "implement")
///     .add_conditional_edge("review", "implement", "score < 70")
///     .add_conditional_edge("review", "done", "score >= 70")
///     .set_entry("spec")
///     .build()?;
/// ```
pub struct GraphBuilder {
    name: String,
    nodes: Vec<(String, Arc<dyn Node>)>,
    edges: Vec<PendingEdge>,
    entry: Option<String>,
    terminal: HashSet<String>,
    finish_keys: HashSet<String>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            entry: None,
            terminal: HashSet::new(),
            finish_keys: ["done", "end", "finish"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn add_node(mut self, name: impl Into<String>, node: Arc<dyn Node>) -> Self {
        self.nodes.push((name.into(), node));
        self
    }

    /// Add an unconditional edge. A target naming a finish key (`done` by
    /// default) terminates the run.
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(PendingEdge {
            from: from.into(),
            to: to.into(),
            condition: None,
        });
        self
    }

    /// Add a conditional edge. Edges are evaluated in declaration order;
    /// the first whose condition holds is taken.
    pub fn add_conditional_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        self.edges.push(PendingEdge {
            from: from.into(),
            to: to.into(),
            condition: Some(condition.into()),
        });
        self
    }

    pub fn set_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Mark a node whose exhausted edges complete the run rather than
    /// failing it
    pub fn mark_terminal(mut self, name: impl Into<String>) -> Self {
        self.terminal.insert(name.into());
        self
    }

    /// Replace the set of edge-target names treated as finish markers
    pub fn set_finish<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.finish_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the structure and produce an immutable [Graph]
    pub fn build(self) -> Result<Graph, ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::EmptyGraph);
        }

        let mut nodes = HashMap::new();
        let mut node_order = Vec::new();
        for (name, node) in self.nodes {
            if nodes.insert(name.clone(), node).is_some() {
                return Err(ConfigError::DuplicateNode(name));
            }
            node_order.push(name);
        }

        let entry = self.entry.ok_or(ConfigError::EntryNotSet)?;
        if !nodes.contains_key(&entry) {
            return Err(ConfigError::UnknownEntry(entry));
        }

        for name in &self.terminal {
            if !nodes.contains_key(name) {
                return Err(ConfigError::Definition(format!(
                    "terminal marker references unknown node '{name}'"
                )));
            }
        }

        let mut edges = Vec::with_capacity(self.edges.len());
        for pending in self.edges {
            if !nodes.contains_key(&pending.from) {
                return Err(ConfigError::UnknownEdgeSource {
                    from: pending.from,
                    to: pending.to,
                });
            }

            let to = if self.finish_keys.contains(&pending.to) {
                EdgeTarget::End
            } else if nodes.contains_key(&pending.to) {
                EdgeTarget::Node(pending.to)
            } else {
                return Err(ConfigError::UnknownEdgeTarget {
                    from: pending.from,
                    to: pending.to,
                });
            };

            let predicate = match pending.condition {
                None => EdgePredicate::Always,
                Some(raw) => EdgePredicate::When(condition::parse(&raw)?),
            };

            edges.push(Edge {
                from: pending.from,
                to,
                predicate,
            });
        }

        Ok(Graph {
            name: self.name,
            nodes,
            node_order,
            edges,
            entry,
            terminal: self.terminal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::WorkflowError;
    use crate::relay::workflow::state::{StateDelta, WorkflowState};
    use async_trait::async_trait;

    struct NoopNode;

    #[async_trait]
    impl Node for NoopNode {
        fn kind(&self) -> &'static str {
            "noop"
        }

        async fn execute(&self, _state: &WorkflowState) -> Result<StateDelta, WorkflowError> {
            Ok(StateDelta::new())
        }
    }

    fn noop() -> Arc<dyn Node> {
        Arc::new(NoopNode)
    }

    #[test]
    fn test_build_valid_graph() {
        let graph = GraphBuilder::new("test")
            .add_node("a", noop())
            .add_node("b", noop())
            .add_edge("a", "b")
            .add_edge("b", "done")
            .set_entry("a")
            .build()
            .unwrap();

        assert_eq!(graph.name(), "test");
        assert_eq!(graph.entry(), "a");
        assert!(graph.contains("a"));
        assert!(graph.contains("b"));
        assert_eq!(graph.edges_from("a").count(), 1);
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let err = GraphBuilder::new("test")
            .add_node("a", noop())
            .add_node("a", noop())
            .set_entry("a")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateNode(name) if name == "a"));
    }

    #[test]
    fn test_unknown_edge_target_rejected() {
        let err = GraphBuilder::new("test")
            .add_node("a", noop())
            .add_edge("a", "ghost")
            .set_entry("a")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEdgeTarget { to, .. } if to == "ghost"));
    }

    #[test]
    fn test_unknown_edge_source_rejected() {
        let err = GraphBuilder::new("test")
            .add_node("a", noop())
            .add_edge("ghost", "a")
            .set_entry("a")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEdgeSource { from, .. } if from == "ghost"));
    }

    #[test]
    fn test_missing_entry_rejected() {
        let err = GraphBuilder::new("test")
            .add_node("a", noop())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EntryNotSet));
    }

    #[test]
    fn test_unknown_entry_rejected() {
        let err = GraphBuilder::new("test")
            .add_node("a", noop())
            .set_entry("ghost")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEntry(name) if name == "ghost"));
    }

    #[test]
    fn test_empty_graph_rejected() {
        let err = GraphBuilder::new("test").build().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyGraph));
    }

    #[test]
    fn test_bad_condition_rejected_at_build() {
        let err = GraphBuilder::new("test")
            .add_node("a", noop())
            .add_conditional_edge("a", "done", "score >= banana")
            .set_entry("a")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Condition { .. }));
    }

    #[test]
    fn test_finish_key_becomes_end_target() {
        let graph = GraphBuilder::new("test")
            .add_node("a", noop())
            .add_edge("a", "done")
            .set_entry("a")
            .build()
            .unwrap();

        let edge = graph.edges_from("a").next().unwrap();
        assert_eq!(edge.to, EdgeTarget::End);
    }

    #[test]
    fn test_custom_finish_keys() {
        let graph = GraphBuilder::new("test")
            .add_node("a", noop())
            .add_edge("a", "complete")
            .set_finish(["complete"])
            .set_entry("a")
            .build()
            .unwrap();

        let edge = graph.edges_from("a").next().unwrap();
        assert_eq!(edge.to, EdgeTarget::End);
    }

    #[test]
    fn test_edges_keep_declaration_order() {
        let graph = GraphBuilder::new("test")
            .add_node("review", noop())
            .add_node("implement", noop())
            .add_conditional_edge("review", "done", "score >= 70")
            .add_conditional_edge("review", "implement", "score < 70")
            .set_entry("review")
            .build()
            .unwrap();

        let targets: Vec<_> = graph.edges_from("review").map(|e| e.to.clone()).collect();
        assert_eq!(
            targets,
            vec![EdgeTarget::End, EdgeTarget::Node("implement".to_string())]
        );
    }

    #[test]
    fn test_visualize_lists_structure() {
        let graph = GraphBuilder::new("review_loop")
            .add_node("a", noop())
            .add_node("b", noop())
            .add_edge("a", "b")
            .add_conditional_edge("b", "done", "score >= 70")
            .set_entry("a")
            .mark_terminal("b")
            .build()
            .unwrap();

        let text = graph.visualize();
        assert!(text.contains("Workflow: review_loop"));
        assert!(text.contains("[a] (entry)"));
        assert!(text.contains("[b] (terminal)"));
        assert!(text.contains("a -> b"));
        assert!(text.contains("b -> [done] when score >= 70"));
    }
}
