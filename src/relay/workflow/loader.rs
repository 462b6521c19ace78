// SPDX-License-Identifier: MIT

//! YAML workflow definitions.
//!
//! Graphs can be declared in a file instead of code; definitions compile
//! through the same [GraphBuilder], so they get identical build-time
//! validation. Example:
//!
//! ```yaml
//! name: review_loop
//! entry: spec
//! nodes:
//!   - id: spec
//!     kind: spec_writer
//!     model: qwen3
//!   - id: implement
//!     kind: implementer
//!     model: qwen3
//!   - id: review
//!     kind: reviewer
//!     model: qwen3
//! edges:
//!   - from: spec
//!     to: implement
//!   - from: implement
//!     to: review
//!   - from: review
//!     to: done
//!     when: "score >= 70"
//!   - from: review
//!     to: implement
//!     when: "score < 70"
//! ```

use crate::adk::error::{ConfigError, RelayError};
use crate::adk::model;
use crate::relay::workflow::graph::{Graph, GraphBuilder};
use crate::relay::workflow::node::{
    ImplementerNode, Node, PromptNode, ReviewerNode, SpecWriterNode, ToolNode,
};
use crate::relay::workflow::registry::ToolRegistry;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Top-level workflow file
#[derive(Debug, Clone, Deserialize)]
pub struct GraphFileDef {
    pub name: String,
    pub entry: String,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
    /// Edge targets treated as finish markers; defaults to done/end/finish
    pub finish: Option<Vec<String>>,
    /// Nodes whose exhausted edges complete the run
    #[serde(default)]
    pub terminal: Vec<String>,
}

/// A node declaration
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDef {
    pub id: String,
    /// One of: prompt, spec_writer, implementer, reviewer, tool
    pub kind: String,
    pub model: String,
    pub system: Option<String>,
    pub prompt: Option<String>,
    pub output_key: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    pub max_tool_iterations: Option<u32>,
}

/// An edge declaration
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeDef {
    pub from: String,
    pub to: String,
    pub when: Option<String>,
}

const DEFAULT_SYSTEM: &str = "You are a helpful assistant.";
const DEFAULT_OUTPUT_KEY: &str = "response";

/// Loads workflow graphs from YAML definitions
pub struct WorkflowLoader {
    registry: ToolRegistry,
}

impl WorkflowLoader {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Load and compile a workflow file
    pub async fn load<P: AsRef<Path>>(&self, path: P) -> Result<Graph, RelayError> {
        let content = fs::read_to_string(path)?;
        let def = Self::parse_yaml(&content)?;
        self.compile(&def).await
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<GraphFileDef, RelayError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Compile a parsed definition into a validated [Graph]
    pub async fn compile(&self, def: &GraphFileDef) -> Result<Graph, RelayError> {
        let mut builder = GraphBuilder::new(&def.name);

        for node_def in &def.nodes {
            let node = self.build_node(node_def).await?;
            builder = builder.add_node(&node_def.id, node);
        }

        for edge in &def.edges {
            builder = match &edge.when {
                Some(condition) => builder.add_conditional_edge(&edge.from, &edge.to, condition),
                None => builder.add_edge(&edge.from, &edge.to),
            };
        }

        for name in &def.terminal {
            builder = builder.mark_terminal(name);
        }
        if let Some(finish) = &def.finish {
            builder = builder.set_finish(finish.iter().cloned());
        }

        Ok(builder.set_entry(&def.entry).build()?)
    }

    async fn build_node(&self, def: &NodeDef) -> Result<Arc<dyn Node>, RelayError> {
        let model = model::resolve(&def.model)?;

        let node: Arc<dyn Node> = match def.kind.as_str() {
            "spec_writer" => Arc::new(SpecWriterNode::new(model)),
            "implementer" => Arc::new(ImplementerNode::new(model)),
            "reviewer" => Arc::new(ReviewerNode::new(model)),
            "prompt" => {
                let template = def.prompt.as_deref().ok_or_else(|| {
                    ConfigError::Definition(format!("node '{}' needs a prompt", def.id))
                })?;
                Arc::new(PromptNode::new(
                    model,
                    def.system.as_deref().unwrap_or(DEFAULT_SYSTEM),
                    template,
                    def.output_key.as_deref().unwrap_or(DEFAULT_OUTPUT_KEY),
                ))
            }
            "tool" => {
                let template = def.prompt.as_deref().ok_or_else(|| {
                    ConfigError::Definition(format!("node '{}' needs a prompt", def.id))
                })?;
                let tools = self.registry.get_many(&def.tools).await;
                let mut node = ToolNode::new(
                    model,
                    def.system.as_deref().unwrap_or(DEFAULT_SYSTEM),
                    template,
                    def.output_key.as_deref().unwrap_or(DEFAULT_OUTPUT_KEY),
                    tools,
                );
                if let Some(limit) = def.max_tool_iterations {
                    node = node.with_max_tool_iterations(limit);
                }
                Arc::new(node)
            }
            other => {
                return Err(
                    ConfigError::Definition(format!("unknown node kind '{other}'")).into(),
                )
            }
        };

        Ok(node)
    }
}
