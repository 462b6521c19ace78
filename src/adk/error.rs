// SPDX-License-Identifier: MIT

//! Typed error handling for relay-rs.
//!
//! The taxonomy separates errors that prevent a run from starting
//! ([ConfigError], surfaced by the graph builder) from errors that occur
//! inside a run ([WorkflowError], always converted into a terminal run
//! status plus a handoff error field, never raised past the executor).

use thiserror::Error;

/// Top-level error type for relay-rs
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed graph or workflow definition (fatal, pre-run)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors raised by nodes during a run
    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Model/LLM provider errors
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// No persisted run matches the requested identifier
    #[error("run not found: {run_id}")]
    RunNotFound { run_id: String },

    /// I/O errors (handoff persistence, workflow file loading)
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Graph construction errors, all caught at build time so that run-time
/// routing failures indicate logic defects, never configuration defects.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two nodes registered under the same name
    #[error("duplicate node name: {0}")]
    DuplicateNode(String),

    /// Edge references a node that does not exist in the graph
    #[error("edge {from} -> {to} references unknown node '{to}'")]
    UnknownEdgeTarget { from: String, to: String },

    /// Edge starts from a node that does not exist in the graph
    #[error("edge {from} -> {to} starts from unknown node '{from}'")]
    UnknownEdgeSource { from: String, to: String },

    /// Graph built or run without an entry node
    #[error("no entry node set")]
    EntryNotSet,

    /// Entry node name does not exist in the graph
    #[error("entry node '{0}' does not exist")]
    UnknownEntry(String),

    /// Graph contains no nodes
    #[error("graph has no nodes")]
    EmptyGraph,

    /// Edge condition string failed to parse
    #[error("invalid condition '{expr}': {message}")]
    Condition { expr: String, message: String },

    /// Workflow definition file problems (unknown node kind, missing field)
    #[error("invalid workflow definition: {0}")]
    Definition(String),
}

/// Errors raised by node execution. The executor records these in the
/// step's handoff and transitions the run to `Failed`; they never
/// propagate to the caller as a panic or early return.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Prompt template references a key absent from state
    #[error("template references missing state key '{key}'")]
    Template { key: String },

    /// Model call failed
    #[error("model invocation failed: {0}")]
    Invocation(#[from] ModelError),

    /// Structured output could not be coerced to the expected shape
    #[error("could not parse structured response: {0}")]
    Parse(String),

    /// Tool-calling loop hit its inner iteration ceiling
    #[error("tool loop exceeded {limit} iterations")]
    ToolLoopExceeded { limit: u32 },

    /// No outgoing edge matched on a non-terminal node
    #[error("no edge matched from node '{node}'")]
    Routing { node: String },

    /// Routed to a node absent from the graph (defensive; build-time
    /// validation makes this unreachable)
    #[error("unknown node '{node}'")]
    UnknownNode { node: String },
}

/// Model/LLM provider errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Provider returned a non-success status or malformed payload
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Response body could not be interpreted
    #[error("invalid response from model: {0}")]
    InvalidResponse(String),

    /// HTTP transport errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Tool execution errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("tool timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("invalid tool input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Failed(String),
}

impl ModelError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<String> for RelayError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for RelayError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}
