// SPDX-License-Identifier: MIT

use crate::adk::error::ToolError;
use async_trait::async_trait;
use serde_json::Value;

/// Trait for tools that can be called from a tool-enabled workflow node.
///
/// `name()`, `description()` and `schema()` return borrows so that the
/// declarations sent to the model on every turn do not allocate;
/// implementations keep these in struct fields (static schemas via
/// `once_cell::sync::Lazy`).
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within a registry
    fn name(&self) -> &str;

    /// Human-readable description shown to the model
    fn description(&self) -> &str;

    /// JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Execute the tool with the given input
    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}
