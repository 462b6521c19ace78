// SPDX-License-Identifier: MIT

use crate::adk::tool::Tool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared registry of callable tools. Cloning shares the underlying map,
/// so tools registered through any handle are visible to all of them.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// Resolve a list of tool names, skipping unknown ones with a warning
    pub async fn get_many(&self, names: &[String]) -> Vec<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        names
            .iter()
            .filter_map(|name| {
                let tool = tools.get(name).cloned();
                if tool.is_none() {
                    log::warn!("Tool '{name}' not registered; skipping");
                }
                tool
            })
            .collect()
    }

    /// All registered tools
    pub async fn all(&self) -> Vec<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ToolError;
    use async_trait::async_trait;
    use once_cell::sync::Lazy;
    use serde_json::{json, Value};

    static MOCK_SCHEMA: Lazy<Value> =
        Lazy::new(|| json!({"type": "object", "properties": {}}));

    struct MockTool {
        name: String,
        description: String,
    }

    impl MockTool {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                description: format!("mock tool: {name}"),
            })
        }
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            &self.description
        }

        fn schema(&self) -> &Value {
            &MOCK_SCHEMA
        }

        async fn execute(&self, _input: Value) -> Result<Value, ToolError> {
            Ok(json!({"result": "mock"}))
        }
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = ToolRegistry::new();
        registry.register(MockTool::new("read_file")).await;

        assert!(registry.get("read_file").await.is_some());
        assert!(registry.get("write_file").await.is_none());
    }

    #[tokio::test]
    async fn test_get_many_skips_unknown() {
        let registry = ToolRegistry::new();
        registry.register(MockTool::new("a")).await;
        registry.register(MockTool::new("b")).await;

        let tools = registry
            .get_many(&["a".to_string(), "ghost".to_string(), "b".to_string()])
            .await;
        assert_eq!(tools.len(), 2);
    }

    #[tokio::test]
    async fn test_clone_shares_tools() {
        let registry = ToolRegistry::new();
        let cloned = registry.clone();

        cloned.register(MockTool::new("shared")).await;
        assert!(registry.get("shared").await.is_some());
    }

    #[tokio::test]
    async fn test_all_lists_everything() {
        let registry = ToolRegistry::new();
        registry.register(MockTool::new("a")).await;
        registry.register(MockTool::new("b")).await;
        assert_eq!(registry.all().await.len(), 2);
    }
}
