// SPDX-License-Identifier: MIT

//! Built-in tools available to tool nodes: filesystem access and shell
//! commands.

pub mod fs;
pub mod shell;

use crate::relay::workflow::registry::ToolRegistry;
use std::sync::Arc;

/// Register the builtin tool set: read_file, write_file, list_files,
/// search_files, run_command.
pub async fn register_builtin_tools(registry: &ToolRegistry) {
    registry.register(Arc::new(fs::ReadFileTool)).await;
    registry.register(Arc::new(fs::WriteFileTool)).await;
    registry.register(Arc::new(fs::ListFilesTool)).await;
    registry.register(Arc::new(fs::SearchFilesTool)).await;
    registry.register(Arc::new(shell::RunCommandTool)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtins_registered() {
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry).await;

        for name in [
            "read_file",
            "write_file",
            "list_files",
            "search_files",
            "run_command",
        ] {
            assert!(registry.get(name).await.is_some(), "missing {name}");
        }
    }
}
