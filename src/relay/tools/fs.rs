// SPDX-License-Identifier: MIT

//! Filesystem tools: read, write, list, and search.

use crate::adk::error::ToolError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::path::Path;
use walkdir::WalkDir;

fn required_str<'a>(input: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    input[field]
        .as_str()
        .ok_or_else(|| ToolError::InvalidInput(format!("missing string field '{field}'")))
}

fn optional_str<'a>(input: &'a Value, field: &str, default: &'a str) -> &'a str {
    input[field].as_str().unwrap_or(default)
}

// ---------------------------------------------------------------------------
// read_file
// ---------------------------------------------------------------------------

static READ_FILE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string", "description": "Path to the file to read"}
        },
        "required": ["path"]
    })
});

/// Read the contents of a file
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file"
    }

    fn schema(&self) -> &Value {
        &READ_FILE_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let path = required_str(&input, "path")?;
        let content = tokio::fs::read_to_string(path).await?;
        Ok(json!({"content": content}))
    }
}

// ---------------------------------------------------------------------------
// write_file
// ---------------------------------------------------------------------------

static WRITE_FILE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string", "description": "Path to the file to write"},
            "content": {"type": "string", "description": "Content to write"}
        },
        "required": ["path", "content"]
    })
});

/// Write content to a file, creating parent directories if needed
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories if needed"
    }

    fn schema(&self) -> &Value {
        &WRITE_FILE_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let path = required_str(&input, "path")?;
        let content = required_str(&input, "content")?;

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content).await?;

        Ok(json!({"path": path, "bytes_written": content.len()}))
    }
}

// ---------------------------------------------------------------------------
// list_files
// ---------------------------------------------------------------------------

static LIST_FILES_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string", "description": "Directory to list (default: current)"}
        }
    })
});

/// List files and directories at a path
pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files and directories at the given path"
    }

    fn schema(&self) -> &Value {
        &LIST_FILES_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let path = optional_str(&input, "path", ".");

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let kind = if entry.path().is_dir() { "dir" } else { "file" };
            entries.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "kind": kind,
            }));
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        Ok(json!({"entries": entries}))
    }
}

// ---------------------------------------------------------------------------
// search_files
// ---------------------------------------------------------------------------

static SEARCH_FILES_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "pattern": {"type": "string", "description": "Wildcard pattern, e.g. *.rs"},
            "path": {"type": "string", "description": "Directory to search (default: current)"}
        },
        "required": ["pattern"]
    })
});

/// Recursively search for files whose name matches a wildcard pattern
pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Recursively search for files matching a wildcard pattern"
    }

    fn schema(&self) -> &Value {
        &SEARCH_FILES_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let pattern = required_str(&input, "pattern")?;
        let path = optional_str(&input, "path", ".");

        let mut matches = Vec::new();
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if wildcard_match(pattern, &name) {
                matches.push(entry.path().to_string_lossy().to_string());
            }
        }
        matches.sort();

        Ok(json!({"matches": matches}))
    }
}

/// Match a file name against a `*`/`?` wildcard pattern
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    // dp[i][j]: pattern[..i] matches name[..j]
    let mut dp = vec![vec![false; name.len() + 1]; pattern.len() + 1];
    dp[0][0] = true;
    for i in 1..=pattern.len() {
        if pattern[i - 1] == '*' {
            dp[i][0] = dp[i - 1][0];
        }
    }

    for i in 1..=pattern.len() {
        for j in 1..=name.len() {
            dp[i][j] = match pattern[i - 1] {
                '*' => dp[i - 1][j] || dp[i][j - 1],
                '?' => dp[i - 1][j - 1],
                c => dp[i - 1][j - 1] && c == name[j - 1],
            };
        }
    }

    dp[pattern.len()][name.len()]
}
