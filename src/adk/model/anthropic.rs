// SPDX-License-Identifier: MIT

//! Anthropic model - Claude messages API implementation

use super::{Content, GenerationConfig, Model, Part};
use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;
use std::sync::Arc;

/// Anthropic Claude model implementation.
///
/// Requires `ANTHROPIC_API_KEY`; `ANTHROPIC_BASE_URL` overrides the
/// endpoint for proxies.
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl AnthropicModel {
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ModelError::ApiKeyMissing("anthropic".to_string()))?;
        let base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    /// The messages API takes the system prompt as a top-level field
    fn extract_system(history: &[Content]) -> Option<String> {
        history
            .iter()
            .find(|c| c.role == "system")
            .and_then(|c| c.text())
            .map(str::to_string)
    }

    fn to_message(content: &Content) -> Option<serde_json::Value> {
        if content.role == "system" {
            return None;
        }

        let role = match content.role.as_str() {
            "model" => "assistant",
            other => other,
        };

        let mut blocks = Vec::new();
        for part in &content.parts {
            match part {
                Part::Text(t) => {
                    blocks.push(json!({"type": "text", "text": t}));
                }
                Part::ToolCall { id, name, args } => {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": id.clone().unwrap_or_else(|| format!("toolu_{}", name)),
                        "name": name,
                        "input": args,
                    }));
                }
                Part::ToolResult { id, name, result } => {
                    blocks.push(json!({
                        "type": "tool_result",
                        "tool_use_id": id.clone().unwrap_or_else(|| format!("toolu_{}", name)),
                        "content": serde_json::to_string(result).unwrap_or_default(),
                    }));
                }
            }
        }

        if blocks.is_empty() {
            return None;
        }
        Some(json!({"role": role, "content": blocks}))
    }

    fn tools_payload(tools: &[Arc<dyn Tool>]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "input_schema": t.schema(),
                })
            })
            .collect()
    }

    fn parse_response(response: &serde_json::Value) -> Result<Content, ModelError> {
        let blocks = response["content"].as_array().ok_or_else(|| {
            ModelError::InvalidResponse("no content in Anthropic response".to_string())
        })?;

        let mut parts = Vec::new();
        for block in blocks {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        if !text.is_empty() {
                            parts.push(Part::Text(text.to_string()));
                        }
                    }
                }
                Some("tool_use") => {
                    parts.push(Part::ToolCall {
                        id: block["id"].as_str().map(str::to_string),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        args: block["input"].clone(),
                    });
                }
                _ => {}
            }
        }

        Ok(Content {
            role: "model".to_string(),
            parts,
        })
    }
}

#[async_trait]
impl Model for AnthropicModel {
    async fn generate(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ModelError> {
        let url = format!("{}/messages", self.base_url);

        let messages: Vec<serde_json::Value> =
            history.iter().filter_map(Self::to_message).collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages,
            "max_tokens": config.and_then(|c| c.max_output_tokens).unwrap_or(4096),
        });

        if let Some(system) = Self::extract_system(history) {
            body["system"] = json!(system);
        }
        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(Self::tools_payload(tools));
            }
        }

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ModelError::api("anthropic", text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("Anthropic response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_system() {
        let history = vec![
            Content::system("You are helpful"),
            Content::user("Hello"),
        ];
        assert_eq!(
            AnthropicModel::extract_system(&history),
            Some("You are helpful".to_string())
        );
    }

    #[test]
    fn test_system_message_excluded_from_messages() {
        let content = Content::system("System prompt");
        assert!(AnthropicModel::to_message(&content).is_none());
    }

    #[test]
    fn test_model_role_maps_to_assistant() {
        let content = Content {
            role: "model".to_string(),
            parts: vec![Part::Text("I can help".to_string())],
        };
        let msg = AnthropicModel::to_message(&content).unwrap();
        assert_eq!(msg["role"], "assistant");
        assert_eq!(msg["content"][0]["text"], "I can help");
    }

    #[test]
    fn test_tool_call_becomes_tool_use_block() {
        let content = Content {
            role: "model".to_string(),
            parts: vec![Part::ToolCall {
                id: Some("toolu_123".to_string()),
                name: "read_file".to_string(),
                args: json!({"path": "main.rs"}),
            }],
        };
        let msg = AnthropicModel::to_message(&content).unwrap();
        assert_eq!(msg["content"][0]["type"], "tool_use");
        assert_eq!(msg["content"][0]["id"], "toolu_123");
        assert_eq!(msg["content"][0]["name"], "read_file");
    }

    #[test]
    fn test_parse_text_response() {
        let response = json!({
            "content": [{"type": "text", "text": "Hello, how can I help?"}],
            "stop_reason": "end_turn"
        });
        let content = AnthropicModel::parse_response(&response).unwrap();
        assert_eq!(content.role, "model");
        assert_eq!(content.text(), Some("Hello, how can I help?"));
    }

    #[test]
    fn test_parse_tool_use_response() {
        let response = json!({
            "content": [{
                "type": "tool_use",
                "id": "toolu_9",
                "name": "list_files",
                "input": {"path": "."}
            }],
            "stop_reason": "tool_use"
        });
        let content = AnthropicModel::parse_response(&response).unwrap();
        let calls = content.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "list_files");
        assert_eq!(calls[0].2["path"], ".");
    }

    #[test]
    fn test_parse_missing_content_is_error() {
        let response = json!({"stop_reason": "end_turn"});
        assert!(AnthropicModel::parse_response(&response).is_err());
    }
}
