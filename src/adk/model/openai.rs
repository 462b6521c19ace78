// SPDX-License-Identifier: MIT

//! OpenAI model - chat completions API implementation

use super::{Content, GenerationConfig, Model, Part};
use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;
use std::sync::Arc;

/// OpenAI chat model implementation.
///
/// Requires `OPENAI_API_KEY`; `OPENAI_BASE_URL` overrides the endpoint
/// for compatible gateways.
pub struct OpenAiModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAiModel {
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| ModelError::ApiKeyMissing("openai".to_string()))?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    fn to_message(content: &Content) -> serde_json::Value {
        let role = match content.role.as_str() {
            "model" => "assistant",
            other => other,
        };

        // Tool results become their own "tool" role message
        for part in &content.parts {
            if let Part::ToolResult { id, name, result } = part {
                return json!({
                    "role": "tool",
                    "tool_call_id": id.clone().unwrap_or_else(|| format!("call_{}", name)),
                    "content": serde_json::to_string(result).unwrap_or_default(),
                });
            }
        }

        let mut tool_calls = Vec::new();
        let mut text = String::new();
        for part in &content.parts {
            match part {
                Part::Text(t) => text.push_str(t),
                Part::ToolCall { id, name, args } => {
                    tool_calls.push(json!({
                        "id": id.clone().unwrap_or_else(|| format!("call_{}", name)),
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": serde_json::to_string(args).unwrap_or_default(),
                        }
                    }));
                }
                Part::ToolResult { .. } => {}
            }
        }

        if tool_calls.is_empty() {
            json!({"role": role, "content": text})
        } else {
            json!({
                "role": role,
                "content": if text.is_empty() { serde_json::Value::Null } else { json!(text) },
                "tool_calls": tool_calls,
            })
        }
    }

    fn tools_payload(tools: &[Arc<dyn Tool>]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.schema(),
                    }
                })
            })
            .collect()
    }

    fn parse_response(response: &serde_json::Value) -> Result<Content, ModelError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| {
                ModelError::InvalidResponse("no choices in OpenAI response".to_string())
            })?;

        let message = &choice["message"];
        let mut parts = Vec::new();

        if let Some(content) = message["content"].as_str() {
            if !content.is_empty() {
                parts.push(Part::Text(content.to_string()));
            }
        }

        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for tc in tool_calls {
                // arguments arrive as a JSON-encoded string
                let args_str = tc["function"]["arguments"].as_str().unwrap_or("{}");
                let args: serde_json::Value = serde_json::from_str(args_str).unwrap_or(json!({}));

                parts.push(Part::ToolCall {
                    id: tc["id"].as_str().map(str::to_string),
                    name: tc["function"]["name"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    args,
                });
            }
        }

        Ok(Content {
            role: "model".to_string(),
            parts,
        })
    }
}

#[async_trait]
impl Model for OpenAiModel {
    async fn generate(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let messages: Vec<serde_json::Value> = history.iter().map(Self::to_message).collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages,
        });

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(Self::tools_payload(tools));
                body["tool_choice"] = json!("auto");
            }
        }

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ModelError::api("openai", text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_becomes_tool_role() {
        let content = Content {
            role: "user".to_string(),
            parts: vec![Part::ToolResult {
                id: Some("call_abc".to_string()),
                name: "read_file".to_string(),
                result: json!({"text": "fn main() {}"}),
            }],
        };
        let msg = OpenAiModel::to_message(&content);
        assert_eq!(msg["role"], "tool");
        assert_eq!(msg["tool_call_id"], "call_abc");
    }

    #[test]
    fn test_assistant_tool_call_arguments_are_string_encoded() {
        let content = Content {
            role: "model".to_string(),
            parts: vec![Part::ToolCall {
                id: Some("call_1".to_string()),
                name: "run_command".to_string(),
                args: json!({"command": "ls"}),
            }],
        };
        let msg = OpenAiModel::to_message(&content);
        assert_eq!(msg["role"], "assistant");
        assert_eq!(msg["tool_calls"][0]["function"]["name"], "run_command");
        let args: serde_json::Value =
            serde_json::from_str(msg["tool_calls"][0]["function"]["arguments"].as_str().unwrap())
                .unwrap();
        assert_eq!(args["command"], "ls");
    }

    #[test]
    fn test_parse_text_response() {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "42"}}]
        });
        let content = OpenAiModel::parse_response(&response).unwrap();
        assert_eq!(content.text(), Some("42"));
    }

    #[test]
    fn test_parse_tool_call_response() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "list_files", "arguments": "{\"path\": \".\"}"}
                    }]
                }
            }]
        });
        let content = OpenAiModel::parse_response(&response).unwrap();
        let calls = content.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.as_deref(), Some("call_9"));
        assert_eq!(calls[0].1, "list_files");
        assert_eq!(calls[0].2["path"], ".");
    }

    #[test]
    fn test_parse_empty_choices_is_error() {
        let response = json!({"choices": []});
        assert!(OpenAiModel::parse_response(&response).is_err());
    }
}
