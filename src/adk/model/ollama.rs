// SPDX-License-Identifier: MIT

//! Ollama model - local inference server implementation
//!
//! Chat requests without tools use the streaming endpoint and aggregate
//! the NDJSON token stream into the final message; the engine only ever
//! consumes the aggregated text. Tool-enabled requests are sent
//! non-streaming because Ollama emits tool calls as a single payload.

use super::{Content, GenerationConfig, Model, Part};
use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;
use std::env;
use std::sync::Arc;

/// Local Ollama model implementation.
///
/// Uses `OLLAMA_BASE_URL` when set, `http://localhost:11434` otherwise.
/// No API key is required.
pub struct OllamaModel {
    client: Client,
    model_name: String,
    base_url: String,
}

impl OllamaModel {
    pub fn new(model_name: String) -> Self {
        let base_url =
            env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());

        Self {
            client: Client::new(),
            model_name,
            base_url,
        }
    }

    fn to_message(content: &Content) -> Option<serde_json::Value> {
        let role = match content.role.as_str() {
            "model" => "assistant",
            other => other,
        };

        for part in &content.parts {
            if let Part::ToolResult { result, .. } = part {
                return Some(json!({
                    "role": "tool",
                    "content": serde_json::to_string(result).unwrap_or_default(),
                }));
            }
        }

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in &content.parts {
            match part {
                Part::Text(t) => text.push_str(t),
                Part::ToolCall { name, args, .. } => {
                    tool_calls.push(json!({
                        "function": {"name": name, "arguments": args}
                    }));
                }
                Part::ToolResult { .. } => {}
            }
        }

        let mut msg = json!({"role": role, "content": text});
        if !tool_calls.is_empty() {
            msg["tool_calls"] = json!(tool_calls);
        }
        Some(msg)
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

    fn parse_message(message: &serde_json::Value) -> Content {
        let mut parts = Vec::new();

        if let Some(text) = message["content"].as_str() {
            if !text.is_empty() {
                parts.push(Part::Text(text.to_string()));
            }
        }

        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for tc in tool_calls {
                parts.push(Part::ToolCall {
                    id: None,
                    name: tc["function"]["name"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    // Ollama sends arguments as a JSON object, not a string
                    args: tc["function"]["arguments"].clone(),
                });
            }
        }

        Content {
            role: "model".to_string(),
            parts,
        }
    }

    /// Aggregate an NDJSON token stream into the final assistant message
    async fn collect_stream(resp: reqwest::Response) -> Result<Content, ModelError> {
        let mut stream = resp.bytes_stream();
        let mut buffer = String::new();
        let mut text = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=pos).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let value: serde_json::Value = serde_json::from_str(line)
                    .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
                if let Some(token) = value["message"]["content"].as_str() {
                    text.push_str(token);
                }
                if value["done"].as_bool() == Some(true) {
                    return Ok(Content {
                        role: "model".to_string(),
                        parts: vec![Part::Text(text)],
                    });
                }
            }
        }

        // Stream closed without a done marker; return what we have
        log::warn!("Ollama stream ended without done marker");
        Ok(Content {
            role: "model".to_string(),
            parts: vec![Part::Text(text)],
        })
    }
}

#[async_trait]
impl Model for OllamaModel {
    async fn generate(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ModelError> {
        let url = format!("{}/api/chat", self.base_url);
        let tool_list = tools.filter(|t| !t.is_empty());

        let messages: Vec<serde_json::Value> =
            history.iter().filter_map(Self::to_message).collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages,
            "stream": tool_list.is_none(),
        });

        if let Some(cfg) = config {
            let mut options = json!({});
            if let Some(temp) = cfg.temperature {
                options["temperature"] = json!(temp);
            }
            if let Some(top_p) = cfg.top_p {
                options["top_p"] = json!(top_p);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                options["num_predict"] = json!(max_tokens);
            }
            body["options"] = options;
        }

        if let Some(list) = tool_list {
            body["tools"] = json!(Self::tools_payload(list));
        }

        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ModelError::api("ollama", text));
        }

        if tool_list.is_some() {
            let resp_json: serde_json::Value = resp.json().await?;
            log::debug!("Ollama response: {}", resp_json);
            Ok(Self::parse_message(&resp_json["message"]))
        } else {
            Self::collect_stream(resp).await
        }
    }
}
