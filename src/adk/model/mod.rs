// SPDX-License-Identifier: MIT

//! Model module - defines the LLM model trait and implementations.
//!
//! Model implementations live in their own submodules:
//! - [anthropic] - Anthropic's Claude API
//! - [openai] - OpenAI's chat completions API
//! - [ollama] - local Ollama server (streaming)

pub mod anthropic;
pub mod ollama;
pub mod openai;

use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    /// First non-empty text part, if any
    pub fn text(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            Part::Text(t) if !t.is_empty() => Some(t.as_str()),
            _ => None,
        })
    }

    /// All tool calls requested in this message
    pub fn tool_calls(&self) -> Vec<(&Option<String>, &str, &serde_json::Value)> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolCall { id, name, args } => Some((id, name.as_str(), args)),
                _ => None,
            })
            .collect()
    }
}

/// Parts of a message - text, tool calls, tool results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    /// Regular text output from the model
    Text(String),
    /// Tool call requested by the model
    ToolCall {
        /// Provider-assigned call id, echoed back with the result
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        args: serde_json::Value,
    },
    /// Result of executing a requested tool call
    ToolResult {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        result: serde_json::Value,
    },
}

/// Core trait for LLM model implementations.
///
/// Providers may stream tokens internally (see [ollama]); the engine only
/// consumes the final aggregated message.
#[async_trait]
pub trait Model: Send + Sync {
    async fn generate(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ModelError>;
}

/// Resolve a model identifier to a provider instance.
///
/// The provider is inferred from the model name prefix (`gpt*` -> OpenAI,
/// `claude*` -> Anthropic, anything else -> local Ollama) and can be
/// overridden with the `MODEL_PROVIDER` environment variable.
pub fn resolve(model_name: &str) -> Result<Arc<dyn Model>, ModelError> {
    let provider = std::env::var("MODEL_PROVIDER")
        .ok()
        .unwrap_or_else(|| infer_provider(model_name).to_string());

    log::info!("Using provider {} for model {}", provider, model_name);

    match provider.to_ascii_lowercase().as_str() {
        "openai" => Ok(Arc::new(openai::OpenAiModel::new(model_name.to_string())?)),
        "anthropic" => Ok(Arc::new(anthropic::AnthropicModel::new(
            model_name.to_string(),
        )?)),
        _ => Ok(Arc::new(ollama::OllamaModel::new(model_name.to_string()))),
    }
}

fn infer_provider(model_name: &str) -> &'static str {
    if model_name.starts_with("gpt") {
        "openai"
    } else if model_name.starts_with("claude") {
        "anthropic"
    } else {
        "ollama"
    }
}
