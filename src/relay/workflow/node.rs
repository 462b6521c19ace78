// SPDX-License-Identifier: MIT

//! Workflow nodes.
//!
//! Every node implements the same contract: read state, do one unit of
//! work, return the keys it wrote. The executor owns merging and
//! recording; nodes never touch state directly.

use crate::adk::error::WorkflowError;
use crate::adk::model::{Content, GenerationConfig, Model, Part};
use crate::adk::tool::Tool;
use crate::relay::workflow::state::{StateDelta, WorkflowState};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// One step in a workflow graph
#[async_trait]
pub trait Node: Send + Sync {
    /// Node-kind tag, used for graph visualization
    fn kind(&self) -> &'static str;

    /// Execute against the current state and return the written keys
    async fn execute(&self, state: &WorkflowState) -> Result<StateDelta, WorkflowError>;
}

fn delta_of(key: &str, value: Value) -> StateDelta {
    let mut delta = StateDelta::new();
    delta.insert(key.to_string(), value);
    delta
}

// ---------------------------------------------------------------------------
// Generic prompt node
// ---------------------------------------------------------------------------

/// Renders a prompt template from state, invokes the model, and writes the
/// raw text response to its output key.
pub struct PromptNode {
    model: Arc<dyn Model>,
    system_prompt: String,
    template: String,
    output_key: String,
    config: Option<GenerationConfig>,
}

impl PromptNode {
    pub fn new(
        model: Arc<dyn Model>,
        system_prompt: impl Into<String>,
        template: impl Into<String>,
        output_key: impl Into<String>,
    ) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
            template: template.into(),
            output_key: output_key.into(),
            config: None,
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    async fn complete(&self, prompt: String) -> Result<String, WorkflowError> {
        let history = vec![Content::system(&self.system_prompt), Content::user(prompt)];
        let response = self
            .model
            .generate(&history, self.config.as_ref(), None)
            .await?;
        Ok(response.text().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl Node for PromptNode {
    fn kind(&self) -> &'static str {
        "prompt"
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateDelta, WorkflowError> {
        let prompt = state.render(&self.template)?;
        let text = self.complete(prompt).await?;
        Ok(delta_of(&self.output_key, Value::String(text)))
    }
}

// ---------------------------------------------------------------------------
// Spec writer
// ---------------------------------------------------------------------------

const SPEC_SYSTEM: &str = "You are a senior technical architect. Given a task, write a detailed specification.

Include:
1. Overview - what this should do
2. Requirements - specific features and behaviors
3. Interface - function signatures, inputs, outputs
4. Edge cases - error handling, boundary conditions
5. Success criteria - how to know it is working

Be precise and comprehensive. The spec will be handed to another model to implement.";

const SPEC_TEMPLATE: &str = "Write a detailed specification for this task:

{task}";

/// Writes a detailed specification from the seeded `task`; output key
/// `spec`.
pub struct SpecWriterNode {
    inner: PromptNode,
}

impl SpecWriterNode {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            inner: PromptNode::new(model, SPEC_SYSTEM, SPEC_TEMPLATE, "spec"),
        }
    }
}

#[async_trait]
impl Node for SpecWriterNode {
    fn kind(&self) -> &'static str {
        "spec_writer"
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateDelta, WorkflowError> {
        self.inner.execute(state).await
    }
}

// ---------------------------------------------------------------------------
// Implementer
// ---------------------------------------------------------------------------

const IMPLEMENT_SYSTEM: &str = "You are an expert programmer. Implement code exactly according to the specification.

Rules:
- Follow the spec precisely
- Write clean, well-documented code
- Handle all edge cases mentioned
- Output only the code in a single fenced code block

If there is feedback from a previous review, address every point.";

const IMPLEMENT_TEMPLATE: &str = "Specification:
{spec}";

/// Implements the `spec`, folding in `feedback` from a previous review
/// when present; output key `implementation`. Re-executing overwrites the
/// previous attempt, which is what makes the review loop converge on one
/// accumulated result.
pub struct ImplementerNode {
    model: Arc<dyn Model>,
    config: Option<GenerationConfig>,
}

impl ImplementerNode {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            config: None,
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[async_trait]
impl Node for ImplementerNode {
    fn kind(&self) -> &'static str {
        "implementer"
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateDelta, WorkflowError> {
        let mut prompt = state.render(IMPLEMENT_TEMPLATE)?;

        if let Some(feedback) = state
            .get("feedback")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
        {
            log::info!("Regenerating implementation with review feedback");
            prompt.push_str("\n\nPrevious review feedback to address:\n");
            prompt.push_str(feedback);
        }

        prompt.push_str(
            "\n\nImplement this specification. Output only the code in a single fenced code block.",
        );

        let history = vec![Content::system(IMPLEMENT_SYSTEM), Content::user(prompt)];
        let response = self
            .model
            .generate(&history, self.config.as_ref(), None)
            .await?;
        let text = response.text().unwrap_or_default().to_string();

        Ok(delta_of("implementation", Value::String(text)))
    }
}

// ---------------------------------------------------------------------------
// Reviewer
// ---------------------------------------------------------------------------

const REVIEW_SYSTEM: &str = "You are a senior code reviewer. Review the implementation against the specification.

Evaluate:
1. Correctness - does it meet the spec?
2. Completeness - all requirements addressed?
3. Quality - clean, readable, well-documented?
4. Edge cases - properly handled?

Output format (MUST follow exactly):
SCORE: [0-100]
FEEDBACK:
- [point 1]
- [point 2]

Be strict but fair. Only give 90+ if the implementation is production-ready.";

const REVIEW_TEMPLATE: &str = "Specification:
{spec}

Implementation to review:
{implementation}

Review this implementation against the specification. Output SCORE and FEEDBACK.";

/// Scores the `implementation` against the `spec`; writes `score`
/// (integer 0-100) and `feedback`.
///
/// A response that cannot be coerced into a score is recoverable: it is
/// scored 0 with the raw text as feedback, so the review loop keeps going
/// instead of aborting the run.
pub struct ReviewerNode {
    model: Arc<dyn Model>,
    config: Option<GenerationConfig>,
}

impl ReviewerNode {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            config: None,
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Extract `(score, feedback)` from a `SCORE:`/`FEEDBACK:` response
    pub(crate) fn parse_review(text: &str) -> Result<(i64, String), WorkflowError> {
        let mut score = None;
        for line in text.lines() {
            if let Some(rest) = line.trim().strip_prefix("SCORE:") {
                let digits: String = rest
                    .trim()
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                if !digits.is_empty() {
                    score = digits.parse::<i64>().ok();
                    break;
                }
            }
        }

        let score = score.ok_or_else(|| {
            WorkflowError::Parse(format!(
                "no SCORE line in review response: {}",
                text.chars().take(80).collect::<String>()
            ))
        })?;

        let feedback = match text.find("FEEDBACK:") {
            Some(pos) => text[pos + "FEEDBACK:".len()..].trim().to_string(),
            None => text.trim().to_string(),
        };

        Ok((score.clamp(0, 100), feedback))
    }
}

#[async_trait]
impl Node for ReviewerNode {
    fn kind(&self) -> &'static str {
        "reviewer"
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateDelta, WorkflowError> {
        let prompt = state.render(REVIEW_TEMPLATE)?;
        let history = vec![Content::system(REVIEW_SYSTEM), Content::user(prompt)];
        let response = self
            .model
            .generate(&history, self.config.as_ref(), None)
            .await?;
        let text = response.text().unwrap_or_default().to_string();

        let (score, feedback) = match Self::parse_review(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                // Recoverable: score 0 keeps the loop going
                log::warn!("Review response not parseable ({e}); scoring 0");
                (0, text)
            }
        };

        log::info!("Review score: {score}/100");

        let mut delta = StateDelta::new();
        delta.insert("score".to_string(), json!(score));
        delta.insert("feedback".to_string(), Value::String(feedback));
        Ok(delta)
    }
}

// ---------------------------------------------------------------------------
// Tool node
// ---------------------------------------------------------------------------

const DEFAULT_TOOL_ITERATIONS: u32 = 10;

/// Prompt node with a bounded inner tool-call loop: the model may request
/// tool executions, whose results are appended to the conversation before
/// re-invoking, until it answers with text or the iteration ceiling hits.
pub struct ToolNode {
    model: Arc<dyn Model>,
    system_prompt: String,
    template: String,
    output_key: String,
    tools: Vec<Arc<dyn Tool>>,
    max_tool_iterations: u32,
}

impl ToolNode {
    pub fn new(
        model: Arc<dyn Model>,
        system_prompt: impl Into<String>,
        template: impl Into<String>,
        output_key: impl Into<String>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
            template: template.into(),
            output_key: output_key.into(),
            tools,
            max_tool_iterations: DEFAULT_TOOL_ITERATIONS,
        }
    }

    pub fn with_max_tool_iterations(mut self, limit: u32) -> Self {
        self.max_tool_iterations = limit;
        self
    }

    async fn run_tool(&self, name: &str, args: Value) -> Value {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            log::error!("Tool {name} not found");
            return json!({"error": format!("tool '{}' not found", name)});
        };

        match tool.execute(args).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Tool {name} failed: {e}");
                json!({"error": e.to_string()})
            }
        }
    }
}

#[async_trait]
impl Node for ToolNode {
    fn kind(&self) -> &'static str {
        "tool"
    }

    async fn execute(&self, state: &WorkflowState) -> Result<StateDelta, WorkflowError> {
        let prompt = state.render(&self.template)?;
        let mut history = vec![Content::system(&self.system_prompt), Content::user(prompt)];

        for turn in 0..self.max_tool_iterations {
            log::info!(
                "Tool node turn {}/{}",
                turn + 1,
                self.max_tool_iterations
            );

            let response = self
                .model
                .generate(&history, None, Some(&self.tools))
                .await?;

            let text = response.text().map(str::to_string);
            let calls: Vec<(Option<String>, String, Value)> = response
                .parts
                .iter()
                .filter_map(|p| match p {
                    Part::ToolCall { id, name, args } => {
                        Some((id.clone(), name.clone(), args.clone()))
                    }
                    _ => None,
                })
                .collect();

            history.push(response);

            // Text wins: a final answer ends the loop even if the model
            // also emitted calls
            if let Some(text) = text {
                return Ok(delta_of(&self.output_key, Value::String(text)));
            }

            if calls.is_empty() {
                log::warn!("Model returned neither text nor tool calls");
                return Ok(delta_of(&self.output_key, Value::String(String::new())));
            }

            let mut results = Vec::with_capacity(calls.len());
            for (id, name, args) in calls {
                log::info!("Tool call: {name} {args}");
                let result = self.run_tool(&name, args).await;
                results.push(Part::ToolResult { id, name, result });
            }
            history.push(Content {
                role: "user".to_string(),
                parts: results,
            });
        }

        Err(WorkflowError::ToolLoopExceeded {
            limit: self.max_tool_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::{ModelError, ToolError};
    use once_cell::sync::Lazy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock model returning scripted responses in order
    struct MockModel {
        responses: Vec<Content>,
        index: AtomicUsize,
        histories: Mutex<Vec<Vec<Content>>>,
    }

    impl MockModel {
        fn new(responses: Vec<Content>) -> Arc<Self> {
            Arc::new(Self {
                responses,
                index: AtomicUsize::new(0),
                histories: Mutex::new(Vec::new()),
            })
        }

        fn text(text: &str) -> Content {
            Content {
                role: "model".to_string(),
                parts: vec![Part::Text(text.to_string())],
            }
        }

        fn tool_call(name: &str, args: Value) -> Content {
            Content {
                role: "model".to_string(),
                parts: vec![Part::ToolCall {
                    id: None,
                    name: name.to_string(),
                    args,
                }],
            }
        }

        fn last_user_prompt(&self) -> String {
            let histories = self.histories.lock().unwrap();
            let history = histories.last().unwrap();
            history
                .iter()
                .rev()
                .find(|c| c.role == "user")
                .and_then(|c| c.text())
                .unwrap_or_default()
                .to_string()
        }
    }

    #[async_trait]
    impl Model for MockModel {
        async fn generate(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> Result<Content, ModelError> {
            self.histories.lock().unwrap().push(history.to_vec());
            let idx = self.index.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .responses
                .get(idx)
                .cloned()
                .unwrap_or_else(|| MockModel::text("exhausted")))
        }
    }

    static ECHO_SCHEMA: Lazy<Value> = Lazy::new(|| json!({"type": "object", "properties": {}}));

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echoes its input"
        }

        fn schema(&self) -> &Value {
            &ECHO_SCHEMA
        }

        async fn execute(&self, input: Value) -> Result<Value, ToolError> {
            Ok(json!({"echo": input}))
        }
    }

    fn seeded(pairs: Vec<(&str, Value)>) -> WorkflowState {
        WorkflowState::from_seed(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[tokio::test]
    async fn test_prompt_node_writes_output_key() {
        let model = MockModel::new(vec![MockModel::text("hello back")]);
        let node = PromptNode::new(model.clone(), "system", "Say hi to {task}", "greeting");

        let state = seeded(vec![("task", json!("the user"))]);
        let delta = node.execute(&state).await.unwrap();

        assert_eq!(delta["greeting"], json!("hello back"));
        assert_eq!(model.last_user_prompt(), "Say hi to the user");
    }

    #[tokio::test]
    async fn test_prompt_node_missing_key_is_template_error() {
        let model = MockModel::new(vec![]);
        let node = PromptNode::new(model, "system", "Implement {spec}", "out");

        let err = node.execute(&WorkflowState::empty()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Template { key } if key == "spec"));
    }

    #[tokio::test]
    async fn test_spec_writer_writes_spec() {
        let model = MockModel::new(vec![MockModel::text("1. Overview...")]);
        let node = SpecWriterNode::new(model);

        let state = seeded(vec![("task", json!("build a calculator"))]);
        let delta = node.execute(&state).await.unwrap();
        assert_eq!(delta["spec"], json!("1. Overview..."));
    }

    #[tokio::test]
    async fn test_implementer_without_feedback() {
        let model = MockModel::new(vec![MockModel::text("fn main() {}")]);
        let node = ImplementerNode::new(model.clone());

        let state = seeded(vec![("spec", json!("write main"))]);
        let delta = node.execute(&state).await.unwrap();

        assert_eq!(delta["implementation"], json!("fn main() {}"));
        assert!(!model.last_user_prompt().contains("feedback"));
    }

    #[tokio::test]
    async fn test_implementer_includes_feedback_when_present() {
        let model = MockModel::new(vec![MockModel::text("fn main() { /* v2 */ }")]);
        let node = ImplementerNode::new(model.clone());

        let state = seeded(vec![
            ("spec", json!("write main")),
            ("feedback", json!("add error handling")),
        ]);
        node.execute(&state).await.unwrap();

        let prompt = model.last_user_prompt();
        assert!(prompt.contains("Previous review feedback to address:"));
        assert!(prompt.contains("add error handling"));
    }

    #[tokio::test]
    async fn test_implementer_missing_spec_is_template_error() {
        let model = MockModel::new(vec![]);
        let node = ImplementerNode::new(model);

        let state = seeded(vec![("task", json!("t"))]);
        let err = node.execute(&state).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Template { key } if key == "spec"));
    }

    #[test]
    fn test_parse_review_well_formed() {
        let text = "SCORE: 85\nFEEDBACK:\n- looks good\n- minor nits";
        let (score, feedback) = ReviewerNode::parse_review(text).unwrap();
        assert_eq!(score, 85);
        assert_eq!(feedback, "- looks good\n- minor nits");
    }

    #[test]
    fn test_parse_review_clamps_score() {
        let (score, _) = ReviewerNode::parse_review("SCORE: 250\nFEEDBACK:\nok").unwrap();
        assert_eq!(score, 100);
    }

    #[test]
    fn test_parse_review_without_feedback_section() {
        let (score, feedback) = ReviewerNode::parse_review("SCORE: 40\nneeds work").unwrap();
        assert_eq!(score, 40);
        assert!(feedback.contains("needs work"));
    }

    #[test]
    fn test_parse_review_unparseable_is_parse_error() {
        let err = ReviewerNode::parse_review("I liked it a lot!").unwrap_err();
        assert!(matches!(err, WorkflowError::Parse(_)));
    }

    #[tokio::test]
    async fn test_reviewer_writes_score_and_feedback() {
        let model = MockModel::new(vec![MockModel::text("SCORE: 85\nFEEDBACK:\nlooks good")]);
        let node = ReviewerNode::new(model);

        let state = seeded(vec![("spec", json!("s")), ("implementation", json!("i"))]);
        let delta = node.execute(&state).await.unwrap();

        assert_eq!(delta["score"], json!(85));
        assert_eq!(delta["feedback"], json!("looks good"));
    }

    #[tokio::test]
    async fn test_reviewer_recovers_from_unparseable_response() {
        let model = MockModel::new(vec![MockModel::text("what a lovely program")]);
        let node = ReviewerNode::new(model);

        let state = seeded(vec![("spec", json!("s")), ("implementation", json!("i"))]);
        let delta = node.execute(&state).await.unwrap();

        assert_eq!(delta["score"], json!(0));
        assert_eq!(delta["feedback"], json!("what a lovely program"));
    }

    #[tokio::test]
    async fn test_tool_node_executes_calls_then_returns_text() {
        let model = MockModel::new(vec![
            MockModel::tool_call("echo", json!({"x": 1})),
            MockModel::text("all done"),
        ]);
        let node = ToolNode::new(
            model.clone(),
            "system",
            "{task}",
            "result",
            vec![Arc::new(EchoTool)],
        );

        let state = seeded(vec![("task", json!("go"))]);
        let delta = node.execute(&state).await.unwrap();

        assert_eq!(delta["result"], json!("all done"));

        // The tool result was appended to the conversation for turn two
        let histories = model.histories.lock().unwrap();
        let second = histories.last().unwrap();
        let has_result = second
            .iter()
            .flat_map(|c| c.parts.iter())
            .any(|p| matches!(p, Part::ToolResult { name, .. } if name == "echo"));
        assert!(has_result);
    }

    #[tokio::test]
    async fn test_tool_node_unknown_tool_reports_error_and_continues() {
        let model = MockModel::new(vec![
            MockModel::tool_call("ghost", json!({})),
            MockModel::text("recovered"),
        ]);
        let node = ToolNode::new(model, "system", "{task}", "result", vec![Arc::new(EchoTool)]);

        let state = seeded(vec![("task", json!("go"))]);
        let delta = node.execute(&state).await.unwrap();
        assert_eq!(delta["result"], json!("recovered"));
    }

    #[tokio::test]
    async fn test_tool_node_loop_ceiling() {
        // Model keeps calling tools forever
        let responses: Vec<Content> = (0..5)
            .map(|_| MockModel::tool_call("echo", json!({})))
            .collect();
        let node = ToolNode::new(
            MockModel::new(responses),
            "system",
            "{task}",
            "result",
            vec![Arc::new(EchoTool)],
        )
        .with_max_tool_iterations(3);

        let state = seeded(vec![("task", json!("go"))]);
        let err = node.execute(&state).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ToolLoopExceeded { limit: 3 }));
    }
}
