// SPDX-License-Identifier: MIT

//! Built-in workflows.
//!
//! The reference loop: a spec writer expands the task, an implementer
//! builds it, a reviewer scores it; below the pass threshold the feedback
//! routes back to the implementer, at or above it the run finishes.

use crate::adk::error::RelayError;
use crate::adk::model::{self, Model};
use crate::relay::workflow::graph::{Graph, GraphBuilder};
use crate::relay::workflow::node::{ImplementerNode, ReviewerNode, SpecWriterNode};
use std::sync::Arc;

/// Default review score required to finish the loop
pub const DEFAULT_PASS_THRESHOLD: u32 = 70;

/// Model and threshold choices for the spec/implement/review loop
#[derive(Debug, Clone)]
pub struct SpecImplementReviewConfig {
    pub spec_model: String,
    pub impl_model: String,
    pub review_model: String,
    pub pass_threshold: u32,
}

impl Default for SpecImplementReviewConfig {
    fn default() -> Self {
        Self {
            spec_model: "qwen3".to_string(),
            impl_model: "qwen3".to_string(),
            review_model: "qwen3".to_string(),
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }
}

/// Build the spec -> implement -> review loop from resolved models.
///
/// Kept separate from [spec_implement_review] so tests and embedders can
/// inject their own [Model] implementations.
pub fn build_spec_implement_review(
    spec_model: Arc<dyn Model>,
    impl_model: Arc<dyn Model>,
    review_model: Arc<dyn Model>,
    pass_threshold: u32,
) -> Result<Graph, RelayError> {
    let graph = GraphBuilder::new("spec_implement_review")
        .add_node("spec", Arc::new(SpecWriterNode::new(spec_model)))
        .add_node("implement", Arc::new(ImplementerNode::new(impl_model)))
        .add_node("review", Arc::new(ReviewerNode::new(review_model)))
        .add_edge("spec", "implement")
        .add_edge("implement", "review")
        .add_conditional_edge("review", "done", format!("score >= {pass_threshold}"))
        .add_conditional_edge("review", "implement", format!("score < {pass_threshold}"))
        .set_entry("spec")
        .build()?;

    Ok(graph)
}

/// Build the reference loop, resolving each model identifier to its
/// provider
pub fn spec_implement_review(config: &SpecImplementReviewConfig) -> Result<Graph, RelayError> {
    let spec_model = model::resolve(&config.spec_model)?;
    let impl_model = model::resolve(&config.impl_model)?;
    let review_model = model::resolve(&config.review_model)?;

    build_spec_implement_review(spec_model, impl_model, review_model, config.pass_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ModelError;
    use crate::adk::model::{Content, GenerationConfig, Part};
    use crate::adk::tool::Tool;
    use async_trait::async_trait;

    struct StaticModel;

    #[async_trait]
    impl Model for StaticModel {
        async fn generate(
            &self,
            _history: &[Content],
            _config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> Result<Content, ModelError> {
            Ok(Content {
                role: "model".to_string(),
                parts: vec![Part::Text("ok".to_string())],
            })
        }
    }

    #[test]
    fn test_preset_structure() {
        let graph =
            build_spec_implement_review(Arc::new(StaticModel), Arc::new(StaticModel), Arc::new(StaticModel), 70)
                .unwrap();

        assert_eq!(graph.name(), "spec_implement_review");
        assert_eq!(graph.entry(), "spec");
        assert!(graph.contains("implement"));
        assert!(graph.contains("review"));
        // Review has the pass edge first, then the loop-back edge
        assert_eq!(graph.edges_from("review").count(), 2);

        let text = graph.visualize();
        assert!(text.contains("review -> [done] when score >= 70"));
        assert!(text.contains("review -> implement when score < 70"));
    }

    #[test]
    fn test_preset_respects_threshold() {
        let graph =
            build_spec_implement_review(Arc::new(StaticModel), Arc::new(StaticModel), Arc::new(StaticModel), 90)
                .unwrap();
        assert!(graph.visualize().contains("score >= 90"));
    }
}
