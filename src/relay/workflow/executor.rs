// SPDX-License-Identifier: MIT

//! The workflow executor.
//!
//! Walks a validated [Graph] from its entry node: execute the current
//! node, merge its delta into state, durably record a handoff, then
//! evaluate outgoing edges in declaration order and follow the first
//! match. A configurable step ceiling bounds every run, so feedback
//! loops cannot spin forever; hitting it is a reported terminal status,
//! not an error.
//!
//! Node failures never propagate out of [Executor::run]: they are
//! captured in the step's handoff and the run terminates as `Failed`.
//! The only fallible path to the caller is handoff persistence itself.

use crate::adk::error::{RelayError, WorkflowError};
use crate::relay::workflow::condition;
use crate::relay::workflow::graph::{EdgePredicate, EdgeTarget, Graph};
use crate::relay::workflow::handoff::{Handoff, RunRecorder, RunSummary};
use crate::relay::workflow::state::{StateDelta, WorkflowState};
use chrono::Local;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub use crate::relay::workflow::handoff::RunStatus;

/// Default step ceiling: room for spec + implement + review plus three
/// further implement/review cycles
pub const DEFAULT_MAX_STEPS: u32 = 10;

/// Default directory for persisted runs
pub const DEFAULT_RUNS_DIR: &str = "workflow_runs";

/// Cooperative cancellation flag, checked between steps. Cancelling never
/// interrupts a node mid-execution; the in-flight step still records its
/// handoff before teardown.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-run options
#[derive(Clone)]
pub struct RunOptions {
    /// Maximum node executions before the run stops as
    /// `StepLimitExceeded`
    pub max_steps: u32,
    /// Persist the handoff trail to disk
    pub persist: bool,
    /// Parent directory for persisted runs
    pub runs_dir: PathBuf,
    /// Cooperative cancellation flag
    pub cancel: Option<CancelToken>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            persist: false,
            runs_dir: PathBuf::from(DEFAULT_RUNS_DIR),
            cancel: None,
        }
    }
}

/// One complete execution of a graph, immutable once returned
pub struct WorkflowRun {
    pub run_id: String,
    pub graph_name: String,
    pub status: RunStatus,
    pub handoffs: Vec<Handoff>,
    pub final_state: Value,
    pub step_count: u32,
    pub total_duration_ms: u64,
    pub error: Option<String>,
}

/// Walks graphs to termination. One executor may run any number of
/// graphs; each run owns its own state and recorder.
pub struct Executor {
    options: RunOptions,
}

impl Executor {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// Run a graph from its entry node with the given seed state
    pub async fn run(&self, graph: &Graph, seed: StateDelta) -> Result<WorkflowRun, RelayError> {
        let run_timer = Instant::now();
        let mut recorder = RunRecorder::new(
            graph.name(),
            self.options.persist.then_some(self.options.runs_dir.as_path()),
        )?;

        log::info!("Workflow {} starting run {}", graph.name(), recorder.run_id());

        let mut state = WorkflowState::from_seed(seed);
        let mut current = graph.entry().to_string();
        let mut steps: u32 = 0;
        let status;
        let mut run_error: Option<String> = None;

        loop {
            if let Some(token) = &self.options.cancel {
                if token.is_cancelled() {
                    log::warn!("Run {} cancelled by caller", recorder.run_id());
                    status = RunStatus::Failed;
                    run_error = Some("cancelled by caller".to_string());
                    break;
                }
            }

            if steps >= self.options.max_steps {
                log::warn!(
                    "Step ceiling {} reached without terminating",
                    self.options.max_steps
                );
                status = RunStatus::StepLimitExceeded;
                break;
            }

            // Defensive: build-time validation makes this unreachable, but
            // routing is dynamic so it is still checked every step
            let Some(node) = graph.node(&current) else {
                let e = WorkflowError::UnknownNode {
                    node: current.clone(),
                };
                log::error!("{e}");
                status = RunStatus::Failed;
                run_error = Some(e.to_string());
                break;
            };

            log::info!("Executing node: {current}");
            let input = state.snapshot();
            let started_at = Local::now();
            let step_timer = Instant::now();

            let result = node.execute(&state).await;

            let duration_ms = step_timer.elapsed().as_millis() as u64;
            let ended_at = Local::now();
            steps += 1;

            match result {
                Ok(delta) => {
                    state.merge(&delta);
                    recorder.record(Handoff {
                        node: current.clone(),
                        step: steps,
                        input,
                        output_delta: delta,
                        started_at: started_at.to_rfc3339(),
                        ended_at: ended_at.to_rfc3339(),
                        duration_ms,
                        error: None,
                    })?;
                }
                Err(e) => {
                    log::error!("Node {current} failed: {e}");
                    recorder.record(Handoff {
                        node: current.clone(),
                        step: steps,
                        input,
                        output_delta: StateDelta::new(),
                        started_at: started_at.to_rfc3339(),
                        ended_at: ended_at.to_rfc3339(),
                        duration_ms,
                        error: Some(e.to_string()),
                    })?;
                    status = RunStatus::Failed;
                    run_error = Some(e.to_string());
                    break;
                }
            }

            // First declared edge whose predicate holds wins
            let next_target = graph
                .edges_from(&current)
                .find(|edge| match &edge.predicate {
                    EdgePredicate::Always => true,
                    EdgePredicate::When(expr) => condition::evaluate(expr, &state),
                })
                .map(|edge| edge.to.clone());

            match next_target {
                Some(EdgeTarget::End) => {
                    log::info!("Node {current} routed to finish");
                    status = RunStatus::Completed;
                    break;
                }
                Some(EdgeTarget::Node(next)) => {
                    log::info!("Routing {current} -> {next}");
                    current = next;
                }
                None => {
                    if graph.is_terminal(&current) {
                        status = RunStatus::Completed;
                    } else {
                        let e = WorkflowError::Routing {
                            node: current.clone(),
                        };
                        log::error!("{e}");
                        status = RunStatus::Failed;
                        run_error = Some(e.to_string());
                    }
                    break;
                }
            }
        }

        let total_duration_ms = run_timer.elapsed().as_millis() as u64;
        let final_state = state.snapshot();

        recorder.finalize(&RunSummary {
            status,
            final_state: final_state.clone(),
            step_count: steps,
            total_duration_ms,
            error: run_error.clone(),
        })?;

        log::info!(
            "Workflow {} finished: {} after {} steps",
            graph.name(),
            status,
            steps
        );

        Ok(WorkflowRun {
            run_id: recorder.run_id().to_string(),
            graph_name: graph.name().to_string(),
            status,
            handoffs: recorder.into_handoffs(),
            final_state,
            step_count: steps,
            total_duration_ms,
            error: run_error,
        })
    }
}
