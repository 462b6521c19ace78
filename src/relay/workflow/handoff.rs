// SPDX-License-Identifier: MIT

//! Durable handoff trail for workflow runs.
//!
//! Each run persists to its own directory named `{timestamp}_{graph}`:
//! one `NN_{node}.json` file per executed step, written synchronously
//! before the executor advances, plus a `final.json` summary once the run
//! terminates. A crash mid-run therefore leaves a truncated-but-valid
//! trail, never a corrupted one.

use crate::adk::error::RelayError;
use crate::relay::workflow::state::StateDelta;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Terminal and in-flight statuses of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    StepLimitExceeded,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::StepLimitExceeded => "step_limit_exceeded",
        };
        write!(f, "{s}")
    }
}

/// Record of one node execution: input snapshot, written delta, timing,
/// and the error if the node failed. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handoff {
    pub node: String,
    pub step: u32,
    pub input: Value,
    pub output_delta: StateDelta,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Terminal summary written to `final.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub status: RunStatus,
    pub final_state: Value,
    pub step_count: u32,
    pub total_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

const FINAL_FILE: &str = "final.json";

/// Appends handoffs to the current run, writing each durably before the
/// executor proceeds when persistence is enabled.
pub struct RunRecorder {
    run_id: String,
    run_dir: Option<PathBuf>,
    handoffs: Vec<Handoff>,
}

impl RunRecorder {
    /// Start a recorder for a new run. `persist_dir` is the parent runs
    /// directory; `None` keeps the trail in memory only.
    pub fn new(graph_name: &str, persist_dir: Option<&Path>) -> Result<Self, RelayError> {
        let run_id = format!(
            "{}_{}",
            Local::now().format("%Y-%m-%d_%H%M%S"),
            graph_name
        );

        let run_dir = match persist_dir {
            Some(dir) => {
                let run_dir = dir.join(&run_id);
                fs::create_dir_all(&run_dir)?;
                log::info!("Recording run to {}", run_dir.display());
                Some(run_dir)
            }
            None => None,
        };

        Ok(Self {
            run_id,
            run_dir,
            handoffs: Vec::new(),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Append a handoff; persisted synchronously before returning
    pub fn record(&mut self, handoff: Handoff) -> Result<(), RelayError> {
        if let Some(dir) = &self.run_dir {
            let filename = format!("{:02}_{}.json", handoff.step, handoff.node);
            fs::write(dir.join(filename), serde_json::to_string_pretty(&handoff)?)?;
        }
        self.handoffs.push(handoff);
        Ok(())
    }

    /// Write the terminal summary
    pub fn finalize(&self, summary: &RunSummary) -> Result<(), RelayError> {
        if let Some(dir) = &self.run_dir {
            fs::write(dir.join(FINAL_FILE), serde_json::to_string_pretty(summary)?)?;
        }
        Ok(())
    }

    pub fn handoffs(&self) -> &[Handoff] {
        &self.handoffs
    }

    pub fn into_handoffs(self) -> Vec<Handoff> {
        self.handoffs
    }
}

/// A known run, as listed from disk
#[derive(Debug, Clone)]
pub struct RunEntry {
    pub run_id: String,
    /// Status from `final.json`; `None` when the run never finalized
    /// (still running, or crashed)
    pub status: Option<RunStatus>,
}

/// Everything persisted for one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub handoffs: Vec<Handoff>,
    pub summary: Option<RunSummary>,
}

/// List persisted run identifiers, newest first.
///
/// Re-reads the runs directory on every call; run ids start with a
/// sortable timestamp, so newest-first is a descending name sort. A
/// missing runs directory is an empty listing, not an error.
pub fn list_runs(runs_dir: &Path) -> Result<Vec<RunEntry>, RelayError> {
    if !runs_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(runs_dir)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let run_id = entry.file_name().to_string_lossy().to_string();
        let status = read_summary(&entry.path()).map(|s| s.status);
        entries.push(RunEntry { run_id, status });
    }

    entries.sort_by(|a, b| b.run_id.cmp(&a.run_id));
    Ok(entries)
}

/// Load the full ordered handoff sequence and final status of a run
pub fn inspect_run(runs_dir: &Path, run_id: &str) -> Result<RunReport, RelayError> {
    let run_dir = runs_dir.join(run_id);
    if !run_dir.is_dir() {
        return Err(RelayError::RunNotFound {
            run_id: run_id.to_string(),
        });
    }

    let mut files: Vec<PathBuf> = fs::read_dir(&run_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension().map(|e| e == "json").unwrap_or(false)
                && p.file_name().map(|n| n != FINAL_FILE).unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut handoffs = Vec::with_capacity(files.len());
    for path in files {
        let handoff: Handoff = serde_json::from_str(&fs::read_to_string(&path)?)?;
        handoffs.push(handoff);
    }
    handoffs.sort_by_key(|h| h.step);

    Ok(RunReport {
        run_id: run_id.to_string(),
        handoffs,
        summary: read_summary(&run_dir),
    })
}

fn read_summary(run_dir: &Path) -> Option<RunSummary> {
    let text = fs::read_to_string(run_dir.join(FINAL_FILE)).ok()?;
    serde_json::from_str(&text).ok()
}
