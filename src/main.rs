use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use relay_rs::relay::tools::register_builtin_tools;
use relay_rs::relay::workflow::executor::{Executor, RunOptions, RunStatus};
use relay_rs::relay::workflow::handoff::{inspect_run, list_runs};
use relay_rs::relay::workflow::loader::WorkflowLoader;
use relay_rs::relay::workflow::presets::{self, SpecImplementReviewConfig};
use relay_rs::relay::workflow::registry::ToolRegistry;
use relay_rs::relay::workflow::state::{display_value, StateDelta};
use relay_rs::relay::workflow::CancelToken;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic graph workflows for LLM pipelines", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workflow on a task
    Run {
        /// The task to work on
        task: String,

        /// Workflow definition file; defaults to the built-in
        /// spec/implement/review loop
        #[arg(short, long)]
        workflow: Option<PathBuf>,

        /// Model for spec writing
        #[arg(long, default_value = "qwen3")]
        spec_model: String,

        /// Model for implementation
        #[arg(long, default_value = "qwen3")]
        impl_model: String,

        /// Model for review
        #[arg(long, default_value = "qwen3")]
        review_model: String,

        /// Review score required to finish (0-100)
        #[arg(short, long, default_value_t = presets::DEFAULT_PASS_THRESHOLD)]
        threshold: u32,

        /// Maximum node executions before the run is stopped
        #[arg(long, default_value_t = 10)]
        max_steps: u32,

        /// Save the handoff trail to disk
        #[arg(short, long)]
        persist: bool,

        /// Directory for persisted runs
        #[arg(long, default_value = "workflow_runs")]
        runs_dir: PathBuf,
    },
    /// List persisted workflow runs, newest first
    Runs {
        #[arg(long, default_value = "workflow_runs")]
        runs_dir: PathBuf,
    },
    /// Inspect a persisted run
    Inspect {
        /// Run identifier, as shown by `runs`
        run_id: String,

        /// Dump a single step's handoff as JSON
        #[arg(long)]
        step: Option<u32>,

        #[arg(long, default_value = "workflow_runs")]
        runs_dir: PathBuf,
    },
    /// Print the structure of a workflow graph
    Graph {
        /// Workflow definition file; defaults to the built-in loop
        #[arg(short, long)]
        workflow: Option<PathBuf>,

        #[arg(short, long, default_value_t = presets::DEFAULT_PASS_THRESHOLD)]
        threshold: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Run {
            task,
            workflow,
            spec_model,
            impl_model,
            review_model,
            threshold,
            max_steps,
            persist,
            runs_dir,
        } => {
            let graph = build_graph(
                workflow,
                SpecImplementReviewConfig {
                    spec_model,
                    impl_model,
                    review_model,
                    pass_threshold: threshold,
                },
            )
            .await?;

            let cancel = CancelToken::new();
            let ctrl_c_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupt received; stopping after the current step");
                    ctrl_c_token.cancel();
                }
            });

            let executor = Executor::new(RunOptions {
                max_steps,
                persist,
                runs_dir,
                cancel: Some(cancel),
            });

            println!("Workflow: {}\n", graph.name());

            let mut seed = StateDelta::new();
            seed.insert("task".to_string(), serde_json::json!(task));

            let run = executor.run(&graph, seed).await?;

            println!("\nStatus: {} ({} steps, {}ms)", run.status, run.step_count, run.total_duration_ms);
            if let Some(error) = &run.error {
                println!("Error:  {error}");
            }
            if let Some(score) = run.final_state.get("score") {
                println!("Score:  {score} (threshold {threshold})");
            }
            if run.status == RunStatus::StepLimitExceeded {
                println!(
                    "The run did not converge within {max_steps} steps; a lower \
                     threshold or a higher step ceiling may be needed."
                );
            }
            if let Some(implementation) = run.final_state.get("implementation") {
                println!("\n{}", display_value(implementation));
            }
            if persist {
                println!("\nRun saved as {}", run.run_id);
            }
        }
        Commands::Runs { runs_dir } => {
            let runs = list_runs(&runs_dir)?;
            if runs.is_empty() {
                println!("No workflow runs found");
                return Ok(());
            }

            println!("{:<20} run id", "status");
            println!("{}", "-".repeat(72));
            for entry in runs {
                let status = entry
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "incomplete".to_string());
                println!("{status:<20} {}", entry.run_id);
            }
        }
        Commands::Inspect {
            run_id,
            step,
            runs_dir,
        } => {
            let report = inspect_run(&runs_dir, &run_id)?;

            if let Some(step) = step {
                let handoff = report
                    .handoffs
                    .iter()
                    .find(|h| h.step == step)
                    .with_context(|| format!("step {step} not found in run {run_id}"))?;
                println!("{}", serde_json::to_string_pretty(handoff)?);
                return Ok(());
            }

            println!("Run: {}", report.run_id);
            for handoff in &report.handoffs {
                let marker = if handoff.error.is_some() { "failed" } else { "ok" };
                println!(
                    "  {:02}. [{}] {} ({}ms)",
                    handoff.step, handoff.node, marker, handoff.duration_ms
                );
                if let Some(error) = &handoff.error {
                    println!("      {error}");
                }
            }
            match report.summary {
                Some(summary) => {
                    println!(
                        "Status: {} ({} steps, {}ms)",
                        summary.status, summary.step_count, summary.total_duration_ms
                    );
                    if let Some(error) = summary.error {
                        println!("Error:  {error}");
                    }
                }
                None => println!("Status: incomplete (no final summary recorded)"),
            }
        }
        Commands::Graph {
            workflow,
            threshold,
        } => {
            let graph = build_graph(
                workflow,
                SpecImplementReviewConfig {
                    pass_threshold: threshold,
                    ..SpecImplementReviewConfig::default()
                },
            )
            .await?;
            println!("{}", graph.visualize());
        }
    }

    Ok(())
}

async fn build_graph(
    workflow: Option<PathBuf>,
    config: SpecImplementReviewConfig,
) -> anyhow::Result<relay_rs::relay::workflow::Graph> {
    match workflow {
        Some(path) => {
            let registry = ToolRegistry::new();
            register_builtin_tools(&registry).await;
            let loader = WorkflowLoader::new(registry);
            loader
                .load(&path)
                .await
                .with_context(|| format!("loading workflow {}", path.display()))
        }
        None => Ok(presets::spec_implement_review(&config)?),
    }
}
