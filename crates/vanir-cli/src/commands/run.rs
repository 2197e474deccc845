//! Run command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use console::style;

use vanir_adapter_sim::{AnalyticStructureBuilder, LayoutProgramBuilder, ReferenceKernel};
use vanir_sched::{BatchConfig, BatchOrchestrator, MoleculeOutcome};

use super::common::{build_registry, load_molecules};

pub struct RunArgs {
    pub molecules: String,
    pub simulators: Vec<String>,
    pub hardware: Vec<String>,
    pub shots: Option<u32>,
    pub max_concurrent: Option<usize>,
    pub load_threshold: Option<f64>,
    pub max_iterations: Option<u32>,
    pub results: Option<String>,
    pub clear_cache: bool,
}

/// Execute the run command.
pub async fn execute(args: RunArgs) -> Result<()> {
    let loads = load_molecules(&args.molecules)?;
    let registry = Arc::new(build_registry(&args.simulators, &args.hardware)?);

    let mut config = BatchConfig::from_env();
    if let Some(shots) = args.shots {
        config.shots = shots;
    }
    if let Some(bound) = args.max_concurrent {
        config.max_concurrent_preparations = bound;
    }
    if let Some(threshold) = args.load_threshold {
        config.load_threshold = threshold;
    }
    if let Some(cap) = args.max_iterations {
        config.max_iterations = cap;
    }
    if let Some(dir) = args.results {
        config.result_dir = PathBuf::from(dir);
    }
    config.clear_cache_on_start = args.clear_cache;

    println!(
        "{} Running batch: {} molecules on {} backend(s)",
        style("→").cyan().bold(),
        style(loads.len()).green(),
        style(registry.len()).yellow()
    );

    let kernel = Arc::new(ReferenceKernel::new(config.samples_per_batch));
    let orchestrator = BatchOrchestrator::new(
        registry,
        Arc::new(AnalyticStructureBuilder),
        Arc::new(LayoutProgramBuilder),
        kernel,
        config,
    );

    // SIGUSR1 cuts short the current interactive retry wait.
    #[cfg(unix)]
    {
        let signal = orchestrator.retry_signal();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal as unix_signal, SignalKind};
            let Ok(mut stream) = unix_signal(SignalKind::user_defined1()) else {
                return;
            };
            while stream.recv().await.is_some() {
                println!("{} Manual retry requested", style("↻").yellow().bold());
                signal.trigger();
            }
        });
    }

    let outcomes = orchestrator.run_loads(&loads).await?;

    println!();
    for outcome in &outcomes {
        match outcome {
            MoleculeOutcome::Completed { record, path, .. } => {
                let flag = if record.fallback_used() {
                    " (fallback)"
                } else {
                    ""
                };
                let convergence = if record.converged {
                    style("converged").green()
                } else {
                    style("not converged").yellow()
                };
                println!(
                    "  {} {:<12} E = {:>12.6} Ha  [{} on {}{flag}] → {}",
                    style("✓").green().bold(),
                    record.molecule,
                    record.energy,
                    convergence,
                    record.backend,
                    path.display()
                );
            }
            MoleculeOutcome::Failed {
                molecule,
                stage,
                error,
            } => {
                println!(
                    "  {} {molecule:<12} failed at {stage}: {error}",
                    style("✗").red().bold()
                );
            }
        }
    }

    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    println!(
        "\n{} {completed}/{} molecules completed",
        style("Batch done:").bold(),
        outcomes.len()
    );

    if completed < outcomes.len() {
        anyhow::bail!("{} molecule(s) failed", outcomes.len() - completed);
    }
    Ok(())
}
