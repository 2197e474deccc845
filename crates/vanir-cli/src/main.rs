//! Vanir command-line interface.
//!
//! ```text
//!                V A N I R
//!     Reliable Batch Orchestration for
//!       Sample-Based Quantum Chemistry
//! ```

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{assign, backends, run, version};

/// Vanir - reliable batch orchestration for quantum-chemistry runs
#[derive(Parser)]
#[command(name = "vanir")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full batch over a molecule directory
    Run {
        /// Directory of molecule input files (*.txt)
        #[arg(short, long)]
        molecules: String,

        /// Simulator backend as name=qubits (repeatable)
        #[arg(long = "simulator", value_name = "NAME=QUBITS")]
        simulators: Vec<String>,

        /// Emulated hardware backend as name=qubits (repeatable)
        #[arg(long = "hardware", value_name = "NAME=QUBITS")]
        hardware: Vec<String>,

        /// Shots per program submission
        #[arg(short, long)]
        shots: Option<u32>,

        /// Concurrent preparation bound
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Host-load percentage above which preparation work is held
        #[arg(long)]
        load_threshold: Option<f64>,

        /// SQD iteration cap
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Directory result files are written to
        #[arg(long)]
        results: Option<String>,

        /// Clear the memoization store before the run
        #[arg(long)]
        clear_cache: bool,
    },

    /// Score molecules against backends without executing anything
    Assign {
        /// Directory of molecule input files (*.txt)
        #[arg(short, long)]
        molecules: String,

        /// Simulator backend as name=qubits (repeatable)
        #[arg(long = "simulator", value_name = "NAME=QUBITS")]
        simulators: Vec<String>,

        /// Emulated hardware backend as name=qubits (repeatable)
        #[arg(long = "hardware", value_name = "NAME=QUBITS")]
        hardware: Vec<String>,
    },

    /// List configured backends
    Backends {
        /// Simulator backend as name=qubits (repeatable)
        #[arg(long = "simulator", value_name = "NAME=QUBITS")]
        simulators: Vec<String>,

        /// Emulated hardware backend as name=qubits (repeatable)
        #[arg(long = "hardware", value_name = "NAME=QUBITS")]
        hardware: Vec<String>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run {
            molecules,
            simulators,
            hardware,
            shots,
            max_concurrent,
            load_threshold,
            max_iterations,
            results,
            clear_cache,
        } => {
            run::execute(run::RunArgs {
                molecules,
                simulators,
                hardware,
                shots,
                max_concurrent,
                load_threshold,
                max_iterations,
                results,
                clear_cache,
            })
            .await
        }

        Commands::Assign {
            molecules,
            simulators,
            hardware,
        } => assign::execute(&molecules, &simulators, &hardware).await,

        Commands::Backends {
            simulators,
            hardware,
        } => backends::execute(&simulators, &hardware).await,

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
