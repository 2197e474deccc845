//! Assign command implementation.
//!
//! Dry-run of the selection pass: score every molecule against the
//! configured backends and print the assignment table without
//! submitting anything.

use std::sync::Arc;

use anyhow::Result;
use console::style;

use vanir_chem::ComplexityEstimate;
use vanir_sched::{analyze_and_assign, BatchConfig};

use super::common::{build_registry, load_molecules};

/// Execute the assign command.
pub async fn execute(molecules: &str, simulators: &[String], hardware: &[String]) -> Result<()> {
    let loads = load_molecules(molecules)?;
    let registry = Arc::new(build_registry(simulators, hardware)?);
    let config = BatchConfig::from_env();

    let specs: Vec<_> = loads.iter().filter_map(|l| l.spec().cloned()).collect();
    let snapshot = registry.snapshot().await;
    let assignments = analyze_and_assign(&specs, &snapshot, config.load_factor);

    println!(
        "{} {:<12} {:>6} {:>7} {:<14} {:>12}",
        style("Assignments:").bold(),
        "molecule",
        "atoms",
        "qubits",
        "backend",
        "score"
    );

    for load in &loads {
        let Some(spec) = load.spec() else {
            println!(
                "  {} {:<12} {}",
                style("○").red(),
                load.molecule(),
                style("unreadable molecule file").red()
            );
            continue;
        };
        let estimate = ComplexityEstimate::for_molecule(spec);
        match assignments.get(&spec.id) {
            Some(assignment) => println!(
                "  {} {:<12} {:>6} {:>7} {:<14} {:>12.1}",
                style("●").green(),
                spec.id,
                estimate.atoms,
                estimate.qubits_needed,
                assignment.backend,
                assignment.score
            ),
            None => println!(
                "  {} {:<12} {:>6} {:>7} {}",
                style("○").red(),
                spec.id,
                estimate.atoms,
                estimate.qubits_needed,
                style("no feasible backend").red()
            ),
        }
    }

    Ok(())
}
