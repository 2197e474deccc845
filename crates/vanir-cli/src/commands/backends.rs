//! Backends command implementation.

use anyhow::Result;
use console::style;

use super::common::build_registry;

/// Execute the backends command.
pub async fn execute(simulators: &[String], hardware: &[String]) -> Result<()> {
    let registry = build_registry(simulators, hardware)?;

    println!("{} Configured backends:\n", style("Vanir").cyan().bold());

    for descriptor in registry.snapshot().await {
        let kind = if descriptor.is_simulator() {
            "simulator"
        } else {
            "hardware"
        };
        println!(
            "  {} {} ({kind})",
            style("●").green(),
            style(&descriptor.name).bold()
        );
        println!("    Qubits:      {}", descriptor.qubit_capacity);
        println!("    Queue depth: {}", descriptor.queue_depth);
        println!("    Cost weight: {}", descriptor.cost_weight);
        println!();
    }

    Ok(())
}
