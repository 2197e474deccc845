//! Shared helpers for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use vanir_adapter_sim::SimulatorBackend;
use vanir_chem::{load_compound_dir, CompoundLoad};
use vanir_hal::BackendRegistry;

/// Parse a `name=qubits` backend argument.
pub fn parse_backend_arg(arg: &str) -> Result<(String, u32)> {
    let (name, qubits) = arg
        .split_once('=')
        .with_context(|| format!("Expected NAME=QUBITS, got '{arg}'"))?;
    let qubits: u32 = qubits
        .parse()
        .with_context(|| format!("Invalid qubit count in '{arg}'"))?;
    if name.is_empty() {
        anyhow::bail!("Empty backend name in '{arg}'");
    }
    Ok((name.to_string(), qubits))
}

/// Build a registry from `--simulator` and `--hardware` arguments.
///
/// With no arguments at all, a single 64-qubit local simulator is
/// registered so every subcommand works out of the box.
pub fn build_registry(simulators: &[String], hardware: &[String]) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();

    for arg in simulators {
        let (name, qubits) = parse_backend_arg(arg)?;
        registry.register(Arc::new(SimulatorBackend::new(name, qubits)));
    }
    for arg in hardware {
        let (name, qubits) = parse_backend_arg(arg)?;
        registry.register(Arc::new(SimulatorBackend::hardware_emulator(name, qubits)));
    }

    if registry.is_empty() {
        registry.register(Arc::new(SimulatorBackend::new("aer_local", 64)));
    }
    Ok(registry)
}

/// Load all molecule files from a directory.
///
/// Malformed files come back as rejected loads so the batch can fail
/// them individually; only a missing or empty directory is an error.
pub fn load_molecules(dir: &str) -> Result<Vec<CompoundLoad>> {
    let path = Path::new(dir);
    if !path.is_dir() {
        anyhow::bail!("Molecule directory not found: {dir}");
    }
    let loads =
        load_compound_dir(path).with_context(|| format!("Failed to load molecules from {dir}"))?;
    if loads.is_empty() {
        anyhow::bail!("No molecule files (*.txt) in {dir}");
    }
    Ok(loads)
}
