//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - reliable batch orchestration for quantum chemistry",
        style("Vanir").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  vanir-hal      Backend abstraction layer");
    println!("  vanir-chem     Molecule handling and collaborator seams");
    println!("  vanir-policy   Reliability policies (memo, retry, checkpoint, capacity)");
    println!("  vanir-sched    Batch orchestration and backend selection");
    println!("  vanir-cli      Command-line interface");
    println!();
    println!(
        "Repository: {}",
        style("https://github.com/vanir-lab/vanir").underlined()
    );
    println!("License:    {}", style("Apache-2.0").dim());
}
