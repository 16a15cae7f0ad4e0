//! Processor listing and information command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use cadence_registry::ProcessorRegistry;
use clap::Args;

#[derive(Args)]
pub struct ProcessorsArgs {
    /// Show details for a specific processor
    #[arg(value_name = "PROCESSOR")]
    processor: Option<String>,
}

pub fn run(args: ProcessorsArgs) -> anyhow::Result<()> {
    let registry = ProcessorRegistry::new();

    if let Some(name) = &args.processor {
        let descriptor = registry
            .get(&name.to_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Unknown processor: {}", name))?;

        println!("{} ({})", descriptor.name, descriptor.id);
        println!("{}", "=".repeat(descriptor.name.len() + descriptor.id.len() + 3));
        println!();
        println!("{}", descriptor.description);
        println!("Role: {}", descriptor.role);
        println!();

        println!("Parameters:");
        println!();
        println!("  {:12}  {:50}  {}", "Name", "Description", "Default");
        println!("  {:12}  {:50}  {}", "----", "-----------", "-------");
        for param in descriptor.params {
            let default = match (param.default, param.required) {
                (Some(default), _) => default,
                (None, true) => "(required)",
                (None, false) => "-",
            };
            println!("  {:12}  {:50}  {}", param.name, param.description, default);
        }

        let example: Vec<String> = descriptor
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| format!("{}=...", p.name))
            .chain(
                descriptor
                    .params
                    .iter()
                    .filter_map(|p| p.default.map(|d| format!("{}={d}", p.name)))
                    .take(1),
            )
            .collect();
        println!();
        println!("Example usage:");
        println!();
        println!(
            "  cadence run input.wav --processor \"{}:{}\"",
            descriptor.id,
            example.join(",")
        );
    } else {
        println!("Available Processors");
        println!("====================");
        println!();
        for descriptor in registry.all_processors() {
            println!(
                "  {:10} {:11} - {}",
                descriptor.id,
                descriptor.role.as_str(),
                descriptor.description
            );
        }
        println!();
        println!("Use 'cadence processors <name>' for detailed parameter info.");
    }

    Ok(())
}
