//! The `sidecars` command: browsing the sidecar registry.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::{CliConfig, OutputFormat};
use crate::sidecar::{SelectionPolicy, SidecarDescriptor, SidecarRegistry, Stability};

#[derive(Args, Debug)]
pub struct SidecarsCommand {
    #[command(subcommand)]
    command: SidecarsSubcommand,
}

#[derive(Subcommand, Debug)]
enum SidecarsSubcommand {
    /// List sidecars available for selection
    List {
        /// Include experimental and deprecated sidecars
        #[arg(long)]
        all: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one sidecar's descriptor
    Show {
        /// Sidecar id
        id: String,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl SidecarsCommand {
    /// Runs the command.
    ///
    /// # Errors
    ///
    /// Fails when the configuration or registry cannot be loaded, or `show` names
    /// an unknown sidecar.
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let config = cli.load_config().await?;
        let catalog_root = config.resolve_catalog_root(cli.catalog_root.clone());
        let registry = SidecarRegistry::load(catalog_root.as_deref())?;

        match self.command {
            SidecarsSubcommand::List {
                all,
                format,
            } => {
                let policy = if all {
                    SelectionPolicy::all()
                } else {
                    config.registry.policy()
                };
                let sidecars = registry.filter_by_stability(policy);
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sidecars)?),
                    OutputFormat::Text => print_list(&sidecars, &registry),
                }
            }
            SidecarsSubcommand::Show {
                id,
                format,
            } => {
                // Goes through selection so unknown ids get a suggestion
                let mut selected = registry.select(&[id], SelectionPolicy::all())?;
                let descriptor = selected.remove(0);
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&descriptor)?),
                    OutputFormat::Text => print_descriptor(&descriptor),
                }
            }
        }
        Ok(())
    }
}

fn stability_tag(stability: Stability) -> colored::ColoredString {
    match stability {
        Stability::Stable => "stable".green(),
        Stability::Experimental => "experimental".yellow(),
        Stability::Deprecated => "deprecated".red(),
    }
}

fn join_ports(ports: &[u16]) -> String {
    ports.iter().map(u16::to_string).collect::<Vec<_>>().join(", ")
}

fn print_list(sidecars: &[&SidecarDescriptor], registry: &SidecarRegistry) {
    if sidecars.is_empty() {
        println!("No sidecars available.");
        return;
    }

    for sidecar in sidecars {
        println!(
            "{:<18} {:<24} {:<14} {}",
            sidecar.id.bold(),
            sidecar.label,
            join_ports(&sidecar.ports),
            stability_tag(sidecar.stability)
        );
    }
    if let Some(source) = registry.source() {
        println!("\n{}", format!("Registry: built-in + {}", source.display()).dimmed());
    }
}

fn print_descriptor(descriptor: &SidecarDescriptor) {
    println!("{} ({})", descriptor.label.bold(), descriptor.id);
    println!("  stability:    {}", stability_tag(descriptor.stability));
    println!("  service:      {}", descriptor.service_name);
    println!("  fragment:     {}", descriptor.template_path.display());
    if !descriptor.ports.is_empty() {
        println!("  ports:        {}", join_ports(&descriptor.ports));
    }
    for (port, label) in &descriptor.port_labels {
        println!("    {port}: {}", label.label);
    }
    if !descriptor.container_env.is_empty() {
        println!("  containerEnv:");
        for (key, value) in &descriptor.container_env {
            println!("    {key}={value}");
        }
    }
    if !descriptor.required_env.is_empty() {
        println!("  requiredEnv:  {}", descriptor.required_env.join(", "));
    }
    for note in &descriptor.notes {
        println!("  {} {note}", "ℹ".blue());
    }
}
