//! The `generate` command.
//!
//! Resolves the selected sidecars against the registry, runs the stack engine on
//! a blocking task and reports the resulting merge plan.
//!
//! ```bash
//! devc generate web --out generated/web --with-browser neko-chrome
//! devc generate web --out generated/web --with-browsers neko-chrome,kasm-chrome --force
//! devc generate web --out generated/web --with-browser neko-firefox --include-experimental --dry-run
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use super::{CliConfig, OutputFormat};
use crate::sidecar::{SelectionPolicy, SidecarRegistry, parse_selection};
use crate::stack::{FileOp, MergePlan, NoteLevel, StackRequest, generate_stack};

#[derive(Args, Debug)]
pub struct GenerateCommand {
    /// Template id under <catalog>/templates/
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub out: PathBuf,

    /// Sidecar to merge (repeatable)
    #[arg(long = "with-browser", value_name = "ID")]
    pub with_browser: Vec<String>,

    /// Comma-separated sidecars to merge
    #[arg(long = "with-browsers", value_name = "IDS")]
    pub with_browsers: Option<String>,

    /// Use this template payload directory instead of looking it up in the catalog
    #[arg(long, value_name = "DIR")]
    pub template_dir: Option<PathBuf>,

    /// Empty and reuse an existing output directory
    #[arg(long)]
    pub force: bool,

    /// Compute the merge plan without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Allow experimental sidecars
    #[arg(long)]
    pub include_experimental: bool,

    /// Allow deprecated sidecars
    #[arg(long)]
    pub include_deprecated: bool,

    /// Fail when the merge produces any warning
    #[arg(long)]
    pub strict: bool,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl GenerateCommand {
    /// Runs the command.
    ///
    /// # Errors
    ///
    /// Fails when configuration or registry loading fails, a sidecar cannot be
    /// selected, or stack generation fails.
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let config = cli.load_config().await?;
        let catalog_root = config.resolve_catalog_root(cli.catalog_root.clone());
        let registry = SidecarRegistry::load(catalog_root.as_deref())?;

        let policy = SelectionPolicy {
            include_experimental: self.include_experimental || config.registry.include_experimental,
            include_deprecated: self.include_deprecated || config.registry.include_deprecated,
        };
        let ids = parse_selection(self.with_browsers.as_deref(), &self.with_browser);
        let sidecars = registry.select(&ids, policy)?;

        let request = StackRequest {
            template: self.template,
            template_dir: self.template_dir,
            catalog_root,
            output: self.out,
            sidecars,
            force: self.force,
            dry_run: self.dry_run,
            strict: self.strict,
            settings: config.merge,
        };

        let plan = tokio::task::spawn_blocking(move || generate_stack(&request))
            .await
            .context("Stack generation task panicked")??;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
            OutputFormat::Text => print_plan(&plan, cli.quiet),
        }
        Ok(())
    }
}

fn print_plan(plan: &MergePlan, quiet: bool) {
    if plan.dry_run {
        println!(
            "{} Dry run: template '{}' would be written to {}",
            "→".cyan(),
            plan.template,
            plan.output.display()
        );
        for file in &plan.files {
            let op = match file.op {
                FileOp::Create => "create".green(),
                FileOp::Modify => "modify".yellow(),
            };
            println!("  {op:<8} {}", file.path);
        }
    } else {
        println!(
            "{} Generated '{}' in {}",
            "✓".green(),
            plan.template.bold(),
            plan.output.display()
        );
    }

    if !plan.ports.is_empty() {
        println!("\n{}", "Ports:".bold());
        for port in &plan.ports {
            let label = port.label.as_deref().unwrap_or("");
            if port.declared == port.assigned {
                println!("  {:<16} {:>5}          {}", port.sidecar, port.assigned, label.dimmed());
            } else {
                let moved = format!("{} → {}", port.declared, port.assigned);
                println!("  {:<16} {:<14} {}", port.sidecar, moved.yellow(), label.dimmed());
            }
        }
    }

    let notes: Vec<_> = plan.notes.iter().filter(|n| !quiet || n.level >= NoteLevel::Warn).collect();
    if !notes.is_empty() {
        println!("\n{}", "Notes:".bold());
        for note in notes {
            match note.level {
                NoteLevel::Info => println!("  {} {}", "ℹ".blue(), note.message),
                NoteLevel::Warn => println!("  {} {}", "⚠".yellow(), note.message),
                NoteLevel::Error => println!("  {} {}", "✗".red(), note.message),
            }
        }
    }
}
