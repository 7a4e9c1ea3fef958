use std::path::PathBuf;

use clap::Parser;
use tiers::{
    EngineConfig,
    domain::hierarchy::{self, ValidationReport},
};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Validate {
    /// The version document to check
    file: PathBuf,

    /// Deepest permitted level (overrides the engine config)
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress all output except errors
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
    Summary,
}

impl Validate {
    #[instrument(level = "debug", skip(self, config), fields(file = %self.file.display()))]
    pub fn run(self, config: &EngineConfig) -> anyhow::Result<()> {
        let version = super::load(&self.file)?;
        let features = version.flat_features();
        let max_depth = self.max_depth.unwrap_or_else(|| config.max_depth());

        let report = hierarchy::validate(&features, max_depth);
        let cycles = hierarchy::cycles(&features);

        if !self.quiet {
            match self.output {
                OutputFormat::Table => {
                    output_table(&version.version, features.len(), &report, &cycles);
                }
                OutputFormat::Json => output_json(&report, &cycles)?,
                OutputFormat::Summary => println!("issues={}", report.errors.len()),
            }
        }

        if !report.valid {
            std::process::exit(2);
        }

        Ok(())
    }
}

fn output_table(
    version: &str,
    feature_count: usize,
    report: &ValidationReport,
    cycles: &[Vec<tiers::FeatureId>],
) {
    println!("Validating {}...\n", version.info());

    if report.valid {
        println!("✓ Hierarchy:  {feature_count} features, all consistent");
        println!("\n{}", "Version is valid (0 issues)".success());
        return;
    }

    println!(
        "{}",
        format!("✗ Hierarchy:  {} issues found", report.errors.len()).warning()
    );
    for message in report.messages() {
        println!("  • {message}");
    }

    if !cycles.is_empty() {
        println!("\nCycles:");
        for cycle in cycles {
            let ids: Vec<_> = cycle.iter().map(tiers::FeatureId::as_str).collect();
            println!("  • {}", ids.join(" ↔ "));
        }
    }

    println!(
        "\n{}",
        "Run 'tiers move <FILE> <ID> --parent <PARENT>' to reattach misplaced features".dim()
    );
}

fn output_json(
    report: &ValidationReport,
    cycles: &[Vec<tiers::FeatureId>],
) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "valid": report.valid,
        "errors": report.errors,
        "cycles": cycles,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
