use std::path::PathBuf;

use clap::Parser;
use tiers::VersionComparator;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Diff {
    /// The base version document
    base: PathBuf,

    /// The version document to compare against the base
    target: PathBuf,

    /// Print the diff as JSON instead of a Markdown report
    #[arg(long)]
    json: bool,
}

impl Diff {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let base = super::load(&self.base)?;
        let target = super::load(&self.target)?;

        let diff = VersionComparator::compare(&base, &target);
        tracing::debug!(
            added = diff.added.len(),
            removed = diff.removed.len(),
            modified = diff.modified.len(),
            "compared versions"
        );

        if self.json {
            println!("{}", serde_json::to_string_pretty(&diff)?);
        } else if diff.is_empty() {
            println!(
                "{}",
                format!("No differences between {} and {}", base.version, target.version).success()
            );
        } else {
            print!("{}", VersionComparator::generate_report(&diff));
        }
        Ok(())
    }
}
