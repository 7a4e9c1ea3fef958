use std::path::PathBuf;

use clap::Parser;
use tiers::Catalog;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct List {
    /// Directory to search for version documents
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Print the listing as JSON
    #[arg(long)]
    json: bool,
}

impl List {
    #[instrument(level = "debug", skip(self), fields(dir = %self.dir.display()))]
    pub fn run(self) -> anyhow::Result<()> {
        let catalog = Catalog::load(&self.dir)?;

        if self.json {
            let versions: Vec<_> = catalog
                .entries()
                .map(|entry| {
                    serde_json::json!({
                        "version": entry.config.version,
                        "name": entry.config.name,
                        "features": entry.config.features.len(),
                        "path": entry.path,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&versions)?);
            return Ok(());
        }

        if catalog.is_empty() {
            println!("{}", format!("No version documents in {}", self.dir.display()).dim());
            return Ok(());
        }

        for entry in catalog.entries() {
            let path = entry.path.strip_prefix(catalog.root()).unwrap_or(&entry.path);
            println!(
                "{}  {}  {} features  {}",
                entry.config.version.info(),
                entry.config.name,
                entry.config.features.len(),
                path.display().to_string().dim()
            );
        }
        Ok(())
    }
}
