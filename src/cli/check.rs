use std::path::PathBuf;

use clap::Parser;
use tiers::VersionConfig;
use tracing::instrument;

use super::terminal::{Colorize, status};

#[derive(Debug, Parser)]
pub struct Check {
    /// The version document
    file: PathBuf,

    /// Dot-path of the feature, e.g. `projects.pipelines`
    #[arg(required_unless_present = "enabled")]
    path: Option<String>,

    /// List every enabled dot-path instead of checking one
    #[arg(long, conflicts_with = "path")]
    enabled: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl Check {
    #[instrument(level = "debug", skip(self), fields(file = %self.file.display()))]
    pub fn run(self) -> anyhow::Result<()> {
        let version = super::load(&self.file)?;
        match &self.path {
            Some(path) => self.check(&version, path),
            None => self.list_enabled(&version),
        }
    }

    fn check(&self, version: &VersionConfig, path: &str) -> anyhow::Result<()> {
        let enabled = version.is_feature_enabled(path);
        let params = version.get_feature_params(path);

        if self.json {
            let output = serde_json::json!({
                "path": path,
                "enabled": enabled,
                "params": params,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("{}: {}", path.info(), status(enabled));
        for (key, value) in &params {
            println!("  {} = {value}", key.dim());
        }
        Ok(())
    }

    fn list_enabled(&self, version: &VersionConfig) -> anyhow::Result<()> {
        let paths = version.enabled_paths()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&paths)?);
        } else {
            for path in &paths {
                println!("{} {}", status(true), path.info());
            }
        }
        Ok(())
    }
}
