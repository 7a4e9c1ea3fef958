use std::path::{Path, PathBuf};

mod check;
mod convert;
mod diff;
mod evaluate;
mod list;
mod r#move;
mod terminal;
mod tree;
mod validate;

use anyhow::Context;
use check::Check;
use clap::ArgAction;
use convert::Convert;
use diff::Diff;
use evaluate::Evaluate;
use list::List;
use r#move::Move;
use tiers::{EngineConfig, VersionConfig, storage};
use tree::Tree;
use validate::Validate;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let config = load_engine_config(self.config.as_deref())?;
        self.command.run(&config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

fn load_engine_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };

    let config = EngineConfig::load(path)
        .with_context(|| format!("failed to load engine config from {}", path.display()))?;
    tracing::debug!(?config, "loaded engine config");
    Ok(config)
}

/// Load a version document, JSON or YAML by extension.
fn load(path: &Path) -> anyhow::Result<VersionConfig> {
    Ok(storage::load_version(path)?)
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Check a version document for hierarchy problems
    ///
    /// Exits with status 2 if any are found.
    Validate(Validate),

    /// Print the feature tree of a version
    Tree(Tree),

    /// Show whether the feature at a dot-path is enabled, or list every
    /// enabled path
    Check(Check),

    /// Evaluate features for a user
    Evaluate(Evaluate),

    /// Compare two versions
    Diff(Diff),

    /// Move a feature under a new parent
    Move(Move),

    /// Convert between the flat and nested feature representations
    Convert(Convert),

    /// List the versions in a directory
    List(List),
}

impl Command {
    fn run(self, config: &EngineConfig) -> anyhow::Result<()> {
        match self {
            Self::Validate(command) => command.run(config)?,
            Self::Tree(command) => command.run()?,
            Self::Check(command) => command.run()?,
            Self::Evaluate(command) => command.run(config)?,
            Self::Diff(command) => command.run()?,
            Self::Move(command) => command.run()?,
            Self::Convert(command) => command.run()?,
            Self::List(command) => command.run()?,
        }
        Ok(())
    }
}
