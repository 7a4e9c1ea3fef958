//! `tiers`: inspect, evaluate and reorganise versioned feature flags.

use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
