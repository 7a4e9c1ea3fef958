use std::path::PathBuf;

use clap::Parser;
use tiers::{
    VersionConfig,
    domain::{FeatureSet, hierarchy},
    storage,
};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Move {
    /// The version document
    file: PathBuf,

    /// The feature to move
    id: String,

    /// The new parent (omit to make the feature a root)
    #[arg(long, short)]
    parent: Option<String>,

    /// Write the result here instead of back to the input file
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl Move {
    #[instrument(level = "debug", skip(self), fields(file = %self.file.display()))]
    pub fn run(self) -> anyhow::Result<()> {
        let version = super::load(&self.file)?;
        let was_nested = matches!(version.features, FeatureSet::Nested(_));

        let (moved, carried) = {
            let features = version.flat_features();
            let carried = hierarchy::descendants(&self.id, &features).len();
            let moved = hierarchy::move_feature(&features, &self.id, self.parent.as_deref())?;
            (moved, carried)
        };

        let mut updated = VersionConfig {
            features: FeatureSet::Flat(moved),
            ..version
        };
        // keep the document in the representation it was written in
        if was_nested {
            updated = updated.into_nested()?;
        }

        let output = self.output.as_ref().unwrap_or(&self.file);
        storage::save_version(output, &updated)?;

        let parent = self.parent.as_deref().unwrap_or("(root)");
        println!("{} Moved {} under {}", "✓".success(), self.id.info(), parent.info());
        if carried > 0 {
            println!("  {}", format!("{carried} descendant(s) moved with it").dim());
        }
        Ok(())
    }
}
