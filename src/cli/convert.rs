use std::path::PathBuf;

use clap::Parser;
use tiers::storage::{self, Format};
use tracing::instrument;

#[derive(Debug, Parser)]
pub struct Convert {
    /// The version document
    file: PathBuf,

    /// The target representation
    #[arg(long, value_name = "SHAPE")]
    to: Shape,

    /// Write the result here (format by extension) instead of to stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Shape {
    /// A list of features linked by `parentId`
    Flat,
    /// Features nested under their parents
    Nested,
}

impl Convert {
    #[instrument(level = "debug", skip(self), fields(file = %self.file.display()))]
    pub fn run(self) -> anyhow::Result<()> {
        let version = super::load(&self.file)?;

        let converted = match self.to {
            Shape::Flat => version.into_flat(),
            Shape::Nested => version.into_nested()?,
        };

        match &self.output {
            Some(output) => storage::save_version(output, &converted)?,
            None => {
                let format = Format::from_path(&self.file);
                print!("{}", storage::loader::render_version(&converted, format)?);
                if format == Format::Json {
                    println!();
                }
            }
        }
        Ok(())
    }
}
