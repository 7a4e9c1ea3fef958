use std::{
    fmt::{self, Write as _},
    path::PathBuf,
};

use clap::Parser;
use tiers::domain::{TreeNode, build_tree};
use tracing::instrument;

use super::terminal::{Colorize, status};

#[derive(Debug, Parser)]
pub struct Tree {
    /// The version document to print
    file: PathBuf,

    /// Show each feature's parameters
    #[arg(long, short)]
    params: bool,
}

impl Tree {
    #[instrument(level = "debug", skip(self), fields(file = %self.file.display()))]
    pub fn run(self) -> anyhow::Result<()> {
        let version = super::load(&self.file)?;
        let tree = build_tree(&version.flat_features())?;

        println!("{} ({})", version.name.info(), version.version);
        print!("{}", render(&tree, self.params)?);
        Ok(())
    }
}

fn render(tree: &[TreeNode], params: bool) -> Result<String, fmt::Error> {
    fn walk(nodes: &[TreeNode], prefix: &str, params: bool, out: &mut String) -> fmt::Result {
        for (i, node) in nodes.iter().enumerate() {
            let last = i + 1 == nodes.len();
            let (branch, indent) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            let feature = &node.feature;

            write!(out, "{prefix}{branch}{} [{}]", feature.id, status(feature.enabled))?;
            if let Some(name) = &feature.name {
                write!(out, " {}", name.dim())?;
            }
            out.push('\n');

            let child_prefix = format!("{prefix}{indent}");
            if params {
                for (key, value) in &feature.params {
                    writeln!(out, "{child_prefix}  {} = {value}", key.dim())?;
                }
            }
            walk(&node.children, &child_prefix, params, out)?;
        }
        Ok(())
    }

    let mut out = String::new();
    walk(tree, "", params, &mut out)?;
    Ok(out)
}
