//! Structural comparison of two versions.

use std::{
    collections::{BTreeSet, HashMap},
    fmt, iter,
};

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::domain::{
    feature::{FeatureConfig, FeatureId, Params},
    version::VersionConfig,
};

/// A change to a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamChange {
    /// The key is new, with this value.
    Added(Value),
    /// The key is gone.
    Removed,
    /// The value changed.
    Changed {
        /// The old value.
        from: Value,
        /// The new value.
        to: Value,
    },
}

/// A single difference between two versions of a feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// The default enabled flag flipped.
    Enabled {
        /// The old flag.
        from: bool,
        /// The new flag.
        to: bool,
    },
    /// The release label changed.
    Version {
        /// The old label.
        from: Option<String>,
        /// The new label.
        to: Option<String>,
    },
    /// The feature moved to another parent.
    Parent {
        /// The old parent, `None` for a root.
        from: Option<FeatureId>,
        /// The new parent, `None` for a root.
        to: Option<FeatureId>,
    },
    /// A parameter changed.
    Param {
        /// Dotted key, starting with `params`.
        path: String,
        /// What happened to it.
        change: ParamChange,
    },
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled { from, to } => write!(f, "enabled: {from} → {to}"),
            Self::Version { from, to } => write!(
                f,
                "version: {} → {}",
                from.as_deref().unwrap_or("none"),
                to.as_deref().unwrap_or("none")
            ),
            Self::Parent { from, to } => write!(
                f,
                "parent: {} → {}",
                from.as_ref().map_or("(root)", FeatureId::as_str),
                to.as_ref().map_or("(root)", FeatureId::as_str)
            ),
            Self::Param { path, change } => match change {
                ParamChange::Added(value) => write!(f, "{path}: added ({value})"),
                ParamChange::Removed => write!(f, "{path}: removed"),
                ParamChange::Changed { from, to } => write!(f, "{path}: {from} → {to}"),
            },
        }
    }
}

impl Serialize for Change {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The changes to a feature present in both versions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedFeature {
    /// The feature.
    pub feature_id: FeatureId,
    /// What changed, in a fixed order: enabled, version, parent, then
    /// parameters by key.
    pub changes: Vec<Change>,
}

/// The differences between a base and a target version.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VersionDiff {
    /// Features only in the target, in target order.
    pub added: Vec<FeatureConfig>,
    /// Ids only in the base, in base order.
    pub removed: Vec<FeatureId>,
    /// Features in both that differ, in base order.
    pub modified: Vec<ModifiedFeature>,
}

impl VersionDiff {
    /// Whether the versions are equivalent.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Compares versions and renders the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionComparator;

impl VersionComparator {
    /// Compares `base` with `target`.
    ///
    /// Either version may use the flat or the nested representation.
    #[must_use]
    pub fn compare(base: &VersionConfig, target: &VersionConfig) -> VersionDiff {
        let base_features = base.flat_features();
        let target_features = target.flat_features();

        let base_index: HashMap<&str, &FeatureConfig> = base_features
            .iter()
            .map(|f| (f.id.as_str(), f))
            .collect();
        let target_index: HashMap<&str, &FeatureConfig> = target_features
            .iter()
            .map(|f| (f.id.as_str(), f))
            .collect();

        let added = target_features
            .iter()
            .filter(|f| !base_index.contains_key(f.id.as_str()))
            .cloned()
            .collect();

        let mut removed = Vec::new();
        let mut modified = Vec::new();
        for feature in base_features.iter() {
            match target_index.get(feature.id.as_str()) {
                None => removed.push(feature.id.clone()),
                Some(other) => {
                    let changes = compare_features(feature, other);
                    if !changes.is_empty() {
                        modified.push(ModifiedFeature {
                            feature_id: feature.id.clone(),
                            changes,
                        });
                    }
                }
            }
        }

        VersionDiff {
            added,
            removed,
            modified,
        }
    }

    /// Renders a diff as a Markdown report.
    ///
    /// Sections are only present when they have entries, so an empty diff
    /// renders as an empty string.
    #[must_use]
    pub fn generate_report(diff: &VersionDiff) -> String {
        let mut sections = Vec::new();

        if !diff.added.is_empty() {
            sections.push(section(
                "## Added features",
                diff.added.iter().map(|feature| {
                    let state = if feature.enabled { "enabled" } else { "disabled" };
                    format!("- {}: {state}", feature.id)
                }),
            ));
        }

        if !diff.removed.is_empty() {
            sections.push(section(
                "## Removed features",
                diff.removed.iter().map(|id| format!("- {id}")),
            ));
        }

        if !diff.modified.is_empty() {
            sections.push(section(
                "## Modified features",
                diff.modified.iter().flat_map(|feature| {
                    iter::once(format!("### {}", feature.feature_id))
                        .chain(feature.changes.iter().map(|change| format!("  - {change}")))
                }),
            ));
        }

        sections.join("\n")
    }
}

/// A heading followed by its lines, each newline-terminated.
fn section(heading: &str, lines: impl Iterator<Item = String>) -> String {
    iter::once(heading.to_owned())
        .chain(lines)
        .map(|line| line + "\n")
        .collect()
}

fn compare_features(base: &FeatureConfig, target: &FeatureConfig) -> Vec<Change> {
    let mut changes = Vec::new();

    if base.enabled != target.enabled {
        changes.push(Change::Enabled {
            from: base.enabled,
            to: target.enabled,
        });
    }

    if base.version != target.version {
        changes.push(Change::Version {
            from: base.version.clone(),
            to: target.version.clone(),
        });
    }

    if base.parent_id != target.parent_id {
        changes.push(Change::Parent {
            from: base.parent_id.clone(),
            to: target.parent_id.clone(),
        });
    }

    compare_params("params", &base.params, &target.params, &mut changes);
    changes
}

fn compare_params(prefix: &str, base: &Params, target: &Params, changes: &mut Vec<Change>) {
    let keys: BTreeSet<&String> = base.keys().chain(target.keys()).collect();

    for key in keys {
        let path = format!("{prefix}.{key}");
        let change = match (base.get(key), target.get(key)) {
            (None, Some(value)) => ParamChange::Added(value.clone()),
            (Some(_), None) => ParamChange::Removed,
            (Some(Value::Object(from)), Some(Value::Object(to))) => {
                compare_params(&path, from, to, changes);
                continue;
            }
            (Some(from), Some(to)) if from != to => ParamChange::Changed {
                from: from.clone(),
                to: to.clone(),
            },
            _ => continue,
        };
        changes.push(Change::Param { path, change });
    }
}
