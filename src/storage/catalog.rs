//! A directory of version documents.
//!
//! Every `.json`, `.yaml` and `.yml` file below the root is loaded as one
//! version. Hidden files and directories are skipped.

use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fmt,
    path::{Path, PathBuf},
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::instrument;
use walkdir::{DirEntry, WalkDir};

use crate::{
    domain::{VersionComparator, VersionConfig, VersionDiff},
    storage::loader::{LoadError, load_version},
};

/// A loaded version and the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The source file.
    pub path: PathBuf,
    /// The document.
    pub config: VersionConfig,
}

/// All versions found in a directory, keyed by version id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    root: PathBuf,
    entries: BTreeMap<String, Entry>,
}

/// Errors that can occur when loading a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// One or more files could not be loaded.
    Unreadable(Vec<LoadError>),
    /// Two files declare the same version id.
    DuplicateVersion {
        /// The version id.
        version: String,
        /// The first file.
        first: PathBuf,
        /// The second file.
        second: PathBuf,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable(errors) => {
                writeln!(f, "failed to load {} version document(s):", errors.len())?;
                for error in errors {
                    writeln!(f, "  - {error}")?;
                }
                Ok(())
            }
            Self::DuplicateVersion {
                version,
                first,
                second,
            } => write!(
                f,
                "version {version} is defined in both {} and {}",
                first.display(),
                second.display()
            ),
        }
    }
}

impl Catalog {
    /// Loads every version document below `root`.
    ///
    /// Files are parsed in parallel.
    ///
    /// # Errors
    ///
    /// Fails if any document cannot be loaded, or if two documents declare
    /// the same version id.
    #[instrument(level = "debug")]
    pub fn load(root: &Path) -> Result<Self, CatalogError> {
        let paths = collect_document_paths(root);

        let (loaded, failed): (Vec<_>, Vec<_>) = paths
            .par_iter()
            .map(|path| load_version(path).map(|config| (path.clone(), config)))
            .partition(Result::is_ok);

        let failed: Vec<_> = failed.into_iter().filter_map(Result::err).collect();
        if !failed.is_empty() {
            return Err(CatalogError::Unreadable(failed));
        }

        let mut entries = BTreeMap::new();
        for (path, config) in loaded.into_iter().filter_map(Result::ok) {
            let version = config.version.clone();
            if let Some(existing) = entries.get(&version) {
                let Entry { path: first, .. } = existing;
                return Err(CatalogError::DuplicateVersion {
                    version,
                    first: first.clone(),
                    second: path,
                });
            }
            entries.insert(version, Entry { path, config });
        }

        tracing::debug!(versions = entries.len(), "loaded catalog");
        Ok(Self {
            root: root.to_path_buf(),
            entries,
        })
    }

    /// The directory the catalog was loaded from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The version with the given id.
    #[must_use]
    pub fn get(&self, version: &str) -> Option<&VersionConfig> {
        self.entries.get(version).map(|entry| &entry.config)
    }

    /// All entries, ordered by version id.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// The number of versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog holds no versions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compares two versions of the catalog by id.
    ///
    /// Returns `None` if either version is unknown.
    #[must_use]
    pub fn compare(&self, base: &str, target: &str) -> Option<VersionDiff> {
        Some(VersionComparator::compare(self.get(base)?, self.get(target)?))
    }
}

fn collect_document_paths(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            matches!(
                entry.path().extension().and_then(OsStr::to_str),
                Some("json" | "yaml" | "yml")
            )
        })
        .map(DirEntry::into_path)
        .collect();
    paths.sort();
    paths
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{FeatureConfig, FeatureId},
        storage::loader::save_version,
    };

    fn version(id: &str, enabled: bool) -> VersionConfig {
        VersionConfig::new(
            id,
            id.to_uppercase(),
            vec![FeatureConfig::new(FeatureId::new("projects").unwrap(), enabled)],
        )
    }

    #[test]
    fn loads_all_documents() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("tiers")).unwrap();
        save_version(&tmp.path().join("community.json"), &version("community", false)).unwrap();
        save_version(&tmp.path().join("tiers/enterprise.yaml"), &version("enterprise", true))
            .unwrap();
        std::fs::write(tmp.path().join("README.md"), "not a version").unwrap();

        let catalog = Catalog::load(tmp.path()).unwrap();

        assert_eq!(catalog.len(), 2);
        let versions: Vec<_> = catalog.entries().map(|e| e.config.version.as_str()).collect();
        assert_eq!(versions, ["community", "enterprise"]);
        assert!(catalog.get("enterprise").unwrap().is_feature_enabled("projects"));

        let diff = catalog.compare("community", "enterprise").unwrap();
        assert_eq!(diff.modified.len(), 1);
        assert!(catalog.compare("community", "missing").is_none());
    }

    #[test]
    fn skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(".cache")).unwrap();
        std::fs::write(tmp.path().join(".cache/junk.json"), "{").unwrap();
        std::fs::write(tmp.path().join(".draft.json"), "{").unwrap();
        save_version(&tmp.path().join("community.json"), &version("community", true)).unwrap();

        let catalog = Catalog::load(tmp.path()).unwrap();

        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn reports_unreadable_documents() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.json"), "{").unwrap();
        std::fs::write(tmp.path().join("b.yaml"), "- not: a version").unwrap();

        let error = Catalog::load(tmp.path()).unwrap_err();

        let CatalogError::Unreadable(errors) = &error else {
            panic!("unexpected error: {error}");
        };
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn rejects_duplicate_versions() {
        let tmp = tempfile::tempdir().unwrap();
        save_version(&tmp.path().join("a.json"), &version("community", true)).unwrap();
        save_version(&tmp.path().join("b.json"), &version("community", false)).unwrap();

        let error = Catalog::load(tmp.path()).unwrap_err();

        assert!(matches!(
            error,
            CatalogError::DuplicateVersion { version, .. } if version == "community"
        ));
    }
}
