//! Validated, immutable views of a version document, and a store that swaps
//! them atomically on reload.
//!
//! Readers call [`SnapshotStore::load`] and keep the returned [`Arc`] for as
//! long as they need a consistent view; a concurrent reload never changes a
//! snapshot that is already in use.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use arc_swap::{ArcSwap, Guard};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::{
    domain::{
        EngineConfig, Evaluator, FeatureConfig, HierarchyError, NestedFeatures, Params,
        ValidationReport, VersionConfig, hierarchy, path,
    },
    storage::loader::{LoadError, load_version},
};

/// Errors that prevent a snapshot from being built.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The document could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// The document failed hierarchy validation.
    #[error("version document is invalid: {}", .0.messages().join("; "))]
    Invalid(ValidationReport),
    /// The features could not be arranged as a tree.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    /// The document could not be encoded for fingerprinting.
    #[error("failed to fingerprint version document: {0}")]
    Fingerprint(#[from] serde_json::Error),
    /// The store was created from memory and has no file to reload.
    #[error("snapshot store has no source file")]
    NoSource,
}

/// A validated version document with both feature representations
/// precomputed.
#[derive(Debug, Clone)]
pub struct Snapshot {
    config: VersionConfig,
    features: Vec<FeatureConfig>,
    nested: NestedFeatures,
    fingerprint: String,
    loaded_at: DateTime<Utc>,
}

impl Snapshot {
    /// Validates `config` against the engine settings and builds a snapshot.
    ///
    /// # Errors
    ///
    /// Fails if the features do not form a valid hierarchy.
    pub fn new(config: VersionConfig, settings: &EngineConfig) -> Result<Self, SnapshotError> {
        let features = config.flat_features().into_owned();

        let report = hierarchy::validate(&features, settings.max_depth());
        if !report.valid {
            return Err(SnapshotError::Invalid(report));
        }

        let nested = hierarchy::to_nested(&features)?;
        let fingerprint = fingerprint(&config)?;

        Ok(Self {
            config,
            features,
            nested,
            fingerprint,
            loaded_at: Utc::now(),
        })
    }

    /// The document the snapshot was built from.
    #[must_use]
    pub const fn config(&self) -> &VersionConfig {
        &self.config
    }

    /// The features as a flat list.
    #[must_use]
    pub fn features(&self) -> &[FeatureConfig] {
        &self.features
    }

    /// The features as a tree.
    #[must_use]
    pub const fn nested(&self) -> &NestedFeatures {
        &self.nested
    }

    /// A SHA-256 hex digest of the document's JSON encoding.
    ///
    /// Two snapshots of the same document have the same fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// When the snapshot was built.
    #[must_use]
    pub const fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Whether the feature at dot-path `path` is enabled.
    #[must_use]
    pub fn is_feature_enabled(&self, path: &str) -> bool {
        path::is_feature_enabled(&self.nested, path)
    }

    /// The parameters of the feature at dot-path `path`, or an empty map.
    #[must_use]
    pub fn get_feature_params(&self, path: &str) -> Params {
        path::get_feature_params(&self.nested, path)
    }

    /// An evaluator over this snapshot's features.
    #[must_use]
    pub fn evaluator(&self, settings: &EngineConfig) -> Evaluator<'_> {
        Evaluator::new(&self.features).with_config(settings.clone())
    }
}

fn fingerprint(config: &VersionConfig) -> Result<String, serde_json::Error> {
    let encoded = serde_json::to_vec(config)?;
    let hash = Sha256::digest(encoded);
    Ok(format!("{hash:x}"))
}

/// Holds the current [`Snapshot`] and replaces it atomically.
///
/// A replacement that fails to build leaves the current snapshot in place.
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
    settings: EngineConfig,
    source: Option<PathBuf>,
    epoch: AtomicU64,
}

impl fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("fingerprint", &self.current.load().fingerprint())
            .field("source", &self.source)
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}

impl SnapshotStore {
    /// Creates a store around an existing snapshot.
    #[must_use]
    pub fn new(snapshot: Snapshot, settings: EngineConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
            settings,
            source: None,
            epoch: AtomicU64::new(0),
        }
    }

    /// Loads the document at `path` and creates a store that reloads from it.
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be loaded or is invalid.
    #[instrument(level = "debug", skip(settings))]
    pub fn open(path: &Path, settings: EngineConfig) -> Result<Self, SnapshotError> {
        let snapshot = Snapshot::new(load_version(path)?, &settings)?;
        tracing::info!(
            version = %snapshot.config().version,
            fingerprint = snapshot.fingerprint(),
            "opened version document"
        );

        Ok(Self {
            source: Some(path.to_path_buf()),
            ..Self::new(snapshot, settings)
        })
    }

    /// The current snapshot.
    #[must_use]
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// The engine settings snapshots are validated against.
    #[must_use]
    pub const fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    /// The number of times the snapshot has been replaced.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Validates `config` and, if it differs from the current document,
    /// makes it current.
    ///
    /// Returns the snapshot that is current afterwards.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid, in which case the current snapshot is
    /// kept.
    pub fn replace(&self, config: VersionConfig) -> Result<Arc<Snapshot>, SnapshotError> {
        let snapshot = match Snapshot::new(config, &self.settings) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(%error, "rejected version document, keeping current snapshot");
                return Err(error);
            }
        };

        let snapshot = Arc::new(snapshot);
        let mut current = self.current.load_full();
        loop {
            if current.fingerprint() == snapshot.fingerprint() {
                tracing::debug!(fingerprint = current.fingerprint(), "version document unchanged");
                return Ok(current);
            }
            // a concurrent replace won the race; compare against its snapshot
            let previous = self.current.compare_and_swap(&current, Arc::clone(&snapshot));
            if Arc::ptr_eq(&previous, &current) {
                break;
            }
            current = Guard::into_inner(previous);
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            epoch,
            fingerprint = snapshot.fingerprint(),
            "swapped version snapshot"
        );
        Ok(snapshot)
    }

    /// Re-reads the source file and replaces the snapshot with it.
    ///
    /// # Errors
    ///
    /// Fails if the store has no source file, or the file cannot be loaded or
    /// is invalid. On failure the current snapshot is kept.
    #[instrument(level = "debug", skip(self))]
    pub fn reload(&self) -> Result<Arc<Snapshot>, SnapshotError> {
        let path = self.source.as_deref().ok_or(SnapshotError::NoSource)?;
        let config = load_version(path).inspect_err(|error| {
            tracing::warn!(%error, "failed to reload, keeping current snapshot");
        })?;
        self.replace(config)
    }
}
