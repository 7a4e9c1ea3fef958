//! Versioned, hierarchical feature flags.
//!
//! A version (a product tier such as *community* or *enterprise*) is a set of
//! features arranged in a tree. This crate resolves features by dot-path,
//! evaluates them for a user with deterministic rollout bucketing, keeps the
//! parent links of a feature list consistent, and compares versions.

pub mod domain;
pub use domain::{
    EngineConfig, Evaluator, FeatureConfig, FeatureEvaluation, FeatureId, FeatureStatus,
    UserContext, VersionComparator, VersionConfig,
};

/// Loading, cataloguing and hot-reloading version documents.
pub mod storage;
pub use storage::{Catalog, Snapshot, SnapshotStore};
