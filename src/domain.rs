//! Domain models for versioned feature flags.
//!
//! This module contains the feature data model, the evaluation engine, the
//! hierarchy algorithms, and configuration.

/// Runtime context of the user being evaluated.
pub mod context;
pub use context::UserContext;

/// Feature identifiers, definitions and runtime status.
pub mod feature;
pub use feature::{EmptyIdError, FeatureConfig, FeatureId, FeatureStatus, Params};

pub mod condition;
pub use condition::{ConditionType, FeatureCondition, Operator};

pub mod hash;
pub use hash::stable_hash;

pub mod rollout;
pub use rollout::{GradualRamp, RolloutDescriptor, RolloutOutcome, Strategy};

pub mod evaluation;
pub use evaluation::{Evaluator, FeatureEvaluation, Reason, evaluate_feature};

/// Version documents and their two feature representations.
pub mod version;
pub use version::{FeatureSet, NestedFeature, NestedFeatures, VersionConfig};

pub mod path;
pub use path::{enabled_paths, get_feature_params, is_feature_enabled};

pub mod hierarchy;
pub use hierarchy::{
    HierarchyError, HierarchyIssue, MoveError, TreeNode, ValidationReport, build_tree,
    flatten_tree, move_feature, validate,
};

pub mod diff;
pub use diff::{Change, VersionComparator, VersionDiff};

mod config;
pub use config::{ConfigError, EngineConfig};
