//! The feature evaluation engine.
//!
//! Evaluation is a short-circuiting sequence of checks:
//!
//! 1. the feature's status must be enabled;
//! 2. every dependency must itself evaluate to enabled;
//! 3. every targeting condition must pass;
//! 4. the rollout, if any, must admit the user.
//!
//! The first failing check determines the [`Reason`]. Evaluation is a pure
//! function of the feature, its status, the user context and the evaluation
//! instant held by the [`Evaluator`].

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Serialize, Serializer};
use tracing::instrument;

use crate::domain::{
    config::EngineConfig,
    context::UserContext,
    feature::{FeatureConfig, FeatureId, FeatureStatus, Params},
};

/// Why a feature evaluated the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// The feature's status is switched off.
    DisabledInConfiguration,
    /// A dependency is unknown, disabled, or part of a dependency cycle.
    DependencyNotEnabled(FeatureId),
    /// At least one targeting condition failed.
    ConditionsNotMet,
    /// The rollout excluded the user; carries the rollout's own reason.
    Rollout(String),
    /// Every check passed.
    AllConditionsMet,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisabledInConfiguration => f.write_str("disabled in configuration"),
            Self::DependencyNotEnabled(id) => write!(f, "dependency {id} not enabled"),
            Self::ConditionsNotMet => f.write_str("conditions not met"),
            Self::Rollout(reason) => f.write_str(reason),
            Self::AllConditionsMet => f.write_str("all conditions met"),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The verdict for one feature and one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEvaluation {
    /// The evaluated feature.
    pub feature_id: FeatureId,
    /// Whether the feature is on for this user.
    pub enabled: bool,
    /// The feature's default parameters overlaid with its status overrides.
    pub params: Params,
    /// Why.
    pub reason: Reason,
    /// When the evaluation happened.
    pub evaluated_at: DateTime<Utc>,
}

/// Evaluates the features of one version.
///
/// The evaluator borrows the feature list, so it is cheap to build one per
/// request. Dependencies are resolved against the same list, each using its
/// runtime status override if one was supplied and its configured defaults
/// otherwise.
#[derive(Debug, Clone)]
pub struct Evaluator<'a> {
    features: Vec<&'a FeatureConfig>,
    index: HashMap<&'a str, &'a FeatureConfig>,
    statuses: HashMap<FeatureId, FeatureStatus>,
    config: EngineConfig,
    now: DateTime<Utc>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator over `features`, evaluating at the current
    /// instant.
    #[must_use]
    pub fn new(features: &'a [FeatureConfig]) -> Self {
        let index = features.iter().map(|f| (f.id.as_str(), f)).collect();
        Self {
            features: features.iter().collect(),
            index,
            statuses: HashMap::new(),
            config: EngineConfig::default(),
            now: Utc::now(),
        }
    }

    /// Uses `config` for evaluation settings.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Evaluates at instant `now` instead of the construction time.
    #[must_use]
    pub const fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Overrides the runtime status of feature `id`.
    #[must_use]
    pub fn with_status(mut self, id: FeatureId, status: FeatureStatus) -> Self {
        self.statuses.insert(id, status);
        self
    }

    /// Overrides the runtime status of several features.
    #[must_use]
    pub fn with_statuses(
        mut self,
        statuses: impl IntoIterator<Item = (FeatureId, FeatureStatus)>,
    ) -> Self {
        self.statuses.extend(statuses);
        self
    }

    /// The status used for `feature`: its override, or its defaults.
    #[must_use]
    pub fn status_of(&self, feature: &FeatureConfig) -> FeatureStatus {
        self.statuses
            .get(&feature.id)
            .cloned()
            .unwrap_or_else(|| feature.default_status())
    }

    /// Evaluates `feature` with an explicit `status` for `context`.
    #[must_use]
    pub fn evaluate(
        &self,
        feature: &FeatureConfig,
        status: &FeatureStatus,
        context: &UserContext,
    ) -> FeatureEvaluation {
        self.evaluate_guarded(feature, status, context, &mut Resolution::default())
    }

    /// Evaluates the feature with id `id` using its effective status.
    ///
    /// Returns `None` if there is no such feature.
    #[must_use]
    pub fn evaluate_id(&self, id: &str, context: &UserContext) -> Option<FeatureEvaluation> {
        let feature = self.index.get(id)?;
        Some(self.evaluate(feature, &self.status_of(feature), context))
    }

    /// Evaluates every feature for `context`, in input order.
    ///
    /// Features are evaluated in parallel; the evaluator holds no mutable
    /// state, so no coordination is needed.
    #[must_use]
    #[instrument(level = "debug", skip_all, fields(features = self.features.len()))]
    pub fn evaluate_all(&self, context: &UserContext) -> Vec<FeatureEvaluation> {
        self.features
            .par_iter()
            .map(|feature| self.evaluate(feature, &self.status_of(feature), context))
            .collect()
    }

    fn evaluate_guarded<'s>(
        &'s self,
        feature: &'s FeatureConfig,
        status: &FeatureStatus,
        context: &UserContext,
        resolution: &mut Resolution<'s>,
    ) -> FeatureEvaluation {
        let mut params = feature.params.clone();
        params.extend(status.params.iter().map(|(k, v)| (k.clone(), v.clone())));

        let verdict = |enabled, reason| FeatureEvaluation {
            feature_id: feature.id.clone(),
            enabled,
            params,
            reason,
            evaluated_at: self.now,
        };

        if !status.enabled {
            return verdict(false, Reason::DisabledInConfiguration);
        }

        resolution.stack.push(feature.id.as_str());
        let blocked = feature
            .dependencies
            .iter()
            .find(|dependency| !self.dependency_enabled(dependency, context, resolution));
        resolution.stack.pop();
        if let Some(dependency) = blocked {
            return verdict(false, Reason::DependencyNotEnabled(dependency.clone()));
        }

        let anonymous = self.config.anonymous_user();
        if !status
            .conditions
            .iter()
            .all(|condition| condition.matches(context, self.now, anonymous))
        {
            return verdict(false, Reason::ConditionsNotMet);
        }

        if let Some(rollout) = &status.rollout {
            let outcome = rollout.evaluate(context, self.now, anonymous);
            if !outcome.enabled {
                return verdict(false, Reason::Rollout(outcome.reason));
            }
        }

        verdict(true, Reason::AllConditionsMet)
    }

    fn dependency_enabled<'s>(
        &'s self,
        id: &FeatureId,
        context: &UserContext,
        resolution: &mut Resolution<'s>,
    ) -> bool {
        if let Some(&enabled) = resolution.resolved.get(id.as_str()) {
            return enabled;
        }
        if resolution.stack.contains(&id.as_str()) {
            tracing::debug!(dependency = %id, "dependency cycle");
            return false;
        }
        let Some(&dependency) = self.index.get(id.as_str()) else {
            tracing::debug!(dependency = %id, "unknown dependency");
            return false;
        };
        let status = self.status_of(dependency);
        let enabled = self.evaluate_guarded(dependency, &status, context, resolution).enabled;
        resolution.resolved.insert(dependency.id.as_str(), enabled);
        enabled
    }
}

/// Dependency bookkeeping for one top-level evaluation.
///
/// A dependency's verdict depends only on its id, its status and the user
/// context, so each one is resolved at most once per call.
#[derive(Debug, Default)]
struct Resolution<'s> {
    /// Features currently being evaluated, outermost first.
    stack: Vec<&'s str>,
    /// Dependencies whose verdict is already known.
    resolved: HashMap<&'s str, bool>,
}

/// Evaluates a single feature without a surrounding feature list.
///
/// With nothing to resolve them against, any dependencies count as not
/// enabled.
#[must_use]
pub fn evaluate_feature(
    feature: &FeatureConfig,
    status: &FeatureStatus,
    context: &UserContext,
) -> FeatureEvaluation {
    Evaluator::new(&[]).evaluate(feature, status, context)
}
