use std::{
    borrow::Borrow,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
    str::FromStr,
};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{condition::FeatureCondition, rollout::RolloutDescriptor};

/// A feature's parameter bag.
pub type Params = Map<String, Value>;

/// The identifier of a feature, unique within one version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeatureId(NonEmptyString);

/// The error returned when parsing an empty feature id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("feature id must not be empty")]
pub struct EmptyIdError;

impl FeatureId {
    /// Creates a feature id.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyIdError`] if `id` is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, EmptyIdError> {
        NonEmptyString::new(id.into())
            .map(Self)
            .map_err(|_| EmptyIdError)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Hash for FeatureId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Borrow<str> for FeatureId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl Deref for FeatureId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for FeatureId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureId {
    type Err = EmptyIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for FeatureId {
    type Error = EmptyIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for FeatureId {
    type Error = EmptyIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FeatureId> for String {
    fn from(id: FeatureId) -> Self {
        id.as_str().to_owned()
    }
}

/// One flag's definition within a version: its default state, parameters,
/// targeting rules and its place in the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureConfig {
    /// Unique identifier within the version.
    pub id: FeatureId,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the feature is on by default.
    #[serde(default)]
    pub enabled: bool,

    /// Default parameters.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Params,

    /// Features that must also be enabled for this one to be enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<FeatureId>,

    /// The parent feature, if this is not a root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<FeatureId>,

    /// Distance from a root (roots are at level 0).
    #[serde(default)]
    pub level: usize,

    /// Sort key among siblings.
    #[serde(default)]
    pub order: i64,

    /// The release the feature belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Targeting conditions (all must pass).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<FeatureCondition>,

    /// Staged exposure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<RolloutDescriptor>,

    /// Labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl FeatureConfig {
    /// Creates a root feature with the given id and default state.
    #[must_use]
    pub fn new(id: FeatureId, enabled: bool) -> Self {
        Self {
            id,
            name: None,
            description: None,
            enabled,
            params: Params::new(),
            dependencies: Vec::new(),
            parent_id: None,
            level: 0,
            order: 0,
            version: None,
            conditions: Vec::new(),
            rollout: None,
            tags: Vec::new(),
        }
    }

    /// Sets the parent and level.
    #[must_use]
    pub fn with_parent(mut self, parent_id: FeatureId, level: usize) -> Self {
        self.parent_id = Some(parent_id);
        self.level = level;
        self
    }

    /// Adds a default parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, id: FeatureId) -> Self {
        self.dependencies.push(id);
        self
    }

    /// Sets the sibling sort key.
    #[must_use]
    pub const fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Adds a targeting condition.
    #[must_use]
    pub fn with_condition(mut self, condition: FeatureCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Sets the rollout.
    #[must_use]
    pub fn with_rollout(mut self, rollout: RolloutDescriptor) -> Self {
        self.rollout = Some(rollout);
        self
    }

    /// Whether this feature is a root of the hierarchy.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// The status this feature has when no runtime override is supplied.
    #[must_use]
    pub fn default_status(&self) -> FeatureStatus {
        FeatureStatus {
            enabled: self.enabled,
            params: Params::new(),
            conditions: self.conditions.clone(),
            rollout: self.rollout.clone(),
        }
    }
}

/// The runtime status of a feature, which may override its configured
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureStatus {
    /// Whether the feature is switched on.
    pub enabled: bool,

    /// Parameter overrides; these win over the feature's defaults.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Params,

    /// Targeting conditions (all must pass).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<FeatureCondition>,

    /// Staged exposure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<RolloutDescriptor>,
}

impl FeatureStatus {
    /// A status that is switched on with no further rules.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// A status that is switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Adds a parameter override.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Adds a targeting condition.
    #[must_use]
    pub fn with_condition(mut self, condition: FeatureCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Sets the rollout.
    #[must_use]
    pub fn with_rollout(mut self, rollout: RolloutDescriptor) -> Self {
        self.rollout = Some(rollout);
        self
    }
}
