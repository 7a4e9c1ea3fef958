use std::{borrow::Cow, collections::BTreeMap, fmt};

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{
        MapAccess, SeqAccess, Visitor,
        value::{MapAccessDeserializer, SeqAccessDeserializer},
    },
};
use serde_json::Map;

use crate::domain::{
    condition::FeatureCondition,
    feature::{FeatureConfig, FeatureId, Params},
    hierarchy::{self, HierarchyError},
    path,
    rollout::RolloutDescriptor,
};

/// Nested features, keyed by id.
pub type NestedFeatures = BTreeMap<FeatureId, NestedFeature>;

/// A feature in the nested representation.
///
/// This carries everything a [`FeatureConfig`] does except the fields that are
/// implied by its position: the id is the map key, and the parent and level
/// follow from where it sits in the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedFeature {
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

    /// Features that must also be enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<FeatureId>,

    /// Sort key among siblings.
    #[serde(default)]
    pub order: i64,

    /// The release the feature belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Targeting conditions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<FeatureCondition>,

    /// Staged exposure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<RolloutDescriptor>,

    /// Labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Sub-features.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: NestedFeatures,
}

impl NestedFeature {
    /// The flat form of this node, without its children.
    pub(crate) fn to_config(
        &self,
        id: FeatureId,
        parent_id: Option<FeatureId>,
        level: usize,
    ) -> FeatureConfig {
        FeatureConfig {
            id,
            name: self.name.clone(),
            description: self.description.clone(),
            enabled: self.enabled,
            params: self.params.clone(),
            dependencies: self.dependencies.clone(),
            parent_id,
            level,
            order: self.order,
            version: self.version.clone(),
            conditions: self.conditions.clone(),
            rollout: self.rollout.clone(),
            tags: self.tags.clone(),
        }
    }
}

impl From<&FeatureConfig> for NestedFeature {
    fn from(feature: &FeatureConfig) -> Self {
        Self {
            name: feature.name.clone(),
            description: feature.description.clone(),
            enabled: feature.enabled,
            params: feature.params.clone(),
            dependencies: feature.dependencies.clone(),
            order: feature.order,
            version: feature.version.clone(),
            conditions: feature.conditions.clone(),
            rollout: feature.rollout.clone(),
            tags: feature.tags.clone(),
            children: NestedFeatures::new(),
        }
    }
}

/// The features of a version, in either of their two interchangeable
/// representations.
///
/// A list deserializes as [`FeatureSet::Flat`] and a map as
/// [`FeatureSet::Nested`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureSet {
    /// A flat list linked by `parentId`.
    Flat(Vec<FeatureConfig>),
    /// A tree keyed by id.
    Nested(NestedFeatures),
}

impl<'de> Deserialize<'de> for FeatureSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FeatureSetVisitor)
    }
}

/// Picks the representation from the shape of the input, so errors inside a
/// feature surface as they are.
struct FeatureSetVisitor;

impl<'de> Visitor<'de> for FeatureSetVisitor {
    type Value = FeatureSet;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of features or a map of nested features")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Self::Value, A::Error> {
        Vec::deserialize(SeqAccessDeserializer::new(seq)).map(FeatureSet::Flat)
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        NestedFeatures::deserialize(MapAccessDeserializer::new(map)).map(FeatureSet::Nested)
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

impl FeatureSet {
    /// The flat representation.
    #[must_use]
    pub fn flat(&self) -> Cow<'_, [FeatureConfig]> {
        match self {
            Self::Flat(features) => Cow::Borrowed(features),
            Self::Nested(features) => Cow::Owned(hierarchy::to_flat(features)),
        }
    }

    /// The nested representation.
    ///
    /// # Errors
    ///
    /// Fails if a flat list is not a consistent hierarchy (see
    /// [`hierarchy::to_nested`]).
    pub fn nested(&self) -> Result<Cow<'_, NestedFeatures>, HierarchyError> {
        match self {
            Self::Flat(features) => hierarchy::to_nested(features).map(Cow::Owned),
            Self::Nested(features) => Ok(Cow::Borrowed(features)),
        }
    }

    /// The number of features, at every level.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(features) => features.len(),
            Self::Nested(features) => count(features),
        }
    }

    /// Whether there are no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(features) => features.is_empty(),
            Self::Nested(features) => features.is_empty(),
        }
    }
}

fn count(features: &NestedFeatures) -> usize {
    features
        .values()
        .map(|feature| 1 + count(&feature.children))
        .sum()
}

/// A named bundle of features representing one product tier or release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionConfig {
    /// Version identifier, for example `community` or `enterprise`.
    pub version: String,

    /// Display name.
    pub name: String,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The features.
    #[serde(default)]
    pub features: FeatureSet,
}

impl VersionConfig {
    /// Creates a version with a flat feature list.
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        name: impl Into<String>,
        features: Vec<FeatureConfig>,
    ) -> Self {
        Self {
            version: version.into(),
            name: name.into(),
            description: None,
            features: FeatureSet::Flat(features),
        }
    }

    /// The features as a flat list.
    #[must_use]
    pub fn flat_features(&self) -> Cow<'_, [FeatureConfig]> {
        self.features.flat()
    }

    /// Converts the features to the flat representation.
    #[must_use]
    pub fn into_flat(self) -> Self {
        let features = self.features.flat().into_owned();
        Self {
            features: FeatureSet::Flat(features),
            ..self
        }
    }

    /// Converts the features to the nested representation.
    ///
    /// # Errors
    ///
    /// Fails if a flat list is not a consistent hierarchy.
    pub fn into_nested(self) -> Result<Self, HierarchyError> {
        let features = self.features.nested()?.into_owned();
        Ok(Self {
            features: FeatureSet::Nested(features),
            ..self
        })
    }

    /// Whether the feature at dot-path `path` is enabled.
    ///
    /// Returns `false` for unknown paths, and for flat lists that do not form
    /// a consistent hierarchy.
    #[must_use]
    pub fn is_feature_enabled(&self, path: &str) -> bool {
        self.features
            .nested()
            .is_ok_and(|features| path::is_feature_enabled(&features, path))
    }

    /// The parameters of the feature at dot-path `path`, or an empty map.
    #[must_use]
    pub fn get_feature_params(&self, path: &str) -> Params {
        self.features
            .nested()
            .map(|features| path::get_feature_params(&features, path))
            .unwrap_or_default()
    }
    /// Every enabled dot-path, parents before children.
    ///
    /// # Errors
    ///
    /// Fails if a flat list is not a consistent hierarchy.
    pub fn enabled_paths(&self) -> Result<Vec<String>, HierarchyError> {
        Ok(path::enabled_paths(&*self.features.nested()?))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn nested_document() -> serde_json::Value {
        json!({
            "version": "enterprise",
            "name": "Enterprise",
            "features": {
                "projects": {
                    "enabled": true,
                    "params": { "max": 100 },
                    "children": {
                        "pipelines": { "enabled": true, "params": { "runners": 4 } },
                        "wiki": { "enabled": false }
                    }
                },
                "dashboard": { "enabled": true }
            }
        })
    }

    #[test]
    fn parses_nested_document() {
        let config: VersionConfig = serde_json::from_value(nested_document()).unwrap();

        assert!(matches!(config.features, FeatureSet::Nested(_)));
        assert_eq!(config.features.len(), 4);
        assert!(config.is_feature_enabled("projects.pipelines"));
        assert!(!config.is_feature_enabled("projects.wiki"));
        assert_eq!(config.get_feature_params("projects")["max"], json!(100));
    }

    #[test]
    fn parses_flat_document() {
        let config: VersionConfig = serde_json::from_value(json!({
            "version": "community",
            "name": "Community",
            "features": [
                { "id": "projects", "enabled": true },
                { "id": "pipelines", "enabled": true, "parentId": "projects", "level": 1 }
            ]
        }))
        .unwrap();

        assert!(matches!(config.features, FeatureSet::Flat(_)));
        assert!(config.is_feature_enabled("projects.pipelines"));
        assert!(!config.is_feature_enabled("pipelines"));
    }

    #[test]
    fn malformed_nested_feature_reports_the_field() {
        let error = serde_json::from_str::<VersionConfig>(
            r#"{
                "version": "broken",
                "name": "Broken",
                "features": {
                    "projects": { "enabled": "yes" }
                }
            }"#,
        )
        .unwrap_err();

        let message = error.to_string();
        assert!(message.contains("expected a boolean"), "{message}");
        assert_eq!(error.line(), 5);
    }

    #[test]
    fn malformed_flat_feature_reports_the_field() {
        let error = serde_json::from_value::<VersionConfig>(json!({
            "version": "broken",
            "name": "Broken",
            "features": [{ "id": "projects", "level": "deep" }]
        }))
        .unwrap_err();

        assert!(error.to_string().contains("expected usize"), "{error}");
    }

    #[test]
    fn scalar_features_are_rejected() {
        let error = serde_json::from_value::<VersionConfig>(json!({
            "version": "broken",
            "name": "Broken",
            "features": 3
        }))
        .unwrap_err();

        assert!(error.to_string().contains("a list of features or a map"), "{error}");
    }

    #[test]
    fn converts_between_representations() {
        let nested: VersionConfig = serde_json::from_value(nested_document()).unwrap();

        let flat = nested.clone().into_flat();
        let FeatureSet::Flat(features) = &flat.features else {
            panic!("expected a flat list");
        };
        let pipelines = features.iter().find(|f| f.id.as_str() == "pipelines").unwrap();
        assert_eq!(pipelines.parent_id.as_deref(), Some("projects"));
        assert_eq!(pipelines.level, 1);

        assert_eq!(flat.into_nested().unwrap(), nested);
    }

    #[test]
    fn lists_enabled_paths_of_either_representation() {
        let nested: VersionConfig = serde_json::from_value(nested_document()).unwrap();
        let expected = ["dashboard", "projects", "projects.pipelines"];

        assert_eq!(nested.enabled_paths().unwrap(), expected);
        assert_eq!(nested.into_flat().enabled_paths().unwrap(), expected);
    }

    #[test]
    fn inconsistent_flat_list_resolves_nothing() {
        let config: VersionConfig = serde_json::from_value(json!({
            "version": "broken",
            "name": "Broken",
            "features": [
                { "id": "a", "enabled": true, "parentId": "b", "level": 1 },
                { "id": "b", "enabled": true, "parentId": "a", "level": 1 }
            ]
        }))
        .unwrap();

        assert!(!config.is_feature_enabled("a"));
        assert!(config.get_feature_params("a").is_empty());
        assert!(config.enabled_paths().is_err());
        assert!(config.into_nested().is_err());
    }
}
