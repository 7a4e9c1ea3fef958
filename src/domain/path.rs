//! Dot-path lookup over nested features.
//!
//! A path such as `projects.pipelines` names the root feature `projects` and
//! then its child `pipelines`. [`resolve`] reports a miss as `None`; the
//! [`is_feature_enabled`] and [`get_feature_params`] helpers turn a miss into
//! `false` and an empty map.

use crate::domain::{
    feature::Params,
    version::{NestedFeature, NestedFeatures},
};

/// Finds the feature at `path`.
///
/// Returns `None` if the path is empty, has an empty segment, or names a
/// feature that does not exist.
#[must_use]
pub fn resolve<'a>(features: &'a NestedFeatures, path: &str) -> Option<&'a NestedFeature> {
    let mut segments = path.split('.');
    let first = segments.next().filter(|s| !s.is_empty())?;
    let root = features.get(first)?;

    segments.try_fold(root, |node, segment| node.children.get(segment))
}

/// Whether the feature at `path` exists and is enabled.
#[must_use]
pub fn is_feature_enabled(features: &NestedFeatures, path: &str) -> bool {
    resolve(features, path).is_some_and(|feature| feature.enabled)
}

/// The parameters of the feature at `path`, or an empty map if there is no
/// such feature.
#[must_use]
pub fn get_feature_params(features: &NestedFeatures, path: &str) -> Params {
    resolve(features, path)
        .map(|feature| feature.params.clone())
        .unwrap_or_default()
}

/// Every path whose feature is enabled, parents before children, siblings in
/// id order.
///
/// A child is listed on its own merits; a disabled parent does not hide it.
#[must_use]
pub fn enabled_paths(features: &NestedFeatures) -> Vec<String> {
    fn walk(features: &NestedFeatures, prefix: &str, out: &mut Vec<String>) {
        for (id, feature) in features {
            let path = if prefix.is_empty() {
                id.to_string()
            } else {
                format!("{prefix}.{id}")
            };
            if feature.enabled {
                out.push(path.clone());
            }
            walk(&feature.children, &path, out);
        }
    }

    let mut out = Vec::new();
    walk(features, "", &mut out);
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn features() -> NestedFeatures {
        serde_json::from_value(json!({
            "projects": {
                "enabled": true,
                "params": { "limit": 10 },
                "children": {
                    "pipelines": {
                        "enabled": true,
                        "children": {
                            "schedules": { "enabled": false, "params": { "cron": true } }
                        }
                    }
                }
            },
            "issues": { "enabled": false, "params": { "boards": 2 } }
        }))
        .unwrap()
    }

    #[test_case("projects", true; "root")]
    #[test_case("projects.pipelines", true; "child")]
    #[test_case("projects.pipelines.schedules", false; "disabled grandchild")]
    #[test_case("issues", false; "disabled root")]
    #[test_case("pipelines", false; "child is not a root")]
    #[test_case("projects.missing", false; "missing child")]
    #[test_case("projects.pipelines.schedules.extra", false; "past a leaf")]
    #[test_case("", false; "empty path")]
    #[test_case("projects.", false; "trailing dot")]
    #[test_case(".projects", false; "leading dot")]
    fn enabled(path: &str, expected: bool) {
        assert_eq!(is_feature_enabled(&features(), path), expected);
    }

    #[test]
    fn params_of_resolved_feature() {
        assert_eq!(get_feature_params(&features(), "projects")["limit"], json!(10));
        assert_eq!(
            get_feature_params(&features(), "projects.pipelines.schedules")["cron"],
            json!(true)
        );
        // disabled features still expose their parameters
        assert_eq!(get_feature_params(&features(), "issues")["boards"], json!(2));
    }

    #[test]
    fn absent_paths_have_no_params() {
        for path in ["nope", "projects.nope", "", "projects..pipelines"] {
            assert!(get_feature_params(&features(), path).is_empty(), "{path}");
        }
    }

    #[test]
    fn lists_enabled_paths() {
        assert_eq!(enabled_paths(&features()), ["projects", "projects.pipelines"]);
    }
}
