//! Parent-linked feature hierarchies.
//!
//! A flat feature list forms a forest through each feature's `parent_id`.
//! Nothing guarantees that the links are sound: a parent can be missing, a
//! chain of parents can loop, and stored levels can drift from the real
//! depth. The functions here never assume the input is well formed. Those that
//! need a sound hierarchy ([`build_tree`], [`move_feature`], [`to_nested`])
//! check for it first and refuse otherwise; [`validate`] reports every
//! problem it finds.
//!
//! Every operation borrows its input and returns a new collection.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
};

use petgraph::{
    algo::{has_path_connecting, tarjan_scc},
    graphmap::DiGraphMap,
};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::instrument;

use crate::domain::{
    feature::{FeatureConfig, FeatureId},
    version::{NestedFeature, NestedFeatures},
};

/// A feature with its children attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// The feature. Its `level` is its depth in the tree.
    #[serde(flatten)]
    pub feature: FeatureConfig,
    /// Child nodes, sorted by `(order, id)`.
    pub children: Vec<TreeNode>,
    /// Ids of the ancestors, root first, excluding this node.
    pub path: Vec<FeatureId>,
    /// Whether the node has no children.
    pub is_leaf: bool,
}

/// Errors for operations that need a sound hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    /// Two features share an id.
    #[error("feature {0} is defined more than once")]
    DuplicateId(FeatureId),
    /// A feature's parent does not exist.
    #[error("feature {id} references missing parent {parent}")]
    DanglingParent {
        /// The feature.
        id: FeatureId,
        /// The missing parent.
        parent: FeatureId,
    },
    /// Parent links form a loop.
    #[error("parent links form a cycle: {}", join(.0))]
    Cycle(Vec<FeatureId>),
}

/// Errors that can occur when moving a feature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    /// The feature to move could not be found.
    #[error("feature {0} not found")]
    FeatureNotFound(String),
    /// The new parent could not be found.
    #[error("parent feature {0} not found")]
    ParentNotFound(String),
    /// The new parent is the feature itself or one of its descendants.
    #[error("moving {feature} under {parent} would create a cycle")]
    Cycle {
        /// The feature being moved.
        feature: FeatureId,
        /// The requested parent.
        parent: FeatureId,
    },
}

/// A structural problem found by [`validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum HierarchyIssue {
    /// Two features share an id.
    DuplicateId {
        /// The repeated id.
        id: FeatureId,
    },
    /// A feature's parent does not exist.
    DanglingParent {
        /// The feature.
        id: FeatureId,
        /// The missing parent.
        parent: FeatureId,
    },
    /// Following the feature's parents revisits a feature.
    Cycle {
        /// The feature whose parent chain loops.
        id: FeatureId,
    },
    /// The feature sits deeper than allowed.
    TooDeep {
        /// The feature.
        id: FeatureId,
        /// Its level.
        level: usize,
        /// The configured maximum.
        max_depth: usize,
    },
    /// The stored level disagrees with the parent's level.
    LevelMismatch {
        /// The feature.
        id: FeatureId,
        /// The stored level.
        level: usize,
        /// The level implied by the parent.
        expected: usize,
    },
    /// The rollout percentage is outside `[0, 100]`.
    RolloutOutOfRange {
        /// The feature.
        id: FeatureId,
        /// The configured percentage.
        percentage: f64,
    },
}

impl fmt::Display for HierarchyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id } => write!(f, "feature {id} is defined more than once"),
            Self::DanglingParent { id, parent } => {
                write!(f, "feature {id} references missing parent {parent}")
            }
            Self::Cycle { id } => write!(f, "feature {id} has a cyclic parent chain"),
            Self::TooDeep {
                id,
                level,
                max_depth,
            } => write!(
                f,
                "feature {id} is at level {level}, deeper than the maximum depth {max_depth}"
            ),
            Self::LevelMismatch {
                id,
                level,
                expected,
            } => write!(f, "feature {id} has level {level} but its parent implies {expected}"),
            Self::RolloutOutOfRange { id, percentage } => write!(
                f,
                "feature {id} has rollout percentage {percentage} outside [0, 100]"
            ),
        }
    }
}

impl Serialize for HierarchyIssue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The outcome of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Whether no issues were found.
    pub valid: bool,
    /// Every issue found, in input order.
    pub errors: Vec<HierarchyIssue>,
}

impl ValidationReport {
    /// The issues as human-readable messages.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Checks a flat feature list for structural problems.
///
/// All problems are collected; validation does not stop at the first.
#[instrument(level = "debug", skip(features), fields(features = features.len()))]
#[must_use]
pub fn validate(features: &[FeatureConfig], max_depth: usize) -> ValidationReport {
    let index = index(features);
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for feature in features {
        if !seen.insert(feature.id.as_str()) {
            errors.push(HierarchyIssue::DuplicateId {
                id: feature.id.clone(),
            });
        }

        match &feature.parent_id {
            Some(parent_id) => match index.get(parent_id.as_str()) {
                None => errors.push(HierarchyIssue::DanglingParent {
                    id: feature.id.clone(),
                    parent: parent_id.clone(),
                }),
                Some(_) if parent_chain_loops(feature, &index) => {
                    errors.push(HierarchyIssue::Cycle {
                        id: feature.id.clone(),
                    });
                }
                Some(parent) if feature.level != parent.level + 1 => {
                    errors.push(HierarchyIssue::LevelMismatch {
                        id: feature.id.clone(),
                        level: feature.level,
                        expected: parent.level + 1,
                    });
                }
                Some(_) => {}
            },
            None if feature.level != 0 => errors.push(HierarchyIssue::LevelMismatch {
                id: feature.id.clone(),
                level: feature.level,
                expected: 0,
            }),
            None => {}
        }

        if feature.level > max_depth {
            errors.push(HierarchyIssue::TooDeep {
                id: feature.id.clone(),
                level: feature.level,
                max_depth,
            });
        }

        if let Some(rollout) = &feature.rollout
            && let Some(percentage) = rollout.percentage
            && !rollout.percentage_in_range()
        {
            errors.push(HierarchyIssue::RolloutOutOfRange {
                id: feature.id.clone(),
                percentage,
            });
        }
    }

    if !errors.is_empty() {
        tracing::debug!(issues = errors.len(), "hierarchy has issues");
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Walks the parent chain of `feature`, returning `true` if it revisits a
/// feature (including `feature` itself).
fn parent_chain_loops(feature: &FeatureConfig, index: &HashMap<&str, &FeatureConfig>) -> bool {
    let mut visited = HashSet::from([feature.id.as_str()]);
    let mut current = feature.parent_id.as_ref();

    while let Some(id) = current {
        if !visited.insert(id.as_str()) {
            return true;
        }
        current = index.get(id.as_str()).and_then(|f| f.parent_id.as_ref());
    }

    false
}

/// Return all cycles in the parent links as sets of ids.
///
/// Each cycle is sorted, and the cycles are sorted.
#[must_use]
pub fn cycles(features: &[FeatureConfig]) -> Vec<Vec<FeatureId>> {
    let graph = parent_graph(features);
    let ids = index(features);
    let id_of = |node: &str| ids.get(node).map(|f| f.id.clone());
    let mut cycles = Vec::new();

    for component in tarjan_scc(&graph) {
        if component.len() > 1 {
            let mut members: Vec<_> = component.iter().filter_map(|&node| id_of(node)).collect();
            members.sort();
            cycles.push(members);
            continue;
        }

        let Some(&node) = component.first() else {
            continue;
        };

        if graph.contains_edge(node, node)
            && let Some(id) = id_of(node)
        {
            cycles.push(vec![id]);
        }
    }

    cycles.sort();
    cycles
}

/// The parent graph. Nodes are ids, edges point from child to parent.
fn parent_graph(features: &[FeatureConfig]) -> DiGraphMap<&str, ()> {
    let mut graph = DiGraphMap::with_capacity(features.len(), features.len());
    for feature in features {
        graph.add_node(feature.id.as_str());
        if let Some(parent) = &feature.parent_id {
            graph.add_edge(feature.id.as_str(), parent.as_str(), ());
        }
    }
    graph
}

fn index(features: &[FeatureConfig]) -> HashMap<&str, &FeatureConfig> {
    features.iter().map(|f| (f.id.as_str(), f)).collect()
}

/// Rejects lists that cannot be arranged as a forest.
fn check_sound(features: &[FeatureConfig]) -> Result<(), HierarchyError> {
    let index = index(features);
    let mut seen = HashSet::new();

    for feature in features {
        if !seen.insert(feature.id.as_str()) {
            return Err(HierarchyError::DuplicateId(feature.id.clone()));
        }
        if let Some(parent) = &feature.parent_id
            && !index.contains_key(parent.as_str())
        {
            return Err(HierarchyError::DanglingParent {
                id: feature.id.clone(),
                parent: parent.clone(),
            });
        }
    }

    match cycles(features).into_iter().next() {
        Some(cycle) => Err(HierarchyError::Cycle(cycle)),
        None => Ok(()),
    }
}

/// Arranges a flat list into a forest.
///
/// Siblings are sorted by `(order, id)`. Each node's `level` is recomputed
/// from its depth, and its `path` lists its ancestors.
///
/// # Errors
///
/// Fails if ids repeat, a parent is missing, or the parent links loop.
pub fn build_tree(features: &[FeatureConfig]) -> Result<Vec<TreeNode>, HierarchyError> {
    check_sound(features)?;

    let mut groups: HashMap<Option<&str>, Vec<&FeatureConfig>> = HashMap::new();
    for feature in features {
        groups
            .entry(feature.parent_id.as_deref())
            .or_default()
            .push(feature);
    }
    for siblings in groups.values_mut() {
        siblings.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    }

    Ok(attach(&groups, None, &[]))
}

fn attach(
    groups: &HashMap<Option<&str>, Vec<&FeatureConfig>>,
    parent: Option<&str>,
    path: &[FeatureId],
) -> Vec<TreeNode> {
    let Some(siblings) = groups.get(&parent) else {
        return Vec::new();
    };

    siblings
        .iter()
        .map(|feature| {
            let mut child_path = path.to_vec();
            child_path.push(feature.id.clone());
            let children = attach(groups, Some(feature.id.as_str()), &child_path);

            let mut feature = (*feature).clone();
            feature.level = path.len();

            TreeNode {
                is_leaf: children.is_empty(),
                feature,
                children,
                path: path.to_vec(),
            }
        })
        .collect()
}

/// Flattens a forest back into a parent-linked list, parents first.
///
/// `parent_id` and `level` are taken from each node's position.
#[must_use]
pub fn flatten_tree(tree: &[TreeNode]) -> Vec<FeatureConfig> {
    fn walk(
        nodes: &[TreeNode],
        parent: Option<&FeatureId>,
        level: usize,
        out: &mut Vec<FeatureConfig>,
    ) {
        for node in nodes {
            let mut feature = node.feature.clone();
            feature.parent_id = parent.cloned();
            feature.level = level;
            out.push(feature);
            walk(&node.children, Some(&node.feature.id), level + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(tree, None, 0, &mut out);
    out
}

/// Every feature below `id`, parents before their children.
///
/// Safe on cyclic input: each feature is reported at most once, and `id`
/// itself never is.
#[must_use]
pub fn descendants<'a>(id: &str, features: &'a [FeatureConfig]) -> Vec<&'a FeatureConfig> {
    let mut children: HashMap<&str, Vec<&FeatureConfig>> = HashMap::new();
    for feature in features {
        if let Some(parent) = &feature.parent_id {
            children.entry(parent.as_str()).or_default().push(feature);
        }
    }

    let index = index(features);
    let mut out = Vec::new();
    let mut visited = HashSet::from([id]);
    let mut stack = vec![id];

    while let Some(current) = stack.pop() {
        if current != id
            && let Some(feature) = index.get(current)
        {
            out.push(*feature);
        }
        // reversed so that siblings come out in input order
        for kid in children.get(current).into_iter().flatten().rev() {
            if visited.insert(kid.id.as_str()) {
                stack.push(kid.id.as_str());
            }
        }
    }

    out
}

/// The features from the root down to `id`, inclusive.
///
/// Returns an empty list if `id` does not exist. On a cyclic chain the walk
/// stops before revisiting a feature.
#[must_use]
pub fn ancestor_path<'a>(id: &str, features: &'a [FeatureConfig]) -> Vec<&'a FeatureConfig> {
    let index = index(features);
    let mut path = Vec::new();
    let mut visited = HashSet::new();
    let mut current = index.get(id).copied();

    while let Some(feature) = current {
        if !visited.insert(feature.id.as_str()) {
            break;
        }
        path.push(feature);
        current = feature
            .parent_id
            .as_ref()
            .and_then(|parent| index.get(parent.as_str()).copied());
    }

    path.reverse();
    path
}

/// Reparents the feature `id` under `new_parent` (or makes it a root).
///
/// Returns a new list in the same order, in which the moved feature's level
/// is one more than its new parent's (0 for a root) and every descendant's
/// level follows from that.
///
/// # Errors
///
/// Fails if either feature is unknown, or if `new_parent` is `id` itself or
/// one of its descendants.
#[instrument(level = "debug", skip(features))]
pub fn move_feature(
    features: &[FeatureConfig],
    id: &str,
    new_parent: Option<&str>,
) -> Result<Vec<FeatureConfig>, MoveError> {
    let index = index(features);
    let target = index
        .get(id)
        .copied()
        .ok_or_else(|| MoveError::FeatureNotFound(id.to_owned()))?;

    let level = match new_parent {
        Some(parent_id) => {
            let parent = index
                .get(parent_id)
                .copied()
                .ok_or_else(|| MoveError::ParentNotFound(parent_id.to_owned()))?;

            if move_would_create_cycle(features, id, parent_id) {
                tracing::debug!(feature = id, parent = parent_id, "rejected move");
                return Err(MoveError::Cycle {
                    feature: target.id.clone(),
                    parent: parent.id.clone(),
                });
            }
            parent.level + 1
        }
        None => 0,
    };
    let new_parent_id = new_parent.and_then(|p| index.get(p)).map(|p| p.id.clone());

    let mut moved = features.to_vec();
    let positions: HashMap<&str, usize> = features
        .iter()
        .enumerate()
        .map(|(pos, f)| (f.id.as_str(), pos))
        .collect();
    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    for (pos, feature) in features.iter().enumerate() {
        if let Some(parent_pos) = feature
            .parent_id
            .as_ref()
            .and_then(|p| positions.get(p.as_str()))
        {
            children.entry(*parent_pos).or_default().push(pos);
        }
    }

    let target_pos = positions[id];
    moved[target_pos].parent_id = new_parent_id;
    moved[target_pos].level = level;

    let mut queue = VecDeque::from([target_pos]);
    let mut visited = HashSet::from([target_pos]);
    while let Some(pos) = queue.pop_front() {
        let child_level = moved[pos].level + 1;
        for &child in children.get(&pos).into_iter().flatten() {
            if visited.insert(child) {
                moved[child].level = child_level;
                queue.push_back(child);
            }
        }
    }

    Ok(moved)
}

/// Whether making `parent` the parent of `child` would close a loop, i.e.
/// `parent` is `child` or already sits below it.
fn move_would_create_cycle(features: &[FeatureConfig], child: &str, parent: &str) -> bool {
    if child == parent {
        return true;
    }
    let graph = parent_graph(features);
    graph.contains_node(parent)
        && graph.contains_node(child)
        && has_path_connecting(&graph, parent, child, None)
}

/// Converts a flat list to the nested representation.
///
/// # Errors
///
/// Fails if the list cannot be arranged as a forest (see [`build_tree`]).
pub fn to_nested(features: &[FeatureConfig]) -> Result<NestedFeatures, HierarchyError> {
    fn convert(nodes: &[TreeNode]) -> NestedFeatures {
        nodes
            .iter()
            .map(|node| {
                let mut nested = NestedFeature::from(&node.feature);
                nested.children = convert(&node.children);
                (node.feature.id.clone(), nested)
            })
            .collect()
    }

    Ok(convert(&build_tree(features)?))
}

/// Converts the nested representation to a flat list, parents first.
#[must_use]
pub fn to_flat(features: &NestedFeatures) -> Vec<FeatureConfig> {
    fn walk(
        features: &NestedFeatures,
        parent: Option<&FeatureId>,
        level: usize,
        out: &mut Vec<FeatureConfig>,
    ) {
        for (id, feature) in features {
            out.push(feature.to_config(id.clone(), parent.cloned(), level));
            walk(&feature.children, Some(id), level + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(features, None, 0, &mut out);
    out
}

fn join(ids: &[FeatureId]) -> String {
    ids.iter()
        .map(FeatureId::as_str)
        .collect::<Vec<_>>()
        .join(" → ")
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::domain::rollout::RolloutDescriptor;

    fn id(s: &str) -> FeatureId {
        FeatureId::new(s).unwrap()
    }

    fn root(s: &str) -> FeatureConfig {
        FeatureConfig::new(id(s), true)
    }

    fn child(s: &str, parent: &str, level: usize) -> FeatureConfig {
        root(s).with_parent(id(parent), level)
    }

    /// projects
    /// ├── pipelines
    /// │   └── schedules
    /// └── wiki
    /// admin
    fn catalogue() -> Vec<FeatureConfig> {
        vec![
            child("schedules", "pipelines", 2),
            root("projects"),
            child("wiki", "projects", 1).with_order(2),
            child("pipelines", "projects", 1).with_order(1),
            root("admin").with_order(-1),
        ]
    }

    fn ids<'a>(features: impl IntoIterator<Item = &'a FeatureConfig>) -> Vec<&'a str> {
        features.into_iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn builds_sorted_tree() {
        let tree = build_tree(&catalogue()).unwrap();

        let roots: Vec<_> = tree.iter().map(|n| n.feature.id.as_str()).collect();
        assert_eq!(roots, ["admin", "projects"]);

        let projects = &tree[1];
        assert!(!projects.is_leaf);
        let children: Vec<_> = projects.children.iter().map(|n| n.feature.id.as_str()).collect();
        assert_eq!(children, ["pipelines", "wiki"]);

        let schedules = &projects.children[0].children[0];
        assert!(schedules.is_leaf);
        assert_eq!(schedules.feature.level, 2);
        assert_eq!(schedules.path, [id("projects"), id("pipelines")]);
    }

    #[test]
    fn build_recomputes_levels() {
        let features = vec![root("a"), child("b", "a", 7)];
        let tree = build_tree(&features).unwrap();
        assert_eq!(tree[0].children[0].feature.level, 1);
    }

    #[test]
    fn flatten_round_trips_irrespective_of_order() {
        let features = catalogue();
        let mut flattened = flatten_tree(&build_tree(&features).unwrap());

        let mut expected = features;
        expected.sort_by(|a, b| a.id.cmp(&b.id));
        flattened.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(flattened, expected);
    }

    #[test]
    fn flatten_puts_parents_first() {
        let flattened = flatten_tree(&build_tree(&catalogue()).unwrap());
        assert_eq!(ids(&flattened), ["admin", "projects", "pipelines", "schedules", "wiki"]);
    }

    #[test]
    fn build_rejects_self_parent() {
        let features = vec![child("a", "a", 1)];
        assert_eq!(build_tree(&features), Err(HierarchyError::Cycle(vec![id("a")])));
    }

    #[test]
    fn build_rejects_two_cycle() {
        let features = vec![root("r"), child("a", "b", 1), child("b", "a", 1)];
        assert_eq!(
            build_tree(&features),
            Err(HierarchyError::Cycle(vec![id("a"), id("b")]))
        );
    }

    #[test]
    fn build_rejects_dangling_parent() {
        let features = vec![child("a", "ghost", 1)];
        assert_eq!(
            build_tree(&features),
            Err(HierarchyError::DanglingParent {
                id: id("a"),
                parent: id("ghost"),
            })
        );
    }

    #[test]
    fn build_rejects_duplicates() {
        let features = vec![root("a"), root("a")];
        assert_eq!(build_tree(&features), Err(HierarchyError::DuplicateId(id("a"))));
    }

    #[test]
    fn descendants_in_pre_order() {
        let features = catalogue();
        assert_eq!(
            ids(descendants("projects", &features)),
            ["wiki", "pipelines", "schedules"]
        );
        assert!(descendants("admin", &features).is_empty());
        assert!(descendants("nope", &features).is_empty());
    }

    #[test]
    fn descendants_survive_cycles() {
        let features = vec![child("a", "b", 1), child("b", "a", 1), child("c", "a", 2)];
        assert_eq!(ids(descendants("a", &features)), ["b", "c"]);
    }

    #[test]
    fn ancestor_path_is_root_first() {
        let features = catalogue();
        assert_eq!(
            ids(ancestor_path("schedules", &features)),
            ["projects", "pipelines", "schedules"]
        );
        assert_eq!(ids(ancestor_path("admin", &features)), ["admin"]);
        assert!(ancestor_path("nope", &features).is_empty());
    }

    #[test]
    fn ancestor_path_survives_cycles() {
        let features = vec![child("a", "b", 1), child("b", "a", 1)];
        assert_eq!(ids(ancestor_path("a", &features)), ["b", "a"]);
    }

    #[test]
    fn consistent_catalogue_is_valid() {
        let report = validate(&catalogue(), 5);
        assert!(report.valid, "{:?}", report.messages());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn validation_collects_every_issue() {
        let features = vec![
            root("a"),
            root("a"),
            child("orphan", "ghost", 1),
            child("loop", "loop", 1),
            child("b", "a", 3),
            root("c").with_rollout(RolloutDescriptor::percentage(120.0)),
        ];

        let report = validate(&features, 5);

        assert!(!report.valid);
        assert_eq!(
            report.messages(),
            [
                "feature a is defined more than once",
                "feature orphan references missing parent ghost",
                "feature loop has a cyclic parent chain",
                "feature b has level 3 but its parent implies 1",
                "feature c has rollout percentage 120 outside [0, 100]",
            ]
        );
    }

    #[test]
    fn validation_reports_each_member_of_a_two_cycle() {
        let features = vec![child("a", "b", 1), child("b", "a", 1)];

        let report = validate(&features, 5);

        assert!(!report.valid);
        assert_eq!(
            report.errors,
            [
                HierarchyIssue::Cycle { id: id("a") },
                HierarchyIssue::Cycle { id: id("b") },
            ]
        );
    }

    #[test_case(2, true; "within limit")]
    #[test_case(1, false; "too deep")]
    fn depth_limit(max_depth: usize, valid: bool) {
        let report = validate(&catalogue(), max_depth);
        assert_eq!(report.valid, valid);
        if !valid {
            assert_eq!(
                report.errors,
                [HierarchyIssue::TooDeep {
                    id: id("schedules"),
                    level: 2,
                    max_depth: 1,
                }]
            );
        }
    }

    #[test]
    fn root_with_nonzero_level_is_inconsistent() {
        let mut feature = root("a");
        feature.level = 1;
        let report = validate(&[feature], 5);
        assert_eq!(
            report.errors,
            [HierarchyIssue::LevelMismatch {
                id: id("a"),
                level: 1,
                expected: 0,
            }]
        );
    }

    #[test]
    fn reports_all_cycles() {
        let features = vec![
            child("a", "b", 1),
            child("b", "a", 1),
            child("self", "self", 1),
            root("fine"),
            child("tail", "a", 2),
        ];
        assert_eq!(
            cycles(&features),
            [vec![id("a"), id("b")], vec![id("self")]]
        );
    }

    #[test]
    fn move_cascades_levels() {
        let moved = move_feature(&catalogue(), "pipelines", Some("admin")).unwrap();

        let level = |s: &str| moved.iter().find(|f| f.id.as_str() == s).unwrap().level;
        let pipelines = moved.iter().find(|f| f.id.as_str() == "pipelines").unwrap();
        assert_eq!(pipelines.parent_id, Some(id("admin")));
        assert_eq!(level("pipelines"), 1);
        assert_eq!(level("schedules"), 2);

        // input order is kept
        assert_eq!(ids(&moved), ids(&catalogue()));
        assert!(validate(&moved, 5).valid);
    }

    #[test]
    fn move_to_root() {
        let moved = move_feature(&catalogue(), "pipelines", None).unwrap();

        let pipelines = moved.iter().find(|f| f.id.as_str() == "pipelines").unwrap();
        let schedules = moved.iter().find(|f| f.id.as_str() == "schedules").unwrap();
        assert_eq!(pipelines.parent_id, None);
        assert_eq!(pipelines.level, 0);
        assert_eq!(schedules.level, 1);
        assert!(validate(&moved, 5).valid);
    }

    #[test]
    fn move_deeper_cascades() {
        let moved = move_feature(&catalogue(), "projects", Some("admin")).unwrap();

        let levels: Vec<_> = moved.iter().map(|f| (f.id.as_str(), f.level)).collect();
        assert_eq!(
            levels,
            [
                ("schedules", 3),
                ("projects", 1),
                ("wiki", 2),
                ("pipelines", 2),
                ("admin", 0),
            ]
        );
    }

    #[test_case("projects", Some("projects"); "under itself")]
    #[test_case("projects", Some("schedules"); "under a descendant")]
    fn move_rejects_cycles(feature: &str, parent: Option<&str>) {
        let error = move_feature(&catalogue(), feature, parent).unwrap_err();
        assert!(matches!(error, MoveError::Cycle { .. }), "{error}");
    }

    #[test]
    fn move_rejects_unknown_features() {
        assert_eq!(
            move_feature(&catalogue(), "nope", None),
            Err(MoveError::FeatureNotFound("nope".to_owned()))
        );
        assert_eq!(
            move_feature(&catalogue(), "wiki", Some("nope")),
            Err(MoveError::ParentNotFound("nope".to_owned()))
        );
    }

    #[test]
    fn nested_conversion_round_trips() {
        let nested = to_nested(&catalogue()).unwrap();

        assert_eq!(nested.len(), 2);
        assert!(nested["projects"].children.contains_key("pipelines"));

        let mut flat = to_flat(&nested);
        let mut expected = catalogue();
        flat.sort_by(|a, b| a.id.cmp(&b.id));
        expected.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(flat, expected);

        assert_eq!(to_nested(&to_flat(&nested)).unwrap(), nested);
    }
}
