//! This bench evaluates every feature of a large, deep catalogue for a batch
//! of users, and times the hierarchy checks that run before a snapshot is
//! accepted.

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use tiers::{
    Evaluator, FeatureConfig, FeatureId, UserContext,
    domain::{
        build_tree,
        condition::{ConditionType, FeatureCondition, Operator},
        hierarchy,
        rollout::RolloutDescriptor,
    },
};

/// Builds a forest of `roots` trees, each `depth` levels deep with `fanout`
/// children per node. Every third feature carries a percentage rollout and
/// depends on its parent.
fn catalogue(roots: usize, depth: usize, fanout: usize) -> Vec<FeatureConfig> {
    fn grow(
        parent: &FeatureId,
        level: usize,
        depth: usize,
        fanout: usize,
        out: &mut Vec<FeatureConfig>,
    ) {
        if level > depth {
            return;
        }
        for i in 0..fanout {
            let id = FeatureId::new(format!("{parent}.{i}")).unwrap();
            let mut feature = FeatureConfig::new(id.clone(), true)
                .with_parent(parent.clone(), level)
                .with_param("limit", i);
            if out.len() % 3 == 0 {
                feature = feature
                    .with_dependency(parent.clone())
                    .with_rollout(RolloutDescriptor::percentage(50.0));
            }
            out.push(feature);
            grow(&id, level + 1, depth, fanout, out);
        }
    }

    let mut out = Vec::new();
    for r in 0..roots {
        let id = FeatureId::new(format!("root{r}")).unwrap();
        out.push(
            FeatureConfig::new(id.clone(), true).with_condition(FeatureCondition::new(
                ConditionType::User,
                Operator::Contains,
                "user",
            )),
        );
        grow(&id, 1, depth, fanout, &mut out);
    }
    out
}

fn evaluate_all(c: &mut Criterion) {
    let features = catalogue(10, 3, 4);
    let users: Vec<_> = (0..100)
        .map(|i| UserContext::new().with_user_id(format!("user-{i}")))
        .collect();
    let evaluator = Evaluator::new(&features);

    c.bench_function("evaluate all features for 100 users", |b| {
        b.iter(|| {
            for user in &users {
                black_box(evaluator.evaluate_all(user));
            }
        });
    });
}

fn hierarchy_checks(c: &mut Criterion) {
    let features = catalogue(10, 3, 4);

    c.bench_function("validate hierarchy", |b| {
        b.iter(|| black_box(hierarchy::validate(&features, 5)));
    });

    c.bench_function("build tree", |b| {
        b.iter(|| black_box(build_tree(&features).unwrap()));
    });
}

criterion_group!(benches, evaluate_all, hierarchy_checks);
criterion_main!(benches);
