//! Staged exposure of features to users.
//!
//! Every strategy buckets users with [`stable_hash`](crate::domain::hash),
//! so a user's verdict only changes when the configuration (or, for
//! [`Strategy::Gradual`], the clock) moves past their bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{context::UserContext, hash::bucket};

/// The rollout strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// A fixed share of users, by bucket.
    Percentage,
    /// An explicit list of user ids.
    Whitelist,
    /// A share of users that grows over time.
    Gradual,
    /// Anything else. Always disabled.
    #[serde(other)]
    Unknown,
}

/// A time-based ramp for [`Strategy::Gradual`].
///
/// The effective percentage is `start` at `started_at` and grows by `step`
/// every `interval` minutes, capped at `end`. Before `started_at` it is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradualRamp {
    /// Percentage at the start of the ramp.
    pub start: f64,
    /// Final percentage.
    pub end: f64,
    /// Increase per interval.
    pub step: f64,
    /// Interval length, in minutes.
    pub interval: u64,
    /// When the ramp begins.
    pub started_at: DateTime<Utc>,
}

impl GradualRamp {
    /// The percentage of users exposed at instant `now`, or `None` if the
    /// ramp is malformed.
    #[must_use]
    pub fn percentage_at(&self, now: DateTime<Utc>) -> Option<f64> {
        if self.interval == 0 {
            return None;
        }
        let elapsed = now.signed_duration_since(self.started_at).num_minutes();
        let Ok(elapsed) = u64::try_from(elapsed) else {
            // not started yet
            return Some(0.0);
        };
        let steps = elapsed / self.interval;
        #[allow(clippy::cast_precision_loss)]
        let ramped = self.step.mul_add(steps as f64, self.start);
        Some(ramped.min(self.end).clamp(0.0, 100.0))
    }
}

/// How a feature is progressively released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutDescriptor {
    /// The strategy.
    pub strategy: Strategy,

    /// Percentage of users exposed, in `[0, 100]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,

    /// User ids exposed by [`Strategy::Whitelist`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub whitelist: Vec<String>,

    /// Ramp used by [`Strategy::Gradual`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradual: Option<GradualRamp>,
}

/// The verdict of a rollout, with an audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutOutcome {
    /// Whether the user is in the rollout.
    pub enabled: bool,
    /// What was checked.
    pub reason: String,
}

impl RolloutOutcome {
    fn new(enabled: bool, reason: impl Into<String>) -> Self {
        Self {
            enabled,
            reason: reason.into(),
        }
    }
}

impl RolloutDescriptor {
    /// A percentage rollout.
    #[must_use]
    pub const fn percentage(percentage: f64) -> Self {
        Self {
            strategy: Strategy::Percentage,
            percentage: Some(percentage),
            whitelist: Vec::new(),
            gradual: None,
        }
    }

    /// A whitelist rollout.
    #[must_use]
    pub fn whitelist<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            strategy: Strategy::Whitelist,
            percentage: None,
            whitelist: users.into_iter().map(Into::into).collect(),
            gradual: None,
        }
    }

    /// A gradual rollout.
    #[must_use]
    pub const fn gradual(ramp: GradualRamp) -> Self {
        Self {
            strategy: Strategy::Gradual,
            percentage: None,
            whitelist: Vec::new(),
            gradual: Some(ramp),
        }
    }

    /// Whether the configured percentage lies in `[0, 100]` (or is absent).
    #[must_use]
    pub fn percentage_in_range(&self) -> bool {
        self.percentage.is_none_or(|p| (0.0..=100.0).contains(&p))
    }

    /// Decides whether `context` is in the rollout at instant `now`.
    ///
    /// `anonymous` is the bucketing id used when the context has no user id.
    #[must_use]
    pub fn evaluate(
        &self,
        context: &UserContext,
        now: DateTime<Utc>,
        anonymous: &str,
    ) -> RolloutOutcome {
        match self.strategy {
            Strategy::Percentage => match self.percentage {
                Some(percentage) => {
                    by_bucket("percentage", context.bucketing_id(anonymous), percentage)
                }
                None => RolloutOutcome::new(false, "invalid percentage configuration"),
            },
            Strategy::Whitelist => match context.user_id() {
                Some(user) => {
                    let listed = self.whitelist.iter().any(|u| u == user);
                    let verdict = if listed { "listed" } else { "not listed" };
                    RolloutOutcome::new(
                        listed,
                        format!("whitelist check for user {user}: {verdict}"),
                    )
                }
                None => RolloutOutcome::new(false, "whitelist check: no user id"),
            },
            Strategy::Gradual => match self
                .gradual
                .as_ref()
                .and_then(|ramp| ramp.percentage_at(now))
            {
                Some(percentage) => {
                    by_bucket("gradual", context.bucketing_id(anonymous), percentage)
                }
                None => RolloutOutcome::new(false, "invalid gradual configuration"),
            },
            Strategy::Unknown => RolloutOutcome::new(false, "unknown rollout strategy"),
        }
    }
}

fn by_bucket(strategy: &str, id: &str, percentage: f64) -> RolloutOutcome {
    let bucket = bucket(id);
    let enabled = bucket < percentage;
    let comparison = if enabled { "<" } else { ">=" };
    RolloutOutcome::new(
        enabled,
        format!("{strategy} rollout: bucket {bucket:.2} {comparison} {percentage}%"),
    )
}
