//! Targeting conditions.
//!
//! A condition picks a value out of the [`UserContext`] (selected by its
//! [`ConditionType`] and optional `field`) and compares it against a
//! configured value. Evaluation is total: unknown types, unknown operators and
//! type mismatches all evaluate to `false`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{context::UserContext, hash::bucket};

/// Where a condition reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    /// `custom[field]`, or the user id when no field is given.
    User,
    /// `device[field]`, or `device.type`.
    Device,
    /// `location[field]`, or `location.country`.
    Location,
    /// The evaluation instant, in Unix epoch milliseconds.
    Time,
    /// The user's rollout bucket, in `[0, 100)`.
    Percentage,
    /// `custom[field]`, or the whole custom bag.
    Custom,
    /// Anything else. Never matches.
    #[serde(other)]
    Unknown,
}

/// How the context value is compared against the condition's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Strict equality.
    Equals,
    /// Membership in an array.
    In,
    /// Substring match.
    Contains,
    /// Numeric `>`.
    Greater,
    /// Numeric `<`.
    Less,
    /// Numeric inclusive range `[lo, hi]`.
    Between,
    /// Anything else. Never matches.
    #[serde(other)]
    Unknown,
}

/// A single targeting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCondition {
    /// Where the context value comes from.
    #[serde(rename = "type")]
    pub kind: ConditionType,

    /// Sub-key into the selected context bag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// The comparison to perform.
    pub operator: Operator,

    /// The value to compare against.
    #[serde(default)]
    pub value: Value,
}

impl FeatureCondition {
    /// Creates a condition without a field.
    #[must_use]
    pub fn new(kind: ConditionType, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            kind,
            field: None,
            operator,
            value: value.into(),
        }
    }

    /// Sets the field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Evaluates the condition for `context` at instant `now`.
    ///
    /// `anonymous` is the bucketing id used for percentage conditions when the
    /// context has no user id.
    #[must_use]
    pub fn matches(&self, context: &UserContext, now: DateTime<Utc>, anonymous: &str) -> bool {
        let Some(actual) = self.context_value(context, now, anonymous) else {
            return false;
        };

        compare(self.operator, &actual, &self.value)
    }

    /// Resolves the value this condition inspects. `None` means the value is
    /// absent from the context.
    fn context_value(
        &self,
        context: &UserContext,
        now: DateTime<Utc>,
        anonymous: &str,
    ) -> Option<Value> {
        let field = self.field.as_deref();
        match self.kind {
            ConditionType::User => match field {
                Some(field) => context.custom.get(field).cloned(),
                None => context.user_id.clone().map(Value::String),
            },
            ConditionType::Device => context.device.get(field.unwrap_or("type")).cloned(),
            ConditionType::Location => context.location.get(field.unwrap_or("country")).cloned(),
            ConditionType::Time => Some(Value::from(now.timestamp_millis())),
            ConditionType::Percentage => {
                Some(Value::from(bucket(context.bucketing_id(anonymous))))
            }
            ConditionType::Custom => match field {
                Some(field) => context.custom.get(field).cloned(),
                None => Some(Value::Object(context.custom.clone())),
            },
            ConditionType::Unknown => None,
        }
    }
}

fn compare(operator: Operator, actual: &Value, expected: &Value) -> bool {
    match operator {
        Operator::Equals => strict_eq(actual, expected),
        Operator::In => expected
            .as_array()
            .is_some_and(|candidates| candidates.iter().any(|c| strict_eq(actual, c))),
        Operator::Contains => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            _ => false,
        },
        Operator::Greater => numeric_pair(actual, expected).is_some_and(|(a, b)| a > b),
        Operator::Less => numeric_pair(actual, expected).is_some_and(|(a, b)| a < b),
        Operator::Between => match expected.as_array().map(Vec::as_slice) {
            Some([lo, hi]) => match (to_number(actual), to_number(lo), to_number(hi)) {
                (Some(x), Some(lo), Some(hi)) => lo <= x && x <= hi,
                _ => false,
            },
            _ => false,
        },
        Operator::Unknown => false,
    }
}

/// Equality without type coercion, except that numbers compare by value
/// (`1 == 1.0`).
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => a == b,
        },
        _ => a == b,
    }
}

fn numeric_pair(a: &Value, b: &Value) -> Option<(f64, f64)> {
    Some((to_number(a)?, to_number(b)?))
}

/// Numeric coercion. Returns `None` where the value has no numeric reading
/// (non-numeric strings, arrays, objects), so comparisons against it fail.
fn to_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().ok()?
            }
        }
        Value::Array(_) | Value::Object(_) => return None,
    };
    (!number.is_nan()).then_some(number)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn context() -> UserContext {
        UserContext::new()
            .with_user_id("u1")
            .with_device("type", "mobile")
            .with_device("os", "ios")
            .with_location("country", "NZ")
            .with_custom("plan", "enterprise")
            .with_custom("seats", 25)
            .with_custom("email", "someone@example.com")
    }

    fn check(condition: &FeatureCondition) -> bool {
        condition.matches(&context(), Utc::now(), "anonymous")
    }

    #[test_case(ConditionType::User, None, Operator::Equals, json!("u1"), true; "user id equals")]
    #[test_case(ConditionType::User, Some("plan"), Operator::Equals, json!("enterprise"), true; "user field reads custom")]
    #[test_case(ConditionType::Device, None, Operator::Equals, json!("mobile"), true; "device defaults to type")]
    #[test_case(ConditionType::Device, Some("os"), Operator::In, json!(["ios", "android"]), true; "device field in")]
    #[test_case(ConditionType::Location, None, Operator::In, json!(["AU", "GB"]), false; "location not in")]
    #[test_case(ConditionType::Custom, Some("email"), Operator::Contains, json!("@example.com"), true; "custom contains")]
    #[test_case(ConditionType::Custom, Some("seats"), Operator::Greater, json!(10), true; "greater")]
    #[test_case(ConditionType::Custom, Some("seats"), Operator::Less, json!("10"), false; "less with string coercion")]
    #[test_case(ConditionType::Custom, Some("seats"), Operator::Between, json!([25, 30]), true; "between is inclusive")]
    #[test_case(ConditionType::Custom, Some("seats"), Operator::Between, json!([1]), false; "between needs two bounds")]
    #[test_case(ConditionType::Custom, Some("seats"), Operator::Equals, json!(25.0), true; "numbers compare by value")]
    #[test_case(ConditionType::Custom, Some("seats"), Operator::Equals, json!("25"), false; "equals does not coerce")]
    #[test_case(ConditionType::Custom, Some("missing"), Operator::Greater, json!(0), false; "missing value never compares")]
    #[test_case(ConditionType::Custom, Some("plan"), Operator::Greater, json!(0), false; "non numeric string never compares")]
    #[test_case(ConditionType::Unknown, None, Operator::Equals, json!(null), false; "unknown type fails closed")]
    #[test_case(ConditionType::User, None, Operator::Unknown, json!("u1"), false; "unknown operator fails closed")]
    fn evaluates(
        kind: ConditionType,
        field: Option<&str>,
        operator: Operator,
        value: Value,
        expected: bool,
    ) {
        let mut condition = FeatureCondition::new(kind, operator, value);
        condition.field = field.map(str::to_owned);
        assert_eq!(check(&condition), expected);
    }

    #[test]
    fn percentage_uses_user_bucket() {
        let user_bucket = bucket("u1");
        let above =
            FeatureCondition::new(ConditionType::Percentage, Operator::Less, user_bucket + 1.0);
        let below = FeatureCondition::new(ConditionType::Percentage, Operator::Less, user_bucket);

        assert!(check(&above));
        assert!(!check(&below));
    }

    #[test]
    fn time_compares_epoch_millis() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let after_2025 = FeatureCondition::new(
            ConditionType::Time,
            Operator::Greater,
            1_735_689_600_000_i64, // 2025-01-01
        );

        assert!(after_2025.matches(&context(), now, "anonymous"));
    }

    #[test]
    fn unknown_strings_deserialize_to_unknown() {
        let condition: FeatureCondition = serde_json::from_value(json!({
            "type": "weather",
            "operator": "approximately",
            "value": 1
        }))
        .unwrap();

        assert_eq!(condition.kind, ConditionType::Unknown);
        assert_eq!(condition.operator, Operator::Unknown);
        assert!(!check(&condition));
    }

    #[test]
    fn anonymous_user_has_no_id_for_user_conditions() {
        let condition = FeatureCondition::new(ConditionType::User, Operator::Equals, "u1");
        assert!(!condition.matches(&UserContext::new(), Utc::now(), "anonymous"));
    }
}
