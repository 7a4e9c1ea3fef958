use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;
use tiers::{EngineConfig, Evaluator, FeatureEvaluation, UserContext};
use tracing::instrument;

use super::terminal::{Colorize, status};

#[derive(Debug, Parser)]
pub struct Evaluate {
    /// The version document
    file: PathBuf,

    /// Evaluate only this feature
    #[arg(long, short)]
    feature: Option<String>,

    /// The user id (anonymous if omitted)
    #[arg(long, short)]
    user: Option<String>,

    /// The user's group
    #[arg(long, short)]
    group: Option<String>,

    /// Custom attribute, `key=value` (repeatable)
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_key_value)]
    custom: Vec<(String, Value)>,

    /// Device attribute, `key=value` (repeatable)
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_key_value)]
    device: Vec<(String, Value)>,

    /// Location attribute, `key=value` (repeatable)
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_key_value)]
    location: Vec<(String, Value)>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

/// Parse `key=value`. The value is read as JSON if it parses, otherwise it
/// is taken as a plain string, so `age=30` is a number and `plan=pro` a string.
fn parse_key_value(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("missing key in '{s}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((key.to_owned(), value))
}

impl Evaluate {
    fn context(&self) -> UserContext {
        let mut context = UserContext::new();
        if let Some(user) = &self.user {
            context = context.with_user_id(user.clone());
        }
        if let Some(group) = &self.group {
            context = context.with_user_group(group.clone());
        }
        for (key, value) in &self.custom {
            context = context.with_custom(key.clone(), value.clone());
        }
        for (key, value) in &self.device {
            context = context.with_device(key.clone(), value.clone());
        }
        for (key, value) in &self.location {
            context = context.with_location(key.clone(), value.clone());
        }
        context
    }

    #[instrument(level = "debug", skip(self, config), fields(file = %self.file.display()))]
    pub fn run(self, config: &EngineConfig) -> anyhow::Result<()> {
        let version = super::load(&self.file)?;
        let features = version.flat_features();
        let evaluator = Evaluator::new(&features).with_config(config.clone());
        let context = self.context();

        let evaluations = match &self.feature {
            Some(id) => {
                let Some(evaluation) = evaluator.evaluate_id(id, &context) else {
                    anyhow::bail!("feature {id} not found in {}", self.file.display());
                };
                vec![evaluation]
            }
            None => evaluator.evaluate_all(&context),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&evaluations)?);
        } else {
            print_table(&evaluations);
        }
        Ok(())
    }
}

fn print_table(evaluations: &[FeatureEvaluation]) {
    let width = evaluations
        .iter()
        .map(|e| e.feature_id.len())
        .max()
        .unwrap_or_default();

    for evaluation in evaluations {
        let mark = if evaluation.enabled { "✓".success() } else { "✗".warning() };
        println!(
            "{mark} {:<width$}  {:<8}  {}",
            evaluation.feature_id.as_str(),
            status(evaluation.enabled),
            evaluation.reason.to_string().dim(),
        );
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test_case("plan=pro", "plan", json!("pro"); "bare string")]
    #[test_case("age=30", "age", json!(30); "number")]
    #[test_case("beta=true", "beta", json!(true); "boolean")]
    #[test_case("tags=[\"a\",\"b\"]", "tags", json!(["a", "b"]); "array")]
    #[test_case("note=a=b", "note", json!("a=b"); "value containing equals")]
    #[test_case("empty=", "empty", json!(""); "empty value")]
    fn parses_key_values(input: &str, key: &str, value: Value) {
        assert_eq!(parse_key_value(input).unwrap(), (key.to_owned(), value));
    }

    #[test_case("novalue"; "no separator")]
    #[test_case("=value"; "no key")]
    fn rejects_malformed_pairs(input: &str) {
        assert!(parse_key_value(input).is_err());
    }

    #[test]
    fn builds_context_from_flags() {
        let command = Evaluate::parse_from([
            "evaluate",
            "features.json",
            "--user",
            "u1",
            "--custom",
            "plan=pro",
            "--location",
            "country=NZ",
        ]);

        let context = command.context();

        assert_eq!(context.user_id(), Some("u1"));
        assert_eq!(context.custom["plan"], json!("pro"));
        assert_eq!(context.location["country"], json!("NZ"));
    }
}
