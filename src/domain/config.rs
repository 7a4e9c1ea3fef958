use std::path::Path;

use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// This struct holds the settings that control evaluation and hierarchy
/// validation. It is passed explicitly to the components that need it; there
/// is no process-wide instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct EngineConfig {
    /// The deepest level a feature may sit at.
    ///
    /// Roots are at level 0, so a `max_depth` of 5 permits six levels.
    max_depth: usize,

    /// The bucketing id used for users without a user id.
    ///
    /// All anonymous users share one bucket, so they are either all in or all
    /// out of a percentage rollout.
    anonymous_user: String,
}

/// Errors that can occur when loading or saving an [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    /// The file is not valid configuration TOML.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// The configuration could not be serialised.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// The file could not be written.
    #[error("failed to write config file: {0}")]
    Write(#[source] std::io::Error),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            anonymous_user: default_anonymous_user(),
        }
    }
}

impl EngineConfig {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    ///
    /// A file without a `_version` key is read as the current version, so an
    /// empty file yields [`EngineConfig::default`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let mut table: toml::Table = toml::from_str(&content)?;
        table
            .entry(VERSION_TAG)
            .or_insert_with(|| toml::Value::String(CURRENT_VERSION.to_owned()));
        Ok(table.try_into()?)
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(ConfigError::Write)
    }

    /// Returns the deepest permitted level.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Sets the deepest permitted level.
    pub const fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    /// Returns the bucketing id used for anonymous users.
    #[must_use]
    pub fn anonymous_user(&self) -> &str {
        &self.anonymous_user
    }
}

const VERSION_TAG: &str = "_version";
const CURRENT_VERSION: &str = "1";

const fn default_max_depth() -> usize {
    5
}

fn default_anonymous_user() -> String {
    "anonymous".to_owned()
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_max_depth")]
        max_depth: usize,

        #[serde(default = "default_anonymous_user")]
        anonymous_user: String,
    },
}

impl From<Versions> for EngineConfig {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                max_depth,
                anonymous_user,
            } => Self {
                max_depth,
                anonymous_user,
            },
        }
    }
}

impl From<EngineConfig> for Versions {
    fn from(config: EngineConfig) -> Self {
        Self::V1 {
            max_depth: config.max_depth,
            anonymous_user: config.anonymous_user,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nmax_depth = 3\nanonymous_user = \"guest\"\n")
            .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();

        assert_eq!(config.max_depth(), 3);
        assert_eq!(config.anonymous_user(), "guest");
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = EngineConfig::load(&missing).unwrap_err();
        assert!(matches!(error, ConfigError::Read(_)));
        assert!(error.to_string().starts_with("failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nmax_depth = \"five\"\n")
            .unwrap();

        let error = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn empty_file_returns_default() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let config = EngineConfig::load(file.path()).unwrap();

        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn untagged_file_fills_absent_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"max_depth = 2\n").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();

        assert_eq!(config.max_depth(), 2);
        assert_eq!(config.anonymous_user(), "anonymous");
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"99\"\n").unwrap();

        let error = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tiers.toml");
        let mut config = EngineConfig::default();
        config.set_max_depth(8);

        config.save(&path).unwrap();

        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }
}
