//! Reading and writing version documents.
//!
//! Documents are JSON, or YAML when the file extension is `.yaml` or `.yml`.

use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
};

use tracing::instrument;

use crate::domain::VersionConfig;

/// The encoding of a version document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

impl Format {
    /// Picks the format from a file extension, defaulting to JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(OsStr::to_str) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Errors from decoding or encoding a version document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Invalid JSON, or JSON that is not a version document.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Invalid YAML, or YAML that is not a version document.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur when loading a version document from disk.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The file is not a valid version document.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: ParseError,
    },
}

/// Errors that can occur when saving a version document to disk.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The document could not be encoded.
    #[error("failed to encode version document: {0}")]
    Encode(#[from] ParseError),
    /// The file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
}

/// Decodes a version document.
///
/// # Errors
///
/// Fails if the content is not a valid document in the given format.
pub fn parse_version(content: &str, format: Format) -> Result<VersionConfig, ParseError> {
    Ok(match format {
        Format::Json => serde_json::from_str(content)?,
        Format::Yaml => serde_yaml::from_str(content)?,
    })
}

/// Encodes a version document. JSON output is pretty-printed.
///
/// # Errors
///
/// Fails if the document cannot be encoded.
pub fn render_version(config: &VersionConfig, format: Format) -> Result<String, ParseError> {
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(config)?,
        Format::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Loads a version document, choosing the format from the file extension.
///
/// # Errors
///
/// Fails if the file cannot be read or parsed.
#[instrument(level = "debug")]
pub fn load_version(path: &Path) -> Result<VersionConfig, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config =
        parse_version(&content, Format::from_path(path)).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!(
        version = %config.version,
        features = config.features.len(),
        "loaded version document"
    );
    Ok(config)
}

/// Saves a version document, choosing the format from the file extension.
///
/// # Errors
///
/// Fails if the document cannot be encoded or the file cannot be written.
#[instrument(level = "debug", skip(config), fields(version = %config.version))]
pub fn save_version(path: &Path, config: &VersionConfig) -> Result<(), SaveError> {
    let mut content = render_version(config, Format::from_path(path))?;
    if !content.ends_with('\n') {
        content.push('\n');
    }
    std::fs::write(path, content).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })
}
