//! YAML build configuration.
//!
//! Controls which sheets are built, how the artifact is written, and whether
//! unresolved references fail the build.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! include: []
//! exclude:
//!   - Scratch
//! output:
//!   format: compressed
//!   manifest: true
//! references:
//!   strict: false
//! ```
//!
//! Every section is optional; missing values take their defaults.

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sheet_tree_core::GrowOptions;

use crate::artifact::ArtifactFormat;
use crate::error::Result;

/// Artifact output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: ArtifactFormat,
    /// Write `<artifact>.manifest.json` next to the artifact.
    pub manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: ArtifactFormat::Json,
            manifest: true,
        }
    }
}

/// Reference validation policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Treat reference diagnostics as a failed build.
    pub strict: bool,
}

/// Top-level build configuration.
///
/// # Examples
///
/// ```
/// use sheet_tree_db::{ArtifactFormat, BuildConfig};
///
/// let config: BuildConfig = serde_yaml::from_str("exclude: [Scratch]").unwrap();
/// assert_eq!(config.version, "1.0");
/// assert_eq!(config.output.format, ArtifactFormat::Json);
/// assert!(!config.is_sheet_allowed("Scratch"));
/// assert!(config.is_sheet_allowed("Users"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Configuration format version.
    pub version: String,
    /// Sheets to build (empty = every sheet).
    pub include: Vec<String>,
    /// Sheets to skip.
    pub exclude: Vec<String>,
    pub output: OutputConfig,
    pub references: ReferenceConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            include: Vec::new(),
            exclude: Vec::new(),
            output: OutputConfig::default(),
            references: ReferenceConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::DatabaseError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        // An empty document deserializes as unit, not as an empty mapping.
        let value: serde_yaml::Value = serde_yaml::from_reader(reader)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::DatabaseError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    pub fn is_excluded(&self, sheet: &str) -> bool {
        self.exclude.iter().any(|s| s == sheet)
    }

    /// Returns `true` if `sheet` should be built.
    ///
    /// Exclusions are always honored. An empty include list admits every
    /// remaining sheet.
    pub fn is_sheet_allowed(&self, sheet: &str) -> bool {
        self.grow_options().is_sheet_allowed(sheet)
    }

    /// Sheet selection as consumed by [`sheet_tree_core::grow_tree`].
    pub fn grow_options(&self) -> GrowOptions {
        GrowOptions {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
include:
  - Users
  - Orders
  - Scratch
exclude:
  - Scratch
output:
  format: compressed
  manifest: false
references:
  strict: true
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: BuildConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.include, vec!["Users", "Orders", "Scratch"]);
        assert_eq!(config.exclude, vec!["Scratch"]);
        assert_eq!(config.output.format, ArtifactFormat::Compressed);
        assert!(!config.output.manifest);
        assert!(config.references.strict);
    }

    #[test]
    fn test_partial_sections_take_defaults() {
        let config: BuildConfig = serde_yaml::from_str("output:\n  format: compressed\n").unwrap();
        assert!(config.output.manifest);
        assert!(!config.references.strict);
        assert!(config.include.is_empty());
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let config: BuildConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert!(config.is_excluded("Scratch"));
        assert!(!config.is_sheet_allowed("Scratch"));
        assert!(config.is_sheet_allowed("Users"));
        assert!(!config.is_sheet_allowed("Products"));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(serde_yaml::from_str::<BuildConfig>("output: {format: xml}").is_err());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheet-tree.yml");

        let original: BuildConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();
        assert_eq!(BuildConfig::load(&path).unwrap(), original);
    }

    #[test]
    fn test_empty_file_is_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.yml");
        std::fs::write(&path, "").unwrap();
        assert_eq!(BuildConfig::load(&path).unwrap(), BuildConfig::default());
    }
}
