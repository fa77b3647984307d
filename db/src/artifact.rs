//! Tree artifact writing and checksum manifests.
//!
//! A finished tree is written either as pretty JSON or as gzip-compressed
//! compact JSON. The SHA-256 of the bytes on disk is recorded in an
//! [`ArtifactManifest`] saved next to the artifact, so a consumer can
//! detect edits or corruption before loading it.
//!
//! ```no_run
//! use sheet_tree_core::DataTree;
//! use sheet_tree_db::{ArtifactFormat, ArtifactManifest, write_artifact};
//!
//! let tree = DataTree::new();
//! let checksum = write_artifact(&tree, "out/tree.json.gz", ArtifactFormat::Compressed).unwrap();
//!
//! let manifest = ArtifactManifest::new("0.1.0", "tree.json.gz", ArtifactFormat::Compressed, checksum);
//! manifest.save(ArtifactManifest::path_for("out/tree.json.gz")).unwrap();
//! manifest.verify("out/tree.json.gz").unwrap();
//! ```

use std::fmt;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sheet_tree_core::{DiagnosticCounts, GrowReport};
use tracing::debug;

use crate::error::{DatabaseError, Result};

/// Manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";

/// On-disk encoding of a tree artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// Gzip-compressed compact JSON.
    Compressed,
}

impl ArtifactFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Compressed => "compressed",
        }
    }

    /// Conventional file extension for the format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Compressed => "json.gz",
        }
    }

    /// Guesses the format from a file name: `.gz` means compressed.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("gz") => Self::Compressed,
            _ => Self::Json,
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "compressed" | "gzip" | "gz" => Ok(Self::Compressed),
            other => Err(format!(
                "unknown artifact format '{other}' (expected 'json' or 'compressed')"
            )),
        }
    }
}

/// Serializes `document` to `path` in `format` and returns the SHA-256 hex
/// digest of the bytes written.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns [`DatabaseError::JsonError`] if serialization fails,
/// [`DatabaseError::CompressionError`] if gzip encoding fails, or
/// [`DatabaseError::IoError`] if the file cannot be written.
pub fn write_artifact<T: Serialize + ?Sized>(
    document: &T,
    path: impl AsRef<Path>,
    format: ArtifactFormat,
) -> Result<String> {
    let path = path.as_ref();
    let bytes = match format {
        ArtifactFormat::Json => serde_json::to_vec_pretty(document)?,
        ArtifactFormat::Compressed => {
            let json = serde_json::to_vec(document)?;
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(&json)
                .and_then(|()| encoder.finish())
                .map_err(|e| DatabaseError::CompressionError(e.to_string()))?
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &bytes)?;

    let checksum = checksum_bytes(&bytes);
    debug!(path = %path.display(), format = %format, bytes = bytes.len(), "Wrote artifact");
    Ok(checksum)
}

/// Reads an artifact back as a JSON document.
///
/// # Errors
///
/// Returns [`DatabaseError::IoError`] if the file cannot be read,
/// [`DatabaseError::CompressionError`] if a compressed artifact is not
/// valid gzip, or [`DatabaseError::JsonError`] on invalid JSON.
pub fn read_artifact(path: impl AsRef<Path>, format: ArtifactFormat) -> Result<Value> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    match format {
        ArtifactFormat::Json => Ok(serde_json::from_reader(reader)?),
        ArtifactFormat::Compressed => {
            let mut json = Vec::new();
            GzDecoder::new(reader)
                .read_to_end(&mut json)
                .map_err(|e| DatabaseError::CompressionError(e.to_string()))?;
            Ok(serde_json::from_slice(&json)?)
        }
    }
}

/// Computes the SHA-256 hex digest of a file.
///
/// # Errors
///
/// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot be
/// read.
pub fn checksum_file(path: impl AsRef<Path>) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(checksum_bytes(&bytes))
}

fn checksum_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Metadata recorded alongside a written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Manifest format version.
    pub version: String,
    /// Version of the tool that wrote the artifact.
    pub tool_version: String,
    /// RFC 3339 UTC timestamp of the build.
    pub generated_at: String,
    /// Artifact file name, relative to the manifest.
    pub artifact: String,
    pub format: ArtifactFormat,
    /// SHA-256 hex digest of the artifact bytes.
    pub checksum: String,
    /// Built sheet names in build order.
    #[serde(default)]
    pub sheets: Vec<String>,
    #[serde(default)]
    pub diagnostic_counts: DiagnosticCounts,
}

impl ArtifactManifest {
    /// Creates a manifest stamped with the current time.
    pub fn new(
        tool_version: impl Into<String>,
        artifact: impl Into<String>,
        format: ArtifactFormat,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            tool_version: tool_version.into(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            artifact: artifact.into(),
            format,
            checksum: checksum.into(),
            sheets: Vec::new(),
            diagnostic_counts: DiagnosticCounts::default(),
        }
    }

    /// Copies sheet names and diagnostic counts from a build report.
    pub fn with_report(mut self, report: &GrowReport) -> Self {
        self.sheets = report.sheets.iter().map(|s| s.name.clone()).collect();
        self.diagnostic_counts = report.counts();
        self
    }

    /// Conventional manifest location for an artifact:
    /// `<artifact>.manifest.json`.
    pub fn path_for(artifact_path: impl AsRef<Path>) -> PathBuf {
        let mut name = artifact_path.as_ref().as_os_str().to_owned();
        name.push(".manifest.json");
        PathBuf::from(name)
    }

    /// Loads a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, or [`JsonError`](crate::DatabaseError::JsonError) if the
    /// content is not valid manifest JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Saves the manifest as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be written, or [`JsonError`](crate::DatabaseError::JsonError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Recomputes the artifact checksum and compares it to the recorded one.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidChecksum`] on mismatch, or
    /// [`DatabaseError::IoError`] if the artifact cannot be read.
    pub fn verify(&self, artifact_path: impl AsRef<Path>) -> Result<()> {
        let path = artifact_path.as_ref();
        let actual = checksum_file(path)?;
        if actual != self.checksum {
            return Err(DatabaseError::InvalidChecksum(format!(
                "{}: expected {}, found {actual}",
                path.display(),
                self.checksum
            )));
        }
        Ok(())
    }
}
