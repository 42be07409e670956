//! Artifact persistence - load and save fitted transform parameters
//!
//! Every fitted object is stored as a JSON document carrying a `version`
//! field so that newer exports are rejected instead of misread.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Highest artifact format version this build understands.
pub const CURRENT_VERSION: u32 = 1;

/// Serde default for artifacts exported without a `version` field.
pub fn default_version() -> u32 {
    CURRENT_VERSION
}

/// A persisted artifact with a format version.
pub trait Versioned {
    /// Human-readable artifact kind used in error messages.
    const KIND: &'static str;

    fn version(&self) -> u32;
}

/// Errors that can occur while loading startup artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("{kind} file not found: {}", .path.display())]
    NotFound { kind: &'static str, path: PathBuf },
    #[error("IO error reading {kind} at {}: {source}", .path.display())]
    Io {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to deserialize {kind} at {}: {message}", .path.display())]
    Deserialize {
        kind: &'static str,
        path: PathBuf,
        message: String,
    },
    #[error("{kind} version mismatch: expected at most v{expected}, found v{found}")]
    VersionMismatch {
        kind: &'static str,
        expected: u32,
        found: u32,
    },
    #[error("invalid {kind}: {message}")]
    Invalid { kind: &'static str, message: String },
}

impl ArtifactError {
    pub fn invalid(kind: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            kind,
            message: message.into(),
        }
    }
}

/// Load a versioned JSON artifact.
pub fn load_json<T>(path: &Path) -> Result<T, ArtifactError>
where
    T: DeserializeOwned + Versioned,
{
    if !path.exists() {
        return Err(ArtifactError::NotFound {
            kind: T::KIND,
            path: path.to_path_buf(),
        });
    }

    let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
        kind: T::KIND,
        path: path.to_path_buf(),
        source,
    })?;

    let artifact: T = serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Deserialize {
        kind: T::KIND,
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    // Version check
    if artifact.version() > CURRENT_VERSION {
        return Err(ArtifactError::VersionMismatch {
            kind: T::KIND,
            expected: CURRENT_VERSION,
            found: artifact.version(),
        });
    }

    Ok(artifact)
}

/// Save an artifact as pretty-printed JSON, creating parent directories.
pub fn save_json<T>(artifact: &T, path: &Path) -> Result<(), ArtifactError>
where
    T: Serialize + Versioned,
{
    let io_error = |source| ArtifactError::Io {
        kind: T::KIND,
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let bytes = serde_json::to_vec_pretty(artifact).map_err(|e| ArtifactError::Invalid {
        kind: T::KIND,
        message: e.to_string(),
    })?;

    fs::write(path, bytes).map_err(io_error)
}
