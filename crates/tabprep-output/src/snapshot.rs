//! Versioned JSON snapshots of workflows and fitted statistics.
//!
//! A snapshot wraps its payload in an envelope carrying a format version, a
//! creation timestamp, and a sha256 fingerprint over the canonical payload
//! encoding. Loading re-canonicalizes and re-hashes the payload, so a
//! hand-edited or truncated snapshot is rejected instead of silently
//! producing a skewed transform.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use tabprep_transform::{StatsContext, Workflow};

/// Current snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid snapshot {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported snapshot version {found} in {} (expected {FORMAT_VERSION})", path.display())]
    UnsupportedVersion { path: PathBuf, found: u32 },
    #[error("fingerprint mismatch in {}: snapshot is corrupt or was edited", path.display())]
    FingerprintMismatch { path: PathBuf },
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    created_at: String,
    fingerprint: String,
    payload: serde_json::Value,
}

/// Hex sha256 over the canonical (sorted-key, compact) payload encoding.
fn fingerprint(payload: &serde_json::Value) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_string(payload)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

fn save<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), SnapshotError> {
    let payload = serde_json::to_value(value).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        created_at: Utc::now().to_rfc3339(),
        fingerprint: fingerprint(&payload).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        payload,
    };
    let mut contents =
        serde_json::to_string_pretty(&envelope).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    contents.push('\n');
    std::fs::write(path, contents).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "saved {what} snapshot");
    Ok(())
}

fn load<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, SnapshotError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let envelope: Envelope =
        serde_json::from_str(&contents).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    if envelope.format_version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: envelope.format_version,
        });
    }
    let expected = fingerprint(&envelope.payload).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if expected != envelope.fingerprint {
        return Err(SnapshotError::FingerprintMismatch {
            path: path.to_path_buf(),
        });
    }
    let value = serde_json::from_value(envelope.payload).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "loaded {what} snapshot");
    Ok(value)
}

pub fn save_workflow(path: impl AsRef<Path>, workflow: &Workflow) -> Result<(), SnapshotError> {
    save(path.as_ref(), workflow, "workflow")
}

pub fn load_workflow(path: impl AsRef<Path>) -> Result<Workflow, SnapshotError> {
    load(path.as_ref(), "workflow")
}

pub fn save_stats(path: impl AsRef<Path>, stats: &StatsContext) -> Result<(), SnapshotError> {
    save(path.as_ref(), stats, "stats")
}

pub fn load_stats(path: impl AsRef<Path>) -> Result<StatsContext, SnapshotError> {
    load(path.as_ref(), "stats")
}
