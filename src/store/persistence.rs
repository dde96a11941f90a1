//! Snapshot persistence for the diagram store.
//!
//! The diagram (with its persons and api-key references) serializes to one
//! JSON snapshot file under a versioned key. Execution/monitor state is
//! never persisted: the backend owns it and a status query rebuilds it, so
//! a stale local copy would only mislead.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagram::{Diagram, DiagramError};

/// Versioned storage key; bump when the snapshot schema changes shape.
pub const SNAPSHOT_KEY: &str = "diaflow.diagram.v2";

/// Errors from snapshot IO.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistError {
    #[error("snapshot io error: {0}")]
    #[diagnostic(code(diaflow::store::snapshot_io))]
    Io(#[from] std::io::Error),

    #[error("snapshot encode/decode error: {0}")]
    #[diagnostic(code(diaflow::store::snapshot_codec))]
    Codec(#[from] serde_json::Error),

    /// The snapshot on disk was written under a different key.
    #[error("snapshot key mismatch: found {found:?}, expected {SNAPSHOT_KEY:?}")]
    #[diagnostic(
        code(diaflow::store::snapshot_version),
        help("Migrate or delete the stale snapshot file.")
    )]
    KeyMismatch { found: String },

    /// The snapshot decoded but is not a valid diagram.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Invalid(#[from] DiagramError),
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    key: String,
    #[serde(rename = "savedAt")]
    saved_at: DateTime<Utc>,
    diagram: Diagram,
}

/// Reads and writes diagram snapshots in a directory.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// A store writing `{dir}/{SNAPSHOT_KEY}.json`.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{SNAPSHOT_KEY}.json")),
        }
    }

    /// Where the snapshot file lives.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the diagram. Overwrites any previous snapshot.
    pub async fn save(&self, diagram: &Diagram) -> Result<(), PersistError> {
        let snapshot = Snapshot {
            key: SNAPSHOT_KEY.to_string(),
            saved_at: Utc::now(),
            diagram: diagram.clone(),
        };
        let body = serde_json::to_vec_pretty(&snapshot)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, body).await?;
        tracing::debug!(path = %self.path.display(), "diagram snapshot saved");
        Ok(())
    }

    /// Load the snapshot, if one exists.
    ///
    /// A missing file is `Ok(None)`; a snapshot under a different key or an
    /// invalid diagram is an error.
    pub async fn load(&self) -> Result<Option<Diagram>, PersistError> {
        let body = match tokio::fs::read(&self.path).await {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let snapshot: Snapshot = serde_json::from_slice(&body)?;
        if snapshot.key != SNAPSHOT_KEY {
            return Err(PersistError::KeyMismatch {
                found: snapshot.key,
            });
        }
        snapshot.diagram.validate()?;
        Ok(Some(snapshot.diagram))
    }

    /// Delete the snapshot if present.
    pub async fn clear(&self) -> Result<(), PersistError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
