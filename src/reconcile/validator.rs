//! Staged validation of candidate artifacts.
//!
//! The engine validates its entire config set at once, so the candidate is
//! checked alongside a snapshot of everything already committed. A
//! candidate can therefore fail because of a conflict introduced by an
//! unrelated entity (duplicate listen port); that detail is surfaced, not
//! swallowed. Strictly check-only: the live directory and running process
//! are never touched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::ProxyEngine;
use crate::error::{Error, Result};
use crate::render::Artifact;

pub struct Validator {
    live_dir: PathBuf,
    engine: Arc<dyn ProxyEngine>,
}

impl Validator {
    pub fn new(live_dir: impl Into<PathBuf>, engine: Arc<dyn ProxyEngine>) -> Self {
        Self {
            live_dir: live_dir.into(),
            engine,
        }
    }

    /// Check the candidate artifact against a staged snapshot of the full
    /// config directory.
    pub async fn validate(&self, candidate: &Artifact) -> Result<()> {
        let staging = tempfile::Builder::new()
            .prefix("stream-director-check-")
            .tempdir()
            .map_err(|e| Error::io("validate", e))?;

        self.snapshot_live(staging.path())?;

        // add-or-replace the candidate inside the snapshot
        std::fs::write(
            staging.path().join(candidate.id.file_name()),
            &candidate.text,
        )
        .map_err(|e| Error::io("validate", e))?;

        self.engine.check(staging.path()).await.map_err(|rejection| {
            tracing::warn!(
                artifact = %candidate.id,
                detail = %rejection.detail,
                "engine rejected candidate configuration"
            );
            Error::Validation(format!(
                "engine rejected configuration for {}: {}",
                candidate.id, rejection.detail
            ))
        })
    }

    fn snapshot_live(&self, staging: &Path) -> Result<()> {
        let entries = match std::fs::read_dir(&self.live_dir) {
            Ok(entries) => entries,
            // empty live set: nothing to stage
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io("validate", e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| Error::io("validate", e))?;
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(".conf") {
                std::fs::copy(entry.path(), staging.join(&name))
                    .map_err(|e| Error::io("validate", e))?;
            }
        }
        Ok(())
    }
}
