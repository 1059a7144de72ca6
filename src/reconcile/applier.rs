//! Atomic commit of rendered artifacts into the live directory.
//!
//! Writes go to a temporary file in the same directory followed by a
//! single rename, so a concurrent reader of the live directory observes
//! either the fully-old or fully-new content, never a partial write.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::render::{Artifact, ArtifactId};

pub struct Applier {
    live_dir: PathBuf,
}

impl Applier {
    pub fn new(live_dir: impl Into<PathBuf>) -> Self {
        Self {
            live_dir: live_dir.into(),
        }
    }

    pub fn live_dir(&self) -> &Path {
        &self.live_dir
    }

    fn target(&self, id: &ArtifactId) -> PathBuf {
        self.live_dir.join(id.file_name())
    }

    /// Commit `artifact` into the live directory.
    ///
    /// Callers must have validated first; the applier never validates, so
    /// it stays safe to call directly during failure-driven rollback.
    pub fn commit(&self, artifact: &Artifact) -> Result<()> {
        self.commit_text(&artifact.id, &artifact.text)
    }

    /// Commit raw text for an artifact id. Used by rollback to restore
    /// previous known-good content.
    pub fn commit_text(&self, id: &ArtifactId, text: &str) -> Result<()> {
        std::fs::create_dir_all(&self.live_dir).map_err(|e| Error::io("commit", e))?;

        let tmp_path = self.live_dir.join(format!(".{}.tmp", id.file_name()));
        let mut tmp = std::fs::File::create(&tmp_path).map_err(|e| Error::io("commit", e))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| Error::io("commit", e))?;
        tmp.sync_all().map_err(|e| Error::io("commit", e))?;
        drop(tmp);

        std::fs::rename(&tmp_path, self.target(id)).map_err(|e| Error::io("commit", e))?;
        tracing::debug!(artifact = %id, "artifact committed");
        Ok(())
    }

    /// Remove the live artifact if present. Removing a missing artifact is
    /// a no-op, not an error.
    pub fn remove(&self, id: &ArtifactId) -> Result<()> {
        match std::fs::remove_file(self.target(id)) {
            Ok(()) => {
                tracing::debug!(artifact = %id, "artifact removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io("remove", e)),
        }
    }

    /// Read the current live content for an artifact, if any.
    pub fn current(&self, id: &ArtifactId) -> Result<Option<String>> {
        match std::fs::read_to_string(self.target(id)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io("read", e)),
        }
    }

    /// File names of every committed artifact in the live directory.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = match std::fs::read_dir(&self.live_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(Error::io("list", e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| Error::io("list", e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".conf") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, EntityKind};

    fn artifact(id: i64, text: &str) -> Artifact {
        Artifact {
            id: ArtifactId::new(EntityKind::Stream, EntityId(id)),
            text: text.to_string(),
        }
    }

    #[test]
    fn commit_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let applier = Applier::new(dir.path());

        let a = artifact(1, "server {}\n");
        applier.commit(&a).unwrap();
        assert_eq!(applier.current(&a.id).unwrap().unwrap(), "server {}\n");
        assert_eq!(applier.list().unwrap(), vec!["stream_1.conf"]);

        // no leftover temp files
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn commit_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let applier = Applier::new(dir.path());

        applier.commit(&artifact(1, "old\n")).unwrap();
        applier.commit(&artifact(1, "new\n")).unwrap();
        let id = ArtifactId::new(EntityKind::Stream, EntityId(1));
        assert_eq!(applier.current(&id).unwrap().unwrap(), "new\n");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let applier = Applier::new(dir.path());
        let id = ArtifactId::new(EntityKind::Stream, EntityId(2));

        applier.remove(&id).unwrap();
        applier.commit(&artifact(2, "x\n")).unwrap();
        applier.remove(&id).unwrap();
        applier.remove(&id).unwrap();
        assert!(applier.current(&id).unwrap().is_none());
    }
}
