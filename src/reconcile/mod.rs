//! The apply pipeline: validate → commit → reload, under one lock.
//!
//! # Data Flow
//! ```text
//! rendered artifact (render/, outside the lock)
//!     → validator.rs (staged snapshot + engine self-check)
//!     → applier.rs   (write-then-rename into the live directory)
//!     → reload.rs    (serialized graceful reload)
//! ```
//!
//! # Design Decisions
//! - One directory-wide mutex around validate+commit+reload: the engine
//!   has exactly one accepted configuration generation at a time, and two
//!   interleaved appliers could reload against a directory state neither
//!   intended
//! - Rendering happens outside the lock, it is pure
//! - Reload failure after commit rolls the artifact back to its previous
//!   content (last-known-good) and surfaces the reload error; the store is
//!   not rolled back

pub mod applier;
pub mod reload;
pub mod validator;

use serde_json::Map;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{DirectorSettings, ReloadSettings};
use crate::engine::ProxyEngine;
use crate::error::{Error, Result};
use crate::render::{Artifact, ArtifactId};

pub use applier::Applier;
pub use reload::ReloadCoordinator;
pub use validator::Validator;

pub struct Reconciler {
    validator: Validator,
    applier: Applier,
    reloader: ReloadCoordinator,
    /// Guards validate+commit+reload as one directory-wide step.
    apply_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        live_dir: impl Into<PathBuf>,
        engine: Arc<dyn ProxyEngine>,
        reload: ReloadSettings,
    ) -> Self {
        let live_dir = live_dir.into();
        Self {
            validator: Validator::new(&live_dir, engine.clone()),
            applier: Applier::new(&live_dir),
            reloader: ReloadCoordinator::new(engine, reload),
            apply_lock: Mutex::new(()),
        }
    }

    pub fn from_settings(settings: &DirectorSettings, engine: Arc<dyn ProxyEngine>) -> Self {
        Self::new(settings.live_dir.path.clone(), engine, settings.reload)
    }

    pub fn applier(&self) -> &Applier {
        &self.applier
    }

    /// Bring one artifact live: validate the candidate against the current
    /// set, commit it, reload. Returns meta entries the engine derived for
    /// the entity (merged into the stored row by the caller).
    pub async fn apply(&self, artifact: &Artifact) -> Result<Map<String, serde_json::Value>> {
        let _guard = self.apply_lock.lock().await;

        self.validator.validate(artifact).await?;

        let previous = self.applier.current(&artifact.id)?;
        self.applier.commit(artifact)?;

        if let Err(reload_err) = self.reloader.reload().await {
            self.rollback(&artifact.id, previous);
            return Err(reload_err);
        }

        let mut meta = Map::new();
        meta.insert("engine_online".into(), serde_json::Value::Bool(true));
        Ok(meta)
    }

    /// Remove an artifact from the live set and reload. Retiring an
    /// artifact that was never committed still reloads, keeping the engine
    /// in agreement with the store.
    pub async fn retire(&self, id: &ArtifactId) -> Result<()> {
        let _guard = self.apply_lock.lock().await;

        let previous = self.applier.current(id)?;
        self.applier.remove(id)?;

        if let Err(reload_err) = self.reloader.reload().await {
            self.rollback(id, previous);
            return Err(reload_err);
        }
        Ok(())
    }

    /// Rebuild the live directory to exactly `desired` and reload once.
    ///
    /// Correction path for documented transients (stale artifact after a
    /// crash mid-disable, enabled entity with no file). Runs at daemon
    /// startup and on SIGHUP.
    pub async fn reconcile_all(&self, desired: &[Artifact]) -> Result<()> {
        let _guard = self.apply_lock.lock().await;

        let wanted: std::collections::HashSet<String> =
            desired.iter().map(|a| a.id.file_name()).collect();

        for stale in self
            .applier
            .list()?
            .into_iter()
            .filter(|name| !wanted.contains(name))
        {
            let path = self.applier.live_dir().join(&stale);
            std::fs::remove_file(&path).map_err(|e| Error::io("reconcile", e))?;
            tracing::info!(file = %stale, "removed stale artifact");
        }

        for artifact in desired {
            self.applier.commit(artifact)?;
        }

        self.reloader.reload().await
    }

    /// Restore previous content (or absence) after a failed reload. The
    /// engine still holds its last accepted set, so once the directory is
    /// back to that content the next reload re-agrees.
    fn rollback(&self, id: &ArtifactId, previous: Option<String>) {
        let restored = match previous {
            Some(text) => self.applier.commit_text(id, &text),
            None => self.applier.remove(id),
        };
        match restored {
            Ok(()) => tracing::warn!(artifact = %id, "rolled back to last known-good content"),
            Err(e) => tracing::error!(artifact = %id, error = %e, "rollback failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineRejection;
    use crate::entity::{EntityId, EntityKind};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct ScriptedEngine {
        accept_check: AtomicBool,
        accept_reload: AtomicBool,
        reloads: AtomicUsize,
    }

    impl ScriptedEngine {
        fn accepting() -> Arc<Self> {
            Arc::new(Self {
                accept_check: AtomicBool::new(true),
                accept_reload: AtomicBool::new(true),
                reloads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ProxyEngine for ScriptedEngine {
        async fn check(&self, _dir: &Path) -> std::result::Result<(), EngineRejection> {
            if self.accept_check.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(EngineRejection {
                    detail: "duplicate listen 5000".into(),
                })
            }
        }

        async fn reload(&self) -> std::result::Result<(), EngineRejection> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            if self.accept_reload.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(EngineRejection {
                    detail: "bind: permission denied".into(),
                })
            }
        }
    }

    fn artifact(id: i64, text: &str) -> Artifact {
        Artifact {
            id: ArtifactId::new(EntityKind::Stream, EntityId(id)),
            text: text.to_string(),
        }
    }

    fn reload_settings() -> ReloadSettings {
        ReloadSettings {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[tokio::test]
    async fn apply_commits_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::accepting();
        let reconciler = Reconciler::new(dir.path(), engine.clone(), reload_settings());

        let a = artifact(1, "server { listen 5000; }\n");
        let meta = reconciler.apply(&a).await.unwrap();

        assert!(dir.path().join("stream_1.conf").exists());
        assert_eq!(engine.reloads.load(Ordering::SeqCst), 1);
        assert_eq!(meta.get("engine_online"), Some(&serde_json::Value::Bool(true)));
    }

    #[tokio::test]
    async fn validation_failure_leaves_directory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::accepting();
        let reconciler = Reconciler::new(dir.path(), engine.clone(), reload_settings());
        reconciler
            .apply(&artifact(1, "server { listen 5000; }\n"))
            .await
            .unwrap();

        engine.accept_check.store(false, Ordering::SeqCst);
        let err = reconciler
            .apply(&artifact(2, "server { listen 5000; }\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert!(dir.path().join("stream_1.conf").exists());
        assert!(!dir.path().join("stream_2.conf").exists());
        // only the first apply reloaded
        assert_eq!(engine.reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reload_failure_rolls_back_to_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::accepting();
        let reconciler = Reconciler::new(dir.path(), engine.clone(), reload_settings());
        reconciler.apply(&artifact(1, "old content\n")).await.unwrap();

        engine.accept_reload.store(false, Ordering::SeqCst);
        let err = reconciler.apply(&artifact(1, "new content\n")).await.unwrap_err();
        assert!(matches!(err, Error::Reload(_)));

        let live = std::fs::read_to_string(dir.path().join("stream_1.conf")).unwrap();
        assert_eq!(live, "old content\n");
    }

    #[tokio::test]
    async fn reload_failure_on_first_commit_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::accepting();
        engine.accept_reload.store(false, Ordering::SeqCst);
        let reconciler = Reconciler::new(dir.path(), engine, reload_settings());

        let err = reconciler.apply(&artifact(1, "content\n")).await.unwrap_err();
        assert!(matches!(err, Error::Reload(_)));
        assert!(!dir.path().join("stream_1.conf").exists());
    }

    #[tokio::test]
    async fn reconcile_all_rebuilds_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stream_99.conf"), "stale\n").unwrap();

        let engine = ScriptedEngine::accepting();
        let reconciler = Reconciler::new(dir.path(), engine.clone(), reload_settings());

        let desired = vec![artifact(1, "a\n"), artifact(2, "b\n")];
        reconciler.reconcile_all(&desired).await.unwrap();

        assert!(!dir.path().join("stream_99.conf").exists());
        assert!(dir.path().join("stream_1.conf").exists());
        assert!(dir.path().join("stream_2.conf").exists());
        assert_eq!(engine.reloads.load(Ordering::SeqCst), 1);
    }
}
