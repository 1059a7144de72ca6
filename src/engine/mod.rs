//! The external proxy engine.
//!
//! The engine is a long-running process driven entirely by files in its
//! config directory plus an explicit reload signal. It validates its whole
//! config set at once, so a single candidate can be rejected because of a
//! conflict introduced by an unrelated entity.

pub mod process;

use async_trait::async_trait;
use std::path::Path;

/// Why the engine refused a configuration.
#[derive(Debug, Clone)]
pub struct EngineRejection {
    /// The engine's own diagnostic, e.g. a duplicate-listen complaint.
    pub detail: String,
}

impl std::fmt::Display for EngineRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.detail)
    }
}

#[async_trait]
pub trait ProxyEngine: Send + Sync {
    /// Run the engine's configuration self-check against `config_dir`
    /// without affecting what the engine currently serves.
    async fn check(&self, config_dir: &Path) -> Result<(), EngineRejection>;

    /// Ask the running process to gracefully pick up the live directory.
    async fn reload(&self) -> Result<(), EngineRejection>;
}
