//! Error taxonomy shared by every lifecycle and pipeline operation.

use thiserror::Error;

use crate::entity::EntityId;

/// Errors that can abort a lifecycle operation or a pipeline stage.
///
/// Every variant carries enough detail to identify the failing stage;
/// callers never need to re-run the pipeline to find out what went wrong.
#[derive(Debug, Error)]
pub enum Error {
    /// Requested entity has no visible, non-deleted row.
    #[error("item not found: {0}")]
    NotFound(EntityId),

    /// Caller is not allowed to perform the requested action.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Business-rule violation: already enabled/disabled, malformed caller
    /// input, or the engine rejected the combined configuration.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Invariant violation not attributable to caller input. A defect
    /// signal, never a user-facing validation failure.
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),

    /// Renderer could not produce config text from otherwise-valid entity
    /// data.
    #[error("config synthesis failed: {0}")]
    ConfigSynthesis(String),

    /// Engine refused to accept a validated configuration at apply time.
    #[error("engine reload failed: {0}")]
    Reload(String),

    /// Entity store reported a failure.
    #[error("store error: {0}")]
    Store(String),

    /// Filesystem failure, tagged with the pipeline stage it occurred in.
    #[error("io error during {stage}: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an io error with the pipeline stage it happened in.
    pub fn io(stage: &'static str, source: std::io::Error) -> Self {
        Self::Io { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
