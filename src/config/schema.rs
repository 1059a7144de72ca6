//! Settings schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root settings for the director daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DirectorSettings {
    /// Live config directory the engine serves from.
    pub live_dir: LiveDirSettings,

    /// How to talk to the engine process.
    pub engine: EngineSettings,

    /// Reload retry policy.
    pub reload: ReloadSettings,

    /// Observability settings.
    pub observability: ObservabilitySettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LiveDirSettings {
    /// Directory holding one rendered artifact per enabled entity.
    pub path: PathBuf,
}

impl Default for LiveDirSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/etc/proxy/conf.d"),
        }
    }
}

/// Commands used to drive the engine process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Self-check command; the candidate directory is appended as the
    /// final argument.
    pub check_command: String,
    pub check_args: Vec<String>,

    /// Graceful-reload command for the running process.
    pub reload_command: String,
    pub reload_args: Vec<String>,

    /// Timeout for either command, in seconds.
    pub command_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            check_command: "/usr/sbin/nginx".to_string(),
            check_args: vec!["-t".to_string(), "-p".to_string()],
            reload_command: "/usr/sbin/nginx".to_string(),
            reload_args: vec!["-s".to_string(), "reload".to_string()],
            command_timeout_secs: 30,
        }
    }
}

/// Reload retry policy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadSettings {
    /// Maximum reload attempts before giving up.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
