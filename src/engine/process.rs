//! Command-backed proxy engine.
//!
//! # Responsibilities
//! - Run the engine's self-check command against a candidate directory
//! - Issue the graceful-reload command to the running process
//! - Surface the engine's stderr as rejection detail
//! - Bound both calls with a timeout
//!
//! # Design Decisions
//! - The check command receives the candidate directory as its final
//!   argument, so it can be pointed at a staged snapshot
//! - A timeout is treated as a rejection, not a hang

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::EngineSettings;
use crate::engine::{EngineRejection, ProxyEngine};

pub struct ProcessEngine {
    settings: EngineSettings,
    timeout_duration: Duration,
}

impl ProcessEngine {
    pub fn new(settings: EngineSettings) -> Self {
        let timeout_duration = Duration::from_secs(settings.command_timeout_secs);
        Self {
            settings,
            timeout_duration,
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<(), EngineRejection> {
        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);

        let output = match timeout(self.timeout_duration, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(EngineRejection {
                    detail: format!("failed to spawn {program}: {e}"),
                })
            }
            Err(_) => {
                return Err(EngineRejection {
                    detail: format!(
                        "{program} did not finish within {}s",
                        self.timeout_duration.as_secs()
                    ),
                })
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("engine command failed with no diagnostic")
                .to_string();
            Err(EngineRejection { detail })
        }
    }
}

#[async_trait]
impl ProxyEngine for ProcessEngine {
    async fn check(&self, config_dir: &Path) -> Result<(), EngineRejection> {
        let mut args = self.settings.check_args.clone();
        args.push(config_dir.display().to_string());
        tracing::debug!(dir = %config_dir.display(), "running engine self-check");
        self.run(&self.settings.check_command, &args).await
    }

    async fn reload(&self) -> Result<(), EngineRejection> {
        tracing::debug!("issuing engine reload");
        self.run(&self.settings.reload_command, &self.settings.reload_args)
            .await
    }
}

impl std::fmt::Debug for ProcessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEngine")
            .field("check_command", &self.settings.check_command)
            .field("reload_command", &self.settings.reload_command)
            .field("timeout_secs", &self.settings.command_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;

    fn settings(check: &str, check_args: &[&str]) -> EngineSettings {
        EngineSettings {
            check_command: check.to_string(),
            check_args: check_args.iter().map(|s| s.to_string()).collect(),
            reload_command: "true".to_string(),
            reload_args: Vec::new(),
            command_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn check_passes_through_exit_status() {
        let engine = ProcessEngine::new(settings("true", &[]));
        assert!(engine.check(Path::new("/tmp")).await.is_ok());

        let engine = ProcessEngine::new(settings("false", &[]));
        assert!(engine.check(Path::new("/tmp")).await.is_err());
    }

    #[tokio::test]
    async fn spawn_failure_is_a_rejection_with_detail() {
        let engine = ProcessEngine::new(settings("/nonexistent/engine-binary", &[]));
        let err = engine.check(Path::new("/tmp")).await.unwrap_err();
        assert!(err.detail.contains("failed to spawn"));
    }
}
