use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::app_config::AcquisitionConfig;

// @module: Acquisition step run before each pipeline pass

/// Something that fetches new assets and appends them to the manifest
#[async_trait]
pub trait AcquisitionService: Send + Sync {
    /// Run one acquisition pass
    async fn run(&self) -> Result<()>;
}

/// Acquisition by running an external command to completion
#[derive(Debug, Clone)]
pub struct CommandAcquisition {
    config: AcquisitionConfig,
}

impl CommandAcquisition {
    pub fn new(config: AcquisitionConfig) -> Self {
        Self { config }
    }

    /// Whether a command is configured at all
    pub fn is_configured(&self) -> bool {
        self.config.command.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

#[async_trait]
impl AcquisitionService for CommandAcquisition {
    async fn run(&self) -> Result<()> {
        let program = match self.config.command.as_deref().map(str::trim) {
            Some(program) if !program.is_empty() => program,
            _ => {
                info!("No acquisition command configured, using the manifest as is.");
                return Ok(());
            }
        };

        info!("Running acquisition: {} {}", program, self.config.args.join(" "));
        let started = Instant::now();
        let future = Command::new(program)
            .args(&self.config.args)
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            result = future => result.map_err(|e| anyhow!("Failed to start acquisition command '{}': {}", program, e))?,
            _ = tokio::time::sleep(Duration::from_secs(self.config.timeout_secs)) => {
                return Err(anyhow!(
                    "Acquisition command '{}' timed out after {}s",
                    program,
                    self.config.timeout_secs
                ));
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            debug!("[acquisition] {}", line);
        }

        if !output.status.success() {
            warn!("Acquisition stderr: {}", stderr.trim());
            return Err(anyhow!(
                "Acquisition command '{}' exited with {}",
                program,
                output.status
            ));
        }

        info!("Acquisition finished in {:.1}s", started.elapsed().as_secs_f64());
        Ok(())
    }
}

/// Acquisition that does nothing; the manifest is filled by other means
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAcquisition;

#[async_trait]
impl AcquisitionService for NoopAcquisition {
    async fn run(&self) -> Result<()> {
        Ok(())
    }
}
