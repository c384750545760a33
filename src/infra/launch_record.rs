// ============================================================
// Layer 6 — Launch Record
// ============================================================
// Writes launch.json next to the training log, so a log file can
// always be traced back to the exact command, the GPUs it ran on
// and the memory usage that led to picking them.
//
// Example:
//   {
//     "started_at_unix": 1760832000,
//     "visible_devices": "1,2",
//     "gpu_usage": [{ "index": 0, "memory_used_mib": 500 }, ...],
//     "shell": "CUDA_VISIBLE_DEVICES=1,2 torchx run ...",
//     ...
//   }

use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{command::CommandLine, gpu::GpuUsage, job::JobSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchRecord {
    pub started_at_unix: u64,
    pub visible_devices: String,

    /// Empty when devices were given explicitly
    pub gpu_usage: Vec<GpuUsage>,

    pub job: JobSpec,
    pub command: CommandLine,

    /// `command` rendered as a shell line
    pub shell: String,
    pub log_file: PathBuf,
}

impl LaunchRecord {
    pub fn new(
        job: &JobSpec,
        command: &CommandLine,
        gpu_usage: Vec<GpuUsage>,
        log_file: &Path,
    ) -> Self {
        let started_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            started_at_unix,
            visible_devices: command
                .env_value("CUDA_VISIBLE_DEVICES")
                .unwrap_or_default()
                .to_string(),
            gpu_usage,
            job: job.clone(),
            command: command.clone(),
            shell: command.to_string(),
            log_file: log_file.to_path_buf(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write launch record to '{}'", path.display()))?;
        tracing::debug!("Saved launch record to '{}'", path.display());
        Ok(())
    }

    #[cfg(test)]
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read launch record '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}
