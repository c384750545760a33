// ============================================================
// Layer 2 — ContainerUseCase
// ============================================================
// Starts an interactive shell in a GPU container for working on
// the same training setup by hand. Two GPUs are forwarded by
// default, the least-loaded pair unless --devices says otherwise.
//
// The container runs attached to our terminal; nothing is teed.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::application::select_use_case::{DeviceRequest, SelectUseCase};
use crate::application::train_use_case::DEFAULT_DATA_PATH;
use crate::domain::{
    container::ContainerSpec,
    traits::{CommandRunner, GpuProbe, OutputMode},
};
use crate::error::LaunchError;

pub const DEFAULT_RUNTIME: &str = "docker";
pub const DEFAULT_CONTAINER_GPUS: usize = 2;
pub const DEFAULT_WORKDIR_MOUNT: &str = "/workspace";
pub const DEFAULT_DATA_MOUNT: &str = "/data";
pub const DEFAULT_SHELL: &str = "bash";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerConfig {
    pub runtime: Option<String>,
    pub image: Option<String>,
    pub gpus: Option<usize>,
    pub devices: Option<String>,
    pub host_workdir: Option<PathBuf>,
    pub workdir_mount: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub data_mount: Option<String>,
    pub code_path: Option<String>,
    pub shell: Option<String>,
    pub nvidia_smi: Option<String>,
}

impl ContainerConfig {
    /// Fill every unset field of `self` from `lower`.
    pub fn or(self, lower: ContainerConfig) -> ContainerConfig {
        ContainerConfig {
            runtime: self.runtime.or(lower.runtime),
            image: self.image.or(lower.image),
            gpus: self.gpus.or(lower.gpus),
            devices: self.devices.or(lower.devices),
            host_workdir: self.host_workdir.or(lower.host_workdir),
            workdir_mount: self.workdir_mount.or(lower.workdir_mount),
            data_dir: self.data_dir.or(lower.data_dir),
            data_mount: self.data_mount.or(lower.data_mount),
            code_path: self.code_path.or(lower.code_path),
            shell: self.shell.or(lower.shell),
            nvidia_smi: self.nvidia_smi.or(lower.nvidia_smi),
        }
    }

    /// The container description with defaults applied.
    /// `cwd` is mounted when no host directory is configured.
    pub fn spec(&self, cwd: &Path) -> Result<ContainerSpec> {
        let Some(image) = self.image.clone() else {
            bail!("no container image configured; pass --image or set [container].image");
        };

        Ok(ContainerSpec {
            runtime: self.runtime.clone().unwrap_or_else(|| DEFAULT_RUNTIME.into()),
            image,
            host_workdir: self.host_workdir.clone().unwrap_or_else(|| cwd.to_path_buf()),
            workdir_mount: self
                .workdir_mount
                .clone()
                .unwrap_or_else(|| DEFAULT_WORKDIR_MOUNT.into()),
            data_dir: self
                .data_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH)),
            data_mount: self.data_mount.clone().unwrap_or_else(|| DEFAULT_DATA_MOUNT.into()),
            code_path: self.code_path.clone().unwrap_or_default(),
            shell: self.shell.clone().unwrap_or_else(|| DEFAULT_SHELL.into()),
        })
    }

    pub fn device_request(&self) -> Result<DeviceRequest> {
        DeviceRequest::from_parts(self.devices.as_deref(), self.gpus, DEFAULT_CONTAINER_GPUS)
    }
}

pub struct ContainerUseCase {
    config: ContainerConfig,
    cwd: PathBuf,
    probe: Box<dyn GpuProbe>,
    runner: Box<dyn CommandRunner>,
}

impl ContainerUseCase {
    pub fn new(
        config: ContainerConfig,
        cwd: PathBuf,
        probe: Box<dyn GpuProbe>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self { config, cwd, probe, runner }
    }

    /// Start the container and wait for the shell to exit.
    pub fn execute(&self) -> Result<i32> {
        let spec = self.config.spec(&self.cwd)?;
        let selected =
            SelectUseCase::new(self.probe.as_ref()).select(&self.config.device_request()?)?;
        if selected.selection.is_empty() {
            return Err(LaunchError::NoDevices.into());
        }

        let command = spec.to_command(&selected.selection);
        tracing::info!(
            "Starting {} container '{}' on GPUs {}",
            spec.runtime,
            spec.image,
            selected.selection
        );
        self.runner.run(&command, &OutputMode::Inherit)
    }
}
