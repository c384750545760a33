// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Launches the distributed DLRM training run, in order:
//
//   Step 1: Resolve the job settings           (config layering)
//   Step 2: Pick the GPUs                      (SelectUseCase)
//   Step 3: Work out the log/profile paths     (domain LogLayout)
//   Step 4: Build the torchx command line      (domain JobSpec)
//   Step 5: Prepare directories, write record  (Layer 6 - infra)
//   Step 6: Run it, teeing output to the log   (Layer 6 - infra)
//
// The exit code of the torchx process is handed back unchanged.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::select_use_case::{DeviceRequest, SelectUseCase};
use crate::domain::{
    gpu::ALL_DEVICES,
    job::{is_known_sharder, JobSpec, LayerSizes, LogLayout, KNOWN_SHARDERS},
    traits::{CommandRunner, GpuProbe, OutputMode},
};
use crate::error::LaunchError;
use crate::infra::{launch_record::LaunchRecord, run_dirs};

// ─── Defaults ─────────────────────────────────────────────────────────────────
pub const DEFAULT_DATA_PATH: &str = "/data/criteo_kaggle_data";
pub const DEFAULT_BATCH_SIZE: u32 = 16384;
pub const DEFAULT_SHARD_TYPE: &str = "table";
pub const DEFAULT_EMBEDDING_DIM: u32 = 128;
pub const DEFAULT_OVER_ARCH: &str = "1024,1024,512,256,1";
pub const DEFAULT_DENSE_ARCH: &str = "512,256,128";
pub const DEFAULT_LEARNING_RATE: f64 = 1.0;
pub const DEFAULT_LAUNCHER: &str = "torchx";
pub const DEFAULT_SCHEDULER: &str = "local_cwd";
pub const DEFAULT_COMPONENT: &str = "dist.ddp";
pub const DEFAULT_SCRIPT: &str = "dlrm_main.py";

// ─── Job Configuration ───────────────────────────────────────────────────────
// Every field is optional so that the command line, the config
// file and the built-in defaults can be stacked: the first layer
// that sets a field wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub data_path: Option<String>,
    pub gpus: Option<usize>,
    pub devices: Option<String>,
    pub batch_size: Option<u32>,
    pub shard_type: Option<String>,
    pub embedding_dim: Option<u32>,
    pub over_arch_layer_sizes: Option<LayerSizes>,
    pub dense_arch_layer_sizes: Option<LayerSizes>,
    pub learning_rate: Option<f64>,

    pub launcher: Option<String>,
    pub scheduler: Option<String>,
    pub component: Option<String>,
    pub script: Option<String>,
    pub nvidia_smi: Option<String>,

    pub log_root: Option<PathBuf>,
    pub torchx_root: Option<PathBuf>,
    pub tensorboard_root: Option<PathBuf>,

    pub kaggle: Option<bool>,
    pub pin_memory: Option<bool>,
    pub shuffle_batches: Option<bool>,
    pub eval_acc: Option<bool>,

    pub extra_args: Option<Vec<String>>,
}

impl JobConfig {
    /// Fill every unset field of `self` from `lower`.
    pub fn or(self, lower: JobConfig) -> JobConfig {
        JobConfig {
            data_path: self.data_path.or(lower.data_path),
            gpus: self.gpus.or(lower.gpus),
            devices: self.devices.or(lower.devices),
            batch_size: self.batch_size.or(lower.batch_size),
            shard_type: self.shard_type.or(lower.shard_type),
            embedding_dim: self.embedding_dim.or(lower.embedding_dim),
            over_arch_layer_sizes: self.over_arch_layer_sizes.or(lower.over_arch_layer_sizes),
            dense_arch_layer_sizes: self.dense_arch_layer_sizes.or(lower.dense_arch_layer_sizes),
            learning_rate: self.learning_rate.or(lower.learning_rate),
            launcher: self.launcher.or(lower.launcher),
            scheduler: self.scheduler.or(lower.scheduler),
            component: self.component.or(lower.component),
            script: self.script.or(lower.script),
            nvidia_smi: self.nvidia_smi.or(lower.nvidia_smi),
            log_root: self.log_root.or(lower.log_root),
            torchx_root: self.torchx_root.or(lower.torchx_root),
            tensorboard_root: self.tensorboard_root.or(lower.tensorboard_root),
            kaggle: self.kaggle.or(lower.kaggle),
            pin_memory: self.pin_memory.or(lower.pin_memory),
            shuffle_batches: self.shuffle_batches.or(lower.shuffle_batches),
            eval_acc: self.eval_acc.or(lower.eval_acc),
            extra_args: self.extra_args.or(lower.extra_args),
        }
    }

    /// The job description with built-in defaults applied.
    pub fn spec(&self) -> Result<JobSpec, LaunchError> {
        let layers = |set: &Option<LayerSizes>, default: &str| match set {
            Some(l) => Ok(l.clone()),
            None => default.parse::<LayerSizes>(),
        };

        Ok(JobSpec {
            launcher: self.launcher.clone().unwrap_or_else(|| DEFAULT_LAUNCHER.into()),
            scheduler: self.scheduler.clone().unwrap_or_else(|| DEFAULT_SCHEDULER.into()),
            component: self.component.clone().unwrap_or_else(|| DEFAULT_COMPONENT.into()),
            script: self.script.clone().unwrap_or_else(|| DEFAULT_SCRIPT.into()),
            data_path: self.data_path.clone().unwrap_or_else(|| DEFAULT_DATA_PATH.into()),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            shard_type: self.shard_type.clone().unwrap_or_else(|| DEFAULT_SHARD_TYPE.into()),
            embedding_dim: self.embedding_dim.unwrap_or(DEFAULT_EMBEDDING_DIM),
            over_arch_layer_sizes: layers(&self.over_arch_layer_sizes, DEFAULT_OVER_ARCH)?,
            dense_arch_layer_sizes: layers(&self.dense_arch_layer_sizes, DEFAULT_DENSE_ARCH)?,
            learning_rate: self.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
            kaggle: self.kaggle.unwrap_or(true),
            pin_memory: self.pin_memory.unwrap_or(true),
            shuffle_batches: self.shuffle_batches.unwrap_or(true),
            eval_acc: self.eval_acc.unwrap_or(true),
            extra_args: self.extra_args.clone().unwrap_or_default(),
        })
    }

    pub fn layout(&self) -> LogLayout {
        let d = LogLayout::default();
        LogLayout {
            log_root: self.log_root.clone().unwrap_or(d.log_root),
            torchx_root: self.torchx_root.clone().unwrap_or(d.torchx_root),
            tensorboard_root: self.tensorboard_root.clone().unwrap_or(d.tensorboard_root),
        }
    }

    /// Without a count or list, every device on the host is used.
    pub fn device_request(&self) -> Result<DeviceRequest> {
        DeviceRequest::from_parts(self.devices.as_deref(), self.gpus, ALL_DEVICES)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: JobConfig,
    probe: Box<dyn GpuProbe>,
    runner: Box<dyn CommandRunner>,
}

impl TrainUseCase {
    pub fn new(
        config: JobConfig,
        probe: Box<dyn GpuProbe>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self { config, probe, runner }
    }

    /// Run the training job; returns the launcher's exit code.
    pub fn execute(&self) -> Result<i32> {
        let cfg = &self.config;

        // ── Step 1: Resolve the job ───────────────────────────────────────────
        let spec = cfg.spec()?;
        if !is_known_sharder(&spec.shard_type) {
            tracing::warn!(
                "Sharder '{}' is not one of {:?}; forwarding it anyway",
                spec.shard_type,
                KNOWN_SHARDERS
            );
        }

        // ── Step 2: Pick GPUs ─────────────────────────────────────────────────
        let selected = SelectUseCase::new(self.probe.as_ref()).select(&cfg.device_request()?)?;
        if selected.selection.is_empty() {
            return Err(LaunchError::NoDevices.into());
        }
        let workers = selected.selection.len();

        // ── Step 3/4: Paths and command line ──────────────────────────────────
        let layout = cfg.layout();
        let paths = layout.for_run(workers, spec.batch_size, &spec.shard_type);
        let command = spec.to_command(&selected.selection, &paths);

        // ── Step 5: Filesystem side effects ───────────────────────────────────
        if !self.runner.is_dry_run() {
            run_dirs::prepare(&paths, &layout.tensorboard_root)
                .context("Cannot prepare log directories")?;
            LaunchRecord::new(&spec, &command, selected.usage, &paths.log_file)
                .save(&paths.record_file)?;
        }

        // ── Step 6: Run ───────────────────────────────────────────────────────
        tracing::info!(
            "Launching {} worker(s), batch size {}, sharder '{}', log '{}'",
            workers,
            spec.batch_size,
            spec.shard_type,
            paths.log_file.display()
        );
        let code = self
            .runner
            .run(&command, &OutputMode::Tee(paths.log_file.clone()))?;

        if code != 0 {
            tracing::warn!("Training exited with code {}", code);
        }
        Ok(code)
    }
}
