// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands and their flags.
//
// Most flags also read an environment variable, so the usual
// launch style still works:
//
//   GPUNUM=2 BATCHSIZE=8192 SHARDTYPE=row dlrm-launch train
//
// Every value is optional here; unset values fall through to the
// config file and then to the built-in defaults.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{container_use_case::ContainerConfig, train_use_case::JobConfig};
use crate::domain::job::LayerSizes;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pick the least-loaded GPUs and launch the distributed training run
    Train(TrainArgs),

    /// Start an interactive GPU container for the same workflow
    Container(ContainerArgs),

    /// Print CUDA_VISIBLE_DEVICES for the N least-loaded GPUs
    SelectGpus(SelectArgs),
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory holding the preprocessed Criteo Kaggle binaries
    #[arg(long, env = "DATAPATH")]
    pub data_path: Option<String>,

    /// Number of GPUs (one worker each); all GPUs when unset
    #[arg(long, env = "GPUNUM")]
    pub gpus: Option<usize>,

    /// Use exactly these devices, e.g. "0,3", instead of probing
    #[arg(long)]
    pub devices: Option<String>,

    /// Global batch size
    #[arg(long, env = "BATCHSIZE")]
    pub batch_size: Option<u32>,

    /// Embedding sharding strategy (table, row, column, ...)
    #[arg(long, env = "SHARDTYPE")]
    pub shard_type: Option<String>,

    #[arg(long)]
    pub embedding_dim: Option<u32>,

    /// Over-arch MLP sizes, e.g. "1024,1024,512,256,1"
    #[arg(long)]
    pub over_arch_layer_sizes: Option<LayerSizes>,

    /// Dense-arch MLP sizes, e.g. "512,256,128"
    #[arg(long)]
    pub dense_arch_layer_sizes: Option<LayerSizes>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Distributed job runner to invoke
    #[arg(long)]
    pub launcher: Option<String>,

    /// Trainer script handed to the job runner
    #[arg(long)]
    pub script: Option<String>,

    /// Root of the per-run log tree
    #[arg(long)]
    pub log_root: Option<PathBuf>,

    /// Tensorboard profile root; wiped before every run
    #[arg(long)]
    pub tensorboard_root: Option<PathBuf>,

    /// nvidia-smi binary used to probe memory usage
    #[arg(long)]
    pub nvidia_smi: Option<String>,

    /// Print the command instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// Extra trainer flags, given after `--`
    #[arg(last = true)]
    pub extra: Vec<String>,
}

/// The job layer contributed by the command line.
impl From<&TrainArgs> for JobConfig {
    fn from(a: &TrainArgs) -> Self {
        JobConfig {
            data_path: a.data_path.clone(),
            gpus: a.gpus,
            devices: a.devices.clone(),
            batch_size: a.batch_size,
            shard_type: a.shard_type.clone(),
            embedding_dim: a.embedding_dim,
            over_arch_layer_sizes: a.over_arch_layer_sizes.clone(),
            dense_arch_layer_sizes: a.dense_arch_layer_sizes.clone(),
            learning_rate: a.learning_rate,
            launcher: a.launcher.clone(),
            script: a.script.clone(),
            nvidia_smi: a.nvidia_smi.clone(),
            log_root: a.log_root.clone(),
            tensorboard_root: a.tensorboard_root.clone(),
            extra_args: (!a.extra.is_empty()).then(|| a.extra.clone()),
            ..JobConfig::default()
        }
    }
}

// ─── container ────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ContainerArgs {
    /// Container image to start
    #[arg(long)]
    pub image: Option<String>,

    /// Container runtime (docker, podman)
    #[arg(long)]
    pub runtime: Option<String>,

    /// Number of least-loaded GPUs to forward (default 2)
    #[arg(long)]
    pub gpus: Option<usize>,

    /// Forward exactly these devices, e.g. "0,1"
    #[arg(long)]
    pub devices: Option<String>,

    /// Host dataset directory bound into the container
    #[arg(long, env = "DATAPATH")]
    pub data_dir: Option<PathBuf>,

    /// Mount point of the current directory inside the container
    #[arg(long)]
    pub workdir_mount: Option<String>,

    /// Mount point of the dataset inside the container
    #[arg(long)]
    pub data_mount: Option<String>,

    /// Directory under the working directory put on PYTHONPATH
    #[arg(long)]
    pub code_path: Option<String>,

    #[arg(long)]
    pub shell: Option<String>,

    #[arg(long)]
    pub nvidia_smi: Option<String>,

    /// Print the command instead of running it
    #[arg(long)]
    pub dry_run: bool,
}

impl From<&ContainerArgs> for ContainerConfig {
    fn from(a: &ContainerArgs) -> Self {
        ContainerConfig {
            runtime: a.runtime.clone(),
            image: a.image.clone(),
            gpus: a.gpus,
            devices: a.devices.clone(),
            host_workdir: None,
            workdir_mount: a.workdir_mount.clone(),
            data_dir: a.data_dir.clone(),
            data_mount: a.data_mount.clone(),
            code_path: a.code_path.clone(),
            shell: a.shell.clone(),
            nvidia_smi: a.nvidia_smi.clone(),
        }
    }
}

// ─── select-gpus ──────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct SelectArgs {
    /// How many GPUs to pick; all GPUs when unset
    #[arg(long, env = "GPUNUM")]
    pub gpus: Option<usize>,

    #[arg(long)]
    pub nvidia_smi: Option<String>,

    /// Prefix the output with `export ` for use with eval
    #[arg(long)]
    pub export: bool,
}
