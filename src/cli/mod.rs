// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap, stacks it on top of the
// config file, and hands off to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`       — pick GPUs and launch the torchx job
//   2. `container`   — start an interactive GPU container
//   3. `select-gpus` — just print the GPU choice
//
// This layer owns stdout: the use cases never print.

pub mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, ContainerArgs, SelectArgs, TrainArgs};

use crate::application::{
    container_use_case::{ContainerConfig, ContainerUseCase},
    select_use_case::{DeviceRequest, SelectUseCase},
    train_use_case::{JobConfig, TrainUseCase},
};
use crate::domain::{gpu::ALL_DEVICES, traits::CommandRunner};
use crate::infra::{
    config::FileConfig,
    nvidia_smi::NvidiaSmi,
    process::{DryRun, ProcessRunner},
};

#[derive(Parser, Debug)]
#[command(
    name = "dlrm-launch",
    version,
    about = "Pick the least-loaded GPUs and launch a distributed DLRM training run."
)]
pub struct Cli {
    /// TOML config file (default: ./dlrm-launch.toml if present)
    #[arg(long, global = true, env = "DLRM_LAUNCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch the subcommand; returns the process exit code.
    pub fn run(self) -> Result<i32> {
        let cwd = std::env::current_dir().context("Cannot determine working directory")?;
        let file = FileConfig::discover(self.config.as_deref(), &cwd)?;

        match &self.command {
            Commands::Train(args) => run_train(args, file.job),
            Commands::Container(args) => run_container(args, file.container, &cwd),
            Commands::SelectGpus(args) => run_select(args, file.job),
        }
    }
}

fn runner(dry_run: bool) -> Box<dyn CommandRunner> {
    if dry_run {
        Box::new(DryRun)
    } else {
        Box::new(ProcessRunner::new())
    }
}

fn probe(program: Option<&str>) -> NvidiaSmi {
    program.map(NvidiaSmi::new).unwrap_or_default()
}

fn run_train(args: &TrainArgs, file: JobConfig) -> Result<i32> {
    let cfg = JobConfig::from(args).or(file);
    let probe = probe(cfg.nvidia_smi.as_deref());

    TrainUseCase::new(cfg, Box::new(probe), runner(args.dry_run)).execute()
}

fn run_container(args: &ContainerArgs, file: ContainerConfig, cwd: &Path) -> Result<i32> {
    let cfg = ContainerConfig::from(args).or(file);
    let probe = probe(cfg.nvidia_smi.as_deref());

    ContainerUseCase::new(cfg, cwd.to_path_buf(), Box::new(probe), runner(args.dry_run)).execute()
}

fn run_select(args: &SelectArgs, file: JobConfig) -> Result<i32> {
    let program = args.nvidia_smi.as_deref().or(file.nvidia_smi.as_deref());
    let probe = probe(program);
    let request = DeviceRequest::from_parts(None, args.gpus.or(file.gpus), ALL_DEVICES)?;

    let selected = SelectUseCase::new(&probe).select(&request)?;
    let prefix = if args.export { "export " } else { "" };
    println!("{prefix}CUDA_VISIBLE_DEVICES={}", selected.selection);
    Ok(0)
}
