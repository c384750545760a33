// ============================================================
// Layer 3 — Training Job
// ============================================================
// Describes the distributed DLRM training run and turns it into
// a single `torchx` invocation:
//
//   torchx run -s local_cwd -cfg log_dir=<dir> dist.ddp -j 1x<N> \
//     --script dlrm_main.py -- <trainer flags>
//
// The trainer flags are forwarded untouched; the launcher only
// checks that layer-size lists are well formed before handing
// them over.
//
// Log files for a run live in a tree keyed by worker count,
// batch size and sharding type (see RunPaths below).

use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::{command::CommandLine, gpu::GpuSelection};
use crate::error::LaunchError;

/// Sharding strategies the trainer is known to accept.
/// Anything else is still forwarded, with a warning.
pub const KNOWN_SHARDERS: &[&str] = &[
    "table",
    "column",
    "row",
    "table_row",
    "table_column",
    "data_parallel",
];

pub fn is_known_sharder(name: &str) -> bool {
    KNOWN_SHARDERS.contains(&name)
}

// ─── LayerSizes ───────────────────────────────────────────────────────────────
/// A comma-separated list of MLP layer widths, e.g. "512,256,128".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LayerSizes(Vec<u32>);

impl LayerSizes {
    #[cfg(test)]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for LayerSizes {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sizes = s
            .split(',')
            .map(|p| p.trim().parse::<u32>().ok().filter(|&v| v > 0))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| LaunchError::InvalidLayerSizes(s.to_string()))?;
        Ok(Self(sizes))
    }
}

impl TryFrom<String> for LayerSizes {
    type Error = LaunchError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LayerSizes> for String {
    fn from(l: LayerSizes) -> Self {
        l.to_string()
    }
}

impl fmt::Display for LayerSizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

// ─── RunPaths ─────────────────────────────────────────────────────────────────
/// Roots of the three directory trees a run writes into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLayout {
    pub log_root: PathBuf,
    pub torchx_root: PathBuf,
    pub tensorboard_root: PathBuf,
}

impl Default for LogLayout {
    fn default() -> Self {
        Self {
            log_root: PathBuf::from("torchrec_logs"),
            torchx_root: PathBuf::from("log/torchrec_kaggle"),
            tensorboard_root: PathBuf::from("tensorboard_log"),
        }
    }
}

/// Concrete paths for one (workers, batch, sharder) combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPaths {
    /// <log_root>/<workers>/b<batch>/<sharder>
    pub log_dir: PathBuf,

    /// Combined stdout/stderr of the job
    pub log_file: PathBuf,

    /// JSON snapshot of the launch
    pub record_file: PathBuf,

    /// Passed to torchx as `-cfg log_dir=...`
    pub torchx_log_dir: PathBuf,

    /// Passed to the trainer as --profile_dir
    pub profile_dir: PathBuf,
}

impl LogLayout {
    pub fn for_run(&self, workers: usize, batch_size: u32, sharder: &str) -> RunPaths {
        let tag = format!("w{workers}_b{batch_size}");
        let log_dir = self
            .log_root
            .join(workers.to_string())
            .join(format!("b{batch_size}"))
            .join(sharder);

        RunPaths {
            log_file: log_dir.join("train.log"),
            record_file: log_dir.join("launch.json"),
            log_dir,
            torchx_log_dir: self.torchx_root.join(&tag),
            profile_dir: self.tensorboard_root.join("torchrec_kaggle").join(&tag),
        }
    }
}

// ─── JobSpec ──────────────────────────────────────────────────────────────────
/// Everything needed to build the torchx command, minus the GPUs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub launcher: String,
    pub scheduler: String,
    pub component: String,
    pub script: String,

    pub data_path: String,
    pub batch_size: u32,
    pub shard_type: String,
    pub embedding_dim: u32,
    pub over_arch_layer_sizes: LayerSizes,
    pub dense_arch_layer_sizes: LayerSizes,
    pub learning_rate: f64,

    pub kaggle: bool,
    pub pin_memory: bool,
    pub shuffle_batches: bool,
    pub eval_acc: bool,

    /// Appended verbatim after the generated trainer flags
    pub extra_args: Vec<String>,
}

impl JobSpec {
    /// Build the launcher invocation for `devices`.
    ///
    /// One worker process is started per selected device, and the
    /// child sees only those devices through CUDA_VISIBLE_DEVICES.
    pub fn to_command(&self, devices: &GpuSelection, paths: &RunPaths) -> CommandLine {
        CommandLine::new(&self.launcher)
            .arg("run")
            .flag("-s", &self.scheduler)
            .flag("-cfg", format!("log_dir={}", paths.torchx_log_dir.display()))
            .arg(&self.component)
            .flag("-j", format!("1x{}", devices.len()))
            .flag("--script", &self.script)
            .arg("--")
            .flag("--in_memory_binary_criteo_path", &self.data_path)
            .switch("--kaggle", self.kaggle)
            .flag("--embedding_dim", self.embedding_dim.to_string())
            .switch("--pin_memory", self.pin_memory)
            .flag("--over_arch_layer_sizes", self.over_arch_layer_sizes.to_string())
            .flag("--dense_arch_layer_sizes", self.dense_arch_layer_sizes.to_string())
            .switch("--shuffle_batches", self.shuffle_batches)
            .flag("--learning_rate", format!("{:?}", self.learning_rate))
            .flag("--batch_size", self.batch_size.to_string())
            .flag("--profile_dir", paths.profile_dir.display().to_string())
            .flag("--sharder_type", &self.shard_type)
            .switch("--eval_acc", self.eval_acc)
            .args(self.extra_args.iter().cloned())
            .env("CUDA_VISIBLE_DEVICES", devices.visible_devices())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> JobSpec {
        JobSpec {
            launcher: "torchx".into(),
            scheduler: "local_cwd".into(),
            component: "dist.ddp".into(),
            script: "dlrm_main.py".into(),
            data_path: "/data/criteo_kaggle_data".into(),
            batch_size: 16384,
            shard_type: "table".into(),
            embedding_dim: 128,
            over_arch_layer_sizes: "1024,1024,512,256,1".parse().unwrap(),
            dense_arch_layer_sizes: "512,256,128".parse().unwrap(),
            learning_rate: 1.0,
            kaggle: true,
            pin_memory: true,
            shuffle_batches: true,
            eval_acc: true,
            extra_args: Vec::new(),
        }
    }

    #[test]
    fn test_full_command_line() {
        let devices = GpuSelection::parse("1,2").unwrap();
        let paths = LogLayout::default().for_run(2, 16384, "table");
        let cmd = spec().to_command(&devices, &paths);

        assert_eq!(cmd.program, "torchx");
        let expected: Vec<&str> = vec![
            "run", "-s", "local_cwd",
            "-cfg", "log_dir=log/torchrec_kaggle/w2_b16384",
            "dist.ddp", "-j", "1x2", "--script", "dlrm_main.py", "--",
            "--in_memory_binary_criteo_path", "/data/criteo_kaggle_data",
            "--kaggle",
            "--embedding_dim", "128",
            "--pin_memory",
            "--over_arch_layer_sizes", "1024,1024,512,256,1",
            "--dense_arch_layer_sizes", "512,256,128",
            "--shuffle_batches",
            "--learning_rate", "1.0",
            "--batch_size", "16384",
            "--profile_dir", "tensorboard_log/torchrec_kaggle/w2_b16384",
            "--sharder_type", "table",
            "--eval_acc",
        ];
        assert_eq!(cmd.args, expected);
        assert_eq!(cmd.env_value("CUDA_VISIBLE_DEVICES"), Some("1,2"));
    }

    #[test]
    fn test_switches_and_extra_args() {
        let mut s = spec();
        s.kaggle = false;
        s.eval_acc = false;
        s.extra_args = vec!["--epochs".into(), "3".into()];
        let devices = GpuSelection::parse("0").unwrap();
        let paths = LogLayout::default().for_run(1, 16384, "table");
        let cmd = s.to_command(&devices, &paths);

        assert!(!cmd.args.iter().any(|a| a == "--kaggle" || a == "--eval_acc"));
        assert_eq!(cmd.args[cmd.args.len() - 2..], ["--epochs", "3"]);
        assert_eq!(cmd.flag_value("-j"), Some("1x1"));
    }

    #[test]
    fn test_run_paths() {
        let p = LogLayout::default().for_run(4, 8192, "row");
        assert_eq!(p.log_dir, PathBuf::from("torchrec_logs/4/b8192/row"));
        assert_eq!(p.log_file, PathBuf::from("torchrec_logs/4/b8192/row/train.log"));
        assert_eq!(p.record_file, PathBuf::from("torchrec_logs/4/b8192/row/launch.json"));
        assert_eq!(p.torchx_log_dir, PathBuf::from("log/torchrec_kaggle/w4_b8192"));
        assert_eq!(
            p.profile_dir,
            PathBuf::from("tensorboard_log/torchrec_kaggle/w4_b8192")
        );
    }

    #[test]
    fn test_layer_sizes() {
        let l: LayerSizes = " 512, 256 ,128".parse().unwrap();
        assert_eq!(l.as_slice(), &[512, 256, 128]);
        assert_eq!(l.to_string(), "512,256,128");
        assert!("512,,128".parse::<LayerSizes>().is_err());
        assert!("512,0".parse::<LayerSizes>().is_err());
        assert!("wide".parse::<LayerSizes>().is_err());
    }

    #[test]
    fn test_known_sharders() {
        assert!(is_known_sharder("table"));
        assert!(is_known_sharder("data_parallel"));
        assert!(!is_known_sharder("diagonal"));
    }
}
