// ============================================================
// Launcher Error Types
// ============================================================
// Typed failures raised by the domain and infrastructure layers.
// The application and CLI layers wrap these in anyhow with
// extra context before printing them.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    ProbeFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("cannot parse GPU memory row {line}: '{text}'")]
    ProbeParse { line: usize, text: String },

    #[error("device {0} listed more than once")]
    DuplicateDevice(u32),

    #[error("invalid device list '{0}': expected comma-separated indices")]
    InvalidDeviceList(String),

    #[error("invalid layer sizes '{0}': expected comma-separated positive integers")]
    InvalidLayerSizes(String),

    #[error("no GPUs selected")]
    NoDevices,

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl LaunchError {
    /// Attach a path to a raw I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
