// ============================================================
// Layer 6 — Configuration File
// ============================================================
// Optional TOML file holding launch defaults, so a cluster can
// pin its dataset path, image or log roots without exporting
// environment variables in every shell.
//
// Lookup order:
//   1. --config FILE  (or DLRM_LAUNCH_CONFIG)   must exist
//   2. ./dlrm-launch.toml                       used if present
//   3. nothing                                  built-in defaults
//
// Example file:
//
//   [job]
//   data_path = "/data/criteo_kaggle_data"
//   batch_size = 8192
//   shard_type = "row"
//   over_arch_layer_sizes = "1024,1024,512,256,1"
//
//   [container]
//   image = "my-registry/torchrec:latest"
//   gpus = 2
//
// Values given on the command line or through the environment
// always win over the file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::application::{container_use_case::ContainerConfig, train_use_case::JobConfig};
use crate::error::LaunchError;

/// Name of the config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dlrm-launch.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub job: JobConfig,
    pub container: ContainerConfig,
}

impl FileConfig {
    /// Read and parse one config file.
    pub fn load(path: &Path) -> Result<Self, LaunchError> {
        let text = fs::read_to_string(path).map_err(|e| LaunchError::io(path, e))?;
        let cfg = toml::from_str(&text).map_err(|source| LaunchError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from '{}'", path.display());
        Ok(cfg)
    }

    /// Resolve the config file to use, falling back to defaults.
    ///
    /// `explicit` must exist when given; the working-directory file
    /// is only used if it happens to be there.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self, LaunchError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local: PathBuf = cwd.join(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::load(&local);
        }
        Ok(Self::default())
    }
}
