// ============================================================
// Layer 6 — Run Directories
// ============================================================
// Prepares the filesystem before a training run:
//
//   1. mkdir -p <log_root>/<workers>/b<batch>/<sharder>
//   2. rm -rf <tensorboard_root>
//   3. mkdir -p <tensorboard_root>/torchrec_kaggle/w<workers>_b<batch>
//
// The tensorboard tree is wiped every time so the profiler traces
// from a previous run never get mixed into the new one. Log files
// are kept and appended to.

use std::{fs, io, path::Path};

use crate::domain::job::RunPaths;
use crate::error::LaunchError;

pub fn prepare(paths: &RunPaths, tensorboard_root: &Path) -> Result<(), LaunchError> {
    fs::create_dir_all(&paths.log_dir).map_err(|e| LaunchError::io(&paths.log_dir, e))?;

    match fs::remove_dir_all(tensorboard_root) {
        Ok(()) => tracing::debug!("Removed '{}'", tensorboard_root.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(LaunchError::io(tensorboard_root, e)),
    }

    fs::create_dir_all(&paths.profile_dir).map_err(|e| LaunchError::io(&paths.profile_dir, e))?;

    tracing::debug!(
        "Prepared log dir '{}' and profile dir '{}'",
        paths.log_dir.display(),
        paths.profile_dir.display()
    );
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::LogLayout;

    fn layout(root: &Path) -> LogLayout {
        LogLayout {
            log_root: root.join("torchrec_logs"),
            torchx_root: root.join("log/torchrec_kaggle"),
            tensorboard_root: root.join("tensorboard_log"),
        }
    }

    #[test]
    fn test_creates_log_and_profile_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        let paths = layout.for_run(2, 1024, "table");

        prepare(&paths, &layout.tensorboard_root).unwrap();

        assert!(paths.log_dir.is_dir());
        assert!(paths.profile_dir.is_dir());
    }

    #[test]
    fn test_wipes_old_tensorboard_but_keeps_logs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        let paths = layout.for_run(2, 1024, "table");

        let stale = layout.tensorboard_root.join("torchrec_kaggle/w8_b64/trace.json");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "{}").unwrap();
        fs::create_dir_all(&paths.log_dir).unwrap();
        fs::write(&paths.log_file, "previous run\n").unwrap();

        prepare(&paths, &layout.tensorboard_root).unwrap();

        assert!(!stale.exists());
        assert!(paths.profile_dir.is_dir());
        assert_eq!(fs::read_to_string(&paths.log_file).unwrap(), "previous run\n");
    }
}
