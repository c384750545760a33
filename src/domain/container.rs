// ============================================================
// Layer 3 — Container Session
// ============================================================
// An interactive shell inside a GPU container, with the
// working directory and the dataset bound in:
//
//   docker run -it --rm --gpus '"device=0,1"' --ipc=host \
//     --cap-add=SYS_NICE -v $PWD:/workspace -v /data:/data \
//     -w /workspace -e PYTHONPATH=/workspace/... <image> bash
//
// The host IPC namespace is needed for the trainer's shared
// memory data loaders; SYS_NICE lets NCCL pin thread priority.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{command::CommandLine, gpu::GpuSelection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// docker, podman, ...
    pub runtime: String,
    pub image: String,

    /// Host directory mounted as the working directory
    pub host_workdir: PathBuf,
    pub workdir_mount: String,

    /// Host dataset directory
    pub data_dir: PathBuf,
    pub data_mount: String,

    /// Path under the working directory added to PYTHONPATH
    pub code_path: String,

    pub shell: String,
}

impl ContainerSpec {
    /// PYTHONPATH as seen from inside the container.
    pub fn python_path(&self) -> String {
        let code = self.code_path.trim_matches('/');
        if code.is_empty() {
            self.workdir_mount.clone()
        } else {
            format!("{}/{}", self.workdir_mount.trim_end_matches('/'), code)
        }
    }

    pub fn to_command(&self, devices: &GpuSelection) -> CommandLine {
        CommandLine::new(&self.runtime)
            .args(["run", "-it", "--rm"])
            .flag("--gpus", format!("\"device={}\"", devices.visible_devices()))
            .arg("--ipc=host")
            .arg("--cap-add=SYS_NICE")
            .flag(
                "-v",
                format!("{}:{}", self.host_workdir.display(), self.workdir_mount),
            )
            .flag("-v", format!("{}:{}", self.data_dir.display(), self.data_mount))
            .flag("-w", &self.workdir_mount)
            .flag("-e", format!("PYTHONPATH={}", self.python_path()))
            .arg(&self.image)
            .arg(&self.shell)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            runtime: "docker".into(),
            image: "hpcaitech/torchrec:latest".into(),
            host_workdir: PathBuf::from("/home/me/recsys"),
            workdir_mount: "/workspace".into(),
            data_dir: PathBuf::from("/data/criteo_kaggle_data"),
            data_mount: "/data".into(),
            code_path: "recsys".into(),
            shell: "bash".into(),
        }
    }

    #[test]
    fn test_container_command() {
        let devices = GpuSelection::parse("0,1").unwrap();
        let cmd = spec().to_command(&devices);
        assert_eq!(cmd.program, "docker");
        assert_eq!(
            cmd.args,
            vec![
                "run", "-it", "--rm",
                "--gpus", "\"device=0,1\"",
                "--ipc=host", "--cap-add=SYS_NICE",
                "-v", "/home/me/recsys:/workspace",
                "-v", "/data/criteo_kaggle_data:/data",
                "-w", "/workspace",
                "-e", "PYTHONPATH=/workspace/recsys",
                "hpcaitech/torchrec:latest",
                "bash",
            ]
        );
        assert!(cmd.env.is_empty());
    }

    #[test]
    fn test_python_path_without_code_dir() {
        let mut s = spec();
        s.code_path = "/".into();
        assert_eq!(s.python_path(), "/workspace");
        s.code_path = "/src/".into();
        s.workdir_mount = "/ws/".into();
        assert_eq!(s.python_path(), "/ws/src");
    }
}
