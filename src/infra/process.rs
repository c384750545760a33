// ============================================================
// Layer 6 — Process Runner
// ============================================================
// Spawns the child described by a CommandLine and waits for it.
//
// With OutputMode::Tee the child's stdout and stderr are both
// piped back to us. Two scoped threads copy whatever bytes arrive
// to our stdout and append them to the log file, the same as
// `cmd 2>&1 | tee -a train.log`. A mutex around the file keeps
// chunks from the two streams from tearing into each other.
//
// With OutputMode::Inherit the child gets our terminal as-is,
// which is what an interactive `docker run -it` needs.
//
// The exit code we return is the child's own, so a failed
// training run makes the launcher fail too.

use std::{
    fs::{self, OpenOptions},
    io::{self, Read, Write},
    path::Path,
    process::{Command, ExitStatus, Stdio},
    sync::Mutex,
    thread,
};

use anyhow::{anyhow, Context, Result};

use crate::domain::{
    command::CommandLine,
    traits::{CommandRunner, OutputMode},
};
use crate::error::LaunchError;

/// Runs commands for real.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(cmd: &CommandLine) -> Command {
        let mut c = Command::new(&cmd.program);
        c.args(&cmd.args);
        for (k, v) in &cmd.env {
            c.env(k, v);
        }
        c
    }

    fn spawn_error(cmd: &CommandLine, source: io::Error) -> LaunchError {
        LaunchError::Spawn {
            program: cmd.program.clone(),
            source,
        }
    }

    fn run_inherit(&self, cmd: &CommandLine) -> Result<i32> {
        let status = Self::command(cmd)
            .status()
            .map_err(|e| Self::spawn_error(cmd, e))?;
        Ok(exit_code(status))
    }

    fn run_tee(&self, cmd: &CommandLine, log_path: &Path) -> Result<i32> {
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| LaunchError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(|e| LaunchError::io(log_path, e))?;
        let log = Mutex::new(file);

        let mut child = Self::command(cmd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(cmd, e))?;

        let stdout = child.stdout.take().context("child stdout was not piped")?;
        let stderr = child.stderr.take().context("child stderr was not piped")?;

        let copied: io::Result<()> = thread::scope(|s| {
            let out = s.spawn(|| pump(stdout, &log));
            let err = s.spawn(|| pump(stderr, &log));
            let a = join_pump(out);
            let b = join_pump(err);
            a.and(b)
        });

        // Always reap the child, even if copying failed
        let status = child.wait().map_err(|e| Self::spawn_error(cmd, e))?;
        copied.map_err(|e| LaunchError::io(log_path, e))?;

        tracing::debug!("'{}' finished with {}", cmd.program, status);
        Ok(exit_code(status))
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, cmd: &CommandLine, output: &OutputMode) -> Result<i32> {
        tracing::info!("Running: {}", cmd);
        match output {
            OutputMode::Inherit => self.run_inherit(cmd),
            OutputMode::Tee(path) => self.run_tee(cmd, path),
        }
    }
}

/// Copy one child stream to our stdout and the shared log as bytes arrive.
///
/// Partial lines (progress bars redrawn with '\r', prompts) are
/// passed through at once instead of waiting for a newline.
fn pump<R: Read>(mut stream: R, log: &Mutex<std::fs::File>) -> io::Result<()> {
    let mut buf = [0u8; 8192];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let chunk = &buf[..n];

        // Held across both writes so the two streams never tear a chunk
        let mut f = log
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        f.write_all(chunk)?;
        let mut out = io::stdout().lock();
        out.write_all(chunk)?;
        out.flush()?;
    }
}

/// A panicking pump thread is reported as an I/O error.
fn join_pump(handle: thread::ScopedJoinHandle<'_, io::Result<()>>) -> io::Result<()> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("output copy thread panicked")))
}

/// Map a child's exit status onto a launcher exit code.
/// Death by signal becomes 128 + signal, like a shell reports it.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    1
}

// ─── DryRun ───────────────────────────────────────────────────────────────────
/// Prints what would be run and returns success without spawning.
#[derive(Debug, Default)]
pub struct DryRun;

impl CommandRunner for DryRun {
    fn run(&self, cmd: &CommandLine, output: &OutputMode) -> Result<i32> {
        let mut out = io::stdout().lock();
        writeln!(out, "{cmd}").map_err(|e| anyhow!("cannot write to stdout: {e}"))?;
        if let OutputMode::Tee(path) = output {
            writeln!(out, "# output would be appended to {}", path.display())
                .map_err(|e| anyhow!("cannot write to stdout: {e}"))?;
        }
        Ok(0)
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandLine {
        CommandLine::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_tee_captures_both_streams_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("nested/train.log");

        let code = ProcessRunner::new()
            .run(
                &sh("echo to-stdout; echo to-stderr 1>&2; exit 3"),
                &OutputMode::Tee(log.clone()),
            )
            .unwrap();

        assert_eq!(code, 3);
        let text = fs::read_to_string(&log).unwrap();
        assert!(text.contains("to-stdout\n"));
        assert!(text.contains("to-stderr\n"));
    }

    #[test]
    fn test_tee_appends_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("train.log");
        let runner = ProcessRunner::new();

        runner.run(&sh("echo first"), &OutputMode::Tee(log.clone())).unwrap();
        runner.run(&sh("echo second"), &OutputMode::Tee(log.clone())).unwrap();

        assert_eq!(fs::read_to_string(&log).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_child_sees_extra_env() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("env.log");
        let cmd = sh("echo \"devices=$CUDA_VISIBLE_DEVICES\"").env("CUDA_VISIBLE_DEVICES", "1,2");

        let code = ProcessRunner::new().run(&cmd, &OutputMode::Tee(log.clone())).unwrap();

        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(&log).unwrap(), "devices=1,2\n");
        // The launcher's own environment is left alone
        assert_ne!(std::env::var("CUDA_VISIBLE_DEVICES").ok().as_deref(), Some("1,2"));
    }

    #[test]
    fn test_partial_line_reaches_log_while_child_runs() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("train.log");
        let seen = dir.path().join("seen");
        let script = format!(
            "printf '%s' 'epoch 1: 50%'; sleep 1; cat '{}' > '{}'; printf '\\n'",
            log.display(),
            seen.display()
        );

        let code = ProcessRunner::new()
            .run(&sh(&script), &OutputMode::Tee(log.clone()))
            .unwrap();

        assert_eq!(code, 0);
        // What the child found in the log before it printed a newline
        assert_eq!(fs::read_to_string(&seen).unwrap(), "epoch 1: 50%");
        assert_eq!(fs::read_to_string(&log).unwrap(), "epoch 1: 50%\n");
    }

    #[test]
    fn test_inherit_returns_exit_code() {
        let code = ProcessRunner::new()
            .run(&sh("exit 7"), &OutputMode::Inherit)
            .unwrap();
        assert_eq!(code, 7);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let cmd = CommandLine::new("/nonexistent/dlrm-launch-torchx");
        let err = ProcessRunner::new().run(&cmd, &OutputMode::Inherit).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LaunchError>(),
            Some(LaunchError::Spawn { .. })
        ));
    }

    #[test]
    fn test_signal_exit_code() {
        let code = ProcessRunner::new()
            .run(&sh("kill -9 $$"), &OutputMode::Inherit)
            .unwrap();
        assert_eq!(code, 137);
    }

    #[test]
    fn test_dry_run_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("never.log");
        let runner = DryRun;
        let code = runner
            .run(&sh("exit 9"), &OutputMode::Tee(log.clone()))
            .unwrap();
        assert_eq!(code, 0);
        assert!(runner.is_dry_run());
        assert!(!log.exists());
    }
}
