// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The two places where the launcher touches the outside world:
//
//   GpuProbe       → asks the driver how busy each device is
//   CommandRunner  → actually starts a process
//
// The application layer only sees these traits, so a workflow
// can be tested with a canned probe and a runner that records
// what it was asked to do instead of spawning anything.

use std::path::PathBuf;

use anyhow::Result;

use crate::domain::{command::CommandLine, gpu::GpuUsage};

// ─── GpuProbe ─────────────────────────────────────────────────────────────────
/// Anything that can report per-device memory usage.
///
/// Implementations:
///   - NvidiaSmi   → runs `nvidia-smi --query-gpu=...`
///   - FixedProbe  → returns a canned table (tests)
pub trait GpuProbe {
    /// One row per device, in the order the driver lists them.
    fn query(&self) -> Result<Vec<GpuUsage>>;
}

// ─── CommandRunner ────────────────────────────────────────────────────────────
/// Where a child's stdout and stderr go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Child shares the launcher's terminal (interactive sessions)
    Inherit,

    /// Both streams are echoed and appended to this file
    Tee(PathBuf),
}

/// Anything that can run a CommandLine to completion.
///
/// Implementations:
///   - ProcessRunner → spawns a real child process
///   - DryRun        → prints the command, spawns nothing
pub trait CommandRunner {
    /// Run `cmd` and block until it exits.
    /// Returns the exit code the launcher should exit with.
    fn run(&self, cmd: &CommandLine, output: &OutputMode) -> Result<i32>;

    /// True when nothing is really executed.
    /// Workflows skip filesystem side effects in that case.
    fn is_dry_run(&self) -> bool {
        false
    }
}
