// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the operating system:
//
//   nvidia_smi.rs  — GpuProbe backed by the nvidia-smi tool,
//                    plus the parser for its CSV output.
//
//   process.rs     — CommandRunner that spawns the child and
//                    tees its stdout/stderr into a log file,
//                    and the dry-run runner that only prints.
//
//   run_dirs.rs    — Creates the log tree for a run and resets
//                    the tensorboard profile directory.
//
//   config.rs      — Optional TOML config file with [job] and
//                    [container] sections.
//
//   launch_record.rs — JSON snapshot of each launch written
//                    next to the log file.
//
// The domain layer never imports anything from here; the
// application layer wires the two together.

/// nvidia-smi probe and output parser
pub mod nvidia_smi;

/// Process spawning with output duplication
pub mod process;

/// Log and profile directory preparation
pub mod run_dirs;

/// TOML configuration file
pub mod config;

/// Per-launch JSON record
pub mod launch_record;
