// ============================================================
// Layer 6 — nvidia-smi Probe
// ============================================================
// Reads per-device memory usage from the NVIDIA driver tool:
//
//   $ nvidia-smi --query-gpu=index,memory.used --format=csv,noheader,nounits
//   0, 500
//   1, 100
//   2, 300
//
// The parser also accepts the plainer output of
// `--query-gpu=memory.used --format=csv`, where rows carry no
// index and are numbered from 0 in listing order:
//
//   memory.used [MiB]
//   500 MiB
//   100 MiB
//
// There is no retry. If the tool is missing or fails, its own
// error is reported and the launch stops.

use std::process::Command;

use anyhow::Result;

use crate::domain::{gpu::GpuUsage, traits::GpuProbe};
use crate::error::LaunchError;

/// Arguments passed to nvidia-smi.
pub const QUERY_ARGS: &[&str] = &[
    "--query-gpu=index,memory.used",
    "--format=csv,noheader,nounits",
];

/// GpuProbe backed by the nvidia-smi binary.
pub struct NvidiaSmi {
    program: String,
}

impl NvidiaSmi {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::new("nvidia-smi")
    }
}

impl GpuProbe for NvidiaSmi {
    fn query(&self) -> Result<Vec<GpuUsage>> {
        let out = Command::new(&self.program)
            .args(QUERY_ARGS)
            .output()
            .map_err(|source| LaunchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !out.status.success() {
            return Err(LaunchError::ProbeFailed {
                program: self.program.clone(),
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            }
            .into());
        }

        let table = parse_memory_table(&String::from_utf8_lossy(&out.stdout))?;

        tracing::info!("GPU memory usage:");
        for g in &table {
            tracing::info!("  gpu {:>2}: {:>6} MiB", g.index, g.memory_used_mib);
        }
        Ok(table)
    }
}

/// Parse nvidia-smi CSV output into usage rows, in listing order.
pub fn parse_memory_table(text: &str) -> Result<Vec<GpuUsage>, LaunchError> {
    let mut rows: Vec<GpuUsage> = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Header row: "index, memory.used [MiB]" or "memory.used [MiB]"
        if rows.is_empty() && line.contains("memory.used") {
            continue;
        }

        let bad = || LaunchError::ProbeParse {
            line: lineno + 1,
            text: line.to_string(),
        };
        let fields: Vec<&str> = line.split(',').collect();

        let usage = match fields.as_slice() {
            [mem] => GpuUsage::new(rows.len() as u32, parse_mib(mem).ok_or_else(bad)?),
            [idx, mem] => GpuUsage::new(
                idx.trim().parse().map_err(|_| bad())?,
                parse_mib(mem).ok_or_else(bad)?,
            ),
            _ => return Err(bad()),
        };

        if rows.iter().any(|r| r.index == usage.index) {
            return Err(LaunchError::DuplicateDevice(usage.index));
        }
        rows.push(usage);
    }

    Ok(rows)
}

/// "500", " 500 MiB" → 500
fn parse_mib(field: &str) -> Option<u64> {
    let field = field.trim();
    let number = field.strip_suffix("MiB").unwrap_or(field).trim();
    number.parse().ok()
}
