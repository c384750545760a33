// ============================================================
// Layer 2 — SelectUseCase
// ============================================================
// Turns "give me N GPUs" into a concrete device list.
//
//   DeviceRequest::Explicit     → used as given, probe skipped
//   DeviceRequest::LeastLoaded  → probe once, keep the N least
//                                 loaded devices
//
// Both training and container launches go through here, and the
// `select-gpus` subcommand exposes it on its own.

use anyhow::{bail, Result};

use crate::domain::{
    gpu::{select_least_loaded, GpuSelection, GpuUsage, ALL_DEVICES},
    traits::GpuProbe,
};

/// How the caller wants devices chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRequest {
    /// A fixed list such as "0,3"
    Explicit(GpuSelection),

    /// The N least-loaded devices (ALL_DEVICES for every one)
    LeastLoaded(usize),
}

impl DeviceRequest {
    /// Build a request from an optional explicit list and an optional count.
    /// An explicit list takes precedence over a count.
    pub fn from_parts(devices: Option<&str>, count: Option<usize>, default_count: usize) -> Result<Self> {
        if let Some(list) = devices {
            return Ok(Self::Explicit(GpuSelection::parse(list)?));
        }
        match count.unwrap_or(default_count) {
            0 => bail!("GPU count must be at least 1"),
            n => Ok(Self::LeastLoaded(n)),
        }
    }
}

/// Outcome of a selection, with the table it was based on.
#[derive(Debug, Clone)]
pub struct Selected {
    pub selection: GpuSelection,

    /// Empty when the probe was skipped
    pub usage: Vec<GpuUsage>,
}

pub struct SelectUseCase<'a> {
    probe: &'a dyn GpuProbe,
}

impl<'a> SelectUseCase<'a> {
    pub fn new(probe: &'a dyn GpuProbe) -> Self {
        Self { probe }
    }

    pub fn select(&self, request: &DeviceRequest) -> Result<Selected> {
        let selected = match request {
            DeviceRequest::Explicit(sel) => {
                tracing::info!("Using devices given on the command line: {}", sel);
                Selected {
                    selection: sel.clone(),
                    usage: Vec::new(),
                }
            }
            DeviceRequest::LeastLoaded(n) => {
                let usage = self.probe.query()?;
                let selection = select_least_loaded(&usage, *n)?;
                if *n != ALL_DEVICES && selection.len() < *n {
                    tracing::warn!(
                        "Requested {} GPUs but only {} are present",
                        n,
                        selection.len()
                    );
                }
                Selected { selection, usage }
            }
        };

        tracing::info!("CUDA_VISIBLE_DEVICES={}", selected.selection);
        Ok(selected)
    }
}

// ─── Test Probe ───────────────────────────────────────────────────────────────
/// GpuProbe returning a fixed table; counts how often it was asked.
#[cfg(test)]
pub struct FixedProbe {
    pub rows: Vec<GpuUsage>,
    pub calls: std::cell::Cell<usize>,
}

#[cfg(test)]
impl FixedProbe {
    pub fn new(memory: &[u64]) -> Self {
        Self {
            rows: memory
                .iter()
                .enumerate()
                .map(|(i, &m)| GpuUsage::new(i as u32, m))
                .collect(),
            calls: std::cell::Cell::new(0),
        }
    }
}

#[cfg(test)]
impl GpuProbe for FixedProbe {
    fn query(&self) -> Result<Vec<GpuUsage>> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.rows.clone())
    }
}
