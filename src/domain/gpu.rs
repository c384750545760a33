// ============================================================
// Layer 3 — GPU Usage and Selection
// ============================================================
// Ranks devices by how much memory is already in use and keeps
// the N least-loaded ones.
//
// Example:
//   usage   = [500, 100, 300] MiB at indices [0, 1, 2]
//   n       = 2
//   ranked  = 1 (100), 2 (300), 0 (500)
//   result  = "1,2"
//
// The sort is stable, so two devices with identical usage keep
// the order the probe listed them in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LaunchError;

/// Requested count meaning "every device on the host".
pub const ALL_DEVICES: usize = 9999;

/// One row of the device query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuUsage {
    /// Device index as understood by CUDA_VISIBLE_DEVICES
    pub index: u32,

    /// Memory currently allocated on the device, in MiB
    pub memory_used_mib: u64,
}

impl GpuUsage {
    pub fn new(index: u32, memory_used_mib: u64) -> Self {
        Self { index, memory_used_mib }
    }
}

/// An ordered, duplicate-free list of device indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuSelection {
    devices: Vec<u32>,
}

impl GpuSelection {
    /// Build a selection, rejecting repeated indices.
    pub fn new(devices: Vec<u32>) -> Result<Self, LaunchError> {
        for (i, d) in devices.iter().enumerate() {
            if devices[..i].contains(d) {
                return Err(LaunchError::DuplicateDevice(*d));
            }
        }
        Ok(Self { devices })
    }

    /// Parse a user-supplied list such as "0,3".
    pub fn parse(list: &str) -> Result<Self, LaunchError> {
        let devices = list
            .split(',')
            .map(|s| s.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| LaunchError::InvalidDeviceList(list.to_string()))?;
        Self::new(devices)
    }

    pub fn devices(&self) -> &[u32] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Value for the CUDA_VISIBLE_DEVICES variable, e.g. "1,2".
    pub fn visible_devices(&self) -> String {
        self.devices()
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for GpuSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.visible_devices())
    }
}

/// Keep the `n` devices with the lowest memory usage, lowest first.
///
/// If `n` exceeds the number of devices, every device is returned.
/// Fails only if the probe reported the same index twice.
pub fn select_least_loaded(usage: &[GpuUsage], n: usize) -> Result<GpuSelection, LaunchError> {
    let mut ranked = usage.to_vec();
    // sort_by_key is stable: ties keep listing order
    ranked.sort_by_key(|g| g.memory_used_mib);

    let devices = ranked.into_iter().take(n).map(|g| g.index).collect();
    GpuSelection::new(devices)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn usage(values: &[u64]) -> Vec<GpuUsage> {
        values
            .iter()
            .enumerate()
            .map(|(i, &m)| GpuUsage::new(i as u32, m))
            .collect()
    }

    #[test]
    fn test_picks_two_least_loaded() {
        let sel = select_least_loaded(&usage(&[500, 100, 300]), 2).unwrap();
        assert_eq!(sel.devices(), &[1, 2]);
        assert_eq!(sel.visible_devices(), "1,2");
    }

    #[test]
    fn test_all_devices_sentinel() {
        let sel = select_least_loaded(&usage(&[40, 10, 30, 20]), ALL_DEVICES).unwrap();
        assert_eq!(sel.devices(), &[1, 3, 2, 0]);
        assert_eq!(sel.len(), 4);
    }

    #[test]
    fn test_ties_keep_listing_order() {
        let sel = select_least_loaded(&usage(&[7, 3, 7, 3]), 3).unwrap();
        assert_eq!(sel.devices(), &[1, 3, 0]);
    }

    #[test]
    fn test_selection_is_exactly_the_smallest() {
        let rows = usage(&[90, 15, 60, 15, 0, 45]);
        for n in 0..=rows.len() + 2 {
            let sel = select_least_loaded(&rows, n).unwrap();
            assert_eq!(sel.len(), n.min(rows.len()));

            // Every picked device uses no more than any device left out
            let worst_picked = sel
                .devices()
                .iter()
                .map(|d| rows[*d as usize].memory_used_mib)
                .max()
                .unwrap_or(0);
            for row in rows.iter().filter(|r| !sel.devices().contains(&r.index)) {
                assert!(row.memory_used_mib >= worst_picked);
            }
        }
    }

    #[test]
    fn test_empty_host_selects_nothing() {
        let sel = select_least_loaded(&[], 4).unwrap();
        assert!(sel.is_empty());
        assert_eq!(sel.visible_devices(), "");
    }

    #[test]
    fn test_duplicate_usage_rows_rejected() {
        let rows = vec![GpuUsage::new(0, 10), GpuUsage::new(0, 20)];
        assert!(matches!(
            select_least_loaded(&rows, 2),
            Err(LaunchError::DuplicateDevice(0))
        ));
    }

    #[test]
    fn test_parse_device_list() {
        let sel = GpuSelection::parse("0, 3").unwrap();
        assert_eq!(sel.devices(), &[0, 3]);
        assert!(GpuSelection::parse("0,x").is_err());
        assert!(GpuSelection::parse("2,2").is_err());
        assert!(GpuSelection::parse("").is_err());
    }
}
