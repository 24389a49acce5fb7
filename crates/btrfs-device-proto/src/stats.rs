// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-device I/O error counters
//!
//! The driver fills `nr_items` with the number of counter slots it actually
//! populated. A driver older than this client may fill fewer than
//! [`BTRFS_DEV_STAT_VALUES_MAX`]; only populated slots are ever rendered.

use crate::messages::{BTRFS_DEV_STAT_VALUES_MAX, BTRFS_DEV_STATS_RESET, GetDevStats};
use crate::name::DevicePath;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DevStatKind {
    WriteIoErrs,
    ReadIoErrs,
    FlushIoErrs,
    CorruptionErrs,
    GenerationErrs,
}

impl DevStatKind {
    /// Slot order on the wire.
    pub const ALL: [DevStatKind; BTRFS_DEV_STAT_VALUES_MAX] = [
        Self::WriteIoErrs,
        Self::ReadIoErrs,
        Self::FlushIoErrs,
        Self::CorruptionErrs,
        Self::GenerationErrs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::WriteIoErrs => "write_io_errs",
            Self::ReadIoErrs => "read_io_errs",
            Self::FlushIoErrs => "flush_io_errs",
            Self::CorruptionErrs => "corruption_errs",
            Self::GenerationErrs => "generation_errs",
        }
    }
}

/// One stats request: read (and optionally reset) the counters of `devid`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatsQuery {
    pub devid: u64,
    pub max_slots: u64,
    pub reset: bool,
}

impl StatsQuery {
    pub fn new(devid: u64, reset: bool) -> Self {
        Self {
            devid,
            max_slots: BTRFS_DEV_STAT_VALUES_MAX as u64,
            reset,
        }
    }

    pub fn to_args(&self) -> GetDevStats {
        GetDevStats {
            devid: self.devid,
            nr_items: self.max_slots,
            flags: if self.reset { BTRFS_DEV_STATS_RESET } else { 0 },
            values: [0; BTRFS_DEV_STAT_VALUES_MAX],
            unused: [0; 128 - 2 - BTRFS_DEV_STAT_VALUES_MAX],
        }
    }
}

/// Counters returned for one device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceStats {
    pub devid: u64,
    pub nr_items: u64,
    pub values: [u64; BTRFS_DEV_STAT_VALUES_MAX],
}

impl DeviceStats {
    pub fn from_args(args: &GetDevStats) -> Self {
        Self {
            devid: args.devid,
            nr_items: args.nr_items,
            values: args.values,
        }
    }

    /// Counter kinds the driver populated, in slot order.
    pub fn populated(&self) -> impl Iterator<Item = (DevStatKind, u64)> + '_ {
        let filled = usize::try_from(self.nr_items)
            .unwrap_or(usize::MAX)
            .min(BTRFS_DEV_STAT_VALUES_MAX);
        DevStatKind::ALL
            .iter()
            .zip(self.values.iter())
            .take(filled)
            .map(|(kind, value)| (*kind, *value))
    }
}

/// Report lines for one device, one per populated counter.
pub fn render_stats(path: &DevicePath, stats: &DeviceStats) -> Vec<String> {
    stats
        .populated()
        .map(|(kind, value)| format!("[{}].{:<15} {}", path, kind.name(), value))
        .collect()
}
