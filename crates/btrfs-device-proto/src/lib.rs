// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request shapes and result types for the btrfs device control plane
//!
//! This crate defines the fixed-size request structures exchanged with the
//! btrfs driver, the bounded name type used to fill them, and the tagged
//! outcome that keeps driver-reported protocol errors apart from transport
//! failures. It performs no I/O policy of its own; callers decide how to
//! iterate and report.

pub mod ioctl;
pub mod messages;
pub mod name;
pub mod outcome;
pub mod stats;

pub use messages::{
    BTRFS_DEV_STAT_VALUES_MAX, BTRFS_DEV_STATS_RESET, BTRFS_DEVICE_PATH_NAME_MAX,
    BTRFS_FSID_SIZE, BTRFS_IOCTL_MAGIC, BTRFS_PATH_NAME_MAX, BTRFS_UUID_SIZE, DevInfoArgs,
    DeviceInfo, FsInfo, FsInfoArgs, GetDevStats, VolArgs,
};
pub use name::{BoundedName, DeviceName, DevicePath};
pub use outcome::{DeviceOutcome, ProtocolError};
pub use stats::{DevStatKind, DeviceStats, StatsQuery, render_stats};
