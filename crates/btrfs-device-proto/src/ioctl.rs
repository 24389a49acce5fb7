// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Raw ioctl entry points
//!
//! Each function here is a thin `nix`-generated wrapper: it returns the
//! driver's non-negative return value as `Ok` and `-1`/errno as `Err`.
//! Callers own the file descriptor and the argument buffer.

use nix::{
    ioctl_read, ioctl_readwrite, ioctl_write_ptr, ioctl_write_ptr_bad, request_code_none,
};

use crate::messages::{BTRFS_IOCTL_MAGIC, DevInfoArgs, FsInfoArgs, GetDevStats, VolArgs};

ioctl_write_ptr!(
    /// Register one device with the control endpoint.
    btrfs_scan_dev,
    BTRFS_IOCTL_MAGIC,
    4,
    VolArgs
);
ioctl_write_ptr!(
    /// Attach a device to the mounted filesystem.
    btrfs_add_dev,
    BTRFS_IOCTL_MAGIC,
    10,
    VolArgs
);
ioctl_write_ptr!(
    /// Detach a device from the mounted filesystem.
    btrfs_rm_dev,
    BTRFS_IOCTL_MAGIC,
    11,
    VolArgs
);
ioctl_readwrite!(btrfs_dev_info, BTRFS_IOCTL_MAGIC, 30, DevInfoArgs);
ioctl_read!(btrfs_fs_info, BTRFS_IOCTL_MAGIC, 31, FsInfoArgs);
ioctl_read!(
    /// Ask whether every member of the named device's filesystem is known.
    btrfs_devices_ready,
    BTRFS_IOCTL_MAGIC,
    39,
    VolArgs
);
ioctl_readwrite!(btrfs_get_dev_stats, BTRFS_IOCTL_MAGIC, 52, GetDevStats);

// Block layer requests used while preparing a new member.
ioctl_read!(blk_get_size64, 0x12, 114, u64);
ioctl_write_ptr_bad!(blk_discard, request_code_none!(0x12, 119), [u64; 2]);
