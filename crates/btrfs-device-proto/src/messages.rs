// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed-size request structures for the btrfs device control plane
//!
//! The `*Args` structs mirror the driver's ABI byte for byte. Decoded views
//! ([`FsInfo`], [`DeviceInfo`]) are what the rest of the workspace uses.

use crate::name::{DeviceName, DevicePath};

pub const BTRFS_IOCTL_MAGIC: u8 = 0x94;
pub const BTRFS_PATH_NAME_MAX: usize = 4087;
pub const BTRFS_DEVICE_PATH_NAME_MAX: usize = 1024;
pub const BTRFS_FSID_SIZE: usize = 16;
pub const BTRFS_UUID_SIZE: usize = 16;

/// Number of counter kinds this client knows about.
pub const BTRFS_DEV_STAT_VALUES_MAX: usize = 5;

/// Reset the counters after reading them, in the same request.
pub const BTRFS_DEV_STATS_RESET: u64 = 1 << 0;

/// Name-carrying request used by attach, detach, scan and ready.
#[repr(C)]
#[derive(Clone)]
pub struct VolArgs {
    pub fd: i64,
    pub name: [u8; BTRFS_PATH_NAME_MAX + 1],
}

impl VolArgs {
    pub fn new(name: &DeviceName) -> Self {
        let mut args = Self {
            fd: 0,
            name: [0; BTRFS_PATH_NAME_MAX + 1],
        };
        name.write_to(&mut args.name);
        args
    }

    pub fn name(&self) -> DeviceName {
        DeviceName::truncate_from(&self.name[..])
    }
}

#[repr(C)]
#[derive(Clone)]
pub struct FsInfoArgs {
    pub max_id: u64,
    pub num_devices: u64,
    pub fsid: [u8; BTRFS_FSID_SIZE],
    pub reserved: [u64; 124],
}

impl FsInfoArgs {
    pub fn zeroed() -> Self {
        Self {
            max_id: 0,
            num_devices: 0,
            fsid: [0; BTRFS_FSID_SIZE],
            reserved: [0; 124],
        }
    }
}

#[repr(C)]
#[derive(Clone)]
pub struct DevInfoArgs {
    pub devid: u64,
    pub uuid: [u8; BTRFS_UUID_SIZE],
    pub bytes_used: u64,
    pub total_bytes: u64,
    pub unused: [u64; 379],
    pub path: [u8; BTRFS_DEVICE_PATH_NAME_MAX],
}

impl DevInfoArgs {
    /// Query for `devid` with an all-zero uuid, meaning "any uuid".
    pub fn for_devid(devid: u64) -> Self {
        Self {
            devid,
            uuid: [0; BTRFS_UUID_SIZE],
            bytes_used: 0,
            total_bytes: 0,
            unused: [0; 379],
            path: [0; BTRFS_DEVICE_PATH_NAME_MAX],
        }
    }
}

#[repr(C)]
#[derive(Clone)]
pub struct GetDevStats {
    pub devid: u64,
    /// In: slots the caller has room for. Out: slots the driver filled.
    pub nr_items: u64,
    pub flags: u64,
    pub values: [u64; BTRFS_DEV_STAT_VALUES_MAX],
    pub unused: [u64; 128 - 2 - BTRFS_DEV_STAT_VALUES_MAX],
}

const _: () = assert!(std::mem::size_of::<VolArgs>() == 4096);
const _: () = assert!(std::mem::size_of::<FsInfoArgs>() == 1024);
const _: () = assert!(std::mem::size_of::<DevInfoArgs>() == 4096);
const _: () = assert!(std::mem::size_of::<GetDevStats>() == 1032);

/// Filesystem-wide facts returned by the filesystem-info request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsInfo {
    pub max_id: u64,
    pub num_devices: u64,
    pub fsid: [u8; BTRFS_FSID_SIZE],
}

impl From<&FsInfoArgs> for FsInfo {
    fn from(args: &FsInfoArgs) -> Self {
        Self {
            max_id: args.max_id,
            num_devices: args.num_devices,
            fsid: args.fsid,
        }
    }
}

/// One member device as reported by the device-info request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub devid: u64,
    pub uuid: [u8; BTRFS_UUID_SIZE],
    pub bytes_used: u64,
    pub total_bytes: u64,
    pub path: DevicePath,
}

impl From<&DevInfoArgs> for DeviceInfo {
    fn from(args: &DevInfoArgs) -> Self {
        Self {
            devid: args.devid,
            uuid: args.uuid,
            bytes_used: args.bytes_used,
            total_bytes: args.total_bytes,
            path: DevicePath::truncate_from(&args.path[..]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vol_args_round_trips_name() {
        let name = DeviceName::truncate_from("/dev/vdb");
        let args = VolArgs::new(&name);
        assert_eq!(args.fd, 0);
        assert_eq!(&args.name[..9], b"/dev/vdb\0");
        assert_eq!(args.name(), name);
    }

    #[test]
    fn vol_args_always_terminates_the_name() {
        let long = "y".repeat(BTRFS_PATH_NAME_MAX * 2);
        let args = VolArgs::new(&DeviceName::truncate_from(&long));
        assert_eq!(args.name[BTRFS_PATH_NAME_MAX], 0);
        assert_eq!(args.name().len(), BTRFS_PATH_NAME_MAX);
    }

    #[test]
    fn device_info_decodes_nul_terminated_path() {
        let mut raw = DevInfoArgs::for_devid(3);
        raw.path[..9].copy_from_slice(b"/dev/sdd1");
        raw.total_bytes = 1 << 30;
        let info = DeviceInfo::from(&raw);
        assert_eq!(info.devid, 3);
        assert_eq!(info.path.to_string(), "/dev/sdd1");
        assert_eq!(info.total_bytes, 1 << 30);
    }

    #[test]
    fn device_info_path_without_terminator_uses_full_buffer() {
        let mut raw = DevInfoArgs::for_devid(1);
        raw.path.fill(b'p');
        let info = DeviceInfo::from(&raw);
        assert_eq!(info.path.len(), BTRFS_DEVICE_PATH_NAME_MAX);
    }
}
