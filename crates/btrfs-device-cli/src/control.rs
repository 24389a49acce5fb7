// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Control-plane seams
//!
//! A [`FilesystemControl`] talks to one mounted filesystem; a
//! [`ControlEndpoint`] talks to the system-wide control device. Both are
//! owned by the flow that opened them and closed when dropped.

use btrfs_device_proto::{DeviceInfo, DeviceName, DeviceOutcome, DeviceStats, FsInfo, StatsQuery};
use nix::errno::Errno;

#[cfg_attr(test, mockall::automock)]
pub trait FilesystemControl {
    fn add_device(&mut self, name: &DeviceName) -> DeviceOutcome;

    fn remove_device(&mut self, name: &DeviceName) -> DeviceOutcome;

    fn fs_info(&mut self) -> Result<FsInfo, Errno>;

    /// `Err(ENODEV)` means no device has this id.
    fn device_info(&mut self, devid: u64) -> Result<DeviceInfo, Errno>;

    fn device_stats(&mut self, query: &StatsQuery) -> Result<DeviceStats, Errno>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ControlEndpoint {
    fn scan_device(&mut self, name: &DeviceName) -> DeviceOutcome;

    /// Raw driver answer; a non-negative value is passed through untouched.
    fn devices_ready(&mut self, name: &DeviceName) -> Result<i32, Errno>;
}

/// Collect the filesystem's member devices.
///
/// Device ids are probed from 0 up to `max_id`; ids the driver does not
/// know are skipped. Enumeration stops once `num_devices` members are found.
pub fn enumerate_devices(
    fs: &mut dyn FilesystemControl,
) -> Result<(FsInfo, Vec<DeviceInfo>), Errno> {
    let info = fs.fs_info()?;
    let mut devices = Vec::new();
    if info.num_devices == 0 {
        return Ok((info, devices));
    }

    for devid in 0..=info.max_id {
        if devices.len() as u64 >= info.num_devices {
            break;
        }
        match fs.device_info(devid) {
            Ok(device) => devices.push(device),
            Err(Errno::ENODEV) => continue,
            Err(errno) => return Err(errno),
        }
    }
    tracing::debug!(
        max_id = info.max_id,
        num_devices = info.num_devices,
        found = devices.len(),
        "enumerated filesystem devices"
    );
    Ok((info, devices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use btrfs_device_proto::DevicePath;
    use mockall::predicate::eq;

    fn device(devid: u64) -> DeviceInfo {
        DeviceInfo {
            devid,
            uuid: [0; 16],
            bytes_used: 0,
            total_bytes: 0,
            path: DevicePath::truncate_from(format!("/dev/vd{devid}")),
        }
    }

    #[test]
    fn skips_holes_in_the_id_space() {
        let mut fs = MockFilesystemControl::new();
        fs.expect_fs_info().returning(|| {
            Ok(FsInfo {
                max_id: 4,
                num_devices: 2,
                fsid: [0; 16],
            })
        });
        fs.expect_device_info().with(eq(0)).returning(|_| Err(Errno::ENODEV));
        fs.expect_device_info().with(eq(1)).returning(|id| Ok(device(id)));
        fs.expect_device_info().with(eq(2)).returning(|_| Err(Errno::ENODEV));
        fs.expect_device_info().with(eq(3)).returning(|id| Ok(device(id)));

        let (info, devices) = enumerate_devices(&mut fs).unwrap();
        assert_eq!(info.num_devices, 2);
        let ids: Vec<u64> = devices.iter().map(|d| d.devid).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn other_errors_abort_enumeration() {
        let mut fs = MockFilesystemControl::new();
        fs.expect_fs_info().returning(|| {
            Ok(FsInfo {
                max_id: 2,
                num_devices: 2,
                fsid: [0; 16],
            })
        });
        fs.expect_device_info().returning(|_| Err(Errno::EPERM));
        assert_eq!(enumerate_devices(&mut fs).unwrap_err(), Errno::EPERM);
    }

    #[test]
    fn empty_filesystem_issues_no_device_queries() {
        let mut fs = MockFilesystemControl::new();
        fs.expect_fs_info().returning(|| {
            Ok(FsInfo {
                max_id: 0,
                num_devices: 0,
                fsid: [0; 16],
            })
        });
        fs.expect_device_info().never();
        let (_, devices) = enumerate_devices(&mut fs).unwrap();
        assert!(devices.is_empty());
    }
}
