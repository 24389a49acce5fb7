// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! ioctl-backed implementations of the control-plane seams

use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use btrfs_device_proto::ioctl;
use btrfs_device_proto::{
    DevInfoArgs, DeviceInfo, DeviceName, DeviceOutcome, DeviceStats, FsInfo, FsInfoArgs,
    StatsQuery, VolArgs,
};
use nix::errno::Errno;
use tracing::debug;

use crate::control::{ControlEndpoint, FilesystemControl};

/// An open handle on a mounted filesystem (mount point, directory or file
/// inside it). Closed on drop.
pub struct MountedFilesystem {
    file: File,
    path: PathBuf,
}

impl MountedFilesystem {
    pub fn new(file: File, path: &Path) -> Self {
        Self {
            file,
            path: path.to_path_buf(),
        }
    }
}

impl FilesystemControl for MountedFilesystem {
    fn add_device(&mut self, name: &DeviceName) -> DeviceOutcome {
        let args = VolArgs::new(name);
        debug!(mount = %self.path.display(), device = %name, "attach request");
        // SAFETY: `args` is a live, correctly sized VolArgs for the call.
        let result = unsafe { ioctl::btrfs_add_dev(self.file.as_raw_fd(), &args) };
        DeviceOutcome::from_ioctl(result)
    }

    fn remove_device(&mut self, name: &DeviceName) -> DeviceOutcome {
        let args = VolArgs::new(name);
        debug!(mount = %self.path.display(), device = %name, "detach request");
        // SAFETY: as above.
        let result = unsafe { ioctl::btrfs_rm_dev(self.file.as_raw_fd(), &args) };
        DeviceOutcome::from_ioctl(result)
    }

    fn fs_info(&mut self) -> Result<FsInfo, Errno> {
        let mut args = FsInfoArgs::zeroed();
        // SAFETY: the driver writes at most size_of::<FsInfoArgs>() bytes.
        unsafe { ioctl::btrfs_fs_info(self.file.as_raw_fd(), &mut args) }?;
        Ok(FsInfo::from(&args))
    }

    fn device_info(&mut self, devid: u64) -> Result<DeviceInfo, Errno> {
        let mut args = DevInfoArgs::for_devid(devid);
        // SAFETY: as above.
        unsafe { ioctl::btrfs_dev_info(self.file.as_raw_fd(), &mut args) }?;
        Ok(DeviceInfo::from(&args))
    }

    fn device_stats(&mut self, query: &StatsQuery) -> Result<DeviceStats, Errno> {
        let mut args = query.to_args();
        debug!(devid = query.devid, reset = query.reset, "stats request");
        // SAFETY: as above.
        unsafe { ioctl::btrfs_get_dev_stats(self.file.as_raw_fd(), &mut args) }?;
        Ok(DeviceStats::from_args(&args))
    }
}

/// The system-wide control device. Closed on drop.
pub struct ControlDevice {
    file: File,
}

impl ControlDevice {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl ControlEndpoint for ControlDevice {
    fn scan_device(&mut self, name: &DeviceName) -> DeviceOutcome {
        let args = VolArgs::new(name);
        debug!(device = %name, "scan request");
        // SAFETY: `args` is a live, correctly sized VolArgs for the call.
        let result = unsafe { ioctl::btrfs_scan_dev(self.file.as_raw_fd(), &args) };
        DeviceOutcome::from_ioctl(result)
    }

    fn devices_ready(&mut self, name: &DeviceName) -> Result<i32, Errno> {
        let mut args = VolArgs::new(name);
        debug!(device = %name, "devices-ready query");
        // SAFETY: as above; the driver may write back into the buffer.
        unsafe { ioctl::btrfs_devices_ready(self.file.as_raw_fd(), &mut args) }
    }
}
