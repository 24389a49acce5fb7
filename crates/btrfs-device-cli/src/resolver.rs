// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Locating the filesystem or control endpoint a command talks to

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ToolConfig;
use crate::control::{ControlEndpoint, FilesystemControl};
use crate::driver::{ControlDevice, MountedFilesystem};
use crate::error::DeviceError;

#[cfg_attr(test, mockall::automock)]
pub trait Resolver {
    /// Open the filesystem that owns `path`: its mount point, a directory or
    /// file inside it, or one of its member devices. A block device is first
    /// mapped to the mount point of the filesystem it belongs to.
    fn resolve_path_or_device(
        &self,
        path: &Path,
    ) -> Result<Box<dyn FilesystemControl>, DeviceError>;

    /// Open the system-wide control endpoint.
    fn resolve_control(&self) -> Result<Box<dyn ControlEndpoint>, DeviceError>;
}

pub struct SystemResolver {
    control_device: PathBuf,
    mounts_file: PathBuf,
}

impl SystemResolver {
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            control_device: config.control_device.clone(),
            mounts_file: config.mounts_file.clone(),
        }
    }

    fn open_mounted(&self, path: &Path) -> Result<Box<dyn FilesystemControl>, DeviceError> {
        let file = open_file_or_dir(path).map_err(|source| DeviceError::Access {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "opened filesystem handle");
        Ok(Box::new(MountedFilesystem::new(file, path)))
    }

    fn mount_point_of(&self, device: &Path) -> Result<PathBuf, DeviceError> {
        let access = |source: io::Error| DeviceError::Access {
            path: device.to_path_buf(),
            source,
        };
        let mounts = fs::read_to_string(&self.mounts_file).map_err(access)?;
        find_btrfs_mount(&mounts, device).ok_or_else(|| {
            access(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' is not a mounted btrfs device", device.display()),
            ))
        })
    }
}

impl Resolver for SystemResolver {
    fn resolve_path_or_device(
        &self,
        path: &Path,
    ) -> Result<Box<dyn FilesystemControl>, DeviceError> {
        let is_block = fs::metadata(path)
            .map(|meta| meta.file_type().is_block_device())
            .unwrap_or(false);
        if is_block {
            let mount_point = self.mount_point_of(path)?;
            debug!(device = %path.display(), mount = %mount_point.display(), "device mapped to mount point");
            self.open_mounted(&mount_point)
        } else {
            self.open_mounted(path)
        }
    }

    fn resolve_control(&self) -> Result<Box<dyn ControlEndpoint>, DeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.control_device)
            .map_err(|source| DeviceError::ControlUnavailable {
                path: self.control_device.clone(),
                source,
            })?;
        debug!(path = %self.control_device.display(), "opened control endpoint");
        Ok(Box::new(ControlDevice::new(file)))
    }
}

/// Directories open read-only; anything else read-write.
fn open_file_or_dir(path: &Path) -> io::Result<File> {
    let meta = fs::metadata(path)?;
    if meta.is_dir() {
        File::open(path)
    } else {
        OpenOptions::new().read(true).write(true).open(path)
    }
}

/// Decode the octal escapes the kernel uses for spaces and tabs in mount
/// tables (`\040`, `\011`, ...).
pub(crate) fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let value = std::str::from_utf8(&bytes[i + 1..i + 4])
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 8).ok());
            if let Some(value) = value {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// `(source, mount point, fstype)` for every line of a mounts table.
pub(crate) fn parse_mounts(mounts: &str) -> Vec<(String, PathBuf, String)> {
    mounts
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let target = fields.next()?;
            let fstype = fields.next()?;
            Some((
                unescape_mount_field(source),
                PathBuf::from(unescape_mount_field(target)),
                fstype.to_string(),
            ))
        })
        .collect()
}

/// True when `a` and `b` name the same file: same path after
/// canonicalization, or the same device number for device nodes.
pub(crate) fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) if ca == cb => return true,
        _ => {}
    }
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => {
            ma.file_type().is_block_device()
                && mb.file_type().is_block_device()
                && ma.rdev() == mb.rdev()
        }
        _ => false,
    }
}

fn find_btrfs_mount(mounts: &str, device: &Path) -> Option<PathBuf> {
    parse_mounts(mounts)
        .into_iter()
        .find(|(source, _, fstype)| fstype == "btrfs" && same_file(Path::new(source), device))
        .map(|(_, target, _)| target)
}
