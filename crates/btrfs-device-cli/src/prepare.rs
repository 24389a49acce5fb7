// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Preparing a raw device for membership
//!
//! Preparation runs in two phases. [`check_candidate`] refuses devices that
//! are in use or already formatted (unless forced) and opens the device
//! exclusively. [`prepare_file`] then probes the size, optionally discards
//! the whole device and wipes old signatures along with both 2 MiB ends. The device is closed when
//! [`DevicePreparer::prepare`] returns.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::{FileExt, FileTypeExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use btrfs_device_proto::ioctl;
use tracing::{debug, info, warn};

use crate::config::ToolConfig;
use crate::error::PreparationError;
use crate::resolver::{parse_mounts, same_file};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Region zeroed at both ends of a new member.
const ZERO_DEV_BYTES: u64 = 2 * MIB;

const SUPER_INFO_OFFSET: u64 = 64 * KIB;
const SUPER_INFO_SIZE: u64 = 4096;
const SUPER_MIRROR_OFFSETS: [u64; 3] = [SUPER_INFO_OFFSET, 64 * MIB, 256 * GIB];

/// Below this size the filesystem should mix data and metadata.
const SMALL_VOLUME_SIZE: u64 = GIB;

/// Largest single discard request.
const DISCARD_CHUNK: u64 = 2 * GIB;

pub const BTRFS_MAGIC: &[u8; 8] = b"_BHRfS_M";
pub(crate) const BTRFS_MAGIC_OFFSET: u64 = SUPER_INFO_OFFSET + 0x40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Overwrite an existing filesystem signature.
    pub force: bool,
    /// Discard the whole device first (best effort).
    pub discard: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            force: false,
            discard: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreparedDevice {
    /// Device size in bytes.
    pub size: u64,
    /// The device is small enough that data and metadata should share
    /// block groups.
    pub mixed: bool,
}

#[cfg_attr(test, mockall::automock)]
pub trait DevicePreparer {
    fn prepare(
        &self,
        path: &Path,
        options: &PrepareOptions,
    ) -> Result<PreparedDevice, PreparationError>;
}

pub struct BlockDevicePreparer {
    swaps_file: PathBuf,
    mounts_file: PathBuf,
}

impl BlockDevicePreparer {
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            swaps_file: config.swaps_file.clone(),
            mounts_file: config.mounts_file.clone(),
        }
    }
}

impl DevicePreparer for BlockDevicePreparer {
    fn prepare(
        &self,
        path: &Path,
        options: &PrepareOptions,
    ) -> Result<PreparedDevice, PreparationError> {
        let file = check_candidate(path, options.force, &self.swaps_file, &self.mounts_file)?;
        let prepared = prepare_file(&file, path, options)?;
        info!(
            device = %path.display(),
            size = prepared.size,
            mixed = prepared.mixed,
            "device prepared"
        );
        Ok(prepared)
    }
}

/// Refuse unsuitable candidates and open the device exclusively.
pub fn check_candidate(
    path: &Path,
    force: bool,
    swaps_file: &Path,
    mounts_file: &Path,
) -> Result<File, PreparationError> {
    let shown = path.display().to_string();

    if is_listed(swaps_file, path, parse_swaps) {
        return Err(PreparationError::SwapDevice { path: shown });
    }
    if is_listed(mounts_file, path, |text| {
        parse_mounts(text).into_iter().map(|(source, _, _)| PathBuf::from(source)).collect()
    }) {
        return Err(PreparationError::Mounted { path: shown });
    }

    if !force {
        // An unreadable device is reported by the exclusive open below.
        if let Ok(probe) = File::open(path) {
            if let Some(signature) = detect_signature(&probe) {
                return Err(PreparationError::AlreadyFormatted {
                    path: shown,
                    signature,
                });
            }
        }
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_EXCL)
        .open(path)
        .map_err(|source| PreparationError::Open {
            path: shown.clone(),
            source,
        })?;

    let is_block = file
        .metadata()
        .map(|meta| meta.file_type().is_block_device())
        .map_err(|source| PreparationError::Open {
            path: shown.clone(),
            source,
        })?;
    if !is_block {
        return Err(PreparationError::NotBlockDevice { path: shown });
    }
    Ok(file)
}

/// Size probe, optional discard and signature wipe on an already opened
/// device.
pub fn prepare_file(
    file: &File,
    path: &Path,
    options: &PrepareOptions,
) -> Result<PreparedDevice, PreparationError> {
    let shown = path.display().to_string();
    let meta = file.metadata().map_err(|source| PreparationError::Open {
        path: shown.clone(),
        source,
    })?;
    let is_block = meta.file_type().is_block_device();

    let size = if is_block {
        let mut size = 0u64;
        // SAFETY: the driver writes one u64 into `size`.
        unsafe { ioctl::blk_get_size64(file.as_raw_fd(), &mut size) }.map_err(|source| {
            PreparationError::SizeProbe {
                path: shown.clone(),
                source,
            }
        })?;
        size
    } else {
        meta.len()
    };
    if size < SUPER_INFO_OFFSET + SUPER_INFO_SIZE {
        return Err(PreparationError::TooSmall {
            path: shown,
            size,
        });
    }

    let mixed = size < SMALL_VOLUME_SIZE;
    if mixed {
        debug!(device = %shown, size, "small volume, mixed block groups suggested");
    }

    if options.discard && is_block {
        discard_device(file, &shown, size);
    }

    let wipe = |source: io::Error| PreparationError::Wipe {
        path: shown.clone(),
        source,
    };
    zero_range(file, 0, ZERO_DEV_BYTES.min(size)).map_err(wipe)?;
    for offset in SUPER_MIRROR_OFFSETS {
        if offset + SUPER_INFO_SIZE <= size {
            zero_range(file, offset, SUPER_INFO_SIZE).map_err(wipe)?;
        }
    }
    let tail = size.saturating_sub(ZERO_DEV_BYTES);
    zero_range(file, tail, size - tail).map_err(wipe)?;
    file.sync_data().map_err(wipe)?;

    Ok(PreparedDevice { size, mixed })
}

/// Best effort: a device that cannot discard is still usable.
fn discard_device(file: &File, shown: &str, size: u64) {
    let probe = [0u64, 0u64];
    // SAFETY: BLKDISCARD reads two u64 values (start, length).
    if let Err(errno) = unsafe { ioctl::blk_discard(file.as_raw_fd(), &probe) } {
        debug!(device = %shown, %errno, "device does not support discard");
        return;
    }

    let mut start = 0;
    while start < size {
        let len = DISCARD_CHUNK.min(size - start);
        let range = [start, len];
        // SAFETY: as above.
        if let Err(errno) = unsafe { ioctl::blk_discard(file.as_raw_fd(), &range) } {
            warn!(device = %shown, start, len, %errno, "discard failed, continuing");
            return;
        }
        start += len;
    }
    info!(device = %shown, bytes = size, "discarded device");
}

fn zero_range(file: &File, offset: u64, len: u64) -> io::Result<()> {
    const CHUNK: usize = 64 * 1024;
    let zeros = vec![0u8; CHUNK];
    let mut written = 0;
    while written < len {
        let n = (len - written).min(CHUNK as u64) as usize;
        file.write_all_at(&zeros[..n], offset + written)?;
        written += n as u64;
    }
    Ok(())
}

/// Name of a recognized filesystem or swap signature on the device.
pub fn detect_signature(file: &File) -> Option<&'static str> {
    const CHECKS: [(u64, &[u8], &str); 6] = [
        (BTRFS_MAGIC_OFFSET, BTRFS_MAGIC, "btrfs"),
        (1024 + 56, &[0x53, 0xef], "ext2/ext3/ext4"),
        (0, b"XFSB", "xfs"),
        (4096 - 10, b"SWAPSPACE2", "swap"),
        (4096 - 10, b"SWAP-SPACE", "swap"),
        (512, b"EFI PART", "gpt partition table"),
    ];

    CHECKS.iter().find_map(|(offset, magic, name)| {
        let mut buf = vec![0u8; magic.len()];
        match file.read_exact_at(&mut buf, *offset) {
            Ok(()) if buf == *magic => Some(*name),
            _ => None,
        }
    })
}

fn parse_swaps(text: &str) -> Vec<PathBuf> {
    text.lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| PathBuf::from(crate::resolver::unescape_mount_field(name)))
        .collect()
}

fn is_listed(table: &Path, device: &Path, parse: impl Fn(&str) -> Vec<PathBuf>) -> bool {
    match fs::read_to_string(table) {
        Ok(text) => parse(&text).iter().any(|entry| same_file(entry, device)),
        Err(err) => {
            debug!(table = %table.display(), %err, "cannot read table, assuming device is unused");
            false
        }
    }
}
