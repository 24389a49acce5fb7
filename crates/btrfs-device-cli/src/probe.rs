// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Block device discovery for filesystem-wide scans

use std::fs::{self, File};
use std::io;
use std::os::unix::fs::{FileExt, FileTypeExt};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ToolConfig;
use crate::prepare::{BTRFS_MAGIC, BTRFS_MAGIC_OFFSET};

/// Where discovery looks for candidate devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeSource {
    /// Devices listed in the kernel partition table.
    Partitions,
    /// Every block node under the device directory.
    DeviceNodes,
}

#[cfg_attr(test, mockall::automock)]
pub trait DeviceProber {
    /// Devices from `source` that carry a btrfs superblock.
    fn discover(&self, source: ProbeSource) -> io::Result<Vec<PathBuf>>;
}

pub struct SystemProber {
    partitions_file: PathBuf,
    dev_dir: PathBuf,
}

impl SystemProber {
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            partitions_file: config.partitions_file.clone(),
            dev_dir: config.dev_dir.clone(),
        }
    }
}

impl DeviceProber for SystemProber {
    fn discover(&self, source: ProbeSource) -> io::Result<Vec<PathBuf>> {
        let candidates = match source {
            ProbeSource::Partitions => {
                let table = fs::read_to_string(&self.partitions_file)?;
                parse_partitions(&table)
                    .into_iter()
                    .map(|name| self.dev_dir.join(name))
                    .collect()
            }
            ProbeSource::DeviceNodes => {
                let mut found = Vec::new();
                collect_block_nodes(&self.dev_dir, &mut found)?;
                found
            }
        };
        debug!(?source, candidates = candidates.len(), "probing candidates");

        Ok(candidates.into_iter().filter(|path| has_btrfs_superblock(path)).collect())
    }
}

/// Device names from a `/proc/partitions` style table.
pub fn parse_partitions(table: &str) -> Vec<String> {
    table
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [major, _minor, _blocks, name] if major.parse::<u32>().is_ok() => {
                    Some((*name).to_string())
                }
                _ => None,
            }
        })
        .collect()
}

fn collect_block_nodes(dir: &Path, found: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        // Symlinks are not followed, so aliases under /dev/disk/* are not
        // registered twice.
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if let Err(err) = collect_block_nodes(&entry.path(), found) {
                debug!(dir = %entry.path().display(), %err, "skipping unreadable directory");
            }
        } else if file_type.is_block_device() {
            found.push(entry.path());
        }
    }
    Ok(())
}

/// Unreadable candidates are treated as non-members.
pub fn has_btrfs_superblock(path: &Path) -> bool {
    let mut magic = [0u8; 8];
    match File::open(path).and_then(|file| file.read_exact_at(&mut magic, BTRFS_MAGIC_OFFSET)) {
        Ok(()) => &magic == BTRFS_MAGIC,
        Err(err) => {
            debug!(device = %path.display(), %err, "skipping unreadable candidate");
            false
        }
    }
}
