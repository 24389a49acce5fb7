// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error taxonomy for the device commands
//!
//! Fatal errors (`Usage`, `Access`, `ControlUnavailable`, `NoDevices`,
//! `Enumerate`, `Config`, `Discovery`, `Probe`) abort an invocation. The
//! rest are recorded per device and only affect the exit status;
//! [`crate::report::Report`] checks which kind it is handed.

use btrfs_device_proto::{DeviceOutcome, ProtocolError};
use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a candidate device cannot become a member.
#[derive(Error, Debug)]
pub enum PreparationError {
    #[error("{path} is a swap device")]
    SwapDevice { path: String },
    #[error("{path} is mounted")]
    Mounted { path: String },
    #[error(
        "{path} appears to contain an existing filesystem ({signature}).\nUse the -f option to force overwrite."
    )]
    AlreadyFormatted {
        path: String,
        signature: &'static str,
    },
    #[error("unable to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a block device")]
    NotBlockDevice { path: String },
    #[error("unable to determine size of {path}: {}", .source.desc())]
    SizeProbe {
        path: String,
        #[source]
        source: Errno,
    },
    #[error("{path} is too small ({size} bytes)")]
    TooSmall { path: String, size: u64 },
    #[error("failed to zero device '{path}': {source}")]
    Wipe {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("{0}")]
    Usage(String),
    #[error("can't access to '{}': {source}", .path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open {}: {source}", .path.display())]
    ControlUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Preparation(#[from] PreparationError),
    #[error("{0}")]
    Protocol(ProtocolError),
    #[error("{}", .0.desc())]
    Transport(Errno),
    #[error("getting dev info for devstats failed: {}", .0.desc())]
    Enumerate(Errno),
    #[error("no devices found")]
    NoDevices,
    #[error("invalid configuration {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },
    #[error("unable to enumerate block devices: {0}")]
    Discovery(#[source] io::Error),
    #[error("error {0} while scanning")]
    Probe(usize),
}

impl DeviceError {
    /// Split a device-table outcome into success or its error channel.
    pub fn check(outcome: DeviceOutcome) -> Result<(), DeviceError> {
        match outcome {
            DeviceOutcome::Ok => Ok(()),
            DeviceOutcome::Protocol(err) => Err(DeviceError::Protocol(err)),
            DeviceOutcome::Transport(errno) => Err(DeviceError::Transport(errno)),
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            DeviceError::Preparation(_) | DeviceError::Protocol(_) | DeviceError::Transport(_)
        )
    }
}
