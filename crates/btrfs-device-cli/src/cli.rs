// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Command-line grammar and dispatch

use std::path::PathBuf;

use btrfs_device_logging::CliLoggingArgs;
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use crate::error::DeviceError;
use crate::flows::{self, scan::ScanMode};
use crate::prepare::{DevicePreparer, PrepareOptions};
use crate::probe::DeviceProber;
use crate::report::Report;
use crate::resolver::Resolver;

#[derive(Parser, Debug)]
#[command(
    name = "btrfs-device",
    author,
    version,
    about = "Manage the member devices of a btrfs filesystem"
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path of the btrfs control device
    #[arg(long, global = true, env = "BTRFS_DEVICE_CONTROL", value_name = "PATH")]
    pub control_device: Option<PathBuf>,

    #[command(flatten)]
    pub logging: CliLoggingArgs,

    #[command(subcommand)]
    pub command: DeviceCommand,
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    /// Add one or more devices to a mounted filesystem
    Add(AddArgs),
    /// Remove one or more devices from a mounted filesystem
    Delete(DeleteArgs),
    /// Scan devices for btrfs filesystems
    Scan(ScanArgs),
    /// Check whether all devices of a filesystem are present
    Ready(ReadyArgs),
    /// Show I/O error counters for every device of a filesystem
    Stats(StatsArgs),
}

/// Arguments for `add`
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Do not discard the devices before adding them
    #[arg(short = 'K', long = "nodiscard")]
    pub nodiscard: bool,

    /// Overwrite an existing filesystem on the devices
    #[arg(short, long)]
    pub force: bool,

    /// Devices to add, followed by the mount point or a member device
    #[arg(value_name = "DEVICE... PATH", num_args = 2.., required = true)]
    pub paths: Vec<PathBuf>,
}

/// Arguments for `delete`
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Devices to remove, followed by the mount point or a member device
    #[arg(value_name = "DEVICE... PATH", num_args = 2.., required = true)]
    pub paths: Vec<PathBuf>,
}

/// Arguments for `scan`
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Probe every block device node instead of the partition table
    #[arg(long, conflicts_with = "devices")]
    pub all_devices: bool,

    /// Devices to register
    #[arg(value_name = "DEVICE")]
    pub devices: Vec<PathBuf>,
}

/// Arguments for `ready`
#[derive(Args, Debug)]
pub struct ReadyArgs {
    /// Device to check; only the last one given is used
    #[arg(value_name = "DEVICE", num_args = 1.., required = true)]
    pub devices: Vec<PathBuf>,
}

/// Arguments for `stats`
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Reset the counters after reading them
    #[arg(short = 'z')]
    pub reset: bool,

    /// Mount point or member device
    #[arg(value_name = "PATH|DEVICE")]
    pub path: PathBuf,
}

/// Everything a command needs from the outside world.
pub struct Backends<'a> {
    pub resolver: &'a dyn Resolver,
    pub preparer: &'a dyn DevicePreparer,
    pub prober: &'a dyn DeviceProber,
    /// Configured discard default; `-K` turns it off.
    pub discard: bool,
}

/// `paths` minus its last element, and that element.
fn split_target(paths: &[PathBuf]) -> Result<(&[PathBuf], &PathBuf), DeviceError> {
    match paths.split_last() {
        Some((target, devices)) if !devices.is_empty() => Ok((devices, target)),
        _ => Err(DeviceError::Usage(
            "at least one device and the target filesystem are required".into(),
        )),
    }
}

impl AddArgs {
    pub fn run(&self, backends: &Backends<'_>, report: &mut Report<'_>) -> Result<(), DeviceError> {
        let (devices, target) = split_target(&self.paths)?;
        let options = PrepareOptions {
            force: self.force,
            discard: backends.discard && !self.nodiscard,
        };
        flows::add::run(backends.resolver, backends.preparer, devices, target, &options, report)
    }
}

impl DeleteArgs {
    pub fn run(&self, backends: &Backends<'_>, report: &mut Report<'_>) -> Result<(), DeviceError> {
        let (devices, target) = split_target(&self.paths)?;
        flows::remove::run(backends.resolver, devices, target, report)
    }
}

impl ScanArgs {
    pub fn mode(&self) -> ScanMode {
        if self.all_devices {
            ScanMode::AllDevices
        } else {
            ScanMode::Explicit(self.devices.clone())
        }
    }

    pub fn run(&self, backends: &Backends<'_>, report: &mut Report<'_>) -> Result<(), DeviceError> {
        flows::scan::run(backends.resolver, backends.prober, &self.mode(), report)
    }
}

impl ReadyArgs {
    pub fn run(&self, backends: &Backends<'_>, report: &mut Report<'_>) -> Result<(), DeviceError> {
        let Some((device, ignored)) = self.devices.split_last() else {
            return Err(DeviceError::Usage("a device is required".into()));
        };
        if !ignored.is_empty() {
            warn!(
                ignored = ignored.len(),
                device = %device.display(),
                "only the last device is checked"
            );
        }
        flows::ready::run(backends.resolver, device, report)
    }
}

impl StatsArgs {
    pub fn run(&self, backends: &Backends<'_>, report: &mut Report<'_>) -> Result<(), DeviceError> {
        flows::stats::run(backends.resolver, &self.path, self.reset, report)
    }
}

impl DeviceCommand {
    pub fn run(&self, backends: &Backends<'_>, report: &mut Report<'_>) -> Result<(), DeviceError> {
        match self {
            DeviceCommand::Add(args) => args.run(backends, report),
            DeviceCommand::Delete(args) => args.run(backends, report),
            DeviceCommand::Scan(args) => args.run(backends, report),
            DeviceCommand::Ready(args) => args.run(backends, report),
            DeviceCommand::Stats(args) => args.run(backends, report),
        }
    }
}
