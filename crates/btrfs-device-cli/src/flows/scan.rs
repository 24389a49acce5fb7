// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `device scan`: register devices with the control endpoint
//!
//! With explicit paths, each one is registered in order and the first
//! transport failure ends the run. Without paths, candidate devices are
//! discovered first and every btrfs member found is registered.

use std::path::{Path, PathBuf};

use btrfs_device_proto::{DeviceName, DeviceOutcome};
use tracing::{debug, warn};

use super::{best_effort, fail_fast};
use crate::control::ControlEndpoint;
use crate::error::DeviceError;
use crate::probe::{DeviceProber, ProbeSource};
use crate::report::{Action, Failure, Report};
use crate::resolver::Resolver;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanMode {
    /// Probe every block device node.
    AllDevices,
    /// Register the given paths; an empty list probes the partition table.
    Explicit(Vec<PathBuf>),
}

pub fn run(
    resolver: &dyn Resolver,
    prober: &dyn DeviceProber,
    mode: &ScanMode,
    report: &mut Report<'_>,
) -> Result<(), DeviceError> {
    match mode {
        ScanMode::AllDevices => probe_all(resolver, prober, ProbeSource::DeviceNodes, report),
        ScanMode::Explicit(devices) if devices.is_empty() => {
            probe_all(resolver, prober, ProbeSource::Partitions, report)
        }
        ScanMode::Explicit(devices) => scan_each(resolver, devices, report),
    }
}

fn scan_each(
    resolver: &dyn Resolver,
    devices: &[PathBuf],
    report: &mut Report<'_>,
) -> Result<(), DeviceError> {
    let mut control = resolver.resolve_control()?;

    let completed = fail_fast(devices, report, |device, report| {
        report.line(format!("Scanning for Btrfs filesystems in '{}'", device.display()));
        match control.scan_device(&DeviceName::from_os_str(device)) {
            DeviceOutcome::Ok => Ok(()),
            // Only transport failures are fatal here.
            DeviceOutcome::Protocol(code) => {
                warn!(device = %device.display(), %code, "scan reported a driver code");
                Ok(())
            }
            DeviceOutcome::Transport(errno) => Err(Failure::new(
                Action::Scan,
                device.display().to_string(),
                DeviceError::Transport(errno),
            )),
        }
    });
    debug!(completed, "explicit scan finished");
    Ok(())
}

fn probe_all(
    resolver: &dyn Resolver,
    prober: &dyn DeviceProber,
    source: ProbeSource,
    report: &mut Report<'_>,
) -> Result<(), DeviceError> {
    let mut control = resolver.resolve_control()?;
    report.line("Scanning for Btrfs filesystems");

    let candidates = prober.discover(source).map_err(DeviceError::Discovery)?;
    debug!(?source, members = candidates.len(), "registering discovered devices");

    let failed = best_effort(&candidates, report, |device, _| {
        register(control.as_mut(), device)
    });
    if failed > 0 {
        return Err(DeviceError::Probe(failed));
    }
    Ok(())
}

fn register(control: &mut dyn ControlEndpoint, device: &Path) -> Result<(), Failure> {
    DeviceError::check(control.scan_device(&DeviceName::from_os_str(device)))
        .map_err(|err| Failure::new(Action::Register, device.display().to_string(), err))
}
