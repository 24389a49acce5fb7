// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `device add`: prepare each candidate, then attach it

use std::path::{Path, PathBuf};

use btrfs_device_proto::DeviceName;
use tracing::{debug, info};

use super::best_effort;
use crate::error::DeviceError;
use crate::prepare::{DevicePreparer, PrepareOptions};
use crate::report::{Action, Failure, Report};
use crate::resolver::Resolver;

/// Attach `devices` to the filesystem at `target`, which may be its mount
/// point or one of its member devices.
///
/// A device that fails preparation is never attached; the remaining
/// devices are still processed.
pub fn run(
    resolver: &dyn Resolver,
    preparer: &dyn DevicePreparer,
    devices: &[PathBuf],
    target: &Path,
    options: &PrepareOptions,
    report: &mut Report<'_>,
) -> Result<(), DeviceError> {
    let mut fs = resolver.resolve_path_or_device(target)?;
    debug!(target = %target.display(), devices = devices.len(), ?options, "adding devices");

    let failed = best_effort(devices, report, |device, _| {
        let shown = device.display().to_string();
        preparer
            .prepare(device, options)
            .map_err(|err| Failure::new(Action::Prepare, shown.as_str(), err))?;

        let name = DeviceName::from_os_str(device);
        DeviceError::check(fs.add_device(&name))
            .map_err(|err| Failure::new(Action::Add, shown.as_str(), err))?;
        info!(device = %name, target = %target.display(), "device attached");
        Ok(())
    });
    debug!(failed, "add finished");
    Ok(())
}
