// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `device delete`: detach devices by name

use std::path::{Path, PathBuf};

use btrfs_device_proto::DeviceName;
use tracing::info;

use super::best_effort;
use crate::error::DeviceError;
use crate::report::{Action, Failure, Report};
use crate::resolver::Resolver;

/// Detach every name in `devices` from the filesystem at `target`, given as
/// its mount point or one of its member devices.
/// Driver protocol codes and transport errors are reported separately.
pub fn run(
    resolver: &dyn Resolver,
    devices: &[PathBuf],
    target: &Path,
    report: &mut Report<'_>,
) -> Result<(), DeviceError> {
    let mut fs = resolver.resolve_path_or_device(target)?;

    best_effort(devices, report, |device, _| {
        let name = DeviceName::from_os_str(device);
        DeviceError::check(fs.remove_device(&name))
            .map_err(|err| Failure::new(Action::Remove, device.display().to_string(), err))?;
        info!(device = %name, target = %target.display(), "device detached");
        Ok(())
    });
    Ok(())
}
