// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `device ready`: ask whether a device's filesystem has all its members

use std::path::Path;

use btrfs_device_proto::DeviceName;
use nix::errno::Errno;
use tracing::debug;

use crate::error::DeviceError;
use crate::report::{Action, Failure, Report};
use crate::resolver::Resolver;

/// A non-negative driver answer becomes the exit status as is; its meaning
/// is defined by the driver, not by this tool.
pub fn run(
    resolver: &dyn Resolver,
    device: &Path,
    report: &mut Report<'_>,
) -> Result<(), DeviceError> {
    let mut control = resolver.resolve_control()?;
    let name = DeviceName::from_os_str(device);

    let errno = match control.devices_ready(&name) {
        Ok(code) if code >= 0 => {
            debug!(device = %name, code, "devices-ready answer");
            report.set_status(code);
            return Ok(());
        }
        Ok(code) => code.checked_neg().map_or(Errno::UnknownErrno, Errno::from_raw),
        Err(errno) => errno,
    };
    report.fail(Failure::new(
        Action::Ready,
        device.display().to_string(),
        DeviceError::Transport(errno),
    ));
    report.set_status(1);
    Ok(())
}
