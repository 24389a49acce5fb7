// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! User-facing output and exit status aggregation
//!
//! Report lines go to stdout as they are produced. Per-device failures are
//! printed to stderr immediately and also kept, so the invocation's exit
//! status can reflect them once every device has been processed.

use std::fmt;
use std::io::Write;

use crate::error::DeviceError;

/// Which request a per-device failure belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Prepare,
    Add,
    Remove,
    Scan,
    Register,
    Ready,
    Stats,
}

#[derive(Debug)]
pub struct Failure {
    pub action: Action,
    pub device: String,
    pub error: DeviceError,
}

impl Failure {
    pub fn new(action: Action, device: impl Into<String>, error: impl Into<DeviceError>) -> Self {
        Self {
            action,
            device: device.into(),
            error: error.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let device = &self.device;
        let error = &self.error;
        match self.action {
            Action::Prepare => write!(f, "{error}"),
            Action::Add => write!(f, "error adding the device '{device}' - {error}"),
            Action::Remove => write!(f, "error removing the device '{device}' - {error}"),
            Action::Scan => write!(f, "unable to scan the device '{device}' - {error}"),
            Action::Register => write!(f, "device scan failed '{device}' - {error}"),
            Action::Ready => write!(
                f,
                "unable to determine if the device '{device}' is ready for mounting - {error}"
            ),
            Action::Stats => write!(f, "ioctl(GET_DEV_STATS) on {device} failed: {error}"),
        }
    }
}

pub struct Report<'a> {
    out: &'a mut dyn Write,
    err: &'a mut dyn Write,
    failures: Vec<Failure>,
    status: Option<i32>,
}

impl<'a> Report<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self {
            out,
            err,
            failures: Vec::new(),
            status: None,
        }
    }

    pub fn line(&mut self, line: impl AsRef<str>) {
        // A closed stdout is not a device failure.
        let _ = writeln!(self.out, "{}", line.as_ref());
    }

    /// Record a per-device failure; the invocation carries on.
    pub fn fail(&mut self, failure: Failure) {
        debug_assert!(
            !failure.error.is_fatal(),
            "fatal error recorded as a device failure: {}",
            failure.error
        );
        tracing::debug!(
            device = %failure.device,
            action = ?failure.action,
            error = %failure.error,
            "device request failed"
        );
        let _ = writeln!(self.err, "ERROR: {failure}");
        self.failures.push(failure);
    }

    /// Report an error that aborted the invocation.
    pub fn fatal(&mut self, error: &DeviceError) {
        debug_assert!(error.is_fatal(), "device failure reported as fatal: {error}");
        tracing::debug!(%error, "command aborted");
        let _ = writeln!(self.err, "ERROR: {error}");
        self.status = Some(1);
    }

    /// Override the exit status with a value the driver returned.
    pub fn set_status(&mut self, status: i32) {
        self.status = Some(status);
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn finish(self) -> Summary {
        let _ = self.out.flush();
        Summary {
            failures: self.failures,
            status: self.status,
        }
    }
}

#[derive(Debug)]
pub struct Summary {
    pub failures: Vec<Failure>,
    status: Option<i32>,
}

impl Summary {
    pub fn exit_code(&self) -> i32 {
        match self.status {
            Some(status) => status,
            None if self.failures.is_empty() => 0,
            None => 1,
        }
    }
}
