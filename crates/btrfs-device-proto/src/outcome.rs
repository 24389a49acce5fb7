// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-device request outcomes
//!
//! Device-table requests report failure on two separate channels: a positive
//! return value is a driver-defined protocol code, a negative return value
//! means the request itself failed and errno says why. The two are kept as
//! distinct variants so they are never rendered through the same table.

use nix::errno::Errno;
use std::fmt;
use thiserror::Error;

/// Driver-defined failure codes for device-table mutations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unable to go below two devices on raid1")]
    Raid1MinNotMet,
    #[error("unable to go below four devices on raid10")]
    Raid10MinNotMet,
    #[error("unable to go below two devices on raid5")]
    Raid5MinNotMet,
    #[error("unable to go below three devices on raid6")]
    Raid6MinNotMet,
    #[error("unable to remove the dev_replace target dev")]
    ReplaceTarget,
    #[error("no missing devices found to remove")]
    MissingNotFound,
    #[error("unable to remove the only writeable device")]
    OnlyWritable,
    #[error("add/delete/balance/replace/resize operation in progress")]
    ExclusiveOpInProgress,
    #[error("unknown error {0}")]
    Unknown(i32),
}

impl ProtocolError {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Raid1MinNotMet,
            2 => Self::Raid10MinNotMet,
            3 => Self::Raid5MinNotMet,
            4 => Self::Raid6MinNotMet,
            5 => Self::ReplaceTarget,
            6 => Self::MissingNotFound,
            7 => Self::OnlyWritable,
            8 => Self::ExclusiveOpInProgress,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Raid1MinNotMet => 1,
            Self::Raid10MinNotMet => 2,
            Self::Raid5MinNotMet => 3,
            Self::Raid6MinNotMet => 4,
            Self::ReplaceTarget => 5,
            Self::MissingNotFound => 6,
            Self::OnlyWritable => 7,
            Self::ExclusiveOpInProgress => 8,
            Self::Unknown(code) => *code,
        }
    }
}

/// Result of one device-level request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOutcome {
    Ok,
    Protocol(ProtocolError),
    Transport(Errno),
}

impl DeviceOutcome {
    /// Classify the raw result of a device-table ioctl.
    pub fn from_ioctl(result: nix::Result<libc::c_int>) -> Self {
        match result {
            Ok(0) => Self::Ok,
            Ok(code) if code > 0 => Self::Protocol(ProtocolError::from_code(code)),
            // A negative value that is not -1 never reaches userspace from
            // the ioctl path; treat it as a transport failure all the same.
            Ok(code) => {
                Self::Transport(code.checked_neg().map_or(Errno::UnknownErrno, Errno::from_raw))
            }
            Err(errno) => Self::Transport(errno),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for DeviceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Protocol(err) => write!(f, "{err}"),
            Self::Transport(errno) => write!(f, "{}", errno.desc()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_success() {
        assert_eq!(DeviceOutcome::from_ioctl(Ok(0)), DeviceOutcome::Ok);
        assert!(DeviceOutcome::Ok.is_ok());
    }

    #[test]
    fn positive_codes_are_protocol_errors() {
        let outcome = DeviceOutcome::from_ioctl(Ok(6));
        assert_eq!(
            outcome,
            DeviceOutcome::Protocol(ProtocolError::MissingNotFound)
        );
        assert_eq!(outcome.to_string(), "no missing devices found to remove");
    }

    #[test]
    fn errno_is_a_transport_error() {
        let outcome = DeviceOutcome::from_ioctl(Err(Errno::ENOENT));
        assert_eq!(outcome, DeviceOutcome::Transport(Errno::ENOENT));
        assert_eq!(outcome.to_string(), Errno::ENOENT.desc());
    }

    #[test]
    fn negative_returns_map_to_errno() {
        assert_eq!(
            DeviceOutcome::from_ioctl(Ok(-libc::EBUSY)),
            DeviceOutcome::Transport(Errno::EBUSY)
        );
        assert_eq!(
            DeviceOutcome::from_ioctl(Ok(i32::MIN)),
            DeviceOutcome::Transport(Errno::UnknownErrno)
        );
    }

    #[test]
    fn unknown_protocol_codes_keep_their_value() {
        let err = ProtocolError::from_code(42);
        assert_eq!(err, ProtocolError::Unknown(42));
        assert_eq!(err.code(), 42);
        assert_eq!(err.to_string(), "unknown error 42");
    }

    #[test]
    fn known_codes_round_trip() {
        for code in 1..=8 {
            assert_eq!(ProtocolError::from_code(code).code(), code);
        }
    }
}
