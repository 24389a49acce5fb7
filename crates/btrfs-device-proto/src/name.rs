// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Bounded device names
//!
//! The driver receives names in fixed-size, NUL-terminated buffers. A name
//! longer than the buffer is silently cut at the bound; no error is raised.
//! Every request that carries a name goes through [`BoundedName`] so the
//! same input always yields the same bytes on the wire, whichever verb
//! sent it.

use std::ffi::OsStr;
use std::fmt;
use std::os::unix::ffi::OsStrExt;

use crate::messages::{BTRFS_DEVICE_PATH_NAME_MAX, BTRFS_PATH_NAME_MAX};

/// A byte string of at most `MAX` bytes, without interior NUL.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BoundedName<const MAX: usize> {
    bytes: Vec<u8>,
}

/// Name carried by attach, detach, scan and ready requests.
pub type DeviceName = BoundedName<BTRFS_PATH_NAME_MAX>;

/// Member device path as reported by the driver's device-info request.
pub type DevicePath = BoundedName<BTRFS_DEVICE_PATH_NAME_MAX>;

impl<const MAX: usize> BoundedName<MAX> {
    pub const MAX_LEN: usize = MAX;

    /// Build a name from raw bytes, keeping at most `MAX` bytes and stopping
    /// at the first NUL, the way a C string copy into a fixed buffer would.
    pub fn truncate_from(raw: impl AsRef<[u8]>) -> Self {
        let raw = raw.as_ref();
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len()).min(MAX);
        Self {
            bytes: raw[..end].to_vec(),
        }
    }

    pub fn from_os_str(raw: impl AsRef<OsStr>) -> Self {
        Self::truncate_from(raw.as_ref().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_os_str(&self) -> &OsStr {
        OsStr::from_bytes(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy the name into `dst` and NUL-terminate it. `dst` must be at least
    /// `MAX + 1` bytes; any remaining bytes are zeroed.
    pub fn write_to(&self, dst: &mut [u8]) {
        debug_assert!(dst.len() > MAX);
        dst.fill(0);
        dst[..self.bytes.len()].copy_from_slice(&self.bytes);
    }
}

impl<const MAX: usize> fmt::Display for BoundedName<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

impl<const MAX: usize> fmt::Debug for BoundedName<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.bytes))
    }
}
