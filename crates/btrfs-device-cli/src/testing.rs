// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory driver used by the flow tests
//!
//! One [`FakeSystem`] stands in for the resolver, the preparer and the
//! prober at once. Every request that reaches it is appended to
//! [`DriverState::requests`] so tests can assert on order and count.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use btrfs_device_proto::{
    BTRFS_DEV_STAT_VALUES_MAX, DeviceInfo, DeviceName, DeviceOutcome, DevicePath, DeviceStats,
    FsInfo, ProtocolError, StatsQuery,
};
use nix::errno::Errno;

use crate::control::{ControlEndpoint, FilesystemControl};
use crate::error::{DeviceError, PreparationError};
use crate::prepare::{DevicePreparer, PrepareOptions, PreparedDevice};
use crate::probe::{DeviceProber, ProbeSource};
use crate::resolver::Resolver;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    OpenFilesystem(PathBuf),
    OpenControl,
    Close,
    Prepare(PathBuf),
    Attach(DeviceName),
    Detach(DeviceName),
    Scan(DeviceName),
    Ready(DeviceName),
    FsInfo,
    DeviceInfo(u64),
    Stats(StatsQuery),
    Discover(ProbeSource),
}

pub struct FakeMember {
    pub devid: u64,
    pub path: &'static str,
    pub nr_items: u64,
    pub values: [u64; BTRFS_DEV_STAT_VALUES_MAX],
}

#[derive(Default)]
pub struct DriverState {
    pub requests: Vec<Request>,
    pub attached: Vec<DeviceName>,
    pub members: Vec<FakeMember>,
    /// Highest device id; defaults to the highest member id.
    pub max_id: Option<u64>,
    /// Paths whose preparation fails.
    pub unsuitable: HashSet<PathBuf>,
    /// Device names whose requests fail with a transport error.
    pub transport_failures: HashMap<String, Errno>,
    /// Device ids whose stats request fails.
    pub stats_failures: HashSet<u64>,
    pub ready_answer: Option<Result<i32, Errno>>,
    pub discovered: Vec<PathBuf>,
    pub filesystem_missing: bool,
    pub control_missing: bool,
}

#[derive(Clone, Default)]
pub struct FakeSystem {
    pub state: Rc<RefCell<DriverState>>,
}

impl FakeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.borrow().requests.clone()
    }

    pub fn attached(&self) -> Vec<DeviceName> {
        self.state.borrow().attached.clone()
    }

    pub fn count(&self, matches: impl Fn(&Request) -> bool) -> usize {
        self.state.borrow().requests.iter().filter(|r| matches(r)).count()
    }

    fn handle(&self) -> FakeHandle {
        FakeHandle {
            state: Rc::clone(&self.state),
        }
    }
}

impl Resolver for FakeSystem {
    fn resolve_path_or_device(
        &self,
        path: &Path,
    ) -> Result<Box<dyn FilesystemControl>, DeviceError> {
        let mut state = self.state.borrow_mut();
        if state.filesystem_missing {
            return Err(DeviceError::Access {
                path: path.to_path_buf(),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        state.requests.push(Request::OpenFilesystem(path.to_path_buf()));
        drop(state);
        Ok(Box::new(self.handle()))
    }

    fn resolve_control(&self) -> Result<Box<dyn ControlEndpoint>, DeviceError> {
        let mut state = self.state.borrow_mut();
        if state.control_missing {
            return Err(DeviceError::ControlUnavailable {
                path: PathBuf::from("/dev/btrfs-control"),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        state.requests.push(Request::OpenControl);
        drop(state);
        Ok(Box::new(self.handle()))
    }
}

impl DevicePreparer for FakeSystem {
    fn prepare(
        &self,
        path: &Path,
        _options: &PrepareOptions,
    ) -> Result<PreparedDevice, PreparationError> {
        let mut state = self.state.borrow_mut();
        state.requests.push(Request::Prepare(path.to_path_buf()));
        if state.unsuitable.contains(path) {
            return Err(PreparationError::AlreadyFormatted {
                path: path.display().to_string(),
                signature: "btrfs",
            });
        }
        Ok(PreparedDevice {
            size: 1 << 34,
            mixed: false,
        })
    }
}

impl DeviceProber for FakeSystem {
    fn discover(&self, source: ProbeSource) -> io::Result<Vec<PathBuf>> {
        let mut state = self.state.borrow_mut();
        state.requests.push(Request::Discover(source));
        Ok(state.discovered.clone())
    }
}

struct FakeHandle {
    state: Rc<RefCell<DriverState>>,
}

impl FakeHandle {
    fn transport_failure(state: &DriverState, name: &DeviceName) -> Option<Errno> {
        state.transport_failures.get(&name.to_string()).copied()
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.state.borrow_mut().requests.push(Request::Close);
    }
}

impl FilesystemControl for FakeHandle {
    fn add_device(&mut self, name: &DeviceName) -> DeviceOutcome {
        let mut state = self.state.borrow_mut();
        state.requests.push(Request::Attach(name.clone()));
        if let Some(errno) = Self::transport_failure(&state, name) {
            return DeviceOutcome::Transport(errno);
        }
        state.attached.push(name.clone());
        DeviceOutcome::Ok
    }

    fn remove_device(&mut self, name: &DeviceName) -> DeviceOutcome {
        let mut state = self.state.borrow_mut();
        state.requests.push(Request::Detach(name.clone()));
        if let Some(errno) = Self::transport_failure(&state, name) {
            return DeviceOutcome::Transport(errno);
        }
        match state.attached.iter().position(|attached| attached == name) {
            Some(index) => {
                state.attached.remove(index);
                DeviceOutcome::Ok
            }
            None => DeviceOutcome::Protocol(ProtocolError::MissingNotFound),
        }
    }

    fn fs_info(&mut self) -> Result<FsInfo, Errno> {
        let mut state = self.state.borrow_mut();
        state.requests.push(Request::FsInfo);
        let highest = state.members.iter().map(|m| m.devid).max().unwrap_or(0);
        Ok(FsInfo {
            max_id: state.max_id.unwrap_or(highest),
            num_devices: state.members.len() as u64,
            fsid: [0xaa; 16],
        })
    }

    fn device_info(&mut self, devid: u64) -> Result<DeviceInfo, Errno> {
        let mut state = self.state.borrow_mut();
        state.requests.push(Request::DeviceInfo(devid));
        state
            .members
            .iter()
            .find(|m| m.devid == devid)
            .map(|m| DeviceInfo {
                devid,
                uuid: [0; 16],
                bytes_used: 0,
                total_bytes: 1 << 30,
                path: DevicePath::truncate_from(m.path),
            })
            .ok_or(Errno::ENODEV)
    }

    fn device_stats(&mut self, query: &StatsQuery) -> Result<DeviceStats, Errno> {
        let mut state = self.state.borrow_mut();
        state.requests.push(Request::Stats(*query));
        if state.stats_failures.contains(&query.devid) {
            return Err(Errno::EIO);
        }
        let member = state
            .members
            .iter_mut()
            .find(|m| m.devid == query.devid)
            .ok_or(Errno::ENODEV)?;
        let stats = DeviceStats {
            devid: member.devid,
            nr_items: member.nr_items.min(query.max_slots),
            values: member.values,
        };
        if query.reset {
            member.values = [0; BTRFS_DEV_STAT_VALUES_MAX];
        }
        Ok(stats)
    }
}

impl ControlEndpoint for FakeHandle {
    fn scan_device(&mut self, name: &DeviceName) -> DeviceOutcome {
        let mut state = self.state.borrow_mut();
        state.requests.push(Request::Scan(name.clone()));
        match Self::transport_failure(&state, name) {
            Some(errno) => DeviceOutcome::Transport(errno),
            None => DeviceOutcome::Ok,
        }
    }

    fn devices_ready(&mut self, name: &DeviceName) -> Result<i32, Errno> {
        let mut state = self.state.borrow_mut();
        state.requests.push(Request::Ready(name.clone()));
        state.ready_answer.unwrap_or(Ok(0))
    }
}

/// Captured stdout and stderr of one flow run.
pub struct Captured {
    pub out: String,
    pub err: String,
    pub exit_code: i32,
}

/// Run `flow` against a fresh report; a fatal error is reported the way
/// `main` does it.
pub fn capture(
    flow: impl FnOnce(&mut crate::report::Report<'_>) -> Result<(), DeviceError>,
) -> Captured {
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let mut report = crate::report::Report::new(&mut out, &mut err);
    if let Err(error) = flow(&mut report) {
        report.fatal(&error);
    }
    let exit_code = report.finish().exit_code();
    Captured {
        out: String::from_utf8_lossy(&out).into_owned(),
        err: String::from_utf8_lossy(&err).into_owned(),
        exit_code,
    }
}
