// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `device stats`: per-device I/O error counters

use std::path::Path;

use btrfs_device_proto::{StatsQuery, render_stats};
use tracing::{debug, warn};

use super::best_effort;
use crate::control::enumerate_devices;
use crate::error::DeviceError;
use crate::report::{Action, Failure, Report};
use crate::resolver::Resolver;

/// Print the counters of every member of the filesystem at `path`, which
/// may be a mount point or one of its member devices. With `reset`, each
/// device's counters are zeroed by the same request that reads them.
pub fn run(
    resolver: &dyn Resolver,
    path: &Path,
    reset: bool,
    report: &mut Report<'_>,
) -> Result<(), DeviceError> {
    let mut fs = resolver.resolve_path_or_device(path)?;
    let (info, devices) = enumerate_devices(fs.as_mut()).map_err(DeviceError::Enumerate)?;
    if info.num_devices == 0 {
        return Err(DeviceError::NoDevices);
    }
    if (devices.len() as u64) < info.num_devices {
        warn!(
            expected = info.num_devices,
            found = devices.len(),
            "fewer devices than the filesystem reports"
        );
    }

    best_effort(&devices, report, |device, report| {
        let stats = fs
            .device_stats(&StatsQuery::new(device.devid, reset))
            .map_err(|errno| {
                Failure::new(Action::Stats, device.path.to_string(), DeviceError::Transport(errno))
            })?;
        debug!(devid = device.devid, populated = stats.nr_items, "counters read");
        for line in render_stats(&device.path, &stats) {
            report.line(line);
        }
        Ok(())
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeMember, FakeSystem, Request, capture};
    use nix::errno::Errno;

    fn member(devid: u64, path: &'static str, nr_items: u64) -> FakeMember {
        FakeMember {
            devid,
            path,
            nr_items,
            values: [devid * 10, devid * 10 + 1, devid * 10 + 2, devid * 10 + 3, devid * 10 + 4],
        }
    }

    fn stats_requests(system: &FakeSystem) -> Vec<StatsQuery> {
        system
            .requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Stats(query) => Some(query),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn renders_only_populated_counters() {
        let system = FakeSystem::new();
        system.state.borrow_mut().members = vec![member(1, "/dev/vdb", 3)];

        let result = capture(|report| run(&system, Path::new("/mnt/fs"), false, report));

        assert_eq!(result.exit_code, 0);
        assert_eq!(
            result.out,
            "[/dev/vdb].write_io_errs   10\n\
             [/dev/vdb].read_io_errs    11\n\
             [/dev/vdb].flush_io_errs   12\n"
        );
    }

    #[test]
    fn walks_members_across_id_holes() {
        let system = FakeSystem::new();
        system.state.borrow_mut().members =
            vec![member(1, "/dev/vdb", 5), member(4, "/dev/vde", 5)];

        let result = capture(|report| run(&system, Path::new("/mnt/fs"), false, report));

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.out.lines().count(), 10);
        let ids: Vec<u64> = stats_requests(&system).iter().map(|q| q.devid).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn reset_rides_on_the_single_read_request() {
        let system = FakeSystem::new();
        system.state.borrow_mut().members = vec![member(1, "/dev/vdb", 5)];

        let result = capture(|report| run(&system, Path::new("/mnt/fs"), true, report));

        assert_eq!(result.exit_code, 0);
        let queries = stats_requests(&system);
        assert_eq!(queries.len(), 1);
        assert!(queries[0].reset);
        // The values printed are the ones read before the reset.
        assert!(result.out.starts_with("[/dev/vdb].write_io_errs   10\n"));
        assert_eq!(system.state.borrow().members[0].values, [0; 5]);
    }

    #[test]
    fn failing_device_does_not_hide_the_others() {
        let system = FakeSystem::new();
        {
            let mut state = system.state.borrow_mut();
            state.members = vec![member(1, "/dev/vdb", 5), member(2, "/dev/vdc", 5)];
            state.stats_failures.insert(1);
        }

        let result = capture(|report| run(&system, Path::new("/mnt/fs"), false, report));

        assert_eq!(result.exit_code, 1);
        assert_eq!(
            result.err,
            format!(
                "ERROR: ioctl(GET_DEV_STATS) on /dev/vdb failed: {}\n",
                Errno::EIO.desc()
            )
        );
        assert_eq!(result.out.lines().count(), 5);
        assert!(result.out.starts_with("[/dev/vdc]"));
    }

    #[test]
    fn empty_filesystem_reports_no_devices() {
        let system = FakeSystem::new();
        let result = capture(|report| run(&system, Path::new("/mnt/fs"), false, report));
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.err, "ERROR: no devices found\n");
        assert!(stats_requests(&system).is_empty());
    }

    #[test]
    fn unreachable_path_is_fatal() {
        let system = FakeSystem::new();
        system.state.borrow_mut().filesystem_missing = true;
        let result = capture(|report| run(&system, Path::new("/mnt/gone"), false, report));
        assert_eq!(result.exit_code, 1);
        assert!(result.out.is_empty());
        assert!(system.requests().is_empty());
    }
}
