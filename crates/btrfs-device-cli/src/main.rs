// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::io::{self, Write};

use btrfs_device_cli::Parser;
use btrfs_device_cli::cli::{Backends, Cli};
use btrfs_device_cli::config::ToolConfig;
use btrfs_device_cli::prepare::BlockDevicePreparer;
use btrfs_device_cli::probe::SystemProber;
use btrfs_device_cli::report::Report;
use btrfs_device_cli::resolver::SystemResolver;

#[allow(clippy::disallowed_methods)]
fn main() {
    let cli = Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();

    let config = match ToolConfig::load(cli.config.as_deref()) {
        Ok(config) => config.with_control_device(cli.control_device.clone()),
        Err(error) => {
            let _ = writeln!(err, "ERROR: {error}");
            return 1;
        }
    };

    if let Err(error) = cli.logging.clone().merged_with(&config.logging).init("btrfs-device") {
        let _ = writeln!(err, "ERROR: failed to initialize logging: {error:#}");
        return 1;
    }
    tracing::debug!(?config, "effective configuration");

    let resolver = SystemResolver::new(&config);
    let preparer = BlockDevicePreparer::new(&config);
    let prober = SystemProber::new(&config);
    let backends = Backends {
        resolver: &resolver,
        preparer: &preparer,
        prober: &prober,
        discard: config.discard,
    };

    let mut report = Report::new(&mut out, &mut err);
    if let Err(error) = cli.command.run(&backends, &mut report) {
        report.fatal(&error);
    }
    report.finish().exit_code()
}
