// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Tool configuration
//!
//! Built-in defaults, optionally overlaid by a TOML file given with
//! `--config`, then by environment and command line (handled by clap).
//! Nothing is ever written back.

use std::fs;
use std::path::{Path, PathBuf};

use btrfs_device_logging::LoggingConfig;
use serde::Deserialize;

use crate::error::DeviceError;

pub const DEFAULT_CONTROL_DEVICE: &str = "/dev/btrfs-control";
pub const DEFAULT_PARTITIONS_FILE: &str = "/proc/partitions";
pub const DEFAULT_DEV_DIR: &str = "/dev";
pub const DEFAULT_MOUNTS_FILE: &str = "/proc/self/mounts";
pub const DEFAULT_SWAPS_FILE: &str = "/proc/swaps";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub control_device: PathBuf,
    pub partitions_file: PathBuf,
    pub dev_dir: PathBuf,
    pub mounts_file: PathBuf,
    pub swaps_file: PathBuf,
    /// Discard new members before attaching them unless `-K` is given.
    pub discard: bool,
    pub logging: LoggingConfig,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            control_device: PathBuf::from(DEFAULT_CONTROL_DEVICE),
            partitions_file: PathBuf::from(DEFAULT_PARTITIONS_FILE),
            dev_dir: PathBuf::from(DEFAULT_DEV_DIR),
            mounts_file: PathBuf::from(DEFAULT_MOUNTS_FILE),
            swaps_file: PathBuf::from(DEFAULT_SWAPS_FILE),
            discard: true,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct ConfigFile {
    control_device: Option<PathBuf>,
    partitions_file: Option<PathBuf>,
    dev_dir: Option<PathBuf>,
    mounts_file: Option<PathBuf>,
    swaps_file: Option<PathBuf>,
    discard: Option<bool>,
    #[serde(default)]
    logging: LoggingConfig,
}

impl ToolConfig {
    /// Defaults, overlaid by `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, DeviceError> {
        let mut config = Self::default();
        let Some(path) = path else {
            return Ok(config);
        };

        let invalid = |reason: String| DeviceError::Config {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let file: ConfigFile = toml::from_str(&text).map_err(|e| invalid(e.to_string()))?;

        if let Some(value) = file.control_device {
            config.control_device = value;
        }
        if let Some(value) = file.partitions_file {
            config.partitions_file = value;
        }
        if let Some(value) = file.dev_dir {
            config.dev_dir = value;
        }
        if let Some(value) = file.mounts_file {
            config.mounts_file = value;
        }
        if let Some(value) = file.swaps_file {
            config.swaps_file = value;
        }
        if let Some(value) = file.discard {
            config.discard = value;
        }
        config.logging = file.logging;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    /// Apply the command-line / environment control device, if any.
    pub fn with_control_device(mut self, control_device: Option<PathBuf>) -> Self {
        if let Some(path) = control_device {
            self.control_device = path;
        }
        self
    }
}
