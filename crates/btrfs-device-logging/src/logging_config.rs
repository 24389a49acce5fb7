// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Logging section of the tool's TOML configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{CliLogLevel, LogFormat};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(rename = "log-level", default)]
    pub level: Option<CliLogLevel>,
    #[serde(rename = "log-format", default)]
    pub format: Option<LogFormat>,
    #[serde(rename = "log-file", default)]
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_case_keys() {
        let config: LoggingConfig = toml::from_str(
            r#"
            log-level = "debug"
            log-format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.level, Some(CliLogLevel::Debug));
        assert_eq!(config.format, Some(LogFormat::Json));
        assert_eq!(config.file, None);
    }
}
