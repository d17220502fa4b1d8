// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// The original tool's compiled-in default block size.
pub const DEFAULT_BLOCK_SIZE: u16 = 512;
/// Default FORMAT UNIT timeout: large media can take many hours.
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 800;
/// Upper bound accepted for a user-supplied timeout.
pub const MAX_TIMEOUT_MINUTES: u64 = 1800;

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    /// Parameters of the destructive reformat itself.
    pub format: FormatConfig,
}

/// Reformat parameters; every field has the original tool's default.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FormatConfig {
    #[serde(default = "default_block_size", rename = "BlockSize")]
    /// New logical block size in bytes, written big-endian into the
    /// MODE SELECT block descriptor.
    pub block_size: u16,

    #[serde(default = "default_timeout_minutes", rename = "TimeoutMinutes")]
    /// Outstanding-command timeout applied to FORMAT UNIT only.
    pub timeout_minutes: u64,
}

fn default_block_size() -> u16 {
    DEFAULT_BLOCK_SIZE
}

fn default_timeout_minutes() -> u64 {
    DEFAULT_TIMEOUT_MINUTES
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let cfg: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_TIMEOUT_MINUTES).contains(&self.format.timeout_minutes),
            "format timeout must be between 1 and {MAX_TIMEOUT_MINUTES} minutes, got {}",
            self.format.timeout_minutes
        );
        Ok(())
    }

    pub fn format_timeout(&self) -> Duration {
        Duration::from_secs(self.format.timeout_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_tool() {
        let cfg = Config::default();
        assert_eq!(cfg.format.block_size, 512);
        assert_eq!(cfg.format.timeout_minutes, 800);
        assert_eq!(cfg.format_timeout(), Duration::from_secs(48_000));
    }

    #[test]
    fn yaml_overrides_defaults() {
        let cfg: Config =
            serde_yaml::from_str("format:\n  BlockSize: 4096\n  TimeoutMinutes: 90\n")
                .expect("WTF");
        assert_eq!(cfg.format.block_size, 4096);
        assert_eq!(cfg.format.timeout_minutes, 90);
        cfg.validate().expect("valid config");
    }

    #[test]
    fn loads_the_sample_config_file() {
        let cfg = Config::load_from_file("tests/config.yaml").expect("sample config");
        assert_eq!(cfg.format.block_size, 4096);
        assert_eq!(cfg.format.timeout_minutes, 90);
    }

    #[test]
    fn out_of_range_timeout_is_rejected() {
        let cfg: Config =
            serde_yaml::from_str("format:\n  TimeoutMinutes: 2000\n").expect("WTF");
        assert!(cfg.validate().is_err());
    }
}
