// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use crate::cfg::config::Config;

/// Reformat a SCSI disk with a new logical block size.
///
/// This permanently destroys all data on the device. The device must be
/// an sg passthrough node the current user can open exclusively.
#[derive(Parser, Debug)]
#[command(name = "setblocksize", version, about)]
pub struct Cli {
    /// sg device node, e.g. /dev/sg0 (root permissions usually needed)
    pub device: PathBuf,

    /// New logical block size in bytes
    #[arg(short = 'b', long = "blocksize")]
    pub block_size: Option<u16>,

    /// FORMAT UNIT timeout in minutes (1..=1800)
    #[arg(short = 't', long = "timeout")]
    pub timeout: Option<u64>,

    /// YAML config file with format parameters
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// YAML logger config file
    #[arg(long)]
    pub logger_config: Option<PathBuf>,

    /// Answer the confirmation prompt with yes (dangerous)
    #[arg(short = 'y', long)]
    pub assume_yes: bool,
}

impl Cli {
    /// Resolve the effective configuration: file (when given), then
    /// command-line overrides, then validation.
    pub fn merged_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => resolve_config_path(path)
                .and_then(Config::load_from_file)
                .context("failed to resolve or load config")?,
            None => Config::default(),
        };
        if let Some(bs) = self.block_size {
            config.format.block_size = bs;
        }
        if let Some(minutes) = self.timeout {
            config.format.timeout_minutes = minutes;
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn resolve_config_path<P: AsRef<Path>>(rel: P) -> Result<PathBuf> {
    let p = rel.as_ref();

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}
