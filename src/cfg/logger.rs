use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
};

// Config logger
#[derive(Debug, Deserialize, Clone)]
struct LoggerConfig {
    logger: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
struct LogConfig {
    level: String,
    output: String,
    #[serde(default)]
    json: bool,
    file: Option<LogFileConfig>,
}

#[derive(Debug, Deserialize, Clone)]
struct LogFileConfig {
    path: String,
    rotation_frequency: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "stderr".to_string(),
            json: false,
            file: None,
        }
    }
}

fn split_path(path: &str) -> (String, String) {
    let path = Path::new(path);
    let directory = path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .to_str()
        .unwrap_or("")
        .to_string();
    let file_name = path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new(""))
        .to_str()
        .unwrap_or("")
        .to_string();
    (directory, file_name)
}

/// Initialize the global tracing subscriber from an optional YAML
/// config; without one, human-readable output goes to stderr at `info`.
/// The returned guard must stay alive for buffered log lines to flush.
pub fn init_logger(config_path: Option<&Path>) -> Result<WorkerGuard> {
    let config = match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| {
                format!("Failed to read logger config file: {}", path.display())
            })?;
            let parsed: LoggerConfig = serde_yaml::from_str(&raw).with_context(|| {
                format!("Failed to parse logger config file: {}", path.display())
            })?;
            parsed.logger
        },
        None => LogConfig::default(),
    };

    let (writer, guard) = match config.output.as_str() {
        "stdout" => tracing_appender::non_blocking(std::io::stdout()),
        "stderr" => tracing_appender::non_blocking(std::io::stderr()),
        "file" => {
            let cfg = config
                .file
                .as_ref()
                .context("Failed to find log file config")?;
            let rotation = match cfg.rotation_frequency.as_deref() {
                Some("minutely") => Rotation::MINUTELY,
                Some("hourly") => Rotation::HOURLY,
                Some("daily") => Rotation::DAILY,
                _ => Rotation::NEVER,
            };
            let (directory, file_name) = split_path(&cfg.path);
            let file_appender = RollingFileAppender::new(rotation, directory, file_name);
            tracing_appender::non_blocking(file_appender)
        },
        other => {
            return Err(anyhow::anyhow!("Invalid log output specified: {other}"));
        },
    };

    let env_filter = EnvFilter::try_new(&config.level)
        .context("Failed to parse log level from config")?;

    if config.json {
        let layer = fmt::layer()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_timer(ChronoLocal::rfc_3339())
            .json();
        let subscriber = tracing_subscriber::registry().with(env_filter).with(layer);
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set global default subscriber")?;
    } else {
        let layer = fmt::layer()
            .with_writer(move || writer.clone())
            .with_ansi(true)
            .with_timer(ChronoLocal::rfc_3339());
        let subscriber = tracing_subscriber::registry().with(env_filter).with(layer);
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set global default subscriber")?;
    }

    Ok(guard)
}
