//! Utility functions and helpers
//!
//! Time, formatting and logging setup shared by the library and the binary.

use crate::config::{LogFormat, LogLevel};
use crate::{Error, Result};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Get current timestamp in seconds since Unix epoch
pub fn current_timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Format hash rate as a human-readable string
pub fn format_hash_rate(hashes_per_sec: f64) -> String {
    const UNITS: &[&str] = &["H/s", "KH/s", "MH/s", "GH/s", "TH/s", "PH/s"];
    let mut rate = hashes_per_sec;
    let mut unit_index = 0;

    while rate >= 1000.0 && unit_index < UNITS.len() - 1 {
        rate /= 1000.0;
        unit_index += 1;
    }

    format!("{:.2} {}", rate, UNITS[unit_index])
}

/// Format duration as a human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        let secs = seconds % 60;
        format!("{}h {}m {}s", hours, minutes, secs)
    } else {
        let days = seconds / 86400;
        let hours = (seconds % 86400) / 3600;
        format!("{}d {}h", days, hours)
    }
}

/// Build the log filter; `RUST_LOG` overrides the configured level
pub fn log_filter(level: LogLevel) -> EnvFilter {
    let level = tracing::Level::from(level);
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()))
}

/// Install the global tracing subscriber
///
/// When `file` is given, logs are also written there through a non-blocking
/// appender; the returned guard must be held until shutdown to flush it.
pub fn init_logging(
    level: LogLevel,
    format: LogFormat,
    file: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let console = match format {
        LogFormat::Plain => fmt::layer().with_target(false).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_names(true)
            .boxed(),
    };

    let (file_layer, guard) = match file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| Error::config(format!("Invalid log file: {}", path.display())))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(log_filter(level))
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hash_rate() {
        assert_eq!(format_hash_rate(100.0), "100.00 H/s");
        assert_eq!(format_hash_rate(1500.0), "1.50 KH/s");
        assert_eq!(format_hash_rate(1000000.0), "1.00 MH/s");
        assert_eq!(format_hash_rate(1500000000.0), "1.50 GH/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3661), "1h 1m 1s");
        assert_eq!(format_duration(90000), "1d 1h");
    }

    #[test]
    fn test_current_timestamp() {
        let ts = current_timestamp_secs();
        assert!(ts > 1_600_000_000);
        assert!(ts < u64::from(u32::MAX));
    }

    #[test]
    fn test_init_logging_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("miner.log");

        let guard = init_logging(LogLevel::Debug, LogFormat::Plain, Some(&path)).unwrap();
        assert!(guard.is_some());
        tracing::info!("written to file");
        drop(guard);

        // Only one global subscriber per process.
        assert!(init_logging(LogLevel::Info, LogFormat::Json, None).is_err());
        assert!(path.exists());
    }
}
