//! Tracing setup for the simulator binary.
//!
//! `RUST_LOG` takes precedence over the caller's default level. Console output goes to
//! stderr so stdout stays free for machine-readable results. When `ENGINE_FILE_LOGS` is
//! switched on, the same events are also written without ANSI colours to a daily rolling
//! file under `ENGINE_LOG_DIR`.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "practice-engine.log";
const DEFAULT_LOG_DIR: &str = "./logs";

/// Keeps the non-blocking file writer flushing; drop it only on shutdown.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset or invalid.
    pub default_level: String,
    /// Directory for the rolling log file; `None` keeps logging on the console only.
    pub file_dir: Option<PathBuf>,
}

impl LogSettings {
    pub fn from_env(default_level: &str) -> Self {
        Self::from_lookup(default_level, |key| std::env::var(key).ok())
    }

    fn from_lookup(default_level: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let file_dir = lookup("ENGINE_FILE_LOGS")
            .is_some_and(|value| parse_flag(&value))
            .then(|| {
                lookup("ENGINE_LOG_DIR")
                    .map(|dir| dir.trim().to_string())
                    .filter(|dir| !dir.is_empty())
                    .unwrap_or_else(|| DEFAULT_LOG_DIR.to_string())
            })
            .map(PathBuf::from);
        let default_level = match default_level.trim() {
            "" => "info".to_string(),
            level => level.to_string(),
        };
        Self {
            default_level,
            file_dir,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Installs the global subscriber. Returns a guard when file logging is active.
pub fn init_tracing(settings: &LogSettings) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    if let Some(log_dir) = settings.file_dir.as_ref() {
        match std::fs::create_dir_all(log_dir) {
            Ok(()) => {
                let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
                let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
                let file_layer = fmt::layer()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_target(true);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .with(file_layer)
                    .init();
                tracing::debug!(dir = %log_dir.display(), "file logging enabled");
                return Some(FileLogGuard { _guard: guard });
            }
            // no subscriber yet, so stderr is the only place to say so
            Err(err) => eprintln!("failed to create log directory {}: {err}", log_dir.display()),
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(default_level: &str, vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(default_level, |key| vars.get(key).cloned())
    }

    #[test]
    fn flag_accepts_common_spellings() {
        for on in ["1", "true", "TRUE", " yes ", "On"] {
            assert!(parse_flag(on), "{on}");
        }
        for off in ["", "0", "false", "no", "enabled"] {
            assert!(!parse_flag(off), "{off}");
        }
    }

    #[test]
    fn file_logging_is_opt_in() {
        let console_only = settings("warn", &[("ENGINE_LOG_DIR", "/tmp/engine")]);
        assert_eq!(console_only.file_dir, None);
        assert_eq!(console_only.default_level, "warn");

        let default_dir = settings("warn", &[("ENGINE_FILE_LOGS", "true"), ("ENGINE_LOG_DIR", "  ")]);
        assert_eq!(default_dir.file_dir, Some(PathBuf::from("./logs")));

        let custom = settings("", &[("ENGINE_FILE_LOGS", "1"), ("ENGINE_LOG_DIR", "/var/log/sim")]);
        assert_eq!(custom.file_dir, Some(PathBuf::from("/var/log/sim")));
        assert_eq!(custom.default_level, "info");
    }
}
