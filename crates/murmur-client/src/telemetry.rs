//! `tracing` setup for applications embedding the client.
//!
//! The library only emits events under `murmur::*` targets. Nothing is
//! printed until the application installs a subscriber, either its own or
//! the one from [`init`].

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid log level {0:?}")]
    Level(String),
    #[error("invalid log filter: {0}")]
    Filter(String),
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Verbosity of the `murmur::*` targets.
    pub level: LevelFilter,
    /// Append here instead of writing to stderr.
    pub file: Option<PathBuf>,
    /// Apply `level` to dependencies too; otherwise they are capped at warn.
    pub dependency_logs: bool,
    /// Raw `EnvFilter` directives. Replaces the three fields above.
    pub directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            file: None,
            dependency_logs: false,
            directives: None,
        }
    }
}

impl LogConfig {
    /// Reads `MURMUR_LOG` (level), `MURMUR_LOG_FILE`, `MURMUR_LOG_DEPS` and
    /// `MURMUR_LOG_FILTER`.
    pub fn from_env() -> Result<Self, InitError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, InitError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("MURMUR_LOG") {
            config.level = raw
                .trim()
                .parse::<LevelFilter>()
                .map_err(|_| InitError::Level(raw.clone()))?;
        }
        config.file = lookup("MURMUR_LOG_FILE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        config.dependency_logs = lookup("MURMUR_LOG_DEPS").is_some_and(|raw| truthy(&raw));
        config.directives = lookup("MURMUR_LOG_FILTER").filter(|raw| !raw.trim().is_empty());
        Ok(config)
    }

    pub fn filter_directives(&self) -> String {
        if let Some(directives) = &self.directives {
            return directives.clone();
        }
        let level = level_name(self.level);
        if self.dependency_logs {
            level.to_owned()
        } else {
            format!("warn,murmur={level}")
        }
    }
}

fn truthy(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

fn level_name(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::TRACE => "trace",
        LevelFilter::DEBUG => "debug",
        LevelFilter::INFO => "info",
        LevelFilter::WARN => "warn",
        LevelFilter::ERROR => "error",
        LevelFilter::OFF => "off",
    }
}

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs a global fmt subscriber writing through a non-blocking worker.
/// Returns `Ok(false)` when the process already has a global subscriber.
pub fn init(config: &LogConfig) -> Result<bool, InitError> {
    if GUARD.get().is_some() {
        return Ok(false);
    }
    let filter = EnvFilter::try_new(config.filter_directives())
        .map_err(|err| InitError::Filter(err.to_string()))?;

    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(config.file.is_none())
        .with_writer(writer)
        .try_init()
        .is_ok();
    if installed {
        // the worker flushes until the guard drops, so keep it for the process
        let _ = GUARD.set(guard);
        tracing::debug!(target: "murmur::telemetry", filter = %config.filter_directives(), "logging initialized");
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test_timeout::timeout]
    fn dependencies_are_capped_unless_asked_for() {
        assert_eq!(LogConfig::default().filter_directives(), "warn,murmur=info");

        let verbose = LogConfig {
            level: LevelFilter::TRACE,
            dependency_logs: true,
            ..LogConfig::default()
        };
        assert_eq!(verbose.filter_directives(), "trace");

        let raw = LogConfig {
            directives: Some("murmur::ping=trace".into()),
            ..verbose
        };
        assert_eq!(raw.filter_directives(), "murmur::ping=trace");
    }

    #[test_timeout::timeout]
    fn variables_overlay_the_defaults() {
        let config = LogConfig::from_lookup(lookup(&[
            ("MURMUR_LOG", " Debug "),
            ("MURMUR_LOG_FILE", "/tmp/murmur.log"),
            ("MURMUR_LOG_DEPS", "off"),
            ("MURMUR_LOG_FILTER", "  "),
        ]))
        .unwrap();
        assert_eq!(config.level, LevelFilter::DEBUG);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/murmur.log")));
        assert!(!config.dependency_logs);
        assert_eq!(config.directives, None);

        assert_eq!(LogConfig::from_lookup(lookup(&[])).unwrap(), LogConfig::default());
        assert!(matches!(
            LogConfig::from_lookup(lookup(&[("MURMUR_LOG", "loud")])),
            Err(InitError::Level(level)) if level == "loud"
        ));
    }

    #[test_timeout::timeout]
    fn init_installs_once_and_writes_to_the_file() {
        let path = env::temp_dir().join(format!("murmur-log-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let config = LogConfig {
            level: LevelFilter::DEBUG,
            file: Some(path.clone()),
            ..LogConfig::default()
        };

        assert!(init(&config).unwrap());
        assert!(!init(&config).unwrap());
        tracing::info!(target: "murmur::telemetry", "subscriber ready");
        tracing::info!(target: "elsewhere", "filtered out");

        let deadline = Instant::now() + Duration::from_secs(5);
        let text = loop {
            let text = std::fs::read_to_string(&path).unwrap_or_default();
            if text.contains("subscriber ready") {
                break text;
            }
            assert!(Instant::now() < deadline, "log line never reached {path:?}");
            std::thread::sleep(Duration::from_millis(10));
        };
        assert!(text.contains("murmur::telemetry"));
        assert!(!text.contains("filtered out"));
        let _ = std::fs::remove_file(&path);
    }
}
