use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::warn;

use crate::audio::CodecRegistry;
use crate::events::{Event, EventHub};
use crate::handler::MessageHandler;
use crate::ping::DEFAULT_PING_INTERVAL;
use crate::volatile::LockStrategy;

/// Per-field overrides for the Version message. Unset or empty fields fall
/// back to the running environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionOverride {
    /// e.g. `my-bot/2.3`
    pub release: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    /// `MAJOR.MINOR.PATCH`; ignored when `version` is set.
    pub semver: Option<String>,
    /// Packed protocol-version word, sent verbatim.
    pub version: Option<u32>,
}

impl VersionOverride {
    pub fn release(&self) -> Option<&str> {
        non_empty(&self.release)
    }

    pub fn os(&self) -> Option<&str> {
        non_empty(&self.os)
    }

    pub fn os_version(&self) -> Option<&str> {
        non_empty(&self.os_version)
    }

    pub fn semver(&self) -> Option<&str> {
        non_empty(&self.semver)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Connection settings. Cloning shares the event hub, codec registry and
/// handler.
#[derive(Clone)]
pub struct Config {
    pub username: String,
    pub password: String,
    /// Access tokens sent with Authenticate.
    pub tokens: Vec<String>,
    pub version: VersionOverride,
    pub ping_interval: Duration,
    pub lock_strategy: LockStrategy,
    pub events: EventHub,
    pub codecs: Arc<CodecRegistry>,
    /// Receives frames the connection engine does not handle itself.
    pub handler: Option<Arc<dyn MessageHandler>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            tokens: Vec::new(),
            version: VersionOverride::default(),
            ping_interval: DEFAULT_PING_INTERVAL,
            lock_strategy: LockStrategy::default(),
            events: EventHub::new(),
            codecs: CodecRegistry::global(),
            handler: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .field("tokens", &self.tokens.len())
            .field("version", &self.version)
            .field("ping_interval", &self.ping_interval)
            .field("lock_strategy", &self.lock_strategy)
            .field("codecs", &self.codecs)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl Config {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `MURMUR_USERNAME`, `MURMUR_PASSWORD`,
    /// `MURMUR_TOKENS` (comma separated) and `MURMUR_PING_INTERVAL_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(username) = env::var("MURMUR_USERNAME") {
            config.username = username;
        }
        if let Ok(password) = env::var("MURMUR_PASSWORD") {
            config.password = password;
        }
        if let Ok(tokens) = env::var("MURMUR_TOKENS") {
            config.tokens = tokens
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Ok(raw) = env::var("MURMUR_PING_INTERVAL_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.ping_interval = Duration::from_millis(ms),
                _ => warn!(target: "murmur::config", value = %raw, "ignoring invalid MURMUR_PING_INTERVAL_MS"),
            }
        }
        config
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_tokens<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_version(mut self, version: VersionOverride) -> Self {
        self.version = version;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_lock_strategy(mut self, strategy: LockStrategy) -> Self {
        self.lock_strategy = strategy;
        self
    }

    pub fn with_events(mut self, events: EventHub) -> Self {
        self.events = events;
        self
    }

    pub fn with_codecs(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Subscribe before connecting to observe the connect outcome.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    // env vars are process-global
    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    const VARS: [&str; 4] = [
        "MURMUR_USERNAME",
        "MURMUR_PASSWORD",
        "MURMUR_TOKENS",
        "MURMUR_PING_INTERVAL_MS",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test_timeout::timeout]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.lock_strategy, LockStrategy::ReadWrite);
        assert!(config.tokens.is_empty());
        assert!(config.handler.is_none());
    }

    #[test_timeout::timeout]
    fn from_env_overlays_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("MURMUR_USERNAME", "relay-bot");
            env::set_var("MURMUR_TOKENS", "alpha, beta,,gamma");
            env::set_var("MURMUR_PING_INTERVAL_MS", "250");
        }
        let config = Config::from_env();
        clear_env();

        assert_eq!(config.username, "relay-bot");
        assert_eq!(config.password, "");
        assert_eq!(config.tokens, vec!["alpha", "beta", "gamma"]);
        assert_eq!(config.ping_interval, Duration::from_millis(250));
    }

    #[test_timeout::timeout]
    fn invalid_ping_interval_keeps_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("MURMUR_PING_INTERVAL_MS", "soon");
        }
        let config = Config::from_env();
        clear_env();
        assert_eq!(config.ping_interval, DEFAULT_PING_INTERVAL);
    }

    #[test_timeout::timeout]
    fn debug_hides_the_password() {
        let config = Config::new("alice").with_password("hunter2");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test_timeout::timeout]
    fn empty_override_fields_count_as_unset() {
        let version = VersionOverride {
            release: Some(String::new()),
            os: Some("plan9".into()),
            ..Default::default()
        };
        assert_eq!(version.release(), None);
        assert_eq!(version.os(), Some("plan9"));
        assert_eq!(version.semver(), None);
    }
}
