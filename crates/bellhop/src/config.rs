//! Host configuration and logging bootstrap.

use tracing_subscriber::EnvFilter;
use url::Url;

/// Production coordinator endpoint. The configured endpoint is always
/// authoritative; this is only the default.
pub const DEFAULT_ENDPOINT: &str = "wss://coordinate.bellhop.dev/ws";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[default]
    Prod,
    Debug,
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub api_key: String,
    pub endpoint: Url,
    pub log_level: LogLevel,
}

impl HostConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid url"),
            log_level: LogLevel::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}

/// Install a global subscriber for the configured verbosity. A no-op when
/// one is already installed.
pub fn init_logging(level: LogLevel) {
    let directive = match level {
        LogLevel::Prod => "info",
        LogLevel::Debug => "debug",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .try_init();
}
