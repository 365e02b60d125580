use profile::{SelectorError, SelectorSpec, validate_selectors};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use subscription::UpstreamConfig;

const DEFAULT_RENDER_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "subhub".into()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive. `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
    /// Errors are also reported to Sentry when set.
    pub sentry_dsn: Option<String>,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
            sentry_dsn: None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Where `run` keeps the rendered profile.
    pub path: Option<PathBuf>,
    /// Seconds between checks for a changed snapshot in `run`.
    #[serde(default)]
    pub render_interval: u64,
}

impl OutputConfig {
    pub fn render_interval(&self) -> Duration {
        match self.render_interval {
            0 => Duration::from_secs(DEFAULT_RENDER_INTERVAL_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
    #[serde(default, alias = "selector")]
    pub selectors: Vec<SelectorSpec>,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Loads and validates the config file. Upstream entries are validated
    /// individually when fetchers are started so one bad URL does not
    /// prevent the others from being polled.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        validate_selectors(&config.selectors)?;

        Ok(config)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid selector: {0}")]
    Selector(#[from] SelectorError),
}
