use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;
const LOCAL_PREFIX: &str = "file://";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("upstream url is empty")]
    EmptyUrl,
    #[error("invalid upstream url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported upstream url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("duplicate upstream url: {0}")]
    DuplicateUpstream(String),
}

/// A single subscription source.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Subscription URL, or a local path prefixed with `file://`.
    pub url: String,
    /// Per-request timeout in seconds. Values <= 0 use the default.
    #[serde(default)]
    pub timeout: i64,
    /// Additional attempts for transient HTTP failures within one cycle.
    /// Capped at `MAX_RETRIES`.
    #[serde(default = "default_retry")]
    pub retry: u32,
    /// Polling interval in seconds. Values <= 0 use the default.
    #[serde(default)]
    pub interval: i64,
    /// Only nodes whose name contains one of these keywords are kept.
    #[serde(default)]
    pub node_keywords: Vec<String>,
}

fn default_retry() -> u32 {
    2
}

impl UpstreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        UpstreamConfig {
            url: url.into(),
            timeout: 0,
            retry: default_retry(),
            interval: 0,
            node_keywords: Vec::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        positive_secs(self.interval).unwrap_or(Duration::from_secs(DEFAULT_INTERVAL_SECS))
    }

    pub fn timeout(&self) -> Duration {
        positive_secs(self.timeout).unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn max_retries(&self) -> u32 {
        self.retry.min(MAX_RETRIES)
    }

    /// The filesystem path for `file://` upstreams.
    pub fn local_path(&self) -> Option<&str> {
        self.url.strip_prefix(LOCAL_PREFIX)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl);
        }

        if let Some(path) = self.local_path() {
            if path.is_empty() {
                return Err(ConfigError::InvalidUrl {
                    url: self.url.clone(),
                    reason: "missing file path".into(),
                });
            }
            return Ok(());
        }

        let url = Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }
}

fn positive_secs(secs: i64) -> Option<Duration> {
    u64::try_from(secs)
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}

/// Splits `configs` into the entries that can be started and the rejected
/// ones. Only the first occurrence of a URL is kept.
pub fn partition_valid(
    configs: Vec<UpstreamConfig>,
) -> (Vec<UpstreamConfig>, Vec<(String, ConfigError)>) {
    let mut seen = HashSet::new();
    let mut valid = Vec::new();
    let mut rejected = Vec::new();

    for config in configs {
        if let Err(e) = config.validate() {
            rejected.push((config.url, e));
            continue;
        }
        if !seen.insert(config.url.clone()) {
            let url = config.url;
            rejected.push((url.clone(), ConfigError::DuplicateUpstream(url)));
            continue;
        }
        valid.push(config);
    }

    (valid, rejected)
}
