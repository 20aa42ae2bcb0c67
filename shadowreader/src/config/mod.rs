//! Configuration types for the reader.
//!
//! All values have serde defaults so a partial JSON document (or none at
//! all) yields a usable configuration.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::errors::ReaderError;

/// Longest accepted auto-advance interval (one day).
const MAX_INTERVAL_SECONDS: f64 = 86_400.0;
/// Longest accepted request timeout (one hour).
const MAX_TIMEOUT_SECONDS: f64 = 3_600.0;

/// Top-level reader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Number of characters per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Seconds between automatic page turns. Zero disables auto-advance.
    #[serde(default)]
    pub auto_advance_interval_seconds: f64,
    /// Keyword search configuration.
    #[serde(default)]
    pub search: SearchConfig,
    /// Remote book configuration.
    #[serde(default)]
    pub remote: RemoteConfig,
    /// HTTP fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
}

fn default_page_size() -> usize {
    50
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            auto_advance_interval_seconds: 0.0,
            search: SearchConfig::default(),
            remote: RemoteConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl ReaderConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the auto-advance interval.
    #[must_use]
    pub fn with_auto_advance_interval(mut self, seconds: f64) -> Self {
        self.auto_advance_interval_seconds = seconds;
        self
    }

    /// Sets the search matcher.
    #[must_use]
    pub fn with_matcher(mut self, matcher: MatcherKind) -> Self {
        self.search.matcher = matcher;
        self
    }

    /// Parses a configuration from JSON and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ReaderError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file. A missing file yields the defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(text) => Self::from_json_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Checks the values the engine depends on.
    pub fn validate(&self) -> Result<(), ReaderError> {
        if self.page_size == 0 {
            return Err(ReaderError::InvalidConfig(
                "page_size must be positive".to_string(),
            ));
        }
        let interval = self.auto_advance_interval_seconds;
        if !(0.0..=MAX_INTERVAL_SECONDS).contains(&interval) {
            return Err(ReaderError::InvalidConfig(format!(
                "auto_advance_interval_seconds must be between 0 and {MAX_INTERVAL_SECONDS}, got {interval}"
            )));
        }
        if self.remote.estimated_section_count == 0 {
            return Err(ReaderError::InvalidConfig(
                "remote.estimated_section_count must be positive".to_string(),
            ));
        }
        let timeout = self.fetch.timeout_seconds;
        if !(timeout > 0.0 && timeout <= MAX_TIMEOUT_SECONDS) {
            return Err(ReaderError::InvalidConfig(format!(
                "fetch.timeout_seconds must be in (0, {MAX_TIMEOUT_SECONDS}], got {timeout}"
            )));
        }
        Ok(())
    }

    /// The auto-advance period, or `None` when disabled.
    #[must_use]
    pub fn auto_advance_interval(&self) -> Option<Duration> {
        if self.auto_advance_interval_seconds > 0.0 {
            Duration::try_from_secs_f64(self.auto_advance_interval_seconds).ok()
        } else {
            None
        }
    }
}

/// Which keyword automaton the search uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    /// Resets to zero on mismatch without re-examining the character.
    /// Misses some overlapping matches such as "aab" in "aaab".
    Naive,
    /// Failure-function automaton. Finds every exact occurrence.
    #[default]
    PrefixFunction,
}

/// Configuration for keyword search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// The matching automaton.
    #[serde(default)]
    pub matcher: MatcherKind,
}

/// Configuration for remote books.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Section count assumed for progress when the site does not report one.
    #[serde(default = "default_section_count")]
    pub estimated_section_count: u32,
    /// Base URLs per site adapter, keyed by adapter name.
    #[serde(default)]
    pub origins: HashMap<String, String>,
}

fn default_section_count() -> u32 {
    1000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            estimated_section_count: default_section_count(),
            origins: HashMap::new(),
        }
    }
}

impl RemoteConfig {
    /// Returns the configured origin for an adapter, if overridden.
    #[must_use]
    pub fn origin_for(&self, adapter: &str) -> Option<&str> {
        self.origins.get(adapter).map(String::as_str)
    }
}

/// Configuration for HTTP fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_timeout() -> f64 {
    15.0
}

fn default_user_agent() -> String {
    concat!("shadowreader/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            headers: HashMap::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl FetchConfig {
    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Gets timeout as Duration. Values no `Duration` can hold fall back
    /// to the default.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_timeout()))
    }
}

/// Retry configuration for failed requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first request.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Initial delay between retries in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: f64,
    /// Backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Maximum delay between retries.
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: f64,
    /// Fraction of the delay added as random jitter.
    #[serde(default)]
    pub jitter: f64,
    /// Status codes that should trigger a retry.
    #[serde(default = "default_retry_status_codes")]
    pub retry_status_codes: HashSet<u16>,
}

fn default_max_retries() -> usize {
    2
}

fn default_retry_delay() -> f64 {
    0.5
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> f64 {
    5.0
}

fn default_retry_status_codes() -> HashSet<u16> {
    [429, 500, 502, 503, 504].into_iter().collect()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_seconds: default_max_delay(),
            jitter: 0.0,
            retry_status_codes: default_retry_status_codes(),
        }
    }
}

impl RetryConfig {
    /// Calculates the delay for a given attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.retry_delay_seconds * self.backoff_multiplier.powi(exponent);
        let mut capped = delay.min(self.max_delay_seconds);
        if self.jitter > 0.0 {
            capped += capped * rand::thread_rng().gen_range(0.0..self.jitter);
        }
        Duration::try_from_secs_f64(capped.max(0.0))
            .unwrap_or_else(|_| Duration::from_secs_f64(default_max_delay()))
    }

    /// Whether a status code should trigger a retry.
    #[must_use]
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_status_codes.contains(&status)
    }
}
