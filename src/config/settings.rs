//! Per-service settings and the validated configuration built from them.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Retry count used when the settings do not supply one.
pub const DEFAULT_RETRIES: u32 = 3;

/// Result alias for configuration and setup failures.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;

/// Errors raised while building a service. These are programmer errors and are
/// never produced at request time.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("name is required")]
    MissingName,
    #[error("invalid service settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),
    #[error("http client initialisation failed: {0}")]
    Client(#[from] reqwest::Error),
}

/// Selects defaults and verbosity for a service.
///
/// `Standard` debug-logs every outgoing URL and reports the response time of
/// successful calls. `Compact` does neither and waits longer by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceProfile {
    #[default]
    Standard,
    Compact,
}

impl ServiceProfile {
    pub fn default_timeout(self) -> Duration {
        match self {
            ServiceProfile::Standard => Duration::from_millis(250),
            ServiceProfile::Compact => Duration::from_millis(1000),
        }
    }

    pub fn logs_requests(self) -> bool {
        matches!(self, ServiceProfile::Standard)
    }

    pub fn reports_response_time(self) -> bool {
        matches!(self, ServiceProfile::Standard)
    }
}

/// Raw settings for one service, usually deserialized from the application
/// config file.
///
/// ```
/// use http_json_service::ServiceSettings;
///
/// let settings = ServiceSettings::from_json(r#"{ "url": "http://localhost:4400", "retries": 1 }"#)?;
/// assert_eq!(settings.retries, Some(1));
/// # Ok::<(), http_json_service::ConfigurationError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub url: Option<String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
}

impl ServiceSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn from_json(raw: &str) -> ConfigurationResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Parses an object keyed by service name, e.g. the `services` block of
    /// an application config.
    pub fn map_from_json(raw: &str) -> ConfigurationResult<BTreeMap<String, Self>> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Immutable description of one remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfiguration {
    name: String,
    base_url: Option<String>,
    timeout: Duration,
    retries: u32,
    profile: ServiceProfile,
}

impl ServiceConfiguration {
    /// Builds a configuration with the [`ServiceProfile::Standard`] defaults.
    pub fn new(name: impl Into<String>, settings: &ServiceSettings) -> ConfigurationResult<Self> {
        Self::with_profile(name, settings, ServiceProfile::default())
    }

    pub fn with_profile(
        name: impl Into<String>,
        settings: &ServiceSettings,
        profile: ServiceProfile,
    ) -> ConfigurationResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigurationError::MissingName);
        }

        let timeout = settings
            .timeout
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
            .unwrap_or_else(|| profile.default_timeout());

        Ok(Self {
            name,
            base_url: normalize_base_url(settings.url.as_deref()),
            timeout,
            retries: settings.retries.unwrap_or(DEFAULT_RETRIES),
            profile,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Default request URL: the base URL, or an empty string when disabled.
    pub fn url(&self) -> &str {
        self.base_url.as_deref().unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn profile(&self) -> ServiceProfile {
        self.profile
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

fn normalize_base_url(url: Option<&str>) -> Option<String> {
    match url {
        Some(url) if !url.is_empty() && !url.ends_with('/') => Some(format!("{url}/")),
        other => other.map(str::to_string),
    }
}
