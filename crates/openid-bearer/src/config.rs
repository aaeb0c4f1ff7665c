//! Bearer authentication configuration
//!
//! A [`BearerConfig`] names the provider metadata URL, an optional pinned
//! provider certificate, the cache timeout and the token-verification knobs.
//! It can be deserialized, read from `OIDC_BEARER_*` environment variables,
//! or built in code. One configuration may be installed process-wide with
//! [`configure`] and read back with [`global`].

use crate::error::ConfigError;
use crate::transport::{HttpsClient, PinnedCertificate};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Environment variable holding the provider metadata URL
pub const ENV_METADATA_URL: &str = "OIDC_BEARER_METADATA_URL";
/// Environment variable holding the cache timeout in seconds (`0` or `never` disables expiry)
pub const ENV_CACHE_TIMEOUT_SECS: &str = "OIDC_BEARER_CACHE_TIMEOUT_SECS";
/// Environment variable holding the path of a PEM file with the pinned certificate
pub const ENV_PINNED_CERT_PATH: &str = "OIDC_BEARER_PINNED_CERT_PATH";
/// Environment variable holding the clock-skew leeway in seconds
pub const ENV_LEEWAY_SECS: &str = "OIDC_BEARER_LEEWAY_SECS";
/// Environment variable holding the expected audience
pub const ENV_AUDIENCE: &str = "OIDC_BEARER_AUDIENCE";
/// Environment variable holding the request timeout in seconds (`0` or `none` removes the deadline)
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "OIDC_BEARER_REQUEST_TIMEOUT_SECS";

/// Default lifetime of cached provider documents (15 minutes)
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 900;
/// Default clock-skew tolerance for `exp`, `nbf` and `iat`
pub const DEFAULT_LEEWAY_SECS: u64 = 60;

static GLOBAL: OnceCell<BearerConfig> = OnceCell::new();

fn default_cache_timeout_ms() -> Option<u64> {
    Some(DEFAULT_CACHE_TIMEOUT_SECS * 1000)
}

fn default_leeway_secs() -> u64 {
    DEFAULT_LEEWAY_SECS
}

/// Settings shared by both bearer strategies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BearerConfig {
    /// OIDC discovery document URL
    pub openid_metadata_url: String,

    /// Lifetime of cached provider documents in milliseconds; `None` means never expire
    #[serde(default = "default_cache_timeout_ms")]
    pub cache_timeout_ms: Option<u64>,

    /// PEM text of a provider certificate trusted by exact match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_certificate_pem: Option<String>,

    /// Clock-skew tolerance for time-based claims
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,

    /// Expected `aud` claim; audience is not checked when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Deadline for each provider request in milliseconds; `None` or `0` means no deadline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

impl BearerConfig {
    /// Configuration with defaults for everything but the metadata URL
    pub fn new(openid_metadata_url: impl Into<String>) -> Self {
        Self {
            openid_metadata_url: openid_metadata_url.into(),
            cache_timeout_ms: default_cache_timeout_ms(),
            pinned_certificate_pem: None,
            leeway_secs: DEFAULT_LEEWAY_SECS,
            audience: None,
            request_timeout_ms: None,
        }
    }

    /// Set the cache timeout
    pub fn with_cache_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.cache_timeout_ms = timeout.map(millis);
        self
    }

    /// Pin the provider certificate
    pub fn with_pinned_certificate_pem(mut self, pem: impl Into<String>) -> Self {
        self.pinned_certificate_pem = Some(pem.into());
        self
    }

    /// Set the clock-skew tolerance
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway_secs = leeway.as_secs();
        self
    }

    /// Require this `aud` claim
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Bound each provider request; a zero duration removes the deadline
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(millis(timeout)).filter(|ms| *ms > 0);
        self
    }

    /// Read the configuration from `OIDC_BEARER_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the metadata URL is missing, a number does
    /// not parse, or the pinned certificate file cannot be read.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(ENV_METADATA_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_METADATA_URL))?;
        let mut config = Self::new(url.trim());

        if let Some(raw) = lookup(ENV_CACHE_TIMEOUT_SECS) {
            config.cache_timeout_ms = match raw.trim() {
                "0" | "never" => None,
                other => Some(parse_secs(ENV_CACHE_TIMEOUT_SECS, other)?.saturating_mul(1000)),
            };
        }

        if let Some(path) = lookup(ENV_PINNED_CERT_PATH) {
            let pem = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Io { path, source })?;
            config.pinned_certificate_pem = Some(pem);
        }

        if let Some(raw) = lookup(ENV_LEEWAY_SECS) {
            config.leeway_secs = parse_secs(ENV_LEEWAY_SECS, raw.trim())?;
        }

        config.audience = lookup(ENV_AUDIENCE).filter(|v| !v.is_empty());

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout_ms = match raw.trim() {
                "0" | "none" => None,
                other => Some(parse_secs(ENV_REQUEST_TIMEOUT_SECS, other)?.saturating_mul(1000)),
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the metadata URL and the pinned certificate
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unusable URL and
    /// [`ConfigError::Transport`] for an undecodable certificate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.openid_metadata_url).map_err(|e| ConfigError::Invalid {
            key: "openid_metadata_url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(ConfigError::Invalid {
                key: "openid_metadata_url",
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        self.pinned_certificate()?;
        Ok(())
    }

    /// Cache timeout as a duration
    pub fn cache_timeout(&self) -> Option<Duration> {
        self.cache_timeout_ms.map(Duration::from_millis)
    }

    /// Clock-skew tolerance as a duration
    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_secs)
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Decode the pinned certificate, if one is configured
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Transport`] if the PEM text holds no certificate.
    pub fn pinned_certificate(&self) -> Result<Option<PinnedCertificate>, ConfigError> {
        self.pinned_certificate_pem
            .as_deref()
            .map(PinnedCertificate::from_pem)
            .transpose()
            .map_err(ConfigError::from)
    }

    /// Build the HTTP client these settings describe
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Transport`] if the certificate or TLS stack is unusable.
    pub fn http_client(&self) -> Result<HttpsClient, ConfigError> {
        Ok(HttpsClient::builder()
            .pinned_certificate(self.pinned_certificate()?)
            .timeout(self.request_timeout())
            .build()?)
    }
}

/// Whole milliseconds, rounding a non-zero sub-millisecond duration up to one
fn millis(duration: Duration) -> u64 {
    let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    if ms == 0 && !duration.is_zero() { 1 } else { ms }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        key,
        reason: format!("'{raw}': {e}"),
    })
}

/// Install `config` as the process-wide configuration.
///
/// # Errors
///
/// Returns [`ConfigError::AlreadyInstalled`] on a second call, or the
/// validation error if `config` is unusable.
pub fn configure(config: BearerConfig) -> Result<(), ConfigError> {
    config.validate()?;
    GLOBAL
        .set(config)
        .map_err(|_| ConfigError::AlreadyInstalled)?;
    tracing::info!("Installed global OIDC bearer configuration");
    Ok(())
}

/// The process-wide configuration, if installed
pub fn global() -> Option<&'static BearerConfig> {
    GLOBAL.get()
}
