//! Error types
//!
//! Errors are layered the same way the components are: the HTTP client only
//! knows about [`TransportError`], the discovery fetcher adds
//! [`DiscoveryError`], and the strategies report everything through
//! [`BearerError`], whose `Display` output is the failure message handed to
//! the host framework.

use thiserror::Error;

/// Network or TLS failure while talking to the identity provider.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client could not be built
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    /// The pinned certificate could not be decoded
    #[error("Invalid pinned certificate: {0}")]
    InvalidCertificate(String),

    /// The URI could not be parsed or uses an unsupported scheme
    #[error("Invalid URI {uri}: {reason}")]
    InvalidUri {
        /// Offending URI
        uri: String,
        /// Why it was refused
        reason: String,
    },

    /// Connection, TLS handshake or certificate rejection
    #[error("Request to {uri} failed: {source}")]
    Request {
        /// Target URI
        uri: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be read
    #[error("Failed to read response from {uri}: {source}")]
    BodyRead {
        /// Target URI
        uri: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },
}

/// Malformed, incomplete or unreachable discovery metadata.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The document (or key set) could not be fetched
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The provider answered with a non-success status
    #[error("HTTP {status} from {uri}")]
    HttpStatus {
        /// Target URI
        uri: String,
        /// Response status code
        status: u16,
    },

    /// The body was not the JSON we expected
    #[error("Invalid JSON from {uri}: {reason}")]
    InvalidJson {
        /// Target URI
        uri: String,
        /// Parser message
        reason: String,
    },

    /// A field this crate depends on is absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// Why a bearer strategy refused a request.
///
/// The `Display` output is the message reported to the host framework.
/// [`BearerError::TokenInvalid`] deliberately hides its reason behind a
/// generic message; the reason is logged and available to callers.
#[derive(Debug, Error)]
pub enum BearerError {
    /// The provider (discovery, JWKS or userinfo) could not be reached
    #[error("OIDC provider unreachable: {0}")]
    Transport(#[from] TransportError),

    /// The provider metadata is unusable
    #[error("OIDC discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Signature checked out but the token is past its expiry
    #[error("Expired OIDC bearer token")]
    TokenExpired,

    /// Bad signature, disallowed algorithm, malformed token or missing claim
    #[error("Invalid OIDC bearer token")]
    TokenInvalid {
        /// Diagnostic detail, never shown in the failure message
        reason: String,
    },

    /// The userinfo endpoint answered with a non-success status
    #[error("OIDC userinfo request rejected (HTTP {status}): {body}")]
    UserinfoRejected {
        /// Response status code
        status: u16,
        /// Response body, as diagnostic detail
        body: String,
    },
}

impl BearerError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::TokenInvalid {
            reason: reason.into(),
        }
    }

    /// Whether this failure is the expiry-specific one
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }
}

/// Strategy registration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A strategy is already registered under that name
    #[error("Strategy already registered: {0}")]
    Duplicate(String),

    /// No strategy is registered under that name
    #[error("Unknown strategy: {0}")]
    Unknown(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),

    /// A setting could not be parsed
    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// Why it was refused
        reason: String,
    },

    /// A referenced file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The pinned certificate or HTTP client could not be set up
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The process-wide configuration was already installed
    #[error("Global configuration already installed")]
    AlreadyInstalled,
}
