//! # Discovery Document Fetcher
//!
//! Fetches the provider's discovery document and signing keys through the
//! pinned-TLS client, memoizing each by URI.

use super::types::DiscoveryDocument;
use crate::cache::ValueCache;
use crate::config::BearerConfig;
use crate::error::{ConfigError, DiscoveryError};
use crate::transport::HttpsClient;
use jsonwebtoken::jwk::JwkSet;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Discovery document fetcher
///
/// Owns one cache for discovery documents and one for key sets, both keyed by
/// URI and honouring the same timeout. Shared freely across concurrent
/// requests; a cache miss triggers exactly one fetch per caller and nothing
/// is retried.
pub struct DiscoveryFetcher {
    metadata_uri: String,
    client: HttpsClient,
    documents: ValueCache<String, Arc<DiscoveryDocument>>,
    key_sets: ValueCache<String, Arc<JwkSet>>,
}

impl DiscoveryFetcher {
    /// Create a fetcher for `metadata_uri`
    ///
    /// `cache_timeout` of `None` keeps documents forever.
    pub fn new(
        metadata_uri: impl Into<String>,
        client: HttpsClient,
        cache_timeout: Option<Duration>,
    ) -> Self {
        Self {
            metadata_uri: metadata_uri.into(),
            client,
            documents: ValueCache::new(cache_timeout),
            key_sets: ValueCache::new(cache_timeout),
        }
    }

    /// Create a fetcher from a [`BearerConfig`]
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &BearerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(
            config.openid_metadata_url.clone(),
            config.http_client()?,
            config.cache_timeout(),
        ))
    }

    /// The discovery document URI
    pub fn metadata_uri(&self) -> &str {
        &self.metadata_uri
    }

    /// The configured cache timeout
    pub fn cache_timeout(&self) -> Option<Duration> {
        self.documents.timeout()
    }

    /// The client used for provider requests
    pub fn client(&self) -> &HttpsClient {
        &self.client
    }

    /// Fetch (or reuse) the discovery document
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if the document is unreachable, not JSON, or
    /// lacks an issuer.
    pub async fn metadata(&self) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        self.documents
            .get_or_try_insert_with(&self.metadata_uri, || async {
                let document: DiscoveryDocument = self.fetch_json(&self.metadata_uri).await?;
                document.validate()?;
                debug!(
                    uri = %self.metadata_uri,
                    issuer = %document.issuer,
                    "Fetched discovery document"
                );
                Ok::<_, DiscoveryError>(Arc::new(document))
            })
            .await
    }

    /// The provider's signing key set.
    ///
    /// An inline `jwks` in the document wins; otherwise the set is fetched
    /// from `jwks_uri` and cached under that URI.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::MissingField`] if the document carries
    /// neither, or any error from fetching either document.
    pub async fn jwks(&self) -> Result<Arc<JwkSet>, DiscoveryError> {
        let metadata = self.metadata().await?;

        if let Some(inline) = &metadata.jwks {
            return Ok(Arc::new(inline.clone()));
        }

        let jwks_uri = metadata
            .jwks_uri
            .clone()
            .ok_or(DiscoveryError::MissingField("jwks_uri"))?;

        self.key_sets
            .get_or_try_insert_with(&jwks_uri, || async {
                let key_set: JwkSet = self.fetch_json(&jwks_uri).await?;
                debug!(uri = %jwks_uri, keys = key_set.keys.len(), "Fetched JWKS");
                Ok::<_, DiscoveryError>(Arc::new(key_set))
            })
            .await
    }

    /// The provider's issuer identifier
    ///
    /// # Errors
    ///
    /// Same as [`metadata`](Self::metadata).
    pub async fn issuer(&self) -> Result<String, DiscoveryError> {
        Ok(self.metadata().await?.issuer.clone())
    }

    /// Algorithm identifiers allowed for token signatures
    ///
    /// # Errors
    ///
    /// Same as [`metadata`](Self::metadata).
    pub async fn authorization_algs(&self) -> Result<Vec<String>, DiscoveryError> {
        Ok(self.metadata().await?.allowed_algorithms().to_vec())
    }

    /// The UserInfo endpoint URL
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::MissingField`] if the provider publishes none.
    pub async fn userinfo_endpoint(&self) -> Result<String, DiscoveryError> {
        self.metadata()
            .await?
            .userinfo_endpoint
            .clone()
            .ok_or(DiscoveryError::MissingField("userinfo_endpoint"))
    }

    /// Forget every cached document and key set
    pub fn clear_cache(&self) {
        self.documents.clear();
        self.key_sets.clear();
        debug!(uri = %self.metadata_uri, "Cleared discovery cache");
    }

    async fn fetch_json<T: DeserializeOwned>(&self, uri: &str) -> Result<T, DiscoveryError> {
        let response = self.client.get(uri).await.inspect_err(|e| {
            warn!(uri, error = %e, "Provider request failed");
        })?;

        if !response.is_success() {
            warn!(uri, status = response.status, "Provider returned an error status");
            return Err(DiscoveryError::HttpStatus {
                uri: uri.to_string(),
                status: response.status,
            });
        }

        response.json().map_err(|e| DiscoveryError::InvalidJson {
            uri: uri.to_string(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for DiscoveryFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryFetcher")
            .field("metadata_uri", &self.metadata_uri)
            .field("cache_timeout", &self.cache_timeout())
            .field("documents", &self.documents.len())
            .field("key_sets", &self.key_sets.len())
            .finish()
    }
}
