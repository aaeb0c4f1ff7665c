//! Remote userinfo strategy

use super::{
    BearerTokens, Outcome, PrincipalFn, RequestHeaders, RequestRef, Strategy, claims_as_principal,
};
use crate::cache::IdentityCache;
use crate::config::{self, BearerConfig};
use crate::discovery::DiscoveryFetcher;
use crate::error::{BearerError, ConfigError};
use crate::jwt::Claims;
use crate::transport::HttpResponse;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Authenticates requests by presenting their bearer token to the provider's
/// userinfo endpoint.
///
/// The token is opaque to this strategy: it applies to any request carrying a
/// bearer token, and the provider alone decides. The userinfo response is
/// fetched at most once per request.
pub struct UserinfoBearerStrategy<P = Claims> {
    fetcher: Arc<DiscoveryFetcher>,
    tokens: BearerTokens,
    responses: IdentityCache<dyn RequestHeaders, HttpResponse>,
    principal: PrincipalFn<P>,
}

impl UserinfoBearerStrategy<Claims> {
    /// Strategy whose principal is the userinfo claims
    pub fn new(fetcher: Arc<DiscoveryFetcher>) -> Self {
        Self {
            fetcher,
            tokens: BearerTokens::new(),
            responses: IdentityCache::new(None),
            principal: claims_as_principal(),
        }
    }

    /// Strategy built from an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is unusable.
    pub fn from_config(config: &BearerConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(DiscoveryFetcher::from_config(config)?)))
    }

    /// Strategy built from the process-wide configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if [`config::configure`] was never called.
    pub fn from_global() -> Result<Self, ConfigError> {
        Self::from_config(config::global().ok_or(ConfigError::Missing("global configuration"))?)
    }
}

impl<P> UserinfoBearerStrategy<P> {
    /// Derive the principal from the userinfo claims with `principal`
    pub fn with_principal<Q, F>(self, principal: F) -> UserinfoBearerStrategy<Q>
    where
        F: Fn(Claims) -> Q + Send + Sync + 'static,
    {
        UserinfoBearerStrategy {
            fetcher: self.fetcher,
            tokens: self.tokens,
            responses: self.responses,
            principal: Arc::new(principal),
        }
    }

    /// The discovery fetcher
    pub fn fetcher(&self) -> &Arc<DiscoveryFetcher> {
        &self.fetcher
    }

    /// The bearer token of `request`, extracted once per request
    pub fn token(&self, request: &RequestRef) -> Option<Arc<str>> {
        self.tokens.token(request)
    }

    async fn userinfo(&self, request: &RequestRef, token: &str) -> Result<Claims, BearerError> {
        let endpoint = self.fetcher.userinfo_endpoint().await?;

        let response = self
            .responses
            .get_or_try_insert_with(request, || {
                self.fetcher.client().get_with_bearer(&endpoint, token)
            })
            .await?;

        if !response.is_success() {
            return Err(BearerError::UserinfoRejected {
                status: response.status,
                body: response.text(),
            });
        }

        response
            .json::<Map<String, Value>>()
            .map(Claims::from_object)
            .map_err(|e| BearerError::invalid(format!("userinfo response is not a claims object: {e}")))
    }
}

#[async_trait]
impl<P: Send + 'static> Strategy for UserinfoBearerStrategy<P> {
    type Principal = P;

    async fn is_valid(&self, request: &RequestRef) -> bool {
        self.token(request).is_some()
    }

    async fn authenticate(&self, request: &RequestRef) -> Outcome<P> {
        let Some(token) = self.token(request) else {
            return Outcome::Decline;
        };

        match self.userinfo(request, &token).await {
            Ok(claims) => {
                debug!(subject = ?claims.sub, "Userinfo accepted bearer token");
                Outcome::Success((self.principal)(claims))
            }
            Err(e) => {
                warn!(error = %e, "Userinfo authentication failed");
                Outcome::Failure(e)
            }
        }
    }
}

impl<P> fmt::Debug for UserinfoBearerStrategy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserinfoBearerStrategy")
            .field("fetcher", &self.fetcher)
            .field("tokens", &self.tokens)
            .field("responses", &self.responses)
            .finish_non_exhaustive()
    }
}
