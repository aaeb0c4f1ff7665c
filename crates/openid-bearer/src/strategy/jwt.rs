//! Local JWT verification strategy

use super::{BearerTokens, Outcome, PrincipalFn, RequestRef, Strategy, claims_as_principal};
use crate::config::{self, BearerConfig};
use crate::discovery::DiscoveryFetcher;
use crate::error::{BearerError, ConfigError};
use crate::jwt::{Claims, JwtVerifier};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Authenticates requests by verifying their bearer JWT locally.
///
/// Applies only when the token's unverified `iss` equals the provider's
/// issuer. Verification uses the provider's key set and algorithm list from
/// the discovery document.
///
/// # Example
///
/// ```rust,no_run
/// use openid_bearer::config::BearerConfig;
/// use openid_bearer::strategy::{JwtBearerStrategy, Outcome, RequestRef, Strategy};
/// use std::sync::Arc;
///
/// # async fn example(request: http::Request<()>) -> Result<(), Box<dyn std::error::Error>> {
/// let config = BearerConfig::new("https://idp.example/.well-known/openid-configuration");
/// let strategy = JwtBearerStrategy::from_config(&config)?
///     .with_principal(|claims| claims.sub.unwrap_or_default());
///
/// let request: RequestRef = Arc::new(request);
/// if strategy.is_valid(&request).await {
///     match strategy.authenticate(&request).await {
///         Outcome::Success(subject) => println!("authenticated {subject}"),
///         Outcome::Failure(error) => println!("refused: {error}"),
///         Outcome::Decline => {}
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct JwtBearerStrategy<P = Claims> {
    fetcher: Arc<DiscoveryFetcher>,
    verifier: JwtVerifier,
    tokens: BearerTokens,
    principal: PrincipalFn<P>,
}

impl JwtBearerStrategy<Claims> {
    /// Strategy whose principal is the verified claims
    pub fn new(fetcher: Arc<DiscoveryFetcher>, verifier: JwtVerifier) -> Self {
        Self {
            fetcher,
            verifier,
            tokens: BearerTokens::new(),
            principal: claims_as_principal(),
        }
    }

    /// Strategy built from an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is unusable.
    pub fn from_config(config: &BearerConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            Arc::new(DiscoveryFetcher::from_config(config)?),
            JwtVerifier::from_config(config),
        ))
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

impl<P> JwtBearerStrategy<P> {
    /// Derive the principal from the verified claims with `principal`
    pub fn with_principal<Q, F>(self, principal: F) -> JwtBearerStrategy<Q>
    where
        F: Fn(Claims) -> Q + Send + Sync + 'static,
    {
        JwtBearerStrategy {
            fetcher: self.fetcher,
            verifier: self.verifier,
            tokens: self.tokens,
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

    async fn verify(&self, token: &str) -> Result<Claims, BearerError> {
        let metadata = self.fetcher.metadata().await?;
        let key_set = self.fetcher.jwks().await?;
        self.verifier.verify(
            token,
            &key_set,
            metadata.allowed_algorithms(),
            &metadata.issuer,
        )
    }
}

#[async_trait]
impl<P: Send + 'static> Strategy for JwtBearerStrategy<P> {
    type Principal = P;

    async fn is_valid(&self, request: &RequestRef) -> bool {
        let Some(token) = self.token(request) else {
            return false;
        };

        let Some(claimed) = JwtVerifier::untrusted_issuer(&token) else {
            debug!("Bearer token is not a JWT with an issuer, declining");
            return false;
        };

        match self.fetcher.issuer().await {
            Ok(issuer) => {
                let applies = issuer == claimed;
                if !applies {
                    debug!(issuer = %issuer, claimed = %claimed, "Token issued elsewhere, declining");
                }
                applies
            }
            Err(e) => {
                // Cannot tell; let authenticate report the discovery failure
                warn!(
                    uri = %self.fetcher.metadata_uri(),
                    error = %e,
                    "Discovery failed while checking token issuer"
                );
                true
            }
        }
    }

    async fn authenticate(&self, request: &RequestRef) -> Outcome<P> {
        let Some(token) = self.token(request) else {
            return Outcome::Decline;
        };

        match self.verify(&token).await {
            Ok(claims) => Outcome::Success((self.principal)(claims)),
            Err(e) => {
                match &e {
                    BearerError::TokenInvalid { reason } => {
                        warn!(reason = %reason, "Rejected bearer token");
                    }
                    other => warn!(error = %other, "Bearer authentication failed"),
                }
                Outcome::Failure(e)
            }
        }
    }
}

impl<P> fmt::Debug for JwtBearerStrategy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtBearerStrategy")
            .field("fetcher", &self.fetcher)
            .field("verifier", &self.verifier)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
