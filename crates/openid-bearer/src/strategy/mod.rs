//! # Bearer strategies
//!
//! A strategy decides, per request, whether it applies ([`Strategy::is_valid`])
//! and, if so, whether the request is authenticated
//! ([`Strategy::authenticate`]). The host framework calls them in that order.
//!
//! Two strategies are provided:
//!
//! - [`JwtBearerStrategy`] verifies the token locally against the provider's
//!   published keys. It only applies to tokens whose (unverified) issuer is
//!   the configured provider, so one strategy per trusted issuer can sit in
//!   the same pipeline.
//! - [`UserinfoBearerStrategy`] treats the token as opaque and asks the
//!   provider's userinfo endpoint who it belongs to.
//!
//! A strategy instance is built once and shared across every request, possibly
//! concurrently. Per-request results (the extracted token, the userinfo
//! response) are memoized in identity-keyed caches under the request's `Arc`,
//! so they vanish with the request.
//!
//! Neither strategy establishes a session: [`Strategy::stores_session`] is
//! `false` and the token is checked again on every request.

mod jwt;
mod registry;
mod userinfo;

pub use jwt::JwtBearerStrategy;
pub use registry::StrategyRegistry;
pub use userinfo::UserinfoBearerStrategy;

use crate::cache::IdentityCache;
use crate::error::BearerError;
use crate::jwt::Claims;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the header carrying the bearer token
pub const AUTHORIZATION: &str = "Authorization";

/// Header lookup on a host framework's request
pub trait RequestHeaders: Send + Sync + 'static {
    /// Value of the header `name`, if present and valid UTF-8
    fn header(&self, name: &str) -> Option<&str>;
}

impl RequestHeaders for http::HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name)?.to_str().ok()
    }
}

impl<B: Send + Sync + 'static> RequestHeaders for http::Request<B> {
    fn header(&self, name: &str) -> Option<&str> {
        RequestHeaders::header(self.headers(), name)
    }
}

impl RequestHeaders for http::request::Parts {
    fn header(&self, name: &str) -> Option<&str> {
        RequestHeaders::header(&self.headers, name)
    }
}

impl RequestHeaders for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// A request as seen by the strategies.
///
/// The `Arc`'s identity keys the per-request caches: clone the `Arc` to share
/// cached results between `is_valid` and `authenticate`.
pub type RequestRef = Arc<dyn RequestHeaders>;

/// Maps verified claims to the host's principal type
pub type PrincipalFn<P> = Arc<dyn Fn(Claims) -> P + Send + Sync>;

pub(crate) fn claims_as_principal() -> PrincipalFn<Claims> {
    Arc::new(|claims| claims)
}

/// Extract the token from an `Authorization` header value.
///
/// The value is split on its first space; the token is the remainder when the
/// scheme is `bearer` in any case. An empty token counts as none.
///
/// ```rust
/// use openid_bearer::strategy::extract_bearer;
///
/// assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
/// assert_eq!(extract_bearer("bEaReR abc"), Some("abc"));
/// assert_eq!(extract_bearer("Basic xyz"), None);
/// assert_eq!(extract_bearer("Bearer"), None);
/// ```
pub fn extract_bearer(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.split_once(' ')?;
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Per-request memo of the extracted bearer token
pub(crate) struct BearerTokens {
    cache: IdentityCache<dyn RequestHeaders, Option<Arc<str>>>,
}

impl BearerTokens {
    pub(crate) fn new() -> Self {
        Self {
            cache: IdentityCache::new(None),
        }
    }

    pub(crate) fn token(&self, request: &RequestRef) -> Option<Arc<str>> {
        self.cache.get_or_insert_with(request, || {
            request
                .header(AUTHORIZATION)
                .and_then(extract_bearer)
                .map(Arc::from)
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }
}

/// Result of running a strategy on a request
#[derive(Debug)]
pub enum Outcome<P> {
    /// The strategy does not apply; the host should try the next one
    Decline,
    /// Authenticated as this principal
    Success(P),
    /// Authentication failed; the request must be refused
    Failure(BearerError),
}

impl<P> Outcome<P> {
    /// Whether the request was authenticated
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether authentication failed
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Whether the strategy declined
    pub fn is_decline(&self) -> bool {
        matches!(self, Self::Decline)
    }

    /// Failure message for the host framework
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Failure(error) => Some(error.to_string()),
            _ => None,
        }
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&BearerError> {
        match self {
            Self::Failure(error) => Some(error),
            _ => None,
        }
    }

    /// The principal, if authenticated
    pub fn into_principal(self) -> Option<P> {
        match self {
            Self::Success(principal) => Some(principal),
            _ => None,
        }
    }
}

/// An authentication strategy the host framework can run per request
#[async_trait]
pub trait Strategy: Send + Sync {
    /// What a successful authentication produces
    type Principal: Send;

    /// Whether this strategy applies to `request`
    async fn is_valid(&self, request: &RequestRef) -> bool;

    /// Authenticate `request`; only meaningful after `is_valid` returned true
    async fn authenticate(&self, request: &RequestRef) -> Outcome<Self::Principal>;

    /// Whether the host should persist the principal between requests
    fn stores_session(&self) -> bool {
        false
    }
}

impl fmt::Debug for BearerTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokens")
            .field("requests", &self.len())
            .finish()
    }
}
