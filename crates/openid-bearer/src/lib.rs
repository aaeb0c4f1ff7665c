//! # OpenID Bearer - OIDC bearer-token authentication
//!
//! Request authentication for backend services that leave the interactive
//! login flow to a separate front-end and only need to check the
//! `Authorization: Bearer <token>` header of each request against an OpenID
//! Connect provider.
//!
//! ## Key Features
//!
//! - **Local JWT verification** - signature, algorithm allow-list, `exp`,
//!   `nbf` and `iat` checked against the provider's published keys
//! - **Remote userinfo delegation** - opaque tokens handed to the provider's
//!   userinfo endpoint
//! - **Issuer routing** - the JWT strategy declines tokens from other issuers,
//!   so one strategy per trusted provider can share a pipeline
//! - **Certificate pinning** - trust a self-issued provider certificate by
//!   exact match instead of hostname verification
//! - **Lazy TTL caching** - discovery documents and key sets cached per URI,
//!   per-request results cached per request without retaining it
//!
//! ## Architecture
//!
//! - [`cache`] - value-keyed and identity-keyed TTL caches
//! - [`transport`] - GET-only HTTPS client with optional certificate pinning
//! - [`discovery`] - discovery document and key set fetcher
//! - [`jwt`] - claims and JWT verification
//! - [`strategy`] - the bearer strategies, their outcome and a named registry
//! - [`config`] - configuration, environment loading and the global slot
//! - [`error`] - error types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use openid_bearer::{BearerConfig, JwtBearerStrategy, Outcome, RequestRef, Strategy};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BearerConfig::new("https://idp.example/.well-known/openid-configuration");
//! let strategy = JwtBearerStrategy::from_config(&config)?;
//!
//! let request: RequestRef = Arc::new(
//!     http::Request::builder()
//!         .header("Authorization", "Bearer eyJhbGciOi...")
//!         .body(())?,
//! );
//!
//! if strategy.is_valid(&request).await {
//!     match strategy.authenticate(&request).await {
//!         Outcome::Success(claims) => println!("hello {:?}", claims.sub),
//!         Outcome::Failure(error) => println!("401: {error}"),
//!         Outcome::Decline => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure model
//!
//! Nothing in this crate panics or returns an error out of a strategy: an
//! unreachable provider, a malformed discovery document and a bad token all
//! become [`Outcome::Failure`] with a message for the client. Expired tokens
//! get their own message so clients know to refresh.

pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod jwt;
pub mod strategy;
pub mod transport;

#[doc(inline)]
pub use config::{BearerConfig, configure, global};

#[doc(inline)]
pub use error::{BearerError, ConfigError, DiscoveryError, RegistryError, TransportError};

#[doc(inline)]
pub use jwt::Claims;

#[doc(inline)]
pub use strategy::{
    JwtBearerStrategy, Outcome, RequestHeaders, RequestRef, Strategy, StrategyRegistry,
    UserinfoBearerStrategy,
};
