//! # OpenID Connect Discovery
//!
//! Retrieves a provider's discovery document from its configured metadata URL
//! and exposes the fields the bearer strategies need: issuer, signing keys,
//! allowed algorithms and the userinfo endpoint.
//!
//! ## Caching
//!
//! The document is cached under its URI for the configured timeout (15
//! minutes by default). A key set published at a separate `jwks_uri` is cached
//! independently under that URI with the same timeout. Refresh is lazy: the
//! first call after expiry refetches. Failures are never cached and never
//! retried; the next call simply tries again.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use openid_bearer::discovery::DiscoveryFetcher;
//! use openid_bearer::transport::HttpsClient;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = DiscoveryFetcher::new(
//!     "https://idp.example/.well-known/openid-configuration",
//!     HttpsClient::new()?,
//!     Some(Duration::from_secs(900)),
//! );
//!
//! let issuer = fetcher.issuer().await?;
//! let keys = fetcher.jwks().await?;
//! println!("{issuer} publishes {} keys", keys.keys.len());
//! # Ok(())
//! # }
//! ```

pub mod fetcher;
pub mod types;

pub use fetcher::DiscoveryFetcher;
pub use types::DiscoveryDocument;
