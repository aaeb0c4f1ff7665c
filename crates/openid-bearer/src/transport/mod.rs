//! # HTTPS client with certificate pinning
//!
//! Small GET-only client used to reach the identity provider. `http` URIs are
//! fetched in the clear; `https` URIs always negotiate TLS with peer
//! verification on, which cannot be switched off.
//!
//! ## Pinning
//!
//! With a [`PinnedCertificate`] configured, hostname verification is replaced
//! by an exact DER comparison of the presented leaf certificate against the
//! pin. Any intermediate certificates the server presents must still chain to
//! a trusted root. This lets an operator trust a self-issued provider
//! certificate without disabling verification altogether.
//!
//! Without a pin, standard hostname and chain validation against the webpki
//! roots applies.
//!
//! ## Failure model
//!
//! Every failure (bad URI, connection refused, handshake failure, certificate
//! rejection, truncated body) surfaces as a single [`TransportError`]. There
//! are no retries. No request timeout is imposed unless one is configured via
//! [`HttpsClientBuilder::timeout`].

mod client;
mod pinned;

pub use client::{HttpResponse, HttpsClient, HttpsClientBuilder};
pub use pinned::PinnedCertificate;
