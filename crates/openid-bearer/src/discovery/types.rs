//! OpenID Connect provider metadata

use crate::error::DiscoveryError;
use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The subset of an OIDC discovery document this crate consumes.
///
/// Immutable once fetched. Fields not modelled here are kept in
/// `additional_fields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// Issuer identifier (REQUIRED)
    #[serde(default)]
    pub issuer: String,

    /// URL of the provider's JSON Web Key Set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Key set embedded in the document; preferred over `jwks_uri`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwkSet>,

    /// Algorithms accepted for signed tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_signing_alg_values_supported: Option<Vec<String>>,

    /// ID token algorithms; consulted when the above is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_signing_alg_values_supported: Option<Vec<String>>,

    /// UserInfo endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// Everything else the provider published
    #[serde(flatten)]
    pub additional_fields: HashMap<String, serde_json::Value>,
}

impl DiscoveryDocument {
    /// Validate the fields every strategy depends on
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::MissingField`] if `issuer` is absent or empty.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.issuer.is_empty() {
            return Err(DiscoveryError::MissingField("issuer"));
        }
        Ok(())
    }

    /// Algorithm identifiers allowed for token signatures, as published.
    ///
    /// Falls back to `id_token_signing_alg_values_supported` when the provider
    /// does not publish `authorization_signing_alg_values_supported`. Empty if
    /// neither is present, which rejects every token.
    pub fn allowed_algorithms(&self) -> &[String] {
        self.authorization_signing_alg_values_supported
            .as_deref()
            .or(self.id_token_signing_alg_values_supported.as_deref())
            .unwrap_or_default()
    }
}
