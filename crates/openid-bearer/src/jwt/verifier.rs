//! JWT signature and claim verification against a provider key set

use super::Claims;
use crate::config::{BearerConfig, DEFAULT_LEEWAY_SECS};
use crate::error::BearerError;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Parse published algorithm identifiers, dropping any this crate cannot verify.
///
/// `none` and unknown names are skipped, never mapped to a default.
pub fn parse_algorithms(names: &[String]) -> Vec<Algorithm> {
    names
        .iter()
        .filter_map(|name| match Algorithm::from_str(name) {
            Ok(alg) => Some(alg),
            Err(_) => {
                debug!(algorithm = %name, "Ignoring unsupported signing algorithm");
                None
            }
        })
        .collect()
}

/// Verifies bearer JWTs
///
/// Stateless apart from its settings; the key set, allow-list and issuer are
/// supplied per call so they can come from a cached discovery document.
#[derive(Debug, Clone)]
pub struct JwtVerifier {
    leeway: Duration,
    audience: Option<String>,
}

impl Default for JwtVerifier {
    fn default() -> Self {
        Self {
            leeway: Duration::from_secs(DEFAULT_LEEWAY_SECS),
            audience: None,
        }
    }
}

impl JwtVerifier {
    /// Verifier with 60 seconds of clock-skew leeway and no audience check
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier with the leeway and audience of `config`
    pub fn from_config(config: &BearerConfig) -> Self {
        Self {
            leeway: config.leeway(),
            audience: config.audience.clone(),
        }
    }

    /// Set the clock-skew tolerance for `exp`, `nbf` and `iat`
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Require this `aud` claim
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Configured leeway
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Decode the payload WITHOUT checking the signature.
    ///
    /// Only for routing decisions; never trust the result.
    ///
    /// # Errors
    ///
    /// Returns [`BearerError::TokenInvalid`] if the token is not a
    /// three-part JWS with a JSON payload.
    pub fn untrusted_claims(token: &str) -> Result<Claims, BearerError> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(BearerError::invalid("token is not a three-part JWS"));
        };

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| BearerError::invalid(format!("invalid payload encoding: {e}")))?;

        serde_json::from_slice(&payload)
            .map_err(|e| BearerError::invalid(format!("invalid claims: {e}")))
    }

    /// The unverified `iss` claim, if the token can be decoded at all
    pub fn untrusted_issuer(token: &str) -> Option<String> {
        Self::untrusted_claims(token).ok()?.iss
    }

    /// The unverified `alg` header
    ///
    /// # Errors
    ///
    /// Returns [`BearerError::TokenInvalid`] if the header is malformed or
    /// names an algorithm this crate does not know (including `none`).
    pub fn untrusted_algorithm(token: &str) -> Result<Algorithm, BearerError> {
        decode_header(token)
            .map(|header| header.alg)
            .map_err(|e| BearerError::invalid(format!("invalid header: {e}")))
    }

    /// Fully verify `token`.
    ///
    /// The header algorithm must be in `allowed_algs`. The signing key is the
    /// one matching the header `kid`; without a `kid`, every key in the set is
    /// tried. Signature, `exp`, `nbf` and `iss` are checked, `iat` must not be
    /// in the future, and `aud` is checked when an audience is configured.
    ///
    /// # Errors
    ///
    /// Returns [`BearerError::TokenExpired`] for a correctly signed but expired
    /// token and [`BearerError::TokenInvalid`] for everything else.
    pub fn verify(
        &self,
        token: &str,
        key_set: &JwkSet,
        allowed_algs: &[String],
        issuer: &str,
    ) -> Result<Claims, BearerError> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode JWT header");
            BearerError::invalid(format!("invalid header: {e}"))
        })?;

        let allowed = parse_algorithms(allowed_algs);
        if !allowed.contains(&header.alg) {
            warn!(
                algorithm = ?header.alg,
                allowed = ?allowed,
                "JWT algorithm not allowed by provider"
            );
            return Err(BearerError::invalid(format!(
                "algorithm {:?} not allowed",
                header.alg
            )));
        }

        let candidates: Vec<&Jwk> = match header.kid.as_deref() {
            Some(kid) => vec![key_set.find(kid).ok_or_else(|| {
                warn!(key_id = kid, "Key ID not found in JWKS");
                BearerError::invalid(format!("key '{kid}' not found"))
            })?],
            None => key_set.keys.iter().collect(),
        };

        let validation = self.validation(header.alg, issuer);
        let mut last_error = BearerError::invalid("no signing key available");

        for jwk in candidates {
            let key = match DecodingKey::from_jwk(jwk) {
                Ok(key) => key,
                Err(e) => {
                    debug!(key_id = ?jwk.common.key_id, error = %e, "Skipping unusable JWK");
                    last_error = BearerError::invalid(format!("unusable key: {e}"));
                    continue;
                }
            };

            match decode::<Claims>(token, &key, &validation) {
                Ok(data) => {
                    self.check_issued_at(&data.claims)?;
                    debug!(
                        issuer,
                        subject = ?data.claims.sub,
                        algorithm = ?header.alg,
                        "JWT verification successful"
                    );
                    return Ok(data.claims);
                }
                Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                    debug!(issuer, "JWT expired");
                    return Err(BearerError::TokenExpired);
                }
                Err(e) if wrong_key(e.kind()) => {
                    last_error = BearerError::invalid(format!("signature check failed: {e}"));
                }
                Err(e) => {
                    warn!(error = %e, issuer, "JWT validation failed");
                    return Err(BearerError::invalid(e.to_string()));
                }
            }
        }

        warn!(issuer, "No key in the provider's set verified the JWT");
        Err(last_error)
    }

    fn validation(&self, algorithm: Algorithm, issuer: &str) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.leeway = self.leeway.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }

    fn check_issued_at(&self, claims: &Claims) -> Result<(), BearerError> {
        let now = jsonwebtoken::get_current_timestamp();
        match claims.iat {
            Some(iat) if iat > now.saturating_add(self.leeway.as_secs()) => {
                warn!(iat, now, "JWT issued in the future");
                Err(BearerError::invalid("token issued in the future"))
            }
            _ => Ok(()),
        }
    }
}

/// Errors that mean "this key did not verify the token", as opposed to a
/// correctly signed token with bad claims
fn wrong_key(kind: &ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::InvalidSignature
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidEcdsaKey
    )
}
