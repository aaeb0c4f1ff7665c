//! # JWT verification
//!
//! Local verification of provider-signed bearer tokens against the key set
//! and algorithm list published in the discovery document.
//!
//! # Algorithm allow-list
//!
//! The algorithm a token claims in its header is honoured only if the
//! provider lists it. Identifiers this crate cannot verify (`none`, `HS256`
//! when no symmetric key is published, unknown names) never make it into the
//! allow-list, so a token can never opt out of signature checking.
//!
//! # Modules
//!
//! - `verifier` - signature and claim checks

pub mod verifier;

pub use verifier::{JwtVerifier, parse_algorithms};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// The `aud` claim, which RFC 7519 allows as a string or an array
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience
    One(String),
    /// Several audiences
    Many(Vec<String>),
}

impl Audience {
    /// Whether `audience` is among the listed audiences
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::One(one) => one == audience,
            Self::Many(many) => many.iter().any(|a| a == audience),
        }
    }
}

/// Token or userinfo claims
///
/// Registered claims per RFC 7519 Section 4.1, plus everything else the
/// provider asserted in `additional`. This is the default principal produced
/// by both bearer strategies.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Claims {
    /// Issuer (iss)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject (sub)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience (aud)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration Time (exp), Unix timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    /// Not Before (nbf), Unix timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,

    /// Issued At (iat), Unix timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// JWT ID (jti)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Additional claims not in RFC 7519
    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

impl Claims {
    /// Look up a non-registered claim
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.additional.get(name)
    }

    /// A non-registered claim as a string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Claims from an unsigned JSON object such as a userinfo response
    ///
    /// Registered claims are read leniently: a numeric `sub` becomes its
    /// decimal string and fractional timestamps are truncated. A registered
    /// claim that still does not fit its type is kept in `additional`.
    pub fn from_object(object: Map<String, Value>) -> Self {
        let mut claims = Self::default();
        for (name, value) in object {
            let rest = match name.as_str() {
                "iss" => string_claim(value).map(|v| claims.iss = Some(v)),
                "jti" => string_claim(value).map(|v| claims.jti = Some(v)),
                "sub" => match value {
                    Value::Number(n) => {
                        claims.sub = Some(n.to_string());
                        Ok(())
                    }
                    other => string_claim(other).map(|v| claims.sub = Some(v)),
                },
                "aud" => serde_json::from_value::<Audience>(value.clone())
                    .map(|v| claims.aud = Some(v))
                    .map_err(|_| value),
                "exp" => timestamp_claim(value).map(|v| claims.exp = Some(v)),
                "nbf" => timestamp_claim(value).map(|v| claims.nbf = Some(v)),
                "iat" => timestamp_claim(value).map(|v| claims.iat = Some(v)),
                _ => Err(value),
            };
            if let Err(value) = rest {
                claims.additional.insert(name, value);
            }
        }
        claims
    }
}

fn string_claim(value: Value) -> Result<String, Value> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(other),
    }
}

fn timestamp_claim(value: Value) -> Result<u64, Value> {
    if let Some(secs) = value.as_u64() {
        return Ok(secs);
    }
    match value.as_f64() {
        Some(secs) if secs.is_finite() && secs >= 0.0 && secs < u64::MAX as f64 => {
            Ok(secs.trunc() as u64)
        }
        _ => Err(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_audience_string_or_array() {
        let one: Claims = serde_json::from_value(json!({ "aud": "api" })).expect("claims");
        let many: Claims = serde_json::from_value(json!({ "aud": ["web", "api"] })).expect("claims");

        assert!(one.aud.as_ref().is_some_and(|a| a.contains("api")));
        assert!(many.aud.as_ref().is_some_and(|a| a.contains("api")));
        assert!(!many.aud.as_ref().is_some_and(|a| a.contains("admin")));
    }

    #[test]
    fn test_userinfo_shape_deserializes() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "248289761001",
            "email": "alice@example.com",
            "email_verified": true
        }))
        .expect("claims");

        assert_eq!(claims.sub.as_deref(), Some("248289761001"));
        assert_eq!(claims.get_str("email"), Some("alice@example.com"));
        assert_eq!(claims.get("email_verified"), Some(&json!(true)));
        assert!(claims.exp.is_none());
    }

    #[test]
    fn test_serialization_skips_absent_claims() {
        let claims = Claims {
            sub: Some("alice".to_string()),
            ..Claims::default()
        };
        assert_eq!(serde_json::to_value(&claims).expect("json"), json!({ "sub": "alice" }));
    }

    #[test]
    fn test_object_claims_are_lenient() {
        let object = json!({
            "sub": 12345,
            "iat": 1_700_000_000.5,
            "exp": "tomorrow",
            "aud": ["web", "api"],
            "iss": "https://idp.example",
            "email": "alice@example.com"
        });
        let Value::Object(object) = object else {
            unreachable!("literal object")
        };

        let claims = Claims::from_object(object);

        assert_eq!(claims.sub.as_deref(), Some("12345"));
        assert_eq!(claims.iat, Some(1_700_000_000));
        assert_eq!(claims.exp, None);
        assert_eq!(claims.get("exp"), Some(&json!("tomorrow")));
        assert!(claims.aud.as_ref().is_some_and(|a| a.contains("api")));
        assert_eq!(claims.iss.as_deref(), Some("https://idp.example"));
        assert_eq!(claims.get_str("email"), Some("alice@example.com"));
    }
}
