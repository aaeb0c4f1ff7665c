//! Common test utilities for integration tests
//!
//! A wiremock-backed OIDC provider (discovery, JWKS, userinfo), fixed signing
//! keys, and helpers to mint tokens and build requests.

#![allow(dead_code)]

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use openid_bearer::config::BearerConfig;
use openid_bearer::discovery::DiscoveryFetcher;
use openid_bearer::strategy::RequestRef;
use openid_bearer::transport::HttpsClient;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

/// Issuer published by the mock provider
pub const ISSUER: &str = "https://idp.example";

pub const RSA_PRIVATE_PEM: &str = include_str!("../fixtures/rsa_private.pem");
pub const RSA_N: &str = "sVOj7ZaQL_MP_cqAvLL0Mw5rwN9ZYgtwPCmK_d83br3pQTFBhQu5QSX9KZcSwLSm9CiHQ-7_X5mt8HPYGZnByay9kJgewZjkMnOx-U5_OI1qg1EplfyEl1uheDL4oQ24GWzcVjqG3Frp7pDG4X_4l_giT_woOuUVS8RMnTg9uKzZQNH3KvxZM6Is8JXCYs4wPZQOQ_5gHBuUPB3T6ddIF15aCc4C08Mit9D8LyaX0vX_dOPgDAPXE27j-jkmZ3iqR_CyHd-OcGMv4IkFUaak3y2iiRQmmdDDWxeuCzG5spLu4CGaNMAVs5Rd3VaBE2EIrGy7SYHUg03OBcgal2-JzQ";

/// A second RSA key the provider never publishes
pub const RSA_OTHER_PRIVATE_PEM: &str = include_str!("../fixtures/rsa_other_private.pem");
pub const RSA_OTHER_N: &str = "wNnJ_ZnePwqHPxl_QYVbyXXB570PiV6msnra8GQC5dFIVDdP0Wy4WPcT1dTXhjhp5-qjOtbrbpQmQ6jSkmbOrrD27F0xJBBggogbDKzurn5Ifimi4sa3XONlchJaIkMkHikbvbPKMAzHEBIpLb7oGq7m4D1M2fK0ZS3k-FuCsPULzwB5XW6Ksjt2OziKsGUXvufsQrOW9En5MeZJv5hf5yEadhNIrB_BXGcWefOWIqA3pTX5lag_WCcUa1ZdqfLm13oGdfeQGJJSLGEuP0tYhrxvZELlxA_OEOoMc9k_vkfwUECG-a83A9g6lIZV6sjxZKflAUTLlylAhZ0cxQpq7Q";

pub const EC_PRIVATE_PEM: &str = include_str!("../fixtures/ec_private.pem");
pub const EC_X: &str = "HL8TIuOfr8sWSRgLyG6TNghXWDnOF9DnTc5T7rnp-LU";
pub const EC_Y: &str = "RJDrZkVQYRAqzFH7FiOoB0C-X1_SIS2A0HM-YM-cEyc";

pub const RSA_KID: &str = "rsa-2025";
pub const EC_KID: &str = "ec-2025";

/// Route tracing output to the test harness; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Current Unix timestamp
pub fn now() -> u64 {
    jsonwebtoken::get_current_timestamp()
}

/// Public JWK for [`RSA_PRIVATE_PEM`]
pub fn rsa_jwk(kid: &str) -> Value {
    json!({ "kty": "RSA", "kid": kid, "use": "sig", "n": RSA_N, "e": "AQAB" })
}

/// Public JWK for [`RSA_OTHER_PRIVATE_PEM`]
pub fn rsa_other_jwk(kid: &str) -> Value {
    json!({ "kty": "RSA", "kid": kid, "use": "sig", "n": RSA_OTHER_N, "e": "AQAB" })
}

/// Public JWK for [`EC_PRIVATE_PEM`]
pub fn ec_jwk(kid: &str) -> Value {
    json!({ "kty": "EC", "kid": kid, "use": "sig", "crv": "P-256", "x": EC_X, "y": EC_Y })
}

/// Claims accepted by the mock provider's issuer, expiring in `exp_in` seconds
pub fn claims(sub: &str, exp_in: i64) -> Value {
    let now = now() as i64;
    json!({
        "iss": ISSUER,
        "sub": sub,
        "iat": now,
        "exp": now + exp_in,
        "email": format!("{sub}@example.com"),
    })
}

/// Sign `claims` with `alg` using `pem`
pub fn sign(alg: Algorithm, pem: &str, kid: Option<&str>, claims: &Value) -> String {
    let key = match alg {
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem.as_bytes()),
        _ => EncodingKey::from_rsa_pem(pem.as_bytes()),
    }
    .expect("Failed to load signing key");

    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, &key).expect("Failed to sign token")
}

/// RS256 token signed with the published RSA key
pub fn rs256_token(claims: &Value) -> String {
    sign(Algorithm::RS256, RSA_PRIVATE_PEM, Some(RSA_KID), claims)
}

/// Request carrying `authorization` as its `Authorization` header
pub fn request_with(authorization: &str) -> RequestRef {
    Arc::new(
        http::Request::builder()
            .uri("/api/resource")
            .header("Authorization", authorization)
            .body(())
            .expect("Failed to build request"),
    )
}

/// Request without an `Authorization` header
pub fn anonymous_request() -> RequestRef {
    Arc::new(http::HeaderMap::new())
}

/// Wiremock-backed OIDC provider
pub struct MockProvider {
    pub server: MockServer,
    pub metadata_url: String,
    pub jwks_url: String,
    pub userinfo_url: String,
}

impl MockProvider {
    /// Start an empty provider; mount endpoints with the `mock_*` methods
    pub async fn start() -> Self {
        init_tracing();
        let server = MockServer::start().await;
        let base_url = server.uri();

        Self {
            server,
            metadata_url: format!("{base_url}/.well-known/openid-configuration"),
            jwks_url: format!("{base_url}/jwks"),
            userinfo_url: format!("{base_url}/userinfo"),
        }
    }

    /// Discovery document with an inline RSA key set and the given algorithms
    pub fn document(&self, algs: &[&str]) -> Value {
        json!({
            "issuer": ISSUER,
            "jwks": { "keys": [rsa_jwk(RSA_KID), ec_jwk(EC_KID)] },
            "authorization_signing_alg_values_supported": algs,
            "userinfo_endpoint": self.userinfo_url,
        })
    }

    /// Serve `document` at the metadata URL
    pub async fn mock_discovery(&self, document: Value) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(&self.server)
            .await;
    }

    /// Serve `document` at the metadata URL, expecting exactly `hits` fetches
    pub async fn mock_discovery_expecting(&self, document: Value, hits: u64) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .expect(hits)
            .mount(&self.server)
            .await;
    }

    /// Answer discovery with `status`
    pub async fn mock_discovery_error(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(status).set_body_string("unavailable"))
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` at the JWKS URL, expecting exactly `hits` fetches
    pub async fn mock_jwks(&self, keys: Vec<Value>, hits: u64) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .expect(hits)
            .mount(&self.server)
            .await;
    }

    /// Answer userinfo requests bearing `token` with `status` and `body`
    pub async fn mock_userinfo(&self, token: &str, status: u16, body: Value, hits: u64) {
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(hits)
            .mount(&self.server)
            .await;
    }

    /// Configuration pointing at this provider
    pub fn config(&self) -> BearerConfig {
        BearerConfig::new(self.metadata_url.clone())
    }

    /// Fetcher for this provider with the given cache timeout
    pub fn fetcher(&self, cache_timeout: Option<Duration>) -> Arc<DiscoveryFetcher> {
        Arc::new(DiscoveryFetcher::new(
            self.metadata_url.clone(),
            HttpsClient::new().expect("Failed to create HTTP client"),
            cache_timeout,
        ))
    }
}
