//! Loading configuration from the environment
//!
//! Uses `from_lookup` with a fixed variable table so tests never touch the
//! process environment.

mod common;

use common::*;
use openid_bearer::config::{
    BearerConfig, ENV_AUDIENCE, ENV_CACHE_TIMEOUT_SECS, ENV_LEEWAY_SECS, ENV_METADATA_URL,
    ENV_PINNED_CERT_PATH, ENV_REQUEST_TIMEOUT_SECS,
};
use openid_bearer::{ConfigError, JwtBearerStrategy, Strategy, UserinfoBearerStrategy};
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

fn env(vars: &[(&str, String)]) -> impl Fn(&str) -> Option<String> + use<> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    move |key| vars.get(key).cloned()
}

/// Test: Every variable lands in the configuration
#[test]
fn test_full_environment() {
    // GIVEN: A PEM file on disk and all variables set
    let cert = rcgen::generate_simple_self_signed(vec!["idp.internal".to_string()])
        .expect("Failed to generate certificate");
    let mut pem_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    pem_file
        .write_all(cert.cert.pem().as_bytes())
        .expect("Failed to write PEM");

    let lookup = env(&[
        (ENV_METADATA_URL, "https://idp.internal/.well-known/openid-configuration".into()),
        (ENV_CACHE_TIMEOUT_SECS, "300".into()),
        (ENV_PINNED_CERT_PATH, pem_file.path().display().to_string()),
        (ENV_LEEWAY_SECS, "5".into()),
        (ENV_AUDIENCE, "orders-api".into()),
        (ENV_REQUEST_TIMEOUT_SECS, "10".into()),
    ]);

    // WHEN: Loading the configuration
    let config = BearerConfig::from_lookup(lookup).expect("Environment is valid");

    // THEN: Everything is picked up and the pin matches the file
    assert_eq!(config.cache_timeout(), Some(Duration::from_secs(300)));
    assert_eq!(config.leeway(), Duration::from_secs(5));
    assert_eq!(config.audience.as_deref(), Some("orders-api"));
    assert_eq!(config.request_timeout(), Some(Duration::from_secs(10)));

    let pinned = config
        .pinned_certificate()
        .expect("PEM decodes")
        .expect("Pin configured");
    assert_eq!(pinned.der().as_ref(), cert.cert.der().as_ref());

    let client = config.http_client().expect("Client builds");
    assert!(client.is_pinned());
    assert_eq!(client.timeout(), Some(Duration::from_secs(10)));
}

/// Test: A missing certificate file is reported with its path
#[test]
fn test_unreadable_certificate_path() {
    let lookup = env(&[
        (ENV_METADATA_URL, "https://idp.example/.well-known/openid-configuration".into()),
        (ENV_PINNED_CERT_PATH, "/nonexistent/idp.pem".into()),
    ]);

    match BearerConfig::from_lookup(lookup) {
        Err(ConfigError::Io { path, .. }) => assert_eq!(path, "/nonexistent/idp.pem"),
        other => panic!("Expected I/O error, got {other:?}"),
    }
}

/// Test: A file without a certificate fails validation
#[test]
fn test_certificate_file_without_certificate() {
    let mut pem_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    pem_file
        .write_all(b"not a certificate\n")
        .expect("Failed to write file");

    let lookup = env(&[
        (ENV_METADATA_URL, "https://idp.example/.well-known/openid-configuration".into()),
        (ENV_PINNED_CERT_PATH, pem_file.path().display().to_string()),
    ]);

    assert!(matches!(
        BearerConfig::from_lookup(lookup),
        Err(ConfigError::Transport(_))
    ));
}

/// Test: Strategies built from loaded configuration work end to end
#[tokio::test]
async fn test_strategies_from_loaded_config() {
    // GIVEN: A provider and configuration read from variables
    let provider = MockProvider::start().await;
    provider.mock_discovery(provider.document(&["RS256"])).await;
    provider
        .mock_userinfo("opaque", 200, serde_json::json!({ "sub": "bob" }), 1)
        .await;

    let config = BearerConfig::from_lookup(env(&[
        (ENV_METADATA_URL, provider.metadata_url.clone()),
        (ENV_CACHE_TIMEOUT_SECS, "never".into()),
    ]))
    .expect("Environment is valid");
    assert_eq!(config.cache_timeout(), None);

    // WHEN: Both strategies are built from it
    let jwt = JwtBearerStrategy::from_config(&config).expect("JWT strategy");
    let userinfo = UserinfoBearerStrategy::from_config(&config).expect("Userinfo strategy");

    // THEN: Each authenticates its kind of token
    let signed = request_with(&format!("Bearer {}", rs256_token(&claims("alice", 3600))));
    assert!(jwt.is_valid(&signed).await);
    assert!(jwt.authenticate(&signed).await.is_success());

    let opaque = request_with("Bearer opaque");
    assert!(userinfo.is_valid(&opaque).await);
    assert_eq!(
        userinfo
            .authenticate(&opaque)
            .await
            .into_principal()
            .and_then(|c| c.sub)
            .as_deref(),
        Some("bob")
    );
}
