//! reqwest-backed GET client

use super::pinned::{self, PinnedCertificate};
use crate::error::TransportError;
use bytes::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("openid-bearer/", env!("CARGO_PKG_VERSION"));

/// Status and body of a completed GET.
///
/// Non-2xx answers are still responses; interpreting the status is up to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Numeric status code
    pub status: u16,
    /// Raw body
    pub body: Bytes,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, with invalid UTF-8 replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Builder for [`HttpsClient`]
#[derive(Debug, Clone, Default)]
pub struct HttpsClientBuilder {
    pinned: Option<PinnedCertificate>,
    timeout: Option<Duration>,
}

impl HttpsClientBuilder {
    /// Trust the provider by exact leaf-certificate match
    pub fn pinned_certificate(mut self, pinned: Option<PinnedCertificate>) -> Self {
        self.pinned = pinned;
        self
    }

    /// Bound the total duration of each request. Unset by default.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if the TLS stack cannot be set up.
    pub fn build(self) -> Result<HttpsClient, TransportError> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match &self.pinned {
            Some(cert) => builder.use_preconfigured_tls(pinned::client_config(cert)?),
            None => builder.use_rustls_tls(),
        };

        let inner = builder
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        Ok(HttpsClient {
            inner,
            pinned: self.pinned.is_some(),
            timeout: self.timeout,
        })
    }
}

/// GET-only HTTP(S) client used for every provider request.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpsClient {
    inner: reqwest::Client,
    pinned: bool,
    timeout: Option<Duration>,
}

impl HttpsClient {
    /// Client with standard certificate validation and no timeout
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if the TLS stack cannot be set up.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }

    /// Start building a client
    pub fn builder() -> HttpsClientBuilder {
        HttpsClientBuilder::default()
    }

    /// Client that trusts `pinned` by exact leaf match
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if the TLS stack cannot be set up.
    pub fn with_pinned_certificate(pinned: PinnedCertificate) -> Result<Self, TransportError> {
        Self::builder().pinned_certificate(Some(pinned)).build()
    }

    /// Whether a pinned certificate replaces hostname verification
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Configured request timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Fetch `uri`
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on an unparseable URI, a connection or TLS
    /// failure, or a truncated body. A non-2xx status is not an error.
    pub async fn get(&self, uri: &str) -> Result<HttpResponse, TransportError> {
        self.execute(uri, None).await
    }

    /// Fetch `uri` with an `Authorization: Bearer <token>` header
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn get_with_bearer(
        &self,
        uri: &str,
        token: &str,
    ) -> Result<HttpResponse, TransportError> {
        self.execute(uri, Some(token)).await
    }

    async fn execute(&self, uri: &str, token: Option<&str>) -> Result<HttpResponse, TransportError> {
        let url = parse_uri(uri)?;

        let mut request = self.inner.get(url).header(ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|source| TransportError::Request {
            uri: uri.to_string(),
            source,
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|source| TransportError::BodyRead {
                uri: uri.to_string(),
                source,
            })?;

        debug!(uri, status, bytes = body.len(), "Fetched provider resource");
        Ok(HttpResponse { status, body })
    }
}

impl fmt::Debug for HttpsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpsClient")
            .field("inner", &"<reqwest::Client>")
            .field("pinned", &self.pinned)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_uri(uri: &str) -> Result<Url, TransportError> {
    let url = Url::parse(uri).map_err(|e| TransportError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "https" | "http" => Ok(url),
        other => Err(TransportError::InvalidUri {
            uri: uri.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_creation() {
        let client = HttpsClient::new().expect("client builds");
        assert!(!client.is_pinned());
        assert_eq!(client.timeout(), None);
    }

    #[test]
    fn test_pinned_client_creation() {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("Failed to generate test certificate");
        let pinned = PinnedCertificate::from_der(cert.cert.der().to_vec());

        let client = HttpsClient::with_pinned_certificate(pinned).expect("client builds");
        assert!(client.is_pinned());
    }

    #[test]
    fn test_parse_uri_rejects_other_schemes() {
        assert!(parse_uri("https://idp.example/.well-known/openid-configuration").is_ok());
        assert!(parse_uri("http://127.0.0.1:8080/").is_ok());
        assert!(matches!(
            parse_uri("ftp://idp.example/"),
            Err(TransportError::InvalidUri { .. })
        ));
        assert!(matches!(
            parse_uri("not a uri"),
            Err(TransportError::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_response_helpers() {
        let response = HttpResponse {
            status: 204,
            body: Bytes::from_static(br#"{"sub":"alice"}"#),
        };
        assert!(response.is_success());
        assert_eq!(response.text(), r#"{"sub":"alice"}"#);

        let value: serde_json::Value = response.json().expect("JSON body");
        assert_eq!(value["sub"], "alice");

        let rejected = HttpResponse {
            status: 401,
            body: Bytes::new(),
        };
        assert!(!rejected.is_success());
    }

    #[tokio::test]
    async fn test_get_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let client = HttpsClient::new().expect("client builds");
        let response = client
            .get(&format!("{}/doc", server.uri()))
            .await
            .expect("request succeeds");

        assert_eq!(response.status, 200);
        assert_eq!(response.body, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = HttpsClient::new().expect("client builds");
        let response = client.get(&server.uri()).await.expect("request completes");

        assert_eq!(response.status, 503);
        assert_eq!(response.text(), "down");
    }

    #[tokio::test]
    async fn test_get_with_bearer_sends_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpsClient::new().expect("client builds");
        let response = client
            .get_with_bearer(&format!("{}/userinfo", server.uri()), "t0ken")
            .await
            .expect("request succeeds");

        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_redirects_are_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/moved"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "http://169.254.169.254/"),
            )
            .mount(&server)
            .await;

        let client = HttpsClient::new().expect("client builds");
        let response = client
            .get(&format!("{}/moved", server.uri()))
            .await
            .expect("request completes");

        assert_eq!(response.status, 302);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let client = HttpsClient::new().expect("client builds");
        let result = client.get(&format!("http://127.0.0.1:{port}/")).await;

        assert!(matches!(result, Err(TransportError::Request { .. })));
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = HttpsClient::builder()
            .timeout(Some(Duration::from_millis(100)))
            .build()
            .expect("client builds");
        let result = client.get(&server.uri()).await;

        assert!(matches!(result, Err(TransportError::Request { .. })));
    }
}
