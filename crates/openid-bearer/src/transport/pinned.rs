//! Leaf-certificate pinning for rustls

use crate::error::TransportError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::verify_server_cert_signed_by_trust_anchor;
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, Error as TlsError, RootCertStore,
    SignatureScheme,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// The provider certificate trusted by exact match.
///
/// Set once at configuration time and read-only afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct PinnedCertificate {
    der: CertificateDer<'static>,
}

impl PinnedCertificate {
    /// Wrap DER-encoded certificate bytes
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self {
            der: CertificateDer::from(der.into()),
        }
    }

    /// Decode the first certificate of a PEM document
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidCertificate`] if the text holds no
    /// decodable certificate.
    pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self, TransportError> {
        let mut reader = pem.as_ref();
        let der = rustls_pemfile::certs(&mut reader)
            .next()
            .ok_or_else(|| {
                TransportError::InvalidCertificate("no CERTIFICATE block found".to_string())
            })?
            .map_err(|e| TransportError::InvalidCertificate(e.to_string()))?;

        Ok(Self { der })
    }

    /// The DER encoding compared against the server's leaf certificate
    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }
}

impl fmt::Debug for PinnedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedCertificate")
            .field("der_len", &self.der.len())
            .finish()
    }
}

/// Accepts the server only if its leaf is byte-identical to the pin.
///
/// Hostname is ignored and so is the leaf's own chain outcome (validity
/// period, issuer, signature). Presented certificates that issued the leaf
/// must still chain to a root in `roots`.
#[derive(Debug)]
pub(crate) struct PinnedCertVerifier {
    pinned: CertificateDer<'static>,
    roots: Arc<RootCertStore>,
    provider: Arc<CryptoProvider>,
}

impl PinnedCertVerifier {
    pub(crate) fn new(
        pinned: &PinnedCertificate,
        roots: Arc<RootCertStore>,
        provider: Arc<CryptoProvider>,
    ) -> Self {
        Self {
            pinned: pinned.der().clone(),
            roots,
            provider,
        }
    }

    /// A time at which the leaf's own validity period holds: `now` when the
    /// leaf is current, else the bound it falls outside of
    fn leaf_time(&self, leaf: &ParsedCertificate<'_>, now: UnixTime) -> UnixTime {
        let no_roots = RootCertStore::empty();
        match self.chain_to(leaf, &no_roots, &[], now) {
            Err(TlsError::InvalidCertificate(CertificateError::ExpiredContext {
                not_after, ..
            })) => not_after,
            Err(TlsError::InvalidCertificate(CertificateError::NotValidYetContext {
                not_before,
                ..
            })) => not_before,
            _ => now,
        }
    }

    /// Whether `candidate` signed the leaf
    fn issued(
        &self,
        leaf: &ParsedCertificate<'_>,
        candidate: &CertificateDer<'_>,
        at: UnixTime,
    ) -> bool {
        let mut issuer = RootCertStore::empty();
        if issuer.add(candidate.clone().into_owned()).is_err() {
            return false;
        }
        self.chain_to(leaf, &issuer, &[], at).is_ok()
    }

    fn chain_to(
        &self,
        leaf: &ParsedCertificate<'_>,
        roots: &RootCertStore,
        intermediates: &[CertificateDer<'_>],
        at: UnixTime,
    ) -> Result<(), TlsError> {
        verify_server_cert_signed_by_trust_anchor(
            leaf,
            roots,
            intermediates,
            at,
            self.provider.signature_verification_algorithms.all,
        )
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        if end_entity.as_ref() != self.pinned.as_ref() {
            warn!("Server leaf certificate does not match the pinned certificate");
            return Err(TlsError::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ));
        }

        let Ok(leaf) = ParsedCertificate::try_from(end_entity) else {
            debug!("Pinned leaf certificate matched");
            return Ok(ServerCertVerified::assertion());
        };

        // Intermediates of an expired or not-yet-valid leaf are checked at the
        // leaf's own validity bound
        let at = self.leaf_time(&leaf, now);
        if !intermediates.iter().any(|cert| self.issued(&leaf, cert, at)) {
            debug!(
                presented = intermediates.len(),
                "Pinned leaf certificate matched, no issuer presented"
            );
            return Ok(ServerCertVerified::assertion());
        }

        self.chain_to(&leaf, &self.roots, intermediates, at)
            .inspect_err(|e| warn!(error = %e, "Pinned leaf matched but its issuers are not trusted"))?;

        debug!(
            intermediates = intermediates.len(),
            "Pinned leaf certificate matched, chain verified"
        );
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Build a rustls client configuration that trusts `pinned` by exact match
pub(crate) fn client_config(pinned: &PinnedCertificate) -> Result<ClientConfig, TransportError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let verifier = PinnedCertVerifier::new(pinned, Arc::new(roots), Arc::clone(&provider));

    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::ClientBuild(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    // Only HTTP/1.1 is compiled into the client
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(config)
}
