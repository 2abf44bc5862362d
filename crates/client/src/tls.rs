//! TLS configurations with per-handshake certificate capture.
//!
//! Every fetch worker owns one [`CapturedChain`] slot and a pair of rustls
//! client configs wired to it: strict (webpki verification against the
//! bundled roots) and insecure (handshake completes, verification skipped).
//! Both install the same verify hook, which records the peer's presented DER
//! chain at the start of each handshake, overwriting whatever the previous
//! handshake left behind. Capture never rejects a certificate; rejection only
//! ever comes from the strict verifier's own webpki checks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};

/// TLS verification posture for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Full webpki verification.
    Strict,
    /// Handshake only; verification skipped. Sticky for the rest of a site.
    Insecure,
}

/// Errors building the TLS configurations.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to build certificate verifier: {0}")]
    Verifier(String),
}

/// Shared slot holding the chain presented during the most recent handshake.
///
/// The verifier writes it, the fetch worker snapshots it when assembling the
/// output record.
#[derive(Debug, Clone, Default)]
pub struct CapturedChain {
    ders: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl CapturedChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop whatever the previous site's handshakes captured.
    pub fn clear(&self) {
        self.ders.lock().expect("chain lock poisoned").clear();
    }

    /// Copy of the most recently captured chain, presentation order.
    pub fn snapshot(&self) -> Vec<Vec<u8>> {
        self.ders.lock().expect("chain lock poisoned").clone()
    }

    fn store(&self, end_entity: &CertificateDer<'_>, intermediates: &[CertificateDer<'_>]) {
        let mut ders = self.ders.lock().expect("chain lock poisoned");
        ders.clear();
        ders.push(end_entity.as_ref().to_vec());
        ders.extend(intermediates.iter().map(|der| der.as_ref().to_vec()));
    }
}

/// Verify hook shared by the strict and insecure configs.
#[derive(Debug)]
struct CapturingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    enforce: bool,
    chain: CapturedChain,
}

impl ServerCertVerifier for CapturingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        self.chain.store(end_entity, intermediates);
        if self.enforce {
            self.inner
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        } else {
            Ok(ServerCertVerified::assertion())
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        if self.enforce {
            self.inner.verify_tls12_signature(message, cert, dss)
        } else {
            Ok(HandshakeSignatureValid::assertion())
        }
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        if self.enforce {
            self.inner.verify_tls13_signature(message, cert, dss)
        } else {
            Ok(HandshakeSignatureValid::assertion())
        }
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// One fetch worker's strict/insecure config pair and its capture slot.
pub struct TlsConfigs {
    strict: Arc<rustls::ClientConfig>,
    insecure: Arc<rustls::ClientConfig>,
    chain: CapturedChain,
}

impl TlsConfigs {
    pub fn new() -> Result<Self, TlsError> {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let webpki = WebPkiServerVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| TlsError::Verifier(e.to_string()))?;

        let chain = CapturedChain::new();
        let strict = config_with(Arc::new(CapturingVerifier {
            inner: Arc::clone(&webpki),
            enforce: true,
            chain: chain.clone(),
        }));
        let insecure = config_with(Arc::new(CapturingVerifier {
            inner: webpki,
            enforce: false,
            chain: chain.clone(),
        }));

        Ok(Self { strict: Arc::new(strict), insecure: Arc::new(insecure), chain })
    }

    pub fn config(&self, mode: TlsMode) -> Arc<rustls::ClientConfig> {
        match mode {
            TlsMode::Strict => Arc::clone(&self.strict),
            TlsMode::Insecure => Arc::clone(&self.insecure),
        }
    }

    pub fn chain(&self) -> &CapturedChain {
        &self.chain
    }
}

fn config_with(verifier: Arc<CapturingVerifier>) -> rustls::ClientConfig {
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth()
}

/// Assemble the single-connection HTTP client used for one site.
///
/// Redirects are never followed automatically (the state machine owns that
/// policy), at most one idle connection is pooled per host, and idle
/// connections are dropped slightly after the worker's one-second retry
/// pause.
pub fn build_http_client(
    tls: &Arc<rustls::ClientConfig>,
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .use_preconfigured_tls(tls.as_ref().clone())
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .connect_timeout(timeout)
        .pool_max_idle_per_host(1)
        .pool_idle_timeout(Duration::from_millis(1100))
        .http1_only()
        .build()
}
