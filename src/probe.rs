use crate::chain::CapturedChain;
use crate::truststore::TrustAnchorSet;
use crate::verify::{ChainCapture, Verifier};
use anyhow::{anyhow, Context, Result};
use log::debug;
use openssl::hash::MessageDigest;
use openssl::ssl::{HandshakeError, SslConnector, SslMethod, SslRef, SslStream};
use openssl::x509::{X509VerifyResult, X509};
use std::net::{TcpStream, ToSocketAddrs};
use thiserror::Error;
use url::Url;

/// Host and port extracted from the target URL.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn from_url(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).with_context(|| format!("invalid target URL {raw}"))?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("target URL {raw} has no host"))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(443);
        Ok(Self { host, port })
    }
}

/// Result of the validating connection attempt.
#[derive(Debug)]
pub enum Outcome {
    Trusted(CapturedChain),
    Untrusted { reason: String },
    HostUnresolved { host: String },
    Failed { message: String },
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error("host could not be resolved")]
    Unresolved,
    #[error("{0}")]
    TrustFailure(String),
    #[error("{0}")]
    Protocol(String),
}

/// Validating attempt: standard OpenSSL path validation (names, validity
/// windows, signatures up the chain) against the supplied anchors.
pub fn connect(target: &Target, anchors: &TrustAnchorSet) -> Outcome {
    let store = match anchors.to_store() {
        Ok(store) => store,
        Err(e) => {
            return Outcome::Failed {
                message: format!("could not assemble verification store: {e}"),
            }
        }
    };
    match open_tls(target, Verifier::Validating { store }) {
        Ok(mut stream) => {
            let presented = presented_chain(stream.ssl());
            let _ = stream.shutdown();
            match CapturedChain::from_certs(&presented) {
                Ok(chain) => Outcome::Trusted(chain),
                Err(e) => Outcome::Failed {
                    message: format!("{e:#}"),
                },
            }
        }
        Err(AttemptError::Unresolved) => Outcome::HostUnresolved {
            host: target.host.clone(),
        },
        Err(AttemptError::TrustFailure(reason)) => Outcome::Untrusted { reason },
        Err(AttemptError::Protocol(message)) => Outcome::Failed { message },
    }
}

/// Diagnostic re-attempt with a fresh capturing verifier. The attempt's own
/// failure is swallowed; only the recorded chain matters. `None` means the
/// verifier callback never fired.
pub fn capture_chain(target: &Target) -> Option<CapturedChain> {
    let capture = ChainCapture::new();
    match open_tls(
        target,
        Verifier::Capturing {
            capture: capture.clone(),
        },
    ) {
        Ok(stream) => drop(stream),
        Err(e) => debug!("diagnostic handshake with {} did not complete: {e}", target.host),
    }
    capture.into_chain()
}

fn open_tls(target: &Target, verifier: Verifier) -> Result<SslStream<TcpStream>, AttemptError> {
    let authority = format!("{}:{}", target.host, target.port);

    // Resolve explicitly so DNS failure is reported independently of
    // anything that happens during the handshake.
    let addrs: Vec<_> = authority
        .to_socket_addrs()
        .map_err(|_| AttemptError::Unresolved)?
        .collect();
    if addrs.is_empty() {
        return Err(AttemptError::Unresolved);
    }
    debug!("{authority} resolved to {} address(es)", addrs.len());

    let tcp = TcpStream::connect(&authority)
        .map_err(|e| AttemptError::Protocol(format!("failed to connect to {authority}: {e}")))?;

    let mut builder = SslConnector::builder(SslMethod::tls())
        .map_err(|e| AttemptError::Protocol(e.to_string()))?;
    verifier
        .install(&mut builder)
        .map_err(|e| AttemptError::Protocol(e.to_string()))?;
    let connector = builder.build();

    debug!("starting TLS handshake with {authority}");
    match connector.connect(&target.host, tcp) {
        Ok(stream) => Ok(stream),
        Err(HandshakeError::Failure(mid)) => {
            let verify = mid.ssl().verify_result();
            if verify != X509VerifyResult::OK {
                Err(AttemptError::TrustFailure(verify.error_string().to_string()))
            } else {
                Err(AttemptError::Protocol(format!(
                    "TLS handshake with {authority} failed: {}",
                    mid.error()
                )))
            }
        }
        Err(err) => Err(AttemptError::Protocol(format!(
            "TLS handshake with {authority} failed: {err}"
        ))),
    }
}

// The peer certificate is sometimes repeated at the head of the chain stack;
// fold it in by fingerprint so index 0 is always the leaf, once.
fn presented_chain(ssl: &SslRef) -> Vec<X509> {
    let leaf = ssl.peer_certificate();
    let leaf_fp = leaf
        .as_ref()
        .and_then(|c| c.digest(MessageDigest::sha256()).ok())
        .map(|d| d.to_vec());

    let mut out: Vec<X509> = Vec::new();
    if let Some(leaf) = leaf {
        out.push(leaf);
    }
    if let Some(stack) = ssl.peer_cert_chain() {
        for cert in stack {
            if let Some(ref fp) = leaf_fp {
                if let Ok(d) = cert.digest(MessageDigest::sha256()) {
                    if &d[..] == &fp[..] {
                        continue;
                    }
                }
            }
            out.push(cert.to_owned());
        }
    }
    out
}
