use crate::chain::DistinguishedName;
use crate::config::ProbeConfig;
use log::{debug, info, log_enabled, Level};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::x509::store::{X509Store, X509StoreBuilder};
use openssl::x509::{X509Ref, X509};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

const PEM_MARKER: &[u8] = b"-----BEGIN";

#[derive(Debug, Error)]
pub enum TrustStoreError {
    #[error("no platform CA bundle could be located on this system")]
    PlatformStoreMissing,
    #[error("failed to load trust store {}: {}", .path.display(), .reason)]
    Load { path: PathBuf, reason: String },
    #[error("combined trust store contains no certificates")]
    Empty,
}

/// A trust store on disk: a PEM bundle or a password-protected PKCS#12
/// archive. The password is ignored for PEM.
#[derive(Debug, Clone)]
pub struct TrustStoreSource {
    pub path: PathBuf,
    pub password: Option<String>,
}

/// The merged anchor collection, keyed by alias. Neither PEM nor PKCS#12
/// parsing surfaces store aliases, so the alias is the subject DN (with a
/// fingerprint fallback for empty subjects).
#[derive(Debug, Default)]
pub struct TrustAnchorSet {
    entries: BTreeMap<String, X509>,
}

/// Locate the platform default CA bundle.
pub fn platform_store_path() -> Result<PathBuf, TrustStoreError> {
    openssl_probe::probe()
        .cert_file
        .ok_or(TrustStoreError::PlatformStoreMissing)
}

/// Assemble the combined anchor set: the mandatory platform store first,
/// then the internal store when configured. Any load failure is fatal,
/// including a configured-but-broken internal store.
pub fn build(config: &ProbeConfig) -> Result<TrustAnchorSet, TrustStoreError> {
    let platform = platform_store_path()?;
    info!("using platform trust store from: {}", platform.display());

    let mut sources = vec![TrustStoreSource {
        path: platform,
        password: Some(config.default_store_password.clone()),
    }];
    match &config.internal_store {
        Some(internal) => sources.push(internal.clone()),
        None => info!("no internal trust store provided (using platform trust store only)"),
    }

    let set = TrustAnchorSet::build(&sources)?;
    if let Some(internal) = &config.internal_store {
        info!("internal trust store loaded from: {}", internal.path.display());
    }
    if log_enabled!(Level::Debug) {
        for alias in set.aliases() {
            debug!("trust anchor: {alias}");
        }
    }
    Ok(set)
}

impl TrustAnchorSet {
    /// Merge the given sources in order. Entries from later sources replace
    /// earlier entries with the same alias.
    pub fn build(sources: &[TrustStoreSource]) -> Result<Self, TrustStoreError> {
        let mut set = TrustAnchorSet::default();
        for source in sources {
            set.merge(source)?;
        }
        if set.entries.is_empty() {
            return Err(TrustStoreError::Empty);
        }
        Ok(set)
    }

    fn merge(&mut self, source: &TrustStoreSource) -> Result<(), TrustStoreError> {
        let data = fs::read(&source.path).map_err(|e| TrustStoreError::Load {
            path: source.path.clone(),
            reason: e.to_string(),
        })?;
        let certs = decode_store(&data, source.password.as_deref()).map_err(|reason| {
            TrustStoreError::Load {
                path: source.path.clone(),
                reason,
            }
        })?;
        for cert in certs {
            self.entries.insert(alias_for(&cert), cert);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, alias: &str) -> Option<&X509> {
        self.entries.get(alias)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Materialize an OpenSSL store for handshake verification.
    pub fn to_store(&self) -> Result<X509Store, ErrorStack> {
        let mut builder = X509StoreBuilder::new()?;
        for cert in self.entries.values() {
            builder.add_cert(cert.clone())?;
        }
        Ok(builder.build())
    }
}

fn decode_store(data: &[u8], password: Option<&str>) -> Result<Vec<X509>, String> {
    if looks_like_pem(data) {
        return X509::stack_from_pem(data).map_err(|e| format!("invalid PEM bundle: {e}"));
    }
    let pkcs12 = Pkcs12::from_der(data)
        .map_err(|e| format!("not a PEM bundle or PKCS#12 archive: {e}"))?;
    let parsed = pkcs12
        .parse2(password.unwrap_or_default())
        .map_err(|e| format!("could not decrypt PKCS#12 archive: {e}"))?;
    let mut certs = Vec::new();
    if let Some(cert) = parsed.cert {
        certs.push(cert);
    }
    if let Some(ca) = parsed.ca {
        certs.extend(ca);
    }
    Ok(certs)
}

fn looks_like_pem(data: &[u8]) -> bool {
    data.windows(PEM_MARKER.len()).any(|w| w == PEM_MARKER)
}

pub(crate) fn alias_for(cert: &X509Ref) -> String {
    let dn = cert
        .subject_name()
        .to_der()
        .ok()
        .and_then(|der| DistinguishedName::from_der(&der).ok());
    match dn {
        Some(dn) if !dn.is_empty() => dn.to_string(),
        _ => fingerprint(cert),
    }
}

fn fingerprint(cert: &X509Ref) -> String {
    cert.digest(MessageDigest::sha256())
        .map(|d| {
            d.iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(":")
        })
        .unwrap_or_else(|_| "<unknown>".to_string())
}
