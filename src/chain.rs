use anyhow::{anyhow, Result};
use openssl::x509::{X509NameRef, X509Ref, X509};
use std::fmt;
use x509_parser::prelude::*;

/// One certificate as presented by the peer during a handshake.
/// Immutable once parsed; `der` keeps the exact wire encoding.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    pub not_before: String,
    pub not_after: String,
    pub signature_algorithm: String,
    pub der: Vec<u8>,
}

impl ChainEntry {
    pub fn parse(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| anyhow!("failed to parse certificate: {e}"))?;
        Ok(Self {
            subject: DistinguishedName::from_x509_name(cert.subject()),
            issuer: DistinguishedName::from_x509_name(cert.issuer()),
            not_before: cert.validity().not_before.to_string(),
            not_after: cert.validity().not_after.to_string(),
            signature_algorithm: signature_algorithm_name(&cert),
            der: der.to_vec(),
        })
    }

    pub fn from_cert(cert: &X509Ref) -> Result<Self> {
        Self::parse(&cert.to_der()?)
    }

    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }
}

/// The chain a peer presented, leaf first. Created per connection attempt.
#[derive(Debug)]
pub struct CapturedChain {
    entries: Vec<ChainEntry>,
}

impl CapturedChain {
    pub fn from_certs(certs: &[X509]) -> Result<Self> {
        if certs.is_empty() {
            return Err(anyhow!("peer presented no certificates"));
        }
        let entries = certs
            .iter()
            .map(|c| ChainEntry::from_cert(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A parsed X.500 name, kept as (attribute OID, value) pairs.
/// Equality is structural over the attribute multiset: two names carrying the
/// same attributes in a different serialization order compare equal.
#[derive(Debug, Clone, Eq)]
pub struct DistinguishedName {
    attrs: Vec<(String, String)>,
}

impl DistinguishedName {
    pub fn from_x509_name(name: &X509Name<'_>) -> Self {
        let mut attrs = Vec::new();
        for rdn in name.iter() {
            for attr in rdn.iter() {
                let oid = attr.attr_type().to_string();
                let value = attr.attr_value().as_str().unwrap_or("<unprintable>").to_string();
                attrs.push((oid, value));
            }
        }
        Self { attrs }
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, name) = X509Name::from_der(der)
            .map_err(|e| anyhow!("failed to parse distinguished name: {e}"))?;
        Ok(Self::from_x509_name(&name))
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        let mut left = self.attrs.clone();
        let mut right = other.attrs.clone();
        left.sort();
        right.sort();
        left == right
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attrs.is_empty() {
            return write!(f, "<empty>");
        }
        let parts: Vec<String> = self
            .attrs
            .iter()
            .map(|(oid, value)| format!("{}={}", attribute_label(oid), value))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// One-line name rendering for log output; never fails.
pub(crate) fn display_name(name: &X509NameRef) -> String {
    name.to_der()
        .ok()
        .and_then(|der| DistinguishedName::from_der(&der).ok())
        .map(|dn| dn.to_string())
        .unwrap_or_else(|| "<unknown>".to_string())
}

fn attribute_label(oid: &str) -> &str {
    match oid {
        "2.5.4.3" => "CN",
        "2.5.4.10" => "O",
        "2.5.4.11" => "OU",
        "2.5.4.6" => "C",
        "2.5.4.7" => "L",
        "2.5.4.8" => "ST",
        "2.5.4.5" => "serialNumber",
        "1.2.840.113549.1.9.1" => "emailAddress",
        other => other,
    }
}

fn signature_algorithm_name(cert: &X509Certificate<'_>) -> String {
    let oid = cert.signature_algorithm.algorithm.to_string();
    let name = match oid.as_str() {
        "1.2.840.113549.1.1.5" => "SHA1withRSA",
        "1.2.840.113549.1.1.10" => "RSASSA-PSS",
        "1.2.840.113549.1.1.11" => "SHA256withRSA",
        "1.2.840.113549.1.1.12" => "SHA384withRSA",
        "1.2.840.113549.1.1.13" => "SHA512withRSA",
        "1.2.840.10045.4.3.2" => "SHA256withECDSA",
        "1.2.840.10045.4.3.3" => "SHA384withECDSA",
        "1.2.840.10045.4.3.4" => "SHA512withECDSA",
        "1.3.101.112" => "Ed25519",
        _ => return oid,
    };
    name.to_string()
}
