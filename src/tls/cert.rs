//! Certificate handling module
//!
//! Reads the subject and fingerprint of the served certificate for the
//! startup log line.

use openssl::hash::MessageDigest;
use openssl::x509::X509;
use std::path::Path;

use crate::common::{read_file, CertificateInfo, ProxyError, Result};

/// Load the first certificate of a PEM file
pub fn load_cert(cert_path: &Path) -> Result<X509> {
    let cert_data = read_file(cert_path)
        .map_err(|e| ProxyError::Certificate(format!("Failed to read certificate file: {}", e)))?;

    X509::from_pem(&cert_data)
        .map_err(|e| ProxyError::Certificate(format!("Failed to parse certificate: {}", e)))
}

/// Get certificate subject as `KEY=value` pairs
pub fn get_cert_subject(cert: &X509) -> String {
    cert.subject_name()
        .entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("?");
            let value = entry
                .data()
                .as_utf8()
                .map(|s| s.to_string())
                .unwrap_or_default();
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Get the SHA-256 fingerprint as colon separated hex
pub fn get_cert_fingerprint(cert: &X509) -> Result<String> {
    let fingerprint = cert.digest(MessageDigest::sha256())
        .map_err(|e| ProxyError::Certificate(format!("Failed to calculate certificate fingerprint: {}", e)))?;

    Ok(fingerprint.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<String>>()
        .join(":"))
}

/// Subject and fingerprint of the certificate at `cert_path`
pub fn certificate_info(cert_path: &Path) -> Result<CertificateInfo> {
    let cert = load_cert(cert_path)?;

    Ok(CertificateInfo {
        subject: get_cert_subject(&cert),
        fingerprint: get_cert_fingerprint(&cert)?,
    })
}
