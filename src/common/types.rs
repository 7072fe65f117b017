//! Shared types module

/// Certificate information logged at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Certificate subject
    pub subject: String,
    /// SHA-256 fingerprint, colon separated
    pub fingerprint: String,
}
