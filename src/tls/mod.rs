//! TLS handling module
//!
//! This module terminates TLS on accepted connections and reads certificate details.

mod acceptor;
mod cert;

pub use acceptor::{accept_tls, create_tls_acceptor};
pub use cert::{certificate_info, get_cert_fingerprint, get_cert_subject, load_cert};
