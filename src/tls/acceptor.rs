//! TLS acceptor creation and server-side handshakes

use log::{debug, info};
use openssl::ssl::{Ssl, SslAcceptor, SslFiletype, SslMethod};
use std::path::Path;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

use crate::common::{ProxyError, Result};

/// Create the TLS acceptor from a PEM certificate chain and private key
///
/// The files are loaded and the key is checked against the certificate here,
/// so an unusable pair is reported before the listener is created.
///
/// # Example
///
/// ```no_run
/// # use std::path::Path;
/// # use tls_forwarder::tls::create_tls_acceptor;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let acceptor = create_tls_acceptor(
///     Path::new("certs/server.crt"),
///     Path::new("certs/server.key"),
/// )?;
/// # Ok(())
/// # }
/// ```
pub fn create_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<SslAcceptor> {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())?;

    acceptor.set_certificate_chain_file(cert_path).map_err(|e| {
        ProxyError::Certificate(format!(
            "Failed to load certificate chain {}: {}",
            cert_path.display(),
            e
        ))
    })?;
    acceptor.set_private_key_file(key_path, SslFiletype::PEM).map_err(|e| {
        ProxyError::Certificate(format!(
            "Failed to load private key {}: {}",
            key_path.display(),
            e
        ))
    })?;
    acceptor.check_private_key().map_err(|e| {
        ProxyError::Certificate(format!("Private key does not match certificate: {}", e))
    })?;

    info!("TLS acceptor ready with certificate {}", cert_path.display());

    Ok(acceptor.build())
}

/// Perform the server side of a TLS handshake on an accepted TCP stream
pub async fn accept_tls(acceptor: &SslAcceptor, stream: TcpStream) -> Result<SslStream<TcpStream>> {
    let ssl = Ssl::new(acceptor.context())?;
    let mut stream = SslStream::new(ssl, stream)?;

    Pin::new(&mut stream)
        .accept()
        .await
        .map_err(|e| ProxyError::TlsHandshake(e.to_string()))?;

    debug!("TLS handshake successful, protocol {}", stream.ssl().version_str());

    Ok(stream)
}
