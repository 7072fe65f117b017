//! Test utilities: throwaway certificates and TLS clients
//!
//! Available to unit tests and, through the `test-util` feature, to
//! integration tests.

use std::path::PathBuf;
use std::pin::Pin;

use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use rcgen::{CertificateParams, DnType, KeyPair};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

/// Self-signed `localhost` certificate and key written to a temporary directory
pub struct TestCertificate {
    /// Directory holding the PEM files; removed on drop
    pub dir: TempDir,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl TestCertificate {
    pub fn generate() -> Self {
        let mut params = CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])
            .expect("valid subject alt names");
        params.distinguished_name.push(DnType::CommonName, "localhost");

        let key_pair = KeyPair::generate().expect("key generation");
        let cert = params.self_signed(&key_pair).expect("self-signed certificate");

        let dir = tempfile::tempdir().expect("temp dir");
        let cert_path = dir.path().join("server.crt");
        let key_path = dir.path().join("server.key");
        std::fs::write(&cert_path, cert.pem()).expect("write certificate");
        std::fs::write(&key_path, key_pair.serialize_pem()).expect("write key");

        Self { dir, cert_path, key_path }
    }
}

/// Open a TLS connection that trusts any server certificate
pub async fn tls_connect(port: u16) -> SslStream<TcpStream> {
    let mut builder = SslConnector::builder(SslMethod::tls()).expect("connector");
    builder.set_verify(SslVerifyMode::NONE);
    let connector = builder.build();

    let ssl = connector
        .configure()
        .expect("connect configuration")
        .verify_hostname(false)
        .into_ssl("localhost")
        .expect("client ssl");

    let tcp = TcpStream::connect(("127.0.0.1", port)).await.expect("tcp connect");
    let mut stream = SslStream::new(ssl, tcp).expect("ssl stream");
    Pin::new(&mut stream).connect().await.expect("tls handshake");
    stream
}
