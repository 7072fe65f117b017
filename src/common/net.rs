//! Network utility functions

use std::net::{Ipv4Addr, SocketAddr};

/// Loopback socket address for a port
///
/// The forwarder only ever listens on, and dials, the IPv4 loopback interface.
pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback() {
        let addr = loopback(8080);
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 8080);
        assert_eq!(addr.to_string(), "127.0.0.1:8080");
    }
}
