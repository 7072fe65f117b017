//! TLS Forwarder: TLS-terminating TCP forwarding proxy
//!
//! Accepts TLS connections on a loopback port, terminates TLS with a
//! configured certificate and key, and relays the decrypted byte stream to a
//! plaintext service on another loopback port.
//!
//! # Main Features
//!
//! - One backend connection per client session, fully isolated
//! - Fixed-size worker pool fed by a work queue
//! - Handshakes performed off the accept path with a timeout
//! - Graceful shutdown that drains queued sessions
//!
//! # Example
//!
//! ```no_run
//! use tls_forwarder::{Forwarder, ConfigLoader, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ConfigLoader::new()
//!         .with_file("forwarder.json")
//!         .load()?;
//!
//!     let forwarder = Forwarder::bind(config)?;
//!     forwarder.run().await?;
//!
//!     Ok(())
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod proxy;
pub mod tls;

// Re-export commonly used structures and functions for convenience
pub use common::{ProxyError, Result};
pub use config::{ConfigLoader, ConfigValues, ForwarderConfig};
pub use proxy::Forwarder;
pub use tls::create_tls_acceptor;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
