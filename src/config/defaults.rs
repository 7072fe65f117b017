//! Default configuration values
//!
//! Single source of truth for defaults used by the loader and the CLI help.

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "TLS_FORWARDER_";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Bytes read per forwarding step, in both directions
pub const CHUNK_SIZE: usize = 1024;

/// Listen backlog
pub const BACKLOG: u32 = 1024;

/// Backend connect timeout in seconds
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// TLS handshake timeout in seconds
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Time allowed for in-flight sessions after a shutdown request, in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Time allowed for a client's TLS close_notify before its handle is dropped, in milliseconds
pub const CLOSE_TIMEOUT_MILLIS: u64 = 1000;

/// Default worker count: one per logical CPU
pub fn workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workers_at_least_one() {
        assert!(workers() >= 1);
    }
}
