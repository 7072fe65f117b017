//! TLS Forwarder Command Line Tool
//!
//! This binary is the command-line interface for the TLS forwarder.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error, info, warn};

use tls_forwarder::common::{init_logger, Result, EXIT_CONFIG};
use tls_forwarder::config::defaults;
use tls_forwarder::tls::certificate_info;
use tls_forwarder::{ConfigLoader, ConfigValues, Forwarder, ForwarderConfig, APP_NAME, VERSION};

/// TLS-terminating TCP forwarder for loopback services
///
/// Every option can also be given through a `TLS_FORWARDER_*` environment
/// variable or a JSON configuration file. Command line values win over
/// environment values, which win over the file.
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Loopback port to accept TLS connections on
    #[clap(long, env = "TLS_FORWARDER_SOURCE_PORT")]
    source_port: Option<u16>,

    /// Loopback port of the plaintext service
    #[clap(long, env = "TLS_FORWARDER_TARGET_PORT")]
    target_port: Option<u16>,

    /// Server certificate chain (PEM)
    #[clap(long, env = "TLS_FORWARDER_PUBLIC_CERTIFICATE")]
    public_certificate: Option<PathBuf>,

    /// Server private key (PEM)
    #[clap(long, env = "TLS_FORWARDER_PRIVATE_KEY")]
    private_key: Option<PathBuf>,

    /// Number of workers [default: available parallelism]
    #[clap(long, env = "TLS_FORWARDER_WORKERS")]
    workers: Option<usize>,

    /// Maximum number of queued sessions [default: unbounded]
    #[clap(long, env = "TLS_FORWARDER_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Maximum bytes relayed per read [default: 1024]
    #[clap(long, env = "TLS_FORWARDER_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Listen backlog [default: 1024]
    #[clap(long, env = "TLS_FORWARDER_BACKLOG")]
    backlog: Option<u32>,

    /// Backend connect timeout in seconds [default: 30]
    #[clap(long, env = "TLS_FORWARDER_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,

    /// TLS handshake timeout in seconds [default: 10]
    #[clap(long, env = "TLS_FORWARDER_HANDSHAKE_TIMEOUT")]
    handshake_timeout: Option<u64>,

    /// Shutdown grace period in seconds [default: 30]
    #[clap(long, env = "TLS_FORWARDER_SHUTDOWN_TIMEOUT")]
    shutdown_timeout: Option<u64>,

    /// Log level [default: info]
    #[clap(long, env = "TLS_FORWARDER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Load configuration from a JSON file
    #[clap(long, env = "TLS_FORWARDER_CONFIG_FILE")]
    config_file: Option<PathBuf>,
}

impl Args {
    /// Explicit values, layered above the configuration file
    fn to_values(&self) -> ConfigValues {
        ConfigValues {
            source_port: self.source_port,
            target_port: self.target_port,
            backlog: self.backlog,
            public_certificate: self.public_certificate.clone(),
            private_key: self.private_key.clone(),
            handshake_timeout: self.handshake_timeout,
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            chunk_size: self.chunk_size,
            connect_timeout: self.connect_timeout,
            shutdown_timeout: self.shutdown_timeout,
            log_level: self.log_level.clone(),
        }
    }

    fn load_config(&self) -> Result<ForwarderConfig> {
        let mut loader = ConfigLoader::new().with_values(self.to_values());
        if let Some(path) = &self.config_file {
            loader = loader.with_file(path);
        }
        Ok(loader.load()?)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::from(EXIT_CONFIG);
        }
        // --help and --version
        Err(e) => e.exit(),
    };

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            let level = args.log_level.clone().unwrap_or_else(defaults::log_level);
            init_logger(&level);
            error!("Failed to load configuration: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    init_logger(&config.log_level);
    info!("Starting {} v{}", APP_NAME, VERSION);
    if let Ok(json) = serde_json::to_string_pretty(&config) {
        debug!("Effective configuration:\n{}", json);
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(config: ForwarderConfig) -> Result<()> {
    match certificate_info(&config.public_certificate) {
        Ok(cert) => {
            info!("Certificate subject: {}", cert.subject);
            info!("Certificate fingerprint: {}", cert.fingerprint);
        }
        Err(e) => warn!("Could not read certificate details: {}", e),
    }

    let forwarder = Forwarder::bind(config)?;
    info!("Forwarder ready on {}", forwarder.local_addr()?);

    forwarder.run().await?;

    info!("Forwarder stopped");
    Ok(())
}
