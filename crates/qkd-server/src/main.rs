//! QKD relay server binary.
//!
//! # Usage
//!
//! ```bash
//! # Local development against the frontend dev server
//! qkd-server
//!
//! # Bigger runs, no pause between stages
//! qkd-server --bind 0.0.0.0:8000 --bit-count 512 --stage-delay-ms 0
//!
//! # RUST_LOG takes precedence over --log-level
//! RUST_LOG=qkd_server=debug,tower_http=debug qkd-server
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use qkd_server::{HubConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// QKD relay server
#[derive(Parser, Debug)]
#[command(name = "qkd-server")]
#[command(about = "BB84 key exchange simulator and file relay")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    bind: String,

    /// Directory uploaded files are stored in
    #[arg(long, default_value = "secure_uploads")]
    upload_dir: PathBuf,

    /// Qubits exchanged per protocol run
    #[arg(long, default_value_t = qkd_core::DEFAULT_BIT_COUNT)]
    bit_count: usize,

    /// Pause between the initializing and complete stages, in milliseconds
    #[arg(long, default_value = "1000")]
    stage_delay_ms: u64,

    /// Browser origin allowed by CORS (repeatable; defaults to the dev frontend)
    #[arg(long = "allowed-origin")]
    allowed_origins: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("QKD relay starting");
    tracing::info!("Binding to {}", args.bind);

    let defaults = ServerRuntimeConfig::default();
    let allowed_origins =
        if args.allowed_origins.is_empty() { defaults.allowed_origins } else { args.allowed_origins };

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        upload_dir: args.upload_dir,
        allowed_origins,
        hub: HubConfig {
            bit_count: args.bit_count,
            stage_delay: Duration::from_millis(args.stage_delay_ms),
            ..HubConfig::default()
        },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
