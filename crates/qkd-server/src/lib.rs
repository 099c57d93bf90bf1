//! QKD relay server.
//!
//! Production server using axum for HTTP and WebSocket transport, Tokio for
//! the async runtime, and system time with cryptographic RNG.
//!
//! # Architecture
//!
//! The [`SessionHub`] owns the observer registry and drives protocol runs.
//! It is fed [`ServerEvent`]s by whatever runtime holds the connections: the
//! WebSocket handlers here, or the simulation harness in tests. The hub never
//! sees a socket; it reaches clients through the [`Observer`] trait.
//!
//! # Components
//!
//! - [`SessionHub`]: Registry, broadcast fan-out and run serialization
//! - [`Server`]: Production runtime binding the router to a TCP listener
//! - [`ChannelObserver`]: Observer backed by a WebSocket writer task
//! - [`Storage`]: Flat blob store behind the file endpoints
//! - [`SystemEnv`]: Production environment (real time, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod hub;
mod hub_error;
mod registry;
mod routes;
pub mod storage;
mod system_env;
mod transport;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{Router, http::HeaderValue};
pub use error::ServerError;
pub use hub::{BroadcastReport, HubConfig, ServerEvent, SessionHub};
pub use hub_error::{ConfigError, HubError, TransportError};
use qkd_core::Environment;
pub use registry::{Observer, ObserverId, ObserverRegistry};
pub use routes::router;
pub use storage::{DirectoryStorage, MemoryStorage, Storage, StorageError};
pub use system_env::SystemEnv;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
pub use transport::ChannelObserver;

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState<E, S>
where
    E: Environment,
    S: Storage,
{
    /// Hub WebSocket observers join
    hub: Arc<SessionHub<E, ChannelObserver>>,
    /// Backing store for the file endpoints
    storage: S,
}

impl<E, S> AppState<E, S>
where
    E: Environment,
    S: Storage,
{
    /// Bundle a hub and a storage backend.
    pub fn new(hub: Arc<SessionHub<E, ChannelObserver>>, storage: S) -> Self {
        Self { hub, storage }
    }

    /// The session hub.
    pub fn hub(&self) -> &Arc<SessionHub<E, ChannelObserver>> {
        &self.hub
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "127.0.0.1:8000")
    pub bind_address: String,
    /// Directory uploads are written to
    pub upload_dir: PathBuf,
    /// Browser origins allowed by CORS
    pub allowed_origins: Vec<String>,
    /// Hub configuration (run size, stage delay)
    pub hub: HubConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            upload_dir: PathBuf::from("secure_uploads"),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            hub: HubConfig::default(),
        }
    }
}

/// Production QKD relay server.
///
/// Wraps the router with a bound TCP listener and the system environment.
pub struct Server {
    /// Bound listener
    listener: TcpListener,
    /// Router with CORS and tracing layers applied
    router: Router,
}

impl Server {
    /// Validate `config`, open the upload directory and bind the listener.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        config.hub.validate()?;
        let cors = cors_layer(&config.allowed_origins)?;
        let storage = DirectoryStorage::open(&config.upload_dir)?;

        tracing::info!(
            upload_dir = %config.upload_dir.display(),
            bit_count = config.hub.bit_count,
            "server configured"
        );

        let hub = Arc::new(SessionHub::new(SystemEnv::new(), config.hub));
        let router = routes::router(AppState::new(hub, storage))
            .layer(cors)
            .layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind(&config.bind_address)
            .await
            .map_err(|e| ServerError::Transport(format!("bind {}: {e}", config.bind_address)))?;

        Ok(Self { listener, router })
    }

    /// Serve requests until the process is stopped or the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.local_addr()?);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// CORS for the configured browser origins. Credentials are not allowed.
fn cors_layer(origins: &[String]) -> Result<CorsLayer, ServerError> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| ServerError::Config(format!("invalid origin {origin:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}
