use crate::config::{BackendKind, Config};
use crate::error::AppError;
use crate::handlers::AppState;
use crate::routes;
use axum::Router;
use order_store::{Backend, MemoryBackend, OrderStore, RedisBackend};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

/// The process host of the orders service.
///
/// `App` owns the backend handle and the HTTP server built on top of it:
/// - **Startup**: checks the backend is reachable, then binds the listener
/// - **Serving**: routes requests to the handlers until shutdown is requested
/// - **Shutdown**: drains in-flight requests for at most `shutdown_timeout`, then
///   closes the backend
///
/// # Example
///
/// ```ignore
/// let app = App::new(Config::from_env()?)?;
/// app.start(tokio::signal::ctrl_c().map(|_| ())).await?;
/// ```
pub struct App {
    config: Config,
    store: OrderStore,
}

impl App {
    /// Creates the backend named by `config`. No connection is made yet.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let backend: Arc<dyn Backend> = match config.backend {
            BackendKind::Redis => Arc::new(RedisBackend::connect(&config.redis)?),
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        };
        Ok(Self::with_backend(config, backend))
    }

    /// Creates the host around an existing backend handle.
    pub fn with_backend(config: Config, backend: Arc<dyn Backend>) -> Self {
        Self {
            config,
            store: OrderStore::new(backend),
        }
    }

    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    pub fn router(&self) -> Router {
        routes::router(AppState::new(self.store.clone(), self.config.page_size))
    }

    /// Checks the backend, binds the configured address and serves until `shutdown`
    /// completes.
    ///
    /// Returns [`AppError::Unreachable`] without binding if the backend does not
    /// answer. The backend is closed on every return path.
    pub async fn start<F>(self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Err(err) = self.store.ping().await {
            self.store.backend().close().await;
            return Err(AppError::Unreachable(err));
        }
        info!("Backend reachable");

        let addr = self.config.listen_addr;
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.store.backend().close().await;
                return Err(AppError::Bind { addr, source });
            }
        };

        self.run(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` completes, then closes
    /// the backend.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = %listener.local_addr()?, "Listening");

        let result = self.serve(listener, shutdown).await;

        self.store.backend().close().await;
        info!("Backend closed");
        result
    }

    async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let stop = Arc::new(Notify::new());
        let stopped = stop.clone();
        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { stopped.notified().await });
        let mut server = tokio::spawn(async move { server.await });

        tokio::select! {
            joined = &mut server => return Ok(joined??),
            _ = shutdown => {
                info!("Shutdown requested, draining requests");
                stop.notify_one();
            }
        }

        match tokio::time::timeout(self.config.shutdown_timeout, &mut server).await {
            Ok(joined) => Ok(joined??),
            Err(_) => {
                warn!(
                    timeout_secs = self.config.shutdown_timeout.as_secs(),
                    "Requests still in flight after shutdown timeout, aborting"
                );
                server.abort();
                Ok(())
            }
        }
    }
}
