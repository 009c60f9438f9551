use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::StatusCode, middleware, routing::get};
use thiserror::Error;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use super::{limits::enforce_header_limit, redirect::download_release, state::AppState};
use crate::config::ServerConfig;
use crate::resolver::Resolver;

/// How long cancelled requests get to flush their responses after the grace period
const CANCEL_DRAIN: Duration = Duration::from_secs(1);

/// Pause after an accept failure that is not tied to a single connection
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Read buffer room beyond `max_header_bytes` for pipelined body bytes
const HEADER_BUFFER_SLACK: usize = 16 * 1024;

/// hyper rejects read buffers smaller than this
const MIN_BUFFER_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("server I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("in-flight requests did not finish within {0:?} of shutdown")]
    ShutdownTimedOut(Duration),
}

/// Builds the application router with transport limits applied.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/gh/{owner}/{repo}/{tag}/{assetName}", get(download_release))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(
                    config.max_header_bytes.as_usize(),
                    enforce_header_limit,
                ))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.write_timeout(),
                ))
                .layer(RequestBodyTimeoutLayer::new(config.read_timeout())),
        )
}

/// Bound listener plus the router it serves
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
    connections: Builder<TokioExecutor>,
    shutdown_timeout: Duration,
    cancel: CancellationToken,
}

impl ApiServer {
    pub async fn bind(
        config: &ServerConfig,
        resolver: Arc<dyn Resolver>,
    ) -> Result<Self, ServeError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServeError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        let cancel = CancellationToken::new();
        let state = AppState::with_cancellation(resolver, cancel.clone());

        Ok(Self {
            listener,
            router: router(state, config),
            connections: connection_builder(config),
            shutdown_timeout: config.shutdown_timeout(),
            cancel,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServeError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    ///
    /// Requests still running after the shutdown grace period are cancelled
    /// (they answer 502) and `ServeError::ShutdownTimedOut` is returned.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            listener,
            router,
            connections,
            shutdown_timeout,
            cancel,
        } = self;

        if let Ok(address) = listener.local_addr() {
            info!(%address, "ghrelay listening");
        }

        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        loop {
            let (stream, remote) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        if !is_connection_error(&err) {
                            error!(error = %err, "Failed to accept connection");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                        continue;
                    }
                },
                _ = &mut shutdown => break,
            };

            let service = TowerToHyperService::new(router.clone());
            let connection = connections
                .serve_connection_with_upgrades(TokioIo::new(stream), service)
                .into_owned();
            let connection = graceful.watch(connection);

            tokio::spawn(async move {
                if let Err(err) = connection.await {
                    debug!(%remote, error = %err, "Connection closed with error");
                }
            });
        }

        drop(listener);
        info!("Shutdown started, waiting for in-flight requests");

        let drained = graceful.shutdown();
        tokio::pin!(drained);

        if tokio::time::timeout(shutdown_timeout, &mut drained)
            .await
            .is_ok()
        {
            return Ok(());
        }

        warn!(
            timeout = ?shutdown_timeout,
            "Shutdown grace period elapsed, cancelling in-flight requests"
        );
        cancel.cancel();

        let _ = tokio::time::timeout(CANCEL_DRAIN, drained).await;

        Err(ServeError::ShutdownTimedOut(shutdown_timeout))
    }
}

/// HTTP/1 parser limits: the header read deadline, plus a read buffer and
/// header count large enough that `enforce_header_limit` sees every header
/// block up to `max_header_bytes`.
fn connection_builder(config: &ServerConfig) -> Builder<TokioExecutor> {
    let mut builder = Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(config.read_timeout())
        .max_buf_size(header_buffer_size(config.max_header_bytes.as_usize()))
        .max_headers(config.max_headers);
    builder
}

fn header_buffer_size(max_header_bytes: usize) -> usize {
    max_header_bytes
        .saturating_add(HEADER_BUFFER_SLACK)
        .max(MIN_BUFFER_SIZE)
}

fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
