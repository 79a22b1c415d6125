//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the users API handlers
//! - Wire up middleware (correlation id, access log, recovery, limits)
//! - Mount everything under the configured path prefix
//! - Bind to a listener and drain in-flight requests on shutdown
//!
//! # Design Decisions
//! - Metrics are a route layer, so only matched routes carry a real
//!   `path` label
//! - Shutdown waits at most the configured grace period; requests still
//!   running after that are abandoned and reported as an error

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use crate::config::{HttpConfig, ObservabilityConfig, ServiceConfig};
use crate::http::handlers::{
    create_user, delete_user, get_user, healthcheck, list_users, render_metrics,
};
use crate::http::middleware::{
    access_log_middleware, install_panic_hook, metrics_middleware, recovery_middleware,
};
use crate::http::request::request_id_middleware;
use crate::observability::logging::Logger;
use crate::observability::metrics;
use crate::storage::UsersRepository;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn UsersRepository>,
    pub expose_error_details: bool,
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("in-flight requests still running after {0:?}")]
    ShutdownTimeout(Duration),
}

/// HTTP server for the users API.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    logger: Logger,
}

impl HttpServer {
    /// Create a new HTTP server backed by `repository`.
    pub fn new(config: ServiceConfig, repository: Arc<dyn UsersRepository>, logger: Logger) -> Self {
        let metrics = config
            .observability
            .metrics_enabled
            .then(metrics::init_metrics);

        let state = AppState {
            repository,
            expose_error_details: config.http.expose_error_details,
            metrics,
        };

        let router = build_router(&config, state, &logger);
        Self {
            router,
            config,
            logger,
        }
    }

    /// The fully layered router, e.g. for driving it without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until a value arrives on `shutdown`, then stop
    /// accepting and wait up to the grace period for in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let grace = Duration::from_secs(self.config.lifecycle.shutdown_grace_secs);
        let logger = self.logger;
        logger.in_scope(|| tracing::info!(address = %addr, "HTTP server starting"));

        let (drain_tx, drain_rx) = oneshot::channel::<()>();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = drain_rx.await;
            })
            .into_future();
        let mut serving = tokio::spawn(serve);

        tokio::select! {
            joined = &mut serving => return flatten(joined),
            _ = shutdown.recv() => {}
        }

        logger.in_scope(|| tracing::info!("Shutting down server..."));
        let _ = drain_tx.send(());

        match tokio::time::timeout(grace, &mut serving).await {
            Ok(joined) => {
                flatten(joined)?;
                logger.in_scope(|| tracing::info!("HTTP server stopped"));
                Ok(())
            }
            Err(_) => {
                serving.abort();
                Err(ServerError::ShutdownTimeout(grace))
            }
        }
    }
}

fn flatten(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    joined
        .map_err(std::io::Error::other)?
        .map_err(ServerError::Io)
}

pub const HEALTHCHECK_PATH: &str = "/healthcheck";
pub const USERS_PATH: &str = "/users";
pub const USER_PATH: &str = "/users/{id}";

/// Users API routes, relative to the path prefix.
pub fn api_routes(observability: &ObservabilityConfig) -> Router<AppState> {
    let mut router = Router::new()
        .route(HEALTHCHECK_PATH, get(healthcheck))
        .route(USERS_PATH, get(list_users).post(create_user))
        .route(USER_PATH, get(get_user).delete(delete_user));
    if observability.metrics_enabled {
        router = router.route(&observability.metrics_path, get(render_metrics));
    }
    router.route_layer(middleware::from_fn(metrics_middleware))
}

/// Mount `router` under `prefix`; an empty prefix mounts at the root.
pub fn with_prefix(prefix: &str, router: Router) -> Router {
    if prefix.is_empty() {
        router
    } else {
        Router::new().nest(prefix, router)
    }
}

/// Apply the request middleware chain, outermost last.
#[allow(deprecated)]
pub fn with_middleware(router: Router, http: &HttpConfig, logger: &Logger) -> Router {
    install_panic_hook();
    router
        .layer(RequestBodyLimitLayer::new(http.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(http.request_timeout_secs)))
        .layer(middleware::from_fn_with_state(logger.clone(), recovery_middleware))
        .layer(middleware::from_fn_with_state(logger.clone(), access_log_middleware))
        .layer(middleware::from_fn(request_id_middleware))
}

/// Build the complete application router.
pub fn build_router(config: &ServiceConfig, state: AppState, logger: &Logger) -> Router {
    let api = api_routes(&config.observability).with_state(state);
    with_middleware(with_prefix(&config.http.path_prefix, api), &config.http, logger)
}
