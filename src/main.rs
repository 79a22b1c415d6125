//! Users CRUD service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ request_id → access_log → recovery → limits ─┐
//!                                                                    ▼
//!                                                   router (prefix) + metrics
//!                                                                    │
//!                                                                    ▼
//!     Client Response                                  handlers → UsersRepository
//!     ◀─────────────── status / JSON ◀────────────────          (postgres | memory)
//! ```
//!
//! Exit status is non-zero when configuration, the database, or the
//! listener cannot be set up, and when in-flight requests outlive the
//! shutdown grace period.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use users_service::config::{load_config, load_from_env, ObservabilityConfig};
use users_service::http::{HttpServer, ServerError};
use users_service::lifecycle::{wait_for_termination, Shutdown};
use users_service::observability::{DbTraceLogger, Logger};
use users_service::storage::{postgres, InMemoryUsersRepository, PgUsersRepository, UsersRepository};

#[derive(Parser)]
#[command(name = "users-service", version, about = "HTTP CRUD service for users")]
struct Cli {
    /// TOML configuration file. Defaults plus POSTGRES_* variables when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep users in process memory instead of PostgreSQL.
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => load_config(path),
        None => load_from_env(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            Logger::from_config(&ObservabilityConfig::default())
                .in_scope(|| tracing::error!(error = %e, "Failed to load config"));
            return ExitCode::FAILURE;
        }
    };

    let logger = Logger::from_config(&config.observability);
    logger.in_scope(|| {
        tracing::info!(
            bind_address = %config.listener.bind_address,
            path_prefix = %config.http.path_prefix,
            in_memory = cli.in_memory,
            "users-service v{} starting",
            env!("CARGO_PKG_VERSION")
        )
    });

    let repository: Arc<dyn UsersRepository> = if cli.in_memory {
        Arc::new(InMemoryUsersRepository::new())
    } else {
        match postgres::connect(&config.database).await {
            Ok(pool) => {
                let tracer = DbTraceLogger::from_config(logger.clone(), &config.observability);
                Arc::new(PgUsersRepository::new(pool, tracer))
            }
            Err(e) => {
                logger.in_scope(|| tracing::error!(error = %e, "Failed to open db"));
                return ExitCode::FAILURE;
            }
        }
    };

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            logger.in_scope(|| {
                tracing::error!(
                    error = %e,
                    bind_address = %config.listener.bind_address,
                    "Failed to bind listener"
                )
            });
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let signal_logger = logger.clone();
    shutdown.trigger_on(async move {
        match wait_for_termination().await {
            Ok(signal) => {
                signal_logger.in_scope(|| tracing::info!(signal, "Shutdown signal received"))
            }
            Err(e) => {
                signal_logger
                    .in_scope(|| tracing::error!(error = %e, "Failed to install signal handler"));
                std::future::pending::<()>().await;
            }
        }
    });

    let server = HttpServer::new(config, repository, logger.clone());
    match server.run(listener, shutdown.subscribe()).await {
        Ok(()) => {
            logger.in_scope(|| tracing::info!("Server was shut down"));
            ExitCode::SUCCESS
        }
        Err(e @ ServerError::ShutdownTimeout(_)) => {
            logger.in_scope(|| tracing::error!(error = %e, "Server forced to shutdown"));
            ExitCode::FAILURE
        }
        Err(e) => {
            logger.in_scope(|| tracing::error!(error = %e, "Server error"));
            ExitCode::FAILURE
        }
    }
}
