//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use users_service::config::ServiceConfig;
use users_service::http::{HttpServer, RequestContext, ServerError};
use users_service::lifecycle::Shutdown;
use users_service::observability::{LogCapture, Logger};
use users_service::storage::{RepositoryError, User, UsersRepository};
use uuid::Uuid;

/// A running server on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub logs: LogCapture,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start `repository` behind a full server with captured logs.
pub async fn start_server(config: ServiceConfig, repository: Arc<dyn UsersRepository>) -> TestServer {
    let (logger, logs) = LogCapture::new();
    start_server_with_logger(config, repository, logger, logs).await
}

async fn start_server_with_logger(
    config: ServiceConfig,
    repository: Arc<dyn UsersRepository>,
    logger: Logger,
    logs: LogCapture,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, repository, logger);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
    TestServer {
        addr,
        shutdown,
        logs,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Repository whose every call panics inside the handler.
pub struct PanickingRepository;

#[async_trait]
impl UsersRepository for PanickingRepository {
    async fn create(&self, _: &RequestContext, _: Uuid, _: &str, _: &str) -> Result<(), RepositoryError> {
        panic!("repository exploded");
    }
    async fn get(&self, _: &RequestContext, _: Uuid) -> Result<Option<User>, RepositoryError> {
        panic!("repository exploded");
    }
    async fn delete(&self, _: &RequestContext, _: Uuid) -> Result<(), RepositoryError> {
        panic!("repository exploded");
    }
    async fn list(&self, _: &RequestContext) -> Result<Vec<User>, RepositoryError> {
        let users: Option<Vec<User>> = None;
        Ok(users.unwrap())
    }
    async fn count_events(&self, _: &RequestContext, _: Uuid) -> Result<i64, RepositoryError> {
        panic!("repository exploded");
    }
}

/// Repository whose `list` takes `delay` before answering with no users.
pub struct SlowRepository {
    pub delay: Duration,
}

#[async_trait]
impl UsersRepository for SlowRepository {
    async fn create(&self, _: &RequestContext, _: Uuid, _: &str, _: &str) -> Result<(), RepositoryError> {
        Ok(())
    }
    async fn get(&self, _: &RequestContext, _: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(None)
    }
    async fn delete(&self, _: &RequestContext, _: Uuid) -> Result<(), RepositoryError> {
        Ok(())
    }
    async fn list(&self, _: &RequestContext) -> Result<Vec<User>, RepositoryError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
    async fn count_events(&self, _: &RequestContext, _: Uuid) -> Result<i64, RepositoryError> {
        Ok(0)
    }
}
