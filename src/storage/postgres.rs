//! PostgreSQL adapter for [`UsersRepository`].
//!
//! Every statement is reported to the [`DbTraceLogger`] with the caller's
//! request context.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgQueryResult};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::http::context::RequestContext;
use crate::observability::db_trace::DbTraceLogger;
use crate::storage::models::User;
use crate::storage::repository::{RepositoryError, UsersRepository};

const INSERT_USER: &str =
    "INSERT INTO users (id, first_name, last_name, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)";
const INSERT_USER_EVENT: &str =
    "INSERT INTO user_events (created_at, updated_at, user_id) VALUES ($1, $2, $3)";
const SELECT_USER: &str =
    "SELECT id, first_name, last_name, created_at, updated_at FROM users WHERE id = $1";
const SELECT_USERS: &str = "SELECT id, first_name, last_name, created_at, updated_at FROM users";
const DELETE_USER: &str = "DELETE FROM users WHERE id = $1";
const COUNT_USER_EVENTS: &str = "SELECT COUNT(*) FROM user_events WHERE user_id = $1";

/// Open a connection pool. Fails if the database cannot be reached.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(config.connect_options())
        .await
}

pub struct PgUsersRepository {
    pool: PgPool,
    tracer: DbTraceLogger,
}

impl PgUsersRepository {
    pub fn new(pool: PgPool, tracer: DbTraceLogger) -> Self {
        Self { pool, tracer }
    }
}

fn failure<T>(result: &Result<T, sqlx::Error>) -> Option<&dyn std::error::Error> {
    result.as_ref().err().map(|e| e as &dyn std::error::Error)
}

fn rows_affected(result: &Result<PgQueryResult, sqlx::Error>) -> u64 {
    result.as_ref().map_or(0, PgQueryResult::rows_affected)
}

#[async_trait]
impl UsersRepository for PgUsersRepository {
    async fn create(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), RepositoryError> {
        // Dropping `tx` on an early return rolls back.
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let begin = Instant::now();
        let inserted = sqlx::query(INSERT_USER)
            .bind(id)
            .bind(first_name)
            .bind(last_name)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await;
        self.tracer.trace(
            ctx,
            "users.create",
            begin,
            || (INSERT_USER, rows_affected(&inserted)),
            failure(&inserted),
        );
        inserted?;

        let begin = Instant::now();
        let event = sqlx::query(INSERT_USER_EVENT)
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await;
        self.tracer.trace(
            ctx,
            "user_events.create",
            begin,
            || (INSERT_USER_EVENT, rows_affected(&event)),
            failure(&event),
        );
        event?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let begin = Instant::now();
        let found = sqlx::query_as::<_, User>(SELECT_USER)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        self.tracer.trace(
            ctx,
            "users.get",
            begin,
            || (SELECT_USER, found.as_ref().map_or(0, |u| u64::from(u.is_some()))),
            failure(&found),
        );
        Ok(found?)
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), RepositoryError> {
        let begin = Instant::now();
        let deleted = sqlx::query(DELETE_USER).bind(id).execute(&self.pool).await;
        self.tracer.trace(
            ctx,
            "users.delete",
            begin,
            || (DELETE_USER, rows_affected(&deleted)),
            failure(&deleted),
        );
        deleted?;
        Ok(())
    }

    async fn list(&self, ctx: &RequestContext) -> Result<Vec<User>, RepositoryError> {
        let begin = Instant::now();
        let users = sqlx::query_as::<_, User>(SELECT_USERS)
            .fetch_all(&self.pool)
            .await;
        self.tracer.trace(
            ctx,
            "users.list",
            begin,
            || (SELECT_USERS, users.as_ref().map_or(0, |u| u.len() as u64)),
            failure(&users),
        );
        Ok(users?)
    }

    async fn count_events(&self, ctx: &RequestContext, user_id: Uuid) -> Result<i64, RepositoryError> {
        let begin = Instant::now();
        let count = sqlx::query_scalar::<_, i64>(COUNT_USER_EVENTS)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await;
        self.tracer.trace(
            ctx,
            "user_events.count",
            begin,
            || (COUNT_USER_EVENTS, 1),
            failure(&count),
        );
        Ok(count?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::db_trace::DbLogLevel;
    use crate::observability::logging::LogCapture;

    /// A pool that never reaches a server, so every statement fails fast.
    fn unreachable_repository() -> (PgUsersRepository, LogCapture) {
        let config = DatabaseConfig {
            host: "127.0.0.1".into(),
            port: 1,
            ..DatabaseConfig::default()
        };
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(500))
            .connect_lazy_with(config.connect_options());
        let (logger, capture) = LogCapture::new();
        let tracer = DbTraceLogger::new(logger).with_level(DbLogLevel::Error);
        (PgUsersRepository::new(pool, tracer), capture)
    }

    #[tokio::test]
    async fn failed_statements_are_attributed_to_this_adapter() {
        let (repo, capture) = unreachable_repository();
        let ctx = RequestContext::new("pg-down");

        assert!(repo.list(&ctx).await.is_err());
        assert!(repo.get(&ctx, Uuid::nil()).await.is_err());

        let errors = capture.records_at("ERROR");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["component"], "users.list");
        assert_eq!(errors[1]["component"], "users.get");
        for record in &errors {
            assert_eq!(record["request_id"], "pg-down");
            assert!(record["caller"].as_str().unwrap().contains("postgres.rs"));
            assert!(record["error"].is_string());
        }
    }

    #[tokio::test]
    async fn create_fails_before_any_statement_without_a_connection() {
        let (repo, capture) = unreachable_repository();
        let err = repo
            .create(&RequestContext::detached(), Uuid::new_v4(), "Ada", "Lovelace")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Database(_)));
        // The transaction never began, so no statement was traced.
        assert!(capture.records().is_empty());
    }
}
