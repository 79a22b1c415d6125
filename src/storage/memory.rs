//! In-process [`UsersRepository`] for tests and database-less local runs.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::http::context::RequestContext;
use crate::storage::models::{User, UserEvent};
use crate::storage::repository::{RepositoryError, UsersRepository};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    events: Vec<UserEvent>,
    next_event_id: i64,
}

/// Users and events held in memory behind a mutex. Every operation takes the
/// lock once, so a create is observed entirely or not at all.
#[derive(Debug, Default)]
pub struct InMemoryUsersRepository {
    tables: Mutex<Tables>,
}

impl InMemoryUsersRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every recorded event.
    pub fn events(&self) -> Vec<UserEvent> {
        self.lock().events.clone()
    }
}

#[async_trait]
impl UsersRepository for InMemoryUsersRepository {
    async fn create(
        &self,
        _ctx: &RequestContext,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.lock();
        if tables.users.iter().any(|u| u.id == id) {
            return Err(RepositoryError::DuplicateKey(id));
        }

        let now = Utc::now();
        tables.next_event_id += 1;
        let event_id = tables.next_event_id;
        tables.users.push(User {
            id,
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            created_at: now,
            updated_at: now,
        });
        tables.events.push(UserEvent {
            id: event_id,
            created_at: now,
            updated_at: now,
            user_id: id,
        });
        Ok(())
    }

    async fn get(&self, _ctx: &RequestContext, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn delete(&self, _ctx: &RequestContext, id: Uuid) -> Result<(), RepositoryError> {
        self.lock().users.retain(|u| u.id != id);
        Ok(())
    }

    async fn list(&self, _ctx: &RequestContext) -> Result<Vec<User>, RepositoryError> {
        Ok(self.lock().users.clone())
    }

    async fn count_events(&self, _ctx: &RequestContext, user_id: Uuid) -> Result<i64, RepositoryError> {
        let count = self.lock().events.iter().filter(|e| e.user_id == user_id).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}
