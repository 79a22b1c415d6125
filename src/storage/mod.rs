//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! handlers
//!     → UsersRepository (port, repository.rs)
//!         → postgres.rs (sqlx, traced statements)   ─┐
//!         → memory.rs   (tests, --in-memory runs)    ├→ User / UserEvent (models.rs)
//! ```
//!
//! # Design Decisions
//! - Only user creation is multi-statement; it runs in one transaction
//! - Driver errors pass through untranslated
//! - Schema lives in `sql/schema.sql`; nothing here creates or migrates it

pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;

pub use memory::InMemoryUsersRepository;
pub use models::{User, UserEvent};
pub use postgres::PgUsersRepository;
pub use repository::{RepositoryError, UsersRepository};
