//! Users CRUD service library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod storage;

pub use config::schema::ServiceConfig;
pub use http::{HttpServer, RequestContext};
pub use lifecycle::Shutdown;
pub use observability::Logger;
