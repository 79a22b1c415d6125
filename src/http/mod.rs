//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware chain, graceful drain)
//!     → request.rs (correlation id → RequestContext)
//!     → middleware/ (access log, panic recovery, metrics)
//!     → handlers.rs (bind input, one repository call)
//!     → response.rs (map outcome to status and body)
//!     → Send to client
//! ```

pub mod context;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use context::{HandlerErrors, RequestContext};
pub use handlers::UserModel;
pub use request::{generate_request_id, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, HttpServer, ServerError};
