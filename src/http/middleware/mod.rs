//! Cross-cutting request middleware.
//!
//! # Order (outermost first)
//! ```text
//! request_id → access_log → recovery → timeout / body limit → router
//!                                                              └─ metrics (route layer)
//! ```
//!
//! The access logger sits outside recovery so that a recovered panic is
//! still reported with its final status.

pub mod access_log;
pub mod metrics;
pub mod recovery;

pub use access_log::access_log_middleware;
pub use metrics::metrics_middleware;
pub use recovery::{install_panic_hook, recovery_middleware};
