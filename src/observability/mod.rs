//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! middleware, handlers, storage produce:
//!     → logging.rs (structured log records through a Logger handle)
//!     → db_trace.rs (per-statement records, level and slow-query gated)
//!     → metrics.rs (request counters and latency histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all subsystems via RequestContext
//! - Metrics are cheap (atomic increments)

pub mod db_trace;
pub mod logging;
pub mod metrics;

pub use db_trace::{DbLogLevel, DbTraceLogger};
pub use logging::{LogCapture, Logger};
