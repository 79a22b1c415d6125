//! Database query trace logging.
//!
//! The storage adapter reports every statement it runs here. Records are
//! routed by outcome and elapsed time:
//!
//! | condition                                   | emitted at |
//! |---------------------------------------------|------------|
//! | statement failed, level ≥ `Error`           | ERROR      |
//! | slower than the threshold, level ≥ `Warn`   | WARN       |
//! | otherwise, level ≥ `Info`                   | DEBUG      |
//!
//! `Silent` emits nothing. Each record carries the request id, the calling
//! component label and the source location of the call site.

use std::panic::Location;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::ObservabilityConfig;
use crate::http::context::RequestContext;
use crate::observability::logging::Logger;

/// Minimum severity of query traces. Ordered from quietest to noisiest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum DbLogLevel {
    Silent = 1,
    Error = 2,
    #[default]
    Warn = 3,
    Info = 4,
}

/// Routes query traces to a [`Logger`].
#[derive(Debug, Clone)]
pub struct DbTraceLogger {
    logger: Logger,
    level: DbLogLevel,
    slow_threshold: Duration,
}

impl DbTraceLogger {
    /// Warn level, 100ms slow-query threshold.
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            level: DbLogLevel::Warn,
            slow_threshold: Duration::from_millis(100),
        }
    }

    pub fn from_config(logger: Logger, config: &ObservabilityConfig) -> Self {
        Self {
            logger,
            level: config.db_log_level,
            slow_threshold: Duration::from_millis(config.slow_query_threshold_ms),
        }
    }

    /// A copy of this logger at another level.
    pub fn with_level(&self, level: DbLogLevel) -> Self {
        Self {
            logger: self.logger.clone(),
            level,
            slow_threshold: self.slow_threshold,
        }
    }

    /// Zero disables slow-query detection.
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    pub fn level(&self) -> DbLogLevel {
        self.level
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    /// Informational message, emitted at debug severity.
    #[track_caller]
    pub fn info(&self, ctx: &RequestContext, message: &str) {
        if self.level < DbLogLevel::Info {
            return;
        }
        let caller = Location::caller();
        self.logger.in_scope(|| {
            tracing::debug!(request_id = ctx.request_id(), caller = %caller, "{message}")
        });
    }

    #[track_caller]
    pub fn warn(&self, ctx: &RequestContext, message: &str) {
        if self.level < DbLogLevel::Warn {
            return;
        }
        let caller = Location::caller();
        self.logger.in_scope(|| {
            tracing::warn!(request_id = ctx.request_id(), caller = %caller, "{message}")
        });
    }

    #[track_caller]
    pub fn error(&self, ctx: &RequestContext, message: &str) {
        if self.level < DbLogLevel::Error {
            return;
        }
        let caller = Location::caller();
        self.logger.in_scope(|| {
            tracing::error!(request_id = ctx.request_id(), caller = %caller, "{message}")
        });
    }

    /// Report one executed statement.
    ///
    /// `fc` yields the SQL text and row count; it is only called when a
    /// record is actually emitted.
    #[track_caller]
    pub fn trace<F, S>(
        &self,
        ctx: &RequestContext,
        component: &'static str,
        begin: Instant,
        fc: F,
        err: Option<&dyn std::error::Error>,
    ) where
        F: FnOnce() -> (S, u64),
        S: AsRef<str>,
    {
        if self.level <= DbLogLevel::Silent {
            return;
        }
        let caller = Location::caller();
        let elapsed = begin.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let request_id = ctx.request_id();

        match err {
            Some(err) if self.level >= DbLogLevel::Error => {
                let (sql, rows) = fc();
                self.logger.in_scope(|| {
                    tracing::error!(
                        request_id,
                        component,
                        caller = %caller,
                        error = %err,
                        elapsed_ms,
                        rows,
                        sql = sql.as_ref(),
                        "trace"
                    )
                });
            }
            _ if !self.slow_threshold.is_zero()
                && elapsed > self.slow_threshold
                && self.level >= DbLogLevel::Warn =>
            {
                let (sql, rows) = fc();
                self.logger.in_scope(|| {
                    tracing::warn!(
                        request_id,
                        component,
                        caller = %caller,
                        elapsed_ms,
                        rows,
                        sql = sql.as_ref(),
                        "trace"
                    )
                });
            }
            _ if self.level >= DbLogLevel::Info => {
                let (sql, rows) = fc();
                self.logger.in_scope(|| {
                    tracing::debug!(
                        request_id,
                        component,
                        caller = %caller,
                        elapsed_ms,
                        rows,
                        sql = sql.as_ref(),
                        "trace"
                    )
                });
            }
            _ => {}
        }
    }
}
