//! Panic recovery.
//!
//! Wraps the inner service so that a panic while producing a response does
//! not tear down the connection task silently. Two outcomes:
//!
//! - The panic carries a broken-pipe / connection-reset error: the peer is
//!   gone. The failure is logged with the request head, recorded as a
//!   [`HandlerErrors`] entry, and no body is produced.
//! - Anything else: logged with the request head and the backtrace of the
//!   panic site, answered with `500`.
//!
//! Backtraces come from a panic hook installed by [`install_panic_hook`].
//! The hook only records (and stays quiet) for panics raised while a guarded
//! future is being polled; other panics go to the previously installed hook.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::{poll_fn, Future};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, Uri, Version},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;

use crate::http::context::{HandlerErrors, RequestContext};
use crate::observability::logging::Logger;

/// Status recorded for requests whose client went away mid-flight.
/// Never reaches the peer.
const CLIENT_CLOSED_REQUEST: u16 = 499;

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

struct PanicSite {
    location: Option<String>,
    backtrace: String,
}

/// Install the process panic hook used to capture panic-site backtraces.
/// Idempotent.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) > 0 {
                let site = PanicSite {
                    location: info.location().map(ToString::to_string),
                    backtrace: Backtrace::force_capture().to_string(),
                };
                LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(site));
            } else {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread as polling a guarded future.
struct GuardScope;

impl GuardScope {
    fn enter() -> Self {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        GuardScope
    }
}

impl Drop for GuardScope {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Method, target, version and headers of a request; the body is never kept.
#[derive(Debug, Clone)]
struct RequestHead {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
}

impl RequestHead {
    fn capture(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            version: req.version(),
            headers: req.headers().clone(),
        }
    }

    /// Wire-style dump: request line, then one `name: value` line per header.
    fn dump(&self) -> String {
        let target = self
            .uri
            .path_and_query()
            .map_or_else(|| self.uri.path(), |pq| pq.as_str());
        let mut out = format!("{} {} {:?}\r\n", self.method, target, self.version);
        for (name, value) in &self.headers {
            out.push_str(name.as_str());
            out.push_str(": ");
            out.push_str(&String::from_utf8_lossy(value.as_bytes()));
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }
}

/// Middleware converting panics in the inner service into responses.
pub async fn recovery_middleware(
    State(logger): State<Logger>,
    req: Request,
    next: Next,
) -> Response {
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();
    let head = RequestHead::capture(&req);

    let mut inner = Box::pin(next.run(req));
    let guarded = poll_fn(move |cx| {
        let _scope = GuardScope::enter();
        inner.as_mut().poll(cx)
    });

    match AssertUnwindSafe(guarded).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => recover(&logger, &ctx, &head, payload),
    }
}

fn recover(
    logger: &Logger,
    ctx: &RequestContext,
    head: &RequestHead,
    payload: Box<dyn Any + Send>,
) -> Response {
    let site = LAST_PANIC.with(|slot| slot.borrow_mut().take());
    let error = panic_message(payload.as_ref());
    let request = head.dump();

    if is_broken_connection(payload.as_ref()) {
        logger.in_scope(|| {
            tracing::error!(
                request_id = ctx.request_id(),
                error = %error,
                request = %request,
                "{}",
                head.uri.path()
            )
        });
        // The connection is dead; nothing written here reaches the client.
        let mut response = Response::new(Body::empty());
        *response.status_mut() =
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST);
        HandlerErrors::record(&mut response, error);
        return response;
    }

    let (location, stack) = match site {
        Some(site) => (site.location, site.backtrace),
        None => (None, Backtrace::force_capture().to_string()),
    };
    logger.in_scope(|| {
        tracing::error!(
            request_id = ctx.request_id(),
            time = %chrono::Utc::now().to_rfc3339(),
            error = %error,
            location = location.as_deref(),
            request = %request,
            stack = %stack,
            "[Recovery from panic]"
        )
    });
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(err) = payload.downcast_ref::<io::Error>() {
        err.to_string()
    } else if let Some(err) = payload.downcast_ref::<hyper::Error>() {
        err.to_string()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Whether a panic payload describes a severed client connection.
pub(crate) fn is_broken_connection(payload: &(dyn Any + Send)) -> bool {
    if let Some(err) = payload.downcast_ref::<io::Error>() {
        return is_disconnect(err);
    }
    if let Some(err) = payload.downcast_ref::<hyper::Error>() {
        let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                if is_disconnect(io_err) {
                    return true;
                }
            }
            source = cause.source();
        }
        return mentions_disconnect(&err.to_string());
    }
    false
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    ) || mentions_disconnect(&err.to_string())
}

fn mentions_disconnect(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("broken pipe") || text.contains("connection reset by peer")
}
