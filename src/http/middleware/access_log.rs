//! Structured access logging.
//!
//! One record per request, written after the inner service has produced a
//! response. When the response carries [`HandlerErrors`], each error is
//! logged on its own instead of the access line.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::USER_AGENT,
    middleware::Next,
    response::Response,
};

use crate::http::context::{HandlerErrors, RequestContext};
use crate::observability::logging::Logger;

/// Middleware emitting the access record.
pub async fn access_log_middleware(
    State(logger): State<Logger>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_owned();
    let query = req.uri().query().unwrap_or_default().to_owned();
    let method = req.method().clone();
    let ip = client_ip(&req);
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();

    let start = Instant::now();
    let response = next.run(req).await;
    let latency = start.elapsed();

    logger.in_scope(|| match response.extensions().get::<HandlerErrors>() {
        Some(errors) if !errors.is_empty() => {
            for error in errors.iter() {
                tracing::error!(request_id = ctx.request_id(), "{error}");
            }
        }
        _ => {
            tracing::info!(
                request_id = ctx.request_id(),
                status = response.status().as_u16(),
                method = %method,
                path = %path,
                query = %query,
                ip = ip.as_deref(),
                user_agent = %user_agent,
                latency_ms = latency.as_secs_f64() * 1000.0,
                "{path}"
            );
        }
    });

    response
}

/// Best-effort client address: first `X-Forwarded-For` hop, then
/// `X-Real-Ip`, then the socket peer.
pub fn client_ip<B>(req: &axum::http::Request<B>) -> Option<String> {
    let headers = req.headers();
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').map(str::trim).find(|hop| !hop.is_empty()));
    if let Some(hop) = forwarded {
        return Some(hop.to_owned());
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return Some(ip.to_owned());
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
