//! Correlation id handling.
//!
//! # Responsibilities
//! - Reuse an inbound `X-Request-Id`, or generate one (UUID v4, 32 hex chars)
//! - Attach a [`RequestContext`] carrying the id to the request
//! - Echo the id on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (outermost layer)
//! - A blank or non-ASCII inbound header is treated as absent

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::http::context::RequestContext;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// A fresh correlation id: a random UUID without separators.
pub fn generate_request_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn inbound_request_id(req: &Request) -> Option<String> {
    req.headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Middleware assigning the correlation id.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = inbound_request_id(&req).unwrap_or_else(generate_request_id);
    req.extensions_mut().insert(RequestContext::new(request_id.clone()));

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|ctx: RequestContext| async move { ctx.request_id().unwrap_or_default().to_string() }),
            )
            .layer(middleware::from_fn(request_id_middleware))
    }

    async fn call(req: axum::http::Request<Body>) -> (String, String) {
        let res = app().oneshot(req).await.unwrap();
        let header = res.headers()[&X_REQUEST_ID].to_str().unwrap().to_string();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (header, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn generated_ids_are_32_hex_chars() {
        let id = generate_request_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_request_id());
    }

    #[tokio::test]
    async fn reuses_inbound_header() {
        let req = axum::http::Request::get("/")
            .header("X-Request-Id", "upstream-id")
            .body(Body::empty())
            .unwrap();
        let (header, seen_by_handler) = call(req).await;
        assert_eq!(header, "upstream-id");
        assert_eq!(seen_by_handler, "upstream-id");
    }

    #[tokio::test]
    async fn generates_when_missing_or_blank() {
        let req = axum::http::Request::get("/").body(Body::empty()).unwrap();
        let (header, seen_by_handler) = call(req).await;
        assert_eq!(header.len(), 32);
        assert_eq!(header, seen_by_handler);

        let req = axum::http::Request::get("/")
            .header("X-Request-Id", "  ")
            .body(Body::empty())
            .unwrap();
        let (header, _) = call(req).await;
        assert_eq!(header.len(), 32);
    }
}
