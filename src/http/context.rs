//! Request-scoped values shared between middleware, handlers and storage.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Response;

/// Per-request values threaded explicitly through every downstream call.
///
/// Inserted into the request extensions by the correlation middleware.
/// Extracting it in a handler never fails: requests that did not pass the
/// middleware get an empty context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    request_id: Option<String>,
}

impl RequestContext {
    /// Context carrying `request_id`. An empty id yields no id.
    pub fn new(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        Self {
            request_id: (!request_id.is_empty()).then_some(request_id),
        }
    }

    /// Context for work that is not tied to an inbound request.
    pub fn detached() -> Self {
        Self::default()
    }

    /// The correlation id, if one was assigned.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_default())
    }
}

/// Handler-level errors attached to a response.
///
/// The access logger emits one error record per entry instead of the usual
/// access line.
#[derive(Debug, Clone, Default)]
pub struct HandlerErrors(Vec<String>);

impl HandlerErrors {
    /// Append `message` to the errors carried by `response`.
    pub fn record(response: &mut Response, message: impl Into<String>) {
        let extensions = response.extensions_mut();
        match extensions.get_mut::<Self>() {
            Some(errors) => errors.0.push(message.into()),
            None => {
                extensions.insert(Self(vec![message.into()]));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    #[test]
    fn empty_id_is_absent() {
        assert_eq!(RequestContext::new("").request_id(), None);
        assert_eq!(RequestContext::new("abc").request_id(), Some("abc"));
    }

    #[tokio::test]
    async fn extracts_from_extensions_or_defaults() {
        let mut req = Request::new(Body::empty());
        req.extensions_mut().insert(RequestContext::new("abc"));
        let (mut parts, _) = req.into_parts();
        let ctx = RequestContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.request_id(), Some("abc"));

        let (mut parts, _) = Request::new(Body::empty()).into_parts();
        let ctx = RequestContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx, RequestContext::detached());
    }

    #[test]
    fn errors_accumulate_on_response() {
        let mut response = Response::new(Body::empty());
        HandlerErrors::record(&mut response, "first");
        HandlerErrors::record(&mut response, "second");

        let errors = response.extensions().get::<HandlerErrors>().unwrap();
        assert_eq!(errors.iter().collect::<Vec<_>>(), vec!["first", "second"]);
    }
}
