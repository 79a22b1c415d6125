//! Mapping of handler failures to HTTP responses.
//!
//! # Design Decisions
//! - Client input errors are 400 with no body
//! - Storage errors are 500 with the driver text (or a generic message when
//!   detail exposure is disabled), never translated
//! - A missing user is 404 with no body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::storage::RepositoryError;

pub const GENERIC_STORAGE_ERROR: &str = "internal server error";

#[derive(Debug)]
pub enum ApiError {
    BadRequest,
    NotFound,
    Storage(String),
}

impl ApiError {
    /// Wrap a repository failure, keeping its text only if `expose` is set.
    pub fn storage(err: RepositoryError, expose: bool) -> Self {
        if expose {
            Self::Storage(err.to_string())
        } else {
            Self::Storage(GENERIC_STORAGE_ERROR.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST.into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Storage(message) => (StatusCode::INTERNAL_SERVER_ERROR, message).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn storage_errors_carry_text_when_exposed() {
        let err = RepositoryError::DuplicateKey(Uuid::nil());
        let expected = err.to_string();
        let response = ApiError::storage(err, true).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await, expected);
    }

    #[tokio::test]
    async fn storage_errors_are_generic_when_hidden() {
        let response = ApiError::storage(RepositoryError::DuplicateKey(Uuid::nil()), false).into_response();
        assert_eq!(body_of(response).await, GENERIC_STORAGE_ERROR);
    }

    #[tokio::test]
    async fn client_errors_have_empty_bodies() {
        let response = ApiError::BadRequest.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_of(response).await.is_empty());

        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_of(response).await.is_empty());
    }
}
