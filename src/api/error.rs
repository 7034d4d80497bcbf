//! JSON error envelope
//!
//! Every failure reaches the client as `{"error": "<message>"}`.

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;
use crate::Error;

/// Message returned for failures the client cannot act on
pub const SERVER_ERROR: &str = "Server Error";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Outcome of a route that produced no rows
#[derive(Debug)]
pub enum ApiError {
    /// Path parameters could not be decoded; no query was run
    BadRequest(String),
    /// Query succeeded but matched nothing
    NotFound(String),
    /// Store rejected the query
    Store(StoreError),
    /// Anything else; details stay in the logs
    Internal(Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(message) | ApiError::NotFound(message) => message.clone(),
            ApiError::Store(error) => error.message.clone(),
            ApiError::Internal(_) => SERVER_ERROR.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Internal(err)
    }
}

/// Turn a handler panic into the generic error response
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "Request handler panicked");

    ApiError::Internal(Error::internal(detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_hide_details() {
        let error = ApiError::Internal(Error::transport("connection refused"));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message(), SERVER_ERROR);
    }

    #[test]
    fn test_bad_request_keeps_message() {
        let error = ApiError::BadRequest("Invalid UTF-8 in `surname`".to_string());
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.message(), "Invalid UTF-8 in `surname`");
    }

    #[test]
    fn test_store_errors_forward_message() {
        let error = ApiError::Store(StoreError::new("permission denied for table races"));
        assert_eq!(error.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(error.message(), "permission denied for table races");
    }
}
