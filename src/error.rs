use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::repository::DirectoryError;

/// ApiError
///
/// The single error taxonomy surfaced across the HTTP boundary. Every failure
/// is terminal for the current request; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No token supplied at all.
    #[error("authentication required")]
    Unauthenticated,
    /// A token was supplied but is unverifiable or expired.
    #[error("forbidden access")]
    InvalidCredential,
    /// A verified identity lacks the required role or directory record.
    #[error("forbidden access")]
    Forbidden,
    /// The referenced email or record is absent from the directory.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// A write collided with an existing record.
    #[error("{0}")]
    Conflict(&'static str),
    /// Directory connectivity failure. Surfaced as a generic server error.
    #[error("internal server error")]
    Directory(#[from] DirectoryError),
    /// Token signing failure in the credential issuer.
    #[error("internal server error")]
    TokenEncoding(#[from] jsonwebtoken::errors::Error),
}

impl ApiError {
    /// Stable machine-readable discriminant used in the error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::InvalidCredential => "invalid_credential",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Directory(_) => "internal",
            ApiError::TokenEncoding(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredential => StatusCode::FORBIDDEN,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::TokenEncoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// ErrorBody
///
/// The normalized error envelope applied consistently across all routes,
/// replacing the ad hoc per-route shapes of earlier revisions.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // The caller only sees a generic 500; the detail goes to the log.
            ApiError::Directory(ref e) => tracing::error!("directory failure: {e}"),
            ApiError::TokenEncoding(ref e) => tracing::error!("token signing failure: {e}"),
            _ => {}
        }

        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
