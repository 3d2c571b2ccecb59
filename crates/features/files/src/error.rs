use crate::models::ErrorResponse;
use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use fgate_storage::StorageError;
use std::borrow::Cow;
use tracing::{debug, error};

/// Errors surfaced by the file routes.
#[fgate_derive::fgate_error]
pub enum FilesError {
    #[error("Storage error{}: {source}", format_context(.context))]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },

    /// The upload body is not valid multipart or exceeds the body limit.
    #[error("Upload body error{}: {source}", format_context(.context))]
    Multipart { source: MultipartError, context: Option<Cow<'static, str>> },

    #[error("Bad request{}: {message}", format_context(.context))]
    BadRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl FilesError {
    /// Status code and client-safe message. Never includes paths.
    fn status_and_detail(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Storage { source, .. } => match source {
                StorageError::PathEscape { .. } => (StatusCode::BAD_REQUEST, "Invalid path"),
                StorageError::InvalidName { .. } => (StatusCode::BAD_REQUEST, "Invalid name"),
                StorageError::MalformedRange { .. } => {
                    (StatusCode::BAD_REQUEST, "Malformed Range header")
                },
                StorageError::NotFound { .. } | StorageError::NotADirectory { .. } => {
                    (StatusCode::NOT_FOUND, "Not found")
                },
                StorageError::DirectoryNotEmpty { .. } => {
                    (StatusCode::CONFLICT, "Directory not empty")
                },
                StorageError::Conflict { .. } => (StatusCode::CONFLICT, "Conflict"),
                StorageError::RangeNotSatisfiable { .. } => {
                    (StatusCode::RANGE_NOT_SATISFIABLE, "Range not satisfiable")
                },
                StorageError::Io { source, .. } => match body_error(source) {
                    Some(body) => (body.status(), "Invalid upload body"),
                    None => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
                },
            },
            Self::Multipart { source, .. } => (source.status(), "Invalid upload body"),
            Self::BadRequest { .. } => (StatusCode::BAD_REQUEST, "Bad request"),
        }
    }

    /// Variant name of the underlying failure, for logs.
    fn log_kind(&self) -> &'static str {
        match self {
            Self::Storage { source, .. } => source.kind(),
            other => other.kind(),
        }
    }
}

/// Upload bodies reach storage as a stream, so a client-side multipart failure (such as the
/// body limit) surfaces as an I/O error wrapping the [`MultipartError`].
fn body_error(err: &std::io::Error) -> Option<&MultipartError> {
    err.get_ref().and_then(|inner| inner.downcast_ref::<MultipartError>())
}

impl IntoResponse for FilesError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();

        if status.is_server_error() {
            error!(kind = self.log_kind(), error = %self, "File request failed");
        } else {
            debug!(kind = self.log_kind(), status = status.as_u16(), error = %self, "File request rejected");
        }

        let mut response =
            (status, Json(ErrorResponse { detail: detail.to_owned() })).into_response();

        if let Self::Storage { source: StorageError::RangeNotSatisfiable { size, .. }, .. } = &self
            && let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}"))
        {
            response.headers_mut().insert(header::CONTENT_RANGE, value);
        }

        response
    }
}
