use crate::services::{
    convert_service::ConvertError,
    object_store::StoreError,
    song_service::SongError,
};
use axum::{
    Json,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Stable, machine-readable error category sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    UploadFailed,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::UploadFailed => "upload_failed",
            ErrorKind::Internal => "internal_error",
        }
    }
}

/// Error returned by every handler: a category, an HTTP status and a message
/// that is safe to show to the client.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorKind::Validation, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorKind::NotFound, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, ErrorKind::Forbidden, msg)
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::UploadFailed, msg)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.kind.as_str(),
            "message": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<SongError> for AppError {
    fn from(err: SongError) -> Self {
        match err {
            SongError::Validation(msg) => AppError::validation(msg),
            SongError::NotFound(msg) => AppError::not_found(msg),
            SongError::UploadFailed(detail) => {
                tracing::error!(error = %detail, "upload failed");
                AppError::upload_failed(format!("Failed to upload file: {detail}"))
            }
            SongError::Store(StoreError::InvalidKey(key)) => {
                AppError::validation(format!("Invalid object key `{key}`"))
            }
            SongError::Store(StoreError::ObjectNotFound(key)) => {
                AppError::not_found(format!("Object `{key}` not found"))
            }
            SongError::Store(err) => {
                tracing::error!(error = %err, "object store failure");
                AppError::internal("Object storage request failed")
            }
            SongError::Metadata(err) => {
                tracing::error!(error = %err, "metadata store failure");
                AppError::internal("Database request failed")
            }
        }
    }
}

/// Extractor rejections keep axum's status and text but use the JSON envelope.
macro_rules! rejection_into_app_error {
    ($($rejection:ty),+ $(,)?) => {
        $(
            impl From<$rejection> for AppError {
                fn from(rejection: $rejection) -> Self {
                    AppError::new(rejection.status(), ErrorKind::Validation, rejection.body_text())
                }
            }
        )+
    };
}

rejection_into_app_error!(JsonRejection, QueryRejection, MultipartRejection);

impl From<ConvertError> for AppError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::UnsupportedFormat(_)
            | ConvertError::InvalidInput(_)
            | ConvertError::UndetectedFormat => AppError::validation(err.to_string()),
            ConvertError::InputMissing => AppError::not_found(err.to_string()),
            ConvertError::EncoderFailed(_) | ConvertError::Io(_) => {
                tracing::error!(error = %err, "conversion failed");
                AppError::internal("Conversion failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_errors_map_to_taxonomy() {
        let cases = [
            (SongError::Validation("bad".into()), StatusCode::BAD_REQUEST, ErrorKind::Validation),
            (SongError::NotFound("gone".into()), StatusCode::NOT_FOUND, ErrorKind::NotFound),
            (
                SongError::UploadFailed("disk full".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::UploadFailed,
            ),
            (
                SongError::Store(StoreError::Backend("timeout".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Internal,
            ),
        ];

        for (err, status, kind) in cases {
            let app: AppError = err.into();
            assert_eq!(app.status, status);
            assert_eq!(app.kind, kind);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let app: AppError = SongError::Store(StoreError::Backend("secret-host:9000".into())).into();
        assert!(!app.message.contains("secret-host"));
    }
}
