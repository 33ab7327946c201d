use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid path")]
    InvalidPath,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Internal(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("request too large")]
    RequestTooLarge,
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("{0} not found")]
    EncoderUnavailable(String),
    #[error("{encoder} conversion failed")]
    EncoderFailed { encoder: String, details: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidPath => "InvalidPath",
            AppError::NotFound(_) => "NotFound",
            AppError::InvalidArgument(_) => "InvalidArgument",
            AppError::PermissionDenied(_) => "PermissionDenied",
            AppError::Internal(_) => "Internal",
            AppError::BadRequest(_) => "BadRequest",
            AppError::RequestTooLarge => "RequestTooLarge",
            AppError::UnsupportedFormat(_) => "UnsupportedFormat",
            AppError::EncoderUnavailable(_) => "EncoderUnavailable",
            AppError::EncoderFailed { .. } => "EncoderFailed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidPath | AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidArgument(_) | AppError::BadRequest(_) | AppError::UnsupportedFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Internal(_) | AppError::EncoderUnavailable(_) | AppError::EncoderFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        let details = match self {
            AppError::EncoderFailed { details, .. } => Some(details.clone()),
            _ => None,
        };
        ErrorBody { code: self.code(), error: self.to_string(), details }
    }

    /// Translates an I/O error into the operation's taxonomy.
    ///
    /// `missing` is the message used for NotFound, `context` prefixes
    /// anything that is not a well-known kind.
    pub fn from_io(err: &io::Error, missing: &str, context: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => AppError::NotFound(missing.to_string()),
            io::ErrorKind::PermissionDenied => AppError::PermissionDenied("Permission denied".to_string()),
            _ => AppError::Internal(format!("{context}: {err}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_kind() {
        assert_eq!(AppError::InvalidPath.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidArgument("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::PermissionDenied("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::EncoderUnavailable("ffmpeg".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn io_errors_map_to_taxonomy() {
        let nf = io::Error::from(io::ErrorKind::NotFound);
        assert!(matches!(AppError::from_io(&nf, "File does not exist", "Error reading file"), AppError::NotFound(m) if m == "File does not exist"));
        let pd = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(AppError::from_io(&pd, "", ""), AppError::PermissionDenied(_)));
        let other = io::Error::new(io::ErrorKind::Other, "disk on fire");
        match AppError::from_io(&other, "", "Error reading directory") {
            AppError::Internal(m) => assert_eq!(m, "Error reading directory: disk on fire"),
            e => panic!("unexpected {e:?}"),
        }
    }

    #[test]
    fn encoder_failure_carries_details() {
        let body = AppError::EncoderFailed { encoder: "ffmpeg".into(), details: "bad codec".into() }.body();
        assert_eq!(body.code, "EncoderFailed");
        assert_eq!(body.error, "ffmpeg conversion failed");
        assert_eq!(body.details.as_deref(), Some("bad codec"));
    }
}
