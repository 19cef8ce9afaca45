use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orb_relay_data_channel::RelayError;
use orb_relay_media::MediaError;
use tracing::{error, warn};

/// Body returned for a relayed upload.
pub const SUCCESS: &str = "SUCCESS";

/// Plain-text outcome tokens returned to HTTP callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorToken {
    FileTooBig,
    InvalidFile,
    InvalidTime,
    InvalidFileType,
    InvalidDepthFile,
    InvalidRgbFile,
    CantReadFileType,
    CantWriteFile,
    TcpServerError,
}

impl ErrorToken {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorToken::FileTooBig => "FILE_TOO_BIG",
            ErrorToken::InvalidFile => "INVALID_FILE",
            ErrorToken::InvalidTime => "INVALID_TIME",
            ErrorToken::InvalidFileType => "INVALID_FILE_TYPE",
            ErrorToken::InvalidDepthFile => "INVALID_DEPTH_FILE",
            ErrorToken::InvalidRgbFile => "INVALID_RGB_FILE",
            ErrorToken::CantReadFileType => "CANT_READ_FILE_TYPE",
            ErrorToken::CantWriteFile => "CANT_WRITE_FILE",
            ErrorToken::TcpServerError => "TCP_SERVER_ERROR",
        }
    }

    /// 400 for caller mistakes, 500 for local resource or downstream failures.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorToken::CantReadFileType | ErrorToken::CantWriteFile | ErrorToken::TcpServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ErrorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IntoResponse for ErrorToken {
    fn into_response(self) -> Response {
        (self.status(), self.as_str()).into_response()
    }
}

/// Errors produced while handling an upload or running the server.
#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("malformed upload: {0}")]
    Malformed(String),

    #[error("missing file field `{field}`")]
    MissingField {
        field: &'static str,
        token: ErrorToken,
    },

    #[error("invalid time value: {0}")]
    InvalidTime(String),

    #[error("field `{field}`: {source}")]
    Media {
        field: &'static str,
        /// Token reported instead of `INVALID_FILE_TYPE` for this field.
        rejected_token: Option<ErrorToken>,
        #[source]
        source: MediaError,
    },

    #[error("relay failed: {0}")]
    Relay(#[from] RelayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngressError {
    /// Token reported to the HTTP caller.
    pub fn token(&self) -> ErrorToken {
        match self {
            IngressError::TooLarge { .. } => ErrorToken::FileTooBig,
            IngressError::Malformed(_) => ErrorToken::InvalidFile,
            IngressError::MissingField { token, .. } => *token,
            IngressError::InvalidTime(_) => ErrorToken::InvalidTime,
            IngressError::Media {
                rejected_token,
                source,
                ..
            } => match source {
                MediaError::InvalidFileType(_) => rejected_token.unwrap_or(ErrorToken::InvalidFileType),
                MediaError::CantReadFileType(_) => ErrorToken::CantReadFileType,
                MediaError::CantWriteFile { .. } => ErrorToken::CantWriteFile,
            },
            IngressError::Relay(_) | IngressError::Io(_) => ErrorToken::TcpServerError,
        }
    }
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let token = self.token();
        if token.status().is_server_error() {
            error!(%token, "upload failed: {self}");
        } else {
            warn!(%token, "upload rejected: {self}");
        }
        token.into_response()
    }
}
