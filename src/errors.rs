use crate::{
    middleware::auth::AuthError,
    services::vault_service::{ErrorKind, VaultError},
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Error as returned to HTTP callers: a stable code plus a generic message.
///
/// Internal detail is logged where the error is converted, never serialized.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: &'static str,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: &'static str) -> Self {
        Self {
            status,
            code,
            message,
        }
    }

    /// Shortcut for a 400 Bad Request
    pub fn bad_request(code: &'static str, message: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "InternalError",
            "Internal server error",
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code,
            "message": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<VaultError> for AppError {
    fn from(err: VaultError) -> Self {
        if err.kind() == ErrorKind::Storage {
            tracing::error!(error = %err, "storage failure");
        }

        match err {
            VaultError::InvalidKeyLength { .. } => Self::bad_request(
                "InvalidKeyLength",
                "Invalid encryption key: must be exactly 16 bytes",
            ),
            VaultError::MissingField(_) => {
                Self::bad_request("MissingField", "Required field is missing")
            }
            VaultError::FileNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "FileNotFound", "File not found")
            }
            VaultError::ObjectMissing { .. } => {
                Self::new(StatusCode::NOT_FOUND, "ObjectMissing", "File not found")
            }
            VaultError::Unauthorized(_) => Self::new(
                StatusCode::FORBIDDEN,
                "Unauthorized",
                "Unauthorized to decrypt this file",
            ),
            VaultError::WrongKey => Self::new(
                StatusCode::FORBIDDEN,
                "WrongKey",
                "Incorrect decryption key",
            ),
            VaultError::StorageWriteFailed(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "StorageWriteFailed",
                "File upload failed",
            ),
            VaultError::CatalogWriteFailed(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "CatalogWriteFailed",
                "File upload failed",
            ),
            VaultError::KeyRecordWriteFailed(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "KeyRecordWriteFailed",
                "File upload failed",
            ),
            VaultError::StorageReadFailed(_) | VaultError::MetadataReadFailed(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "StorageUnavailable",
                "Storage temporarily unavailable",
            ),
            VaultError::DecryptionFailed { .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DecryptionFailed",
                "Decryption failed",
            ),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let (code, message) = match err {
            AuthError::MissingToken => ("MissingToken", "Access denied. No token provided."),
            AuthError::MalformedToken => ("MalformedToken", "Invalid token."),
            AuthError::Expired => ("TokenExpired", "Token expired."),
            AuthError::InvalidToken => ("InvalidToken", "Invalid token."),
            AuthError::SigningFailed => return Self::internal(),
        };
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", err);
        AppError::internal()
    }
}
