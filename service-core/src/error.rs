use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine readable error code carried in every error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AuthorizationError,
    AccessTokenExpired,
    RefreshTokenInvalid,
    AuthenticationError,
    Forbidden,
    InvalidRequest,
    MalformedBody,
    UnsupportedGrantType,
    ResourceNotFound,
    InternalError,
    DatabaseError,
    ConfigurationError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthorizationError => "authorization_error",
            ErrorCode::AccessTokenExpired => "access_token_expired",
            ErrorCode::RefreshTokenInvalid => "refresh_token_invalid",
            ErrorCode::AuthenticationError => "authentication_error",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::MalformedBody => "malformed_body",
            ErrorCode::UnsupportedGrantType => "unsupported_grant_type",
            ErrorCode::ResourceNotFound => "resource_not_found",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::DatabaseError => "database_error",
            ErrorCode::ConfigurationError => "configuration_error",
        }
    }
}

/// JSON body returned for every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed bearer header, bad signature, unparseable subject.
    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Access token expired")]
    AccessTokenExpired,

    /// Refresh token absent, unknown, expired or revoked.
    #[error("Refresh token invalid")]
    RefreshTokenInvalid,

    /// Bad client or user credentials, or a disabled account. The message is
    /// sent to the client as is, so it must not say which check failed.
    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Malformed body: {0}")]
    MalformedBody(String),

    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_)
            | AppError::AccessTokenExpired
            | AppError::RefreshTokenInvalid
            | AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_)
            | AppError::BadRequest(_)
            | AppError::MalformedBody(_)
            | AppError::UnsupportedGrantType(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalError(_) | AppError::DatabaseError(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Unauthorized(_) => ErrorCode::AuthorizationError,
            AppError::AccessTokenExpired => ErrorCode::AccessTokenExpired,
            AppError::RefreshTokenInvalid => ErrorCode::RefreshTokenInvalid,
            AppError::AuthError(_) => ErrorCode::AuthenticationError,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::ValidationError(_) | AppError::BadRequest(_) => ErrorCode::InvalidRequest,
            AppError::MalformedBody(_) => ErrorCode::MalformedBody,
            AppError::UnsupportedGrantType(_) => ErrorCode::UnsupportedGrantType,
            AppError::NotFound(_) => ErrorCode::ResourceNotFound,
            AppError::InternalError(_) => ErrorCode::InternalError,
            AppError::DatabaseError(_) => ErrorCode::DatabaseError,
            AppError::ConfigError(_) => ErrorCode::ConfigurationError,
        }
    }

    /// Text sent to the client. Server-side causes stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Unauthorized(_) => "Missing or invalid access token".to_string(),
            AppError::AccessTokenExpired => {
                "Access token expired, use the refresh endpoint to renew it".to_string()
            }
            AppError::RefreshTokenInvalid => "Session expired, please log in again".to_string(),
            AppError::AuthError(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::ValidationError(err) => format!("Validation error: {}", err),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::MalformedBody(msg) => msg.clone(),
            AppError::UnsupportedGrantType(grant) => {
                format!("Unsupported grant_type: {}", grant)
            }
            AppError::NotFound(msg) => msg.clone(),
            AppError::InternalError(_) => "Internal server error".to_string(),
            AppError::DatabaseError(_) => "Database error".to_string(),
            AppError::ConfigError(_) => "Configuration error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::InternalError(err) => {
                tracing::error!(error = ?err, "Internal error");
            }
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "Database error");
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
            }
            AppError::Unauthorized(err) => {
                tracing::debug!(error = %err, "Rejected access token");
            }
            _ => {}
        }

        (
            status,
            Json(ErrorResponse {
                error_code: self.error_code(),
                message: self.public_message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(err: AppError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_expired_token_is_distinguishable() {
        let (status, body) = body_of(AppError::AccessTokenExpired).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error_code, ErrorCode::AccessTokenExpired);

        let (status, body) =
            body_of(AppError::Unauthorized(anyhow::anyhow!("bad signature"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error_code, ErrorCode::AuthorizationError);
        assert!(!body.message.contains("signature"));
    }

    #[tokio::test]
    async fn test_database_error_does_not_leak_driver_message() {
        let (status, body) = body_of(AppError::DatabaseError(anyhow::anyhow!(
            "relation \"accounts\" does not exist"
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error_code, ErrorCode::DatabaseError);
        assert_eq!(body.message, "Database error");
    }

    #[test]
    fn test_error_code_wire_names() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::RefreshTokenInvalid).unwrap(),
            "\"refresh_token_invalid\""
        );
        assert_eq!(ErrorCode::UnsupportedGrantType.as_str(), "unsupported_grant_type");
        assert_eq!(
            AppError::Forbidden("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
