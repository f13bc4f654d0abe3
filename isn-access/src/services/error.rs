use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    /// Stored data that the access model cannot interpret (unknown role,
    /// account type or permission code).
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Account not found")]
    AccountNotFound,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid client credentials")]
    InvalidClientCredentials,

    #[error("Access token expired")]
    AccessTokenExpired,

    #[error("Invalid access token: {0}")]
    AccessTokenInvalid(String),

    #[error("Refresh token invalid")]
    RefreshTokenInvalid,
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(anyhow::Error::new(err))
    }
}

pub const INVALID_LOGIN_MESSAGE: &str = "Invalid email or password";
pub const INVALID_CLIENT_MESSAGE: &str = "Invalid client_id or client_secret";

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::DataIntegrity(msg) => {
                AppError::InternalError(anyhow::anyhow!("Data integrity error: {}", msg))
            }
            ServiceError::AccountNotFound | ServiceError::AccountDisabled => {
                AppError::AuthError("Account not found or disabled".to_string())
            }
            ServiceError::InvalidCredentials => AppError::AuthError(INVALID_LOGIN_MESSAGE.to_string()),
            ServiceError::InvalidClientCredentials => {
                AppError::AuthError(INVALID_CLIENT_MESSAGE.to_string())
            }
            ServiceError::AccessTokenExpired => AppError::AccessTokenExpired,
            ServiceError::AccessTokenInvalid(reason) => AppError::Unauthorized(anyhow::anyhow!(reason)),
            ServiceError::RefreshTokenInvalid => AppError::RefreshTokenInvalid,
        }
    }
}
