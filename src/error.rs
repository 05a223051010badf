/// Application Error Handling
///
/// One error type per concern, all funnelled into [`AppError`]:
/// 1. Domain error types (validation, database, email, config, auth)
/// 2. The unified `AppError` used for control flow
/// 3. HTTP response mapping with structured logging

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

// ============================================================================
// 1. DOMAIN-SPECIFIC ERROR TYPES
// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(String),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(String, usize),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(String, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(String),
    #[error("{0} contains suspicious content")]
    SuspiciousContent(String),
    #[error("input contains potentially dangerous SQL patterns")]
    PossibleSQLInjection,
}

/// Datastore errors. This is the persistence failure family of the
/// credential manager.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Duplicate entry: {0}")]
    UniqueConstraintViolation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Query error: {0}")]
    QueryExecution(String),
    #[error("Database connection error: {0}")]
    ConnectionPool(String),
    #[error("Database error: {0}")]
    UnexpectedError(String),
}

/// Email service errors
#[derive(Debug, Clone, Error)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("Email service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required config: {0}")]
    MissingRequired(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

/// Authentication and token lifecycle errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No user matches the identifier or id.
    #[error("User does not exist")]
    NotFound,
    #[error("Invalid user credentials")]
    InvalidCredentials,
    #[error("Missing authentication token")]
    MissingToken,
    /// Bad signature, wrong issuer or expired.
    #[error("Invalid or expired token")]
    InvalidToken,
    /// The presented refresh token is not the one currently stored.
    #[error("Refresh token is expired or used")]
    TokenReuse,
    #[error("Token is invalid or has expired")]
    InvalidOrExpiredToken,
    #[error("Something went wrong while generating tokens: {0}")]
    TokenGeneration(String),
    /// A valid access token whose user has since been deleted.
    #[error("Invalid access token: user no longer exists")]
    UserNotFound,
    #[error("Invalid external identity token: {0}")]
    InvalidExternalToken(String),
    #[error("OTP has expired or is invalid. Please request a new one")]
    OtpExpired,
    #[error("Invalid OTP")]
    InvalidOtp,
    /// Authenticated, but the role does not allow this.
    #[error("Forbidden: You do not have administrative privileges")]
    Forbidden,
}

// ============================================================================
// 2. UNIFIED APPLICATION ERROR TYPE
// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the auth error kind, if this is one.
    pub fn auth_kind(&self) -> Option<&AuthError> {
        match self {
            AppError::Auth(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
                DatabaseError::UniqueConstraintViolation(
                    "User with this email or username already exists".to_string(),
                )
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionPool(err.to_string())
            }
            sqlx::Error::Database(_) => DatabaseError::QueryExecution(err.to_string()),
            _ => DatabaseError::UnexpectedError(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.into())
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID, also present in the server log line
    pub error_id: String,
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

fn auth_status(e: &AuthError) -> (StatusCode, &'static str) {
    match e {
        AuthError::NotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
        AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "MISSING_TOKEN"),
        AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "TOKEN_INVALID"),
        AuthError::TokenReuse => (StatusCode::UNAUTHORIZED, "TOKEN_REUSED"),
        AuthError::InvalidOrExpiredToken => (StatusCode::BAD_REQUEST, "RESET_TOKEN_INVALID"),
        AuthError::TokenGeneration(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "TOKEN_GENERATION_ERROR")
        }
        AuthError::UserNotFound => (StatusCode::UNAUTHORIZED, "TOKEN_USER_NOT_FOUND"),
        AuthError::InvalidExternalToken(_) => (StatusCode::UNAUTHORIZED, "EXTERNAL_TOKEN_INVALID"),
        AuthError::OtpExpired => (StatusCode::BAD_REQUEST, "OTP_EXPIRED"),
        AuthError::InvalidOtp => (StatusCode::UNAUTHORIZED, "OTP_INVALID"),
        AuthError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),

            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => {
                    (StatusCode::CONFLICT, "DUPLICATE_ENTRY", e.to_string())
                }
                DatabaseError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
                DatabaseError::ConnectionPool(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service temporarily unavailable".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                ),
            },

            AppError::Email(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "EMAIL_SERVICE_ERROR",
                "There was an error sending the email. Please try again later.".to_string(),
            ),

            AppError::Auth(e) => {
                let (status, code) = auth_status(e);
                // Server-side failures never leak their detail
                let message = if status.is_server_error() {
                    "Something went wrong while generating tokens".to_string()
                } else {
                    e.to_string()
                };
                (status, code, message)
            }

            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Server configuration error".to_string(),
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        let error_response = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Email(e) => {
                tracing::error!(request_id = request_id, error = %e, "Email service error");
            }
            AppError::Auth(e @ AuthError::TokenGeneration(_)) => {
                tracing::error!(request_id = request_id, error = %e, "Token generation failed");
            }
            AppError::Auth(e @ AuthError::TokenReuse) => {
                tracing::warn!(
                    request_id = request_id,
                    error = %e,
                    "Rotated-out refresh token presented"
                );
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        <Self as ErrorHandler>::error_response(self, "").0
    }
}
