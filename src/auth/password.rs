/// Password and OTP Hashing
///
/// bcrypt is CPU-bound, so hashing and verification run on the blocking
/// thread pool rather than on the async executor.

use bcrypt::{hash, verify};

use crate::error::AppError;

/// Hash a secret (password or OTP) with bcrypt at the given cost
///
/// # Errors
/// Returns `AppError::Internal` if bcrypt fails or the task is cancelled
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a secret against its bcrypt hash
///
/// # Errors
/// Returns `AppError::Internal` if the stored hash is malformed
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}
