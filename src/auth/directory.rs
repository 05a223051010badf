/// Read-mostly user lookups: public author profiles, paginated listings and
/// administrative removal.

use uuid::Uuid;

use crate::auth::manager::CredentialManager;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::Page;
use crate::user::User;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

impl CredentialManager {
    /// Looks up a user by username, case-insensitively.
    ///
    /// # Errors
    /// - `ValidationError::EmptyField` for a blank username
    /// - `AuthError::NotFound` if nobody has that username
    pub async fn find_by_username(&self, username: &str) -> Result<User, AppError> {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Err(ValidationError::EmptyField("username".to_string()).into());
        }

        self.store
            .find_by_username(&username)
            .await?
            .ok_or_else(|| AuthError::NotFound.into())
    }

    /// One page of users in creation order. Missing or zero values fall back
    /// to page 1 and the default size; the size is capped.
    pub async fn list_users(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Page<User>, AppError> {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);

        Ok(self.store.list(page, limit).await?)
    }

    /// Removes a user outright.
    ///
    /// # Errors
    /// `AuthError::NotFound` if the user does not exist
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AppError> {
        if !self.store.delete(user_id).await? {
            return Err(AuthError::NotFound.into());
        }

        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }
}
