use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Page, UserStore};
use crate::error::DatabaseError;
use crate::user::{NewUser, ProfileChanges, User};

/// In-memory user store for tests and local runs.
///
/// The lock is only held for the synchronous body of each call, which keeps
/// every operation (including the conditional ones) atomic.
#[derive(Clone, Debug, Default)]
pub struct InMemoryUserStore {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<Uuid, User>>, DatabaseError> {
        self.users
            .lock()
            .map_err(|_| DatabaseError::UnexpectedError("user store lock poisoned".to_string()))
    }

    fn update<F>(&self, id: Uuid, apply: F) -> Result<bool, DatabaseError>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users()?;
        match users.get_mut(&id) {
            Some(user) => {
                apply(user);
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self
            .users()?
            .values()
            .find(|u| u.matches_identifier(identifier))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.users()?.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.users()?.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.users()?.values().find(|u| u.username == username).cloned())
    }

    async fn list(&self, page: u32, limit: u32) -> Result<Page<User>, DatabaseError> {
        let users = self.users()?;
        let mut all: Vec<&User> = users.values().collect();
        all.sort_by_key(|u| u.created_at);

        let offset = (page.max(1) as usize - 1) * limit as usize;
        let docs = all
            .iter()
            .skip(offset)
            .take(limit as usize)
            .map(|u| (*u).clone())
            .collect();

        Ok(Page::new(docs, all.len() as u64, page, limit))
    }

    async fn exists_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, DatabaseError> {
        Ok(self
            .users()?
            .values()
            .any(|u| u.username == username || u.email == email))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        let mut users = self.users()?;
        if users
            .values()
            .any(|u| u.username == new_user.username || u.email == new_user.email)
        {
            return Err(DatabaseError::UniqueConstraintViolation(
                "User with this email or username already exists".to_string(),
            ));
        }

        let user = User::new(new_user);
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, DatabaseError> {
        let mut users = self.users()?;

        if let Some(username) = &changes.username {
            if users.values().any(|u| u.id != id && &u.username == username) {
                return Err(DatabaseError::UniqueConstraintViolation(
                    "This username is already taken".to_string(),
                ));
            }
        }

        let user = match users.get_mut(&id) {
            Some(user) => user,
            None => return Ok(None),
        };

        if let Some(full_name) = &changes.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(mobile_number) = &changes.mobile_number {
            if user.mobile_number.as_ref() != Some(mobile_number) {
                user.mobile_number = Some(mobile_number.clone());
                user.is_mobile_verified = false;
                user.mobile_otp = None;
                user.mobile_otp_expires = None;
            }
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.users()?.remove(&id).is_some())
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        self.update(id, |user| user.refresh_token = token.map(str::to_string))
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
    ) -> Result<bool, DatabaseError> {
        let mut users = self.users()?;
        match users.get_mut(&id) {
            Some(user) if user.refresh_token.as_deref() == Some(expected) => {
                user.refresh_token = Some(new_token.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, DatabaseError> {
        self.update(id, |user| user.password_hash = password_hash.to_string())
    }

    async fn set_password_reset(
        &self,
        id: Uuid,
        token_hash: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, DatabaseError> {
        self.update(id, |user| {
            user.password_reset_token = token_hash.map(str::to_string);
            user.password_reset_expires = expires_at;
        })
    }

    async fn consume_password_reset(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DatabaseError> {
        let mut users = self.users()?;
        let user = users.values_mut().find(|u| {
            u.password_reset_token.as_deref() == Some(token_hash)
                && u.password_reset_expires.map_or(false, |exp| exp > now)
        });

        Ok(user.map(|user| {
            user.password_hash = new_password_hash.to_string();
            user.password_reset_token = None;
            user.password_reset_expires = None;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn set_mobile_otp(
        &self,
        id: Uuid,
        mobile_number: &str,
        otp_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        self.update(id, |user| {
            user.mobile_number = Some(mobile_number.to_string());
            user.mobile_otp = Some(otp_hash.to_string());
            user.mobile_otp_expires = Some(expires_at);
            user.mobile_otp_attempts = 0;
            user.is_mobile_verified = false;
        })
    }

    async fn mark_mobile_verified(&self, id: Uuid, otp_hash: &str) -> Result<bool, DatabaseError> {
        let mut users = self.users()?;
        match users.get_mut(&id) {
            Some(user) if user.mobile_otp.as_deref() == Some(otp_hash) => {
                user.is_mobile_verified = true;
                user.mobile_otp = None;
                user.mobile_otp_expires = None;
                user.mobile_otp_attempts = 0;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_failed_otp(
        &self,
        id: Uuid,
        otp_hash: &str,
        max_attempts: i32,
    ) -> Result<bool, DatabaseError> {
        let mut users = self.users()?;
        match users.get_mut(&id) {
            Some(user) if user.mobile_otp.as_deref() == Some(otp_hash) => {
                user.mobile_otp_attempts += 1;
                let exhausted = user.mobile_otp_attempts >= max_attempts;
                if exhausted {
                    user.mobile_otp = None;
                    user.mobile_otp_expires = None;
                }
                user.updated_at = Utc::now();
                Ok(exhausted)
            }
            _ => Ok(false),
        }
    }
}
