mod memory;
mod postgres;

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::user::{NewUser, ProfileChanges, User};

/// One page of a listing, numbered from 1
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total_docs: u64,
    pub limit: u32,
    pub page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, total_docs: u64, page: u32, limit: u32) -> Self {
        let per_page = u64::from(limit.max(1));
        let total_pages = ((total_docs + per_page - 1) / per_page) as u32;
        Self {
            docs,
            total_docs,
            limit,
            page,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            docs: self.docs.into_iter().map(f).collect(),
            total_docs: self.total_docs,
            limit: self.limit,
            page: self.page,
            total_pages: self.total_pages,
        }
    }
}

/// User persistence, the datastore collaborator of the credential manager.
///
/// Every write that guards a token lifecycle is a single conditional
/// operation so that concurrent requests cannot both win.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds a user whose email or username equals `identifier`.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError>;

    /// Users ordered by creation time. `page` starts at 1.
    async fn list(&self, page: u32, limit: u32) -> Result<Page<User>, DatabaseError>;

    /// Whether any user already holds this username or this email.
    async fn exists_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, DatabaseError>;

    /// Inserts a user. Duplicate username or email yields
    /// `DatabaseError::UniqueConstraintViolation`.
    async fn create(&self, new_user: NewUser) -> Result<User, DatabaseError>;

    /// Applies the given profile fields. A changed mobile number drops its
    /// verification and any pending OTP. Returns `None` if the user does not
    /// exist; a taken username yields `UniqueConstraintViolation`.
    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, DatabaseError>;

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Overwrites (or clears) the stored refresh token. Returns `false` if
    /// the user does not exist.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>)
        -> Result<bool, DatabaseError>;

    /// Replaces the stored refresh token only if it still equals `expected`.
    /// Returns `false` when the stored value has moved on.
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
    ) -> Result<bool, DatabaseError>;

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, DatabaseError>;

    /// Sets or clears the reset token hash and its expiry together.
    async fn set_password_reset(
        &self,
        id: Uuid,
        token_hash: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, DatabaseError>;

    /// Atomically finds the user holding `token_hash` with an expiry after
    /// `now`, stores the new password hash and clears the reset fields.
    async fn consume_password_reset(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DatabaseError>;

    /// Records a pending OTP for `mobile_number`, resets the verified flag
    /// and the wrong-guess counter.
    async fn set_mobile_otp(
        &self,
        id: Uuid,
        mobile_number: &str,
        otp_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    /// Marks the mobile number verified and clears the OTP fields, only if
    /// the pending OTP hash still equals `otp_hash`.
    async fn mark_mobile_verified(&self, id: Uuid, otp_hash: &str)
        -> Result<bool, DatabaseError>;

    /// Counts a wrong guess against the pending OTP `otp_hash`, discarding
    /// the code once `max_attempts` is reached. Returns `true` if the code
    /// was discarded.
    async fn record_failed_otp(
        &self,
        id: Uuid,
        otp_hash: &str,
        max_attempts: i32,
    ) -> Result<bool, DatabaseError>;
}
