/// Account operations built on the credential manager: registration,
/// profile edits, password change, mobile OTP verification and federated
/// login.

use chrono::{Duration, Utc};
use rand::{thread_rng, Rng};
use uuid::Uuid;

use crate::auth::identity::ExternalIdentity;
use crate::auth::manager::{CredentialManager, TokenPair};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::reset_token::{generate_otp, generate_reset_token};
use crate::error::{AppError, AuthError, DatabaseError, ValidationError};
use crate::user::{NewUser, ProfileChanges, Role, User};
use crate::validators::{
    is_valid_email, is_valid_mobile_number, is_valid_name, is_valid_password, is_valid_username,
};

const USERNAME_ATTEMPTS: usize = 5;
const MAX_USERNAME_STEM: usize = 26;

/// Registration input, before validation
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

impl CredentialManager {
    /// Validates and creates a new account.
    ///
    /// # Errors
    /// - `ValidationError` for malformed input
    /// - `DatabaseError::UniqueConstraintViolation` if the username or email
    ///   is taken
    pub async fn register(&self, registration: Registration) -> Result<User, AppError> {
        let username = is_valid_username(&registration.username)?;
        let email = is_valid_email(&registration.email)?;
        let full_name = is_valid_name(&registration.full_name)?;
        is_valid_password(&registration.password)?;

        if self
            .store
            .exists_by_username_or_email(&username, &email)
            .await?
        {
            return Err(DatabaseError::UniqueConstraintViolation(
                "User with email or username already exists".to_string(),
            )
            .into());
        }

        let password_hash = hash_password(&registration.password, self.settings.bcrypt_cost).await?;
        let user = self
            .store
            .create(NewUser {
                username,
                email,
                full_name,
                password_hash,
                avatar: None,
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Edits the caller's own full name, username or mobile number.
    ///
    /// # Errors
    /// - `ValidationError::EmptyField` if no field is given, or any given
    ///   field is malformed
    /// - `DatabaseError::UniqueConstraintViolation` if another user holds the
    ///   username
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> Result<User, AppError> {
        if changes.is_empty() {
            return Err(ValidationError::EmptyField(
                "fullName, username or mobileNumber".to_string(),
            )
            .into());
        }

        let changes = ProfileChanges {
            full_name: changes.full_name.as_deref().map(is_valid_name).transpose()?,
            username: changes.username.as_deref().map(is_valid_username).transpose()?,
            mobile_number: changes
                .mobile_number
                .as_deref()
                .map(is_valid_mobile_number)
                .transpose()?,
        };

        if let Some(username) = &changes.username {
            if let Some(holder) = self.store.find_by_username(username).await? {
                if holder.id != user_id {
                    return Err(DatabaseError::UniqueConstraintViolation(
                        "This username is already taken".to_string(),
                    )
                    .into());
                }
            }
        }

        let user = self
            .store
            .update_profile(user_id, &changes)
            .await?
            .ok_or(AuthError::NotFound)?;

        tracing::info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }

    /// Replaces the password after checking the current one.
    ///
    /// # Errors
    /// `AuthError::InvalidCredentials` if `old_password` does not match
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        is_valid_password(new_password)?;
        let user = self.find_user(user_id).await?;

        if !verify_password(old_password, &user.password_hash).await? {
            tracing::warn!(user_id = %user.id, "Password change with wrong current password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let password_hash = hash_password(new_password, self.settings.bcrypt_cost).await?;
        if !self.store.set_password(user.id, &password_hash).await? {
            return Err(AuthError::NotFound.into());
        }

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Stores a fresh OTP for `mobile_number` and returns the plaintext code
    /// for delivery. The number is marked unverified until the code is
    /// confirmed.
    pub async fn create_mobile_otp(
        &self,
        user_id: Uuid,
        mobile_number: &str,
    ) -> Result<String, AppError> {
        let mobile_number = is_valid_mobile_number(mobile_number)?;

        let otp = generate_otp();
        let otp_hash = hash_password(&otp, self.settings.bcrypt_cost).await?;
        let expires_at = Utc::now() + Duration::seconds(self.settings.otp_expiry);

        if !self
            .store
            .set_mobile_otp(user_id, &mobile_number, &otp_hash, expires_at)
            .await?
        {
            return Err(AuthError::NotFound.into());
        }

        tracing::info!(user_id = %user_id, "Mobile OTP issued");
        Ok(otp)
    }

    /// Confirms the pending mobile OTP. A confirmed code is cleared, so it
    /// works only once. Wrong guesses are counted and the code is discarded
    /// after `max_otp_attempts` of them.
    ///
    /// # Errors
    /// - `AuthError::OtpExpired` if no code is pending, it has expired, or it
    ///   was consumed or replaced while this check ran
    /// - `AuthError::InvalidOtp` if the code does not match
    pub async fn verify_mobile_otp(&self, user_id: Uuid, otp: &str) -> Result<User, AppError> {
        let user = self.find_user(user_id).await?;

        let otp_hash = match (&user.mobile_otp, user.mobile_otp_expires) {
            (Some(hash), Some(expires)) if expires > Utc::now() => hash,
            _ => return Err(AuthError::OtpExpired.into()),
        };

        if !verify_password(otp.trim(), otp_hash).await? {
            let discarded = self
                .store
                .record_failed_otp(user.id, otp_hash, self.settings.max_otp_attempts)
                .await?;
            tracing::warn!(user_id = %user.id, discarded, "Wrong mobile OTP");
            return Err(AuthError::InvalidOtp.into());
        }

        if !self.store.mark_mobile_verified(user.id, otp_hash).await? {
            tracing::warn!(user_id = %user.id, "Mobile OTP consumed concurrently");
            return Err(AuthError::OtpExpired.into());
        }

        tracing::info!(user_id = %user.id, "Mobile number verified");
        self.find_user(user.id).await
    }

    /// Finds or creates the local user for a verified external identity and
    /// logs them in. One local user exists per email.
    pub async fn login_with_external_identity(
        &self,
        identity: ExternalIdentity,
    ) -> Result<(User, TokenPair), AppError> {
        let email = is_valid_email(&identity.email)?;

        let user = match self.store.find_by_email(&email).await? {
            Some(user) => user,
            None => self.create_federated_user(&email, &identity).await?,
        };

        let tokens = self.issue_token_pair(user.id).await?;
        tracing::info!(user_id = %user.id, "User logged in with external identity");
        Ok((user, tokens))
    }

    async fn create_federated_user(
        &self,
        email: &str,
        identity: &ExternalIdentity,
    ) -> Result<User, AppError> {
        let stem = username_stem(email);
        let full_name = is_valid_name(&identity.name).unwrap_or_else(|_| stem.clone());
        // Nobody knows this password; the account is reachable through the
        // provider or a password reset
        let password_hash = hash_password(&generate_reset_token(), self.settings.bcrypt_cost).await?;

        for _ in 0..USERNAME_ATTEMPTS {
            let username = format!("{}{}", stem, thread_rng().gen_range(0..1000));
            let new_user = NewUser {
                username,
                email: email.to_string(),
                full_name: full_name.clone(),
                password_hash: password_hash.clone(),
                avatar: identity.picture.clone(),
                role: Role::User,
            };

            match self.store.create(new_user).await {
                Ok(user) => {
                    tracing::info!(user_id = %user.id, "User created from external identity");
                    return Ok(user);
                }
                Err(DatabaseError::UniqueConstraintViolation(_)) => {
                    // Either the username collided or a concurrent login
                    // created this email first
                    if let Some(user) = self.store.find_by_email(email).await? {
                        return Ok(user);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal(
            "Could not allocate a unique username".to_string(),
        ))
    }
}

/// Username prefix derived from an email's local part, restricted to the
/// username alphabet.
fn username_stem(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut stem: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_USERNAME_STEM)
        .collect();

    if stem.len() < 3 {
        stem.insert_str(0, "user");
    }
    stem
}
