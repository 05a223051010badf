/// Credential & Token Manager
///
/// Owns credential verification and the lifecycle of the three token kinds:
/// - access tokens: stateless, verified per request
/// - refresh tokens: one stored value per user, rotated on every use
/// - password reset tokens: stored as a digest, single use, short lived

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::jwt::{
    generate_access_token, generate_refresh_token, validate_access_token, validate_refresh_token,
};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::reset_token::{generate_reset_token, hash_token};
use crate::configuration::{AuthSettings, JwtSettings};
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::UserStore;
use crate::user::User;
use crate::validators::is_valid_password;

/// A freshly issued access/refresh pair
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of authenticating an access token: its claims plus the live user
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: Claims,
    pub user: User,
}

#[derive(Clone)]
pub struct CredentialManager {
    pub(super) store: Arc<dyn UserStore>,
    pub(super) jwt: JwtSettings,
    pub(super) settings: AuthSettings,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn UserStore>, jwt: JwtSettings, settings: AuthSettings) -> Self {
        Self {
            store,
            jwt,
            settings,
        }
    }

    /// Loads a user by id.
    ///
    /// # Errors
    /// `AuthError::NotFound` if no such user exists
    pub async fn find_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound.into())
    }

    /// Checks a password against the user named by `identifier` (email or
    /// username). Has no side effects.
    ///
    /// # Errors
    /// - `AuthError::NotFound` if no user has that email or username
    /// - `AuthError::InvalidCredentials` if the password does not match
    pub async fn verify_credentials(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<User, AppError> {
        self.verify_any_credentials(&[identifier], password).await
    }

    /// Like [`verify_credentials`](Self::verify_credentials), but the user is
    /// the first one matched by any of `identifiers`. Blank identifiers are
    /// skipped.
    ///
    /// # Errors
    /// - `ValidationError::EmptyField` if every identifier is blank
    /// - `AuthError::NotFound` if none of them names a user
    /// - `AuthError::InvalidCredentials` if the password does not match
    pub async fn verify_any_credentials(
        &self,
        identifiers: &[&str],
        password: &str,
    ) -> Result<User, AppError> {
        let identifiers: Vec<String> = identifiers
            .iter()
            .map(|id| id.trim().to_lowercase())
            .filter(|id| !id.is_empty())
            .collect();
        if identifiers.is_empty() {
            return Err(ValidationError::EmptyField("username or email".to_string()).into());
        }

        let mut found = None;
        for identifier in &identifiers {
            if let Some(user) = self.store.find_by_identifier(identifier).await? {
                found = Some(user);
                break;
            }
        }
        let user = found.ok_or(AuthError::NotFound)?;

        if !verify_password(password, &user.password_hash).await? {
            tracing::warn!(user_id = %user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(user)
    }

    /// Verifies credentials and issues a token pair.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<(User, TokenPair), AppError> {
        self.login_any(&[identifier], password).await
    }

    /// Logs in the first user matched by any of `identifiers`.
    pub async fn login_any(
        &self,
        identifiers: &[&str],
        password: &str,
    ) -> Result<(User, TokenPair), AppError> {
        let user = self.verify_any_credentials(identifiers, password).await?;
        let tokens = self.issue_token_pair(user.id).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok((user, tokens))
    }

    /// Issues a new access/refresh pair and stores the refresh token over any
    /// previous one, which invalidates every earlier refresh token.
    ///
    /// # Errors
    /// - `AuthError::NotFound` if the user does not exist
    /// - `AuthError::TokenGeneration` if signing or persisting fails; no
    ///   token is handed out in that case
    pub async fn issue_token_pair(&self, user_id: Uuid) -> Result<TokenPair, AppError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))?
            .ok_or(AuthError::NotFound)?;

        let tokens = self.mint_pair(&user)?;

        let stored = self
            .store
            .set_refresh_token(user.id, Some(&tokens.refresh_token))
            .await
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;
        if !stored {
            return Err(AuthError::NotFound.into());
        }

        tracing::debug!(user_id = %user.id, "Token pair issued");
        Ok(tokens)
    }

    /// Rotates a refresh token into a brand new pair.
    ///
    /// The stored token is replaced only if it still equals the presented
    /// one, in a single conditional write, so two concurrent refreshes with
    /// the same token cannot both succeed.
    ///
    /// # Errors
    /// - `AuthError::MissingToken` if no token was presented
    /// - `AuthError::InvalidToken` if the signature, issuer or expiry is bad
    /// - `AuthError::NotFound` if the token's user no longer exists
    /// - `AuthError::TokenReuse` if the token is not the current one
    pub async fn refresh_token_pair(&self, presented: Option<&str>) -> Result<TokenPair, AppError> {
        let presented = non_empty(presented).ok_or(AuthError::MissingToken)?;

        let claims = validate_refresh_token(presented, &self.jwt)?;
        let user = self
            .store
            .find_by_id(claims.user_id()?)
            .await?
            .ok_or(AuthError::NotFound)?;

        if user.refresh_token.as_deref() != Some(presented) {
            tracing::warn!(user_id = %user.id, "Stale or foreign refresh token presented");
            return Err(AuthError::TokenReuse.into());
        }

        let tokens = self.mint_pair(&user)?;

        let swapped = self
            .store
            .swap_refresh_token(user.id, presented, &tokens.refresh_token)
            .await
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;
        if !swapped {
            tracing::warn!(user_id = %user.id, "Lost refresh rotation race");
            return Err(AuthError::TokenReuse.into());
        }

        tracing::info!(user_id = %user.id, "Token pair rotated");
        Ok(tokens)
    }

    /// Clears the stored refresh token so no outstanding one can be used.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        if !self.store.set_refresh_token(user_id, None).await? {
            return Err(AuthError::NotFound.into());
        }

        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Verifies an access token and confirms its user still exists.
    ///
    /// # Errors
    /// - `AuthError::MissingToken` if no token was presented
    /// - `AuthError::InvalidToken` on bad signature, issuer or expiry
    /// - `AuthError::UserNotFound` if the user was deleted since issuance
    pub async fn authenticate(&self, token: Option<&str>) -> Result<AuthenticatedUser, AppError> {
        let token = non_empty(token).ok_or(AuthError::MissingToken)?;

        let claims = validate_access_token(token, &self.jwt)?;
        let user = self
            .store
            .find_by_id(claims.user_id()?)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(AuthenticatedUser { claims, user })
    }

    /// Same checks as [`authenticate`](Self::authenticate), returning only
    /// the claims.
    pub async fn verify_access_token(&self, token: Option<&str>) -> Result<Claims, AppError> {
        self.authenticate(token).await.map(|auth| auth.claims)
    }

    /// Starts a password reset: stores the digest of a new random token with
    /// a short expiry and returns the plaintext for delivery. Any earlier
    /// reset token of this user is superseded.
    pub async fn create_password_reset_token(&self, user: &User) -> Result<String, AppError> {
        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::seconds(self.settings.password_reset_expiry);

        if !self
            .store
            .set_password_reset(user.id, Some(&hash_token(&token)), Some(expires_at))
            .await?
        {
            return Err(AuthError::NotFound.into());
        }

        tracing::info!(user_id = %user.id, expires_at = %expires_at, "Password reset token issued");
        Ok(token)
    }

    /// Withdraws an outstanding reset token, e.g. when it could not be
    /// delivered.
    pub async fn clear_password_reset_token(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store.set_password_reset(user_id, None, None).await?;
        Ok(())
    }

    /// Consumes a reset token and sets a new password.
    ///
    /// # Errors
    /// `AuthError::InvalidOrExpiredToken` if no user holds this token or it
    /// has expired; a consumed token can never be used again
    pub async fn consume_reset_token(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<User, AppError> {
        is_valid_password(new_password)?;
        let token = non_empty(Some(token)).ok_or(AuthError::InvalidOrExpiredToken)?;

        let password_hash = hash_password(new_password, self.settings.bcrypt_cost).await?;
        let user = self
            .store
            .consume_password_reset(&hash_token(token), &password_hash, Utc::now())
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(user)
    }

    fn mint_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: generate_access_token(user, &self.jwt)?,
            refresh_token: generate_refresh_token(user.id, &self.jwt)?,
        })
    }
}

fn non_empty(token: Option<&str>) -> Option<&str> {
    token.map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::account::Registration;
    use crate::store::InMemoryUserStore;

    pub(crate) fn test_manager() -> (CredentialManager, Arc<InMemoryUserStore>) {
        let store = Arc::new(InMemoryUserStore::new());
        let jwt = JwtSettings {
            access_token_secret: "test-access-secret-0123456789abcdef".to_string(),
            access_token_expiry: 900,
            refresh_token_secret: "test-refresh-secret-0123456789abcdef".to_string(),
            refresh_token_expiry: 864000,
            issuer: "bolify-test".to_string(),
        };
        let settings = AuthSettings {
            bcrypt_cost: 4,
            ..AuthSettings::default()
        };
        (CredentialManager::new(store.clone(), jwt, settings), store)
    }

    pub(crate) async fn register_alice(manager: &CredentialManager) -> User {
        manager
            .register(Registration {
                username: "alice".to_string(),
                email: "alice@x.com".to_string(),
                full_name: "Alice".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .expect("Failed to register alice")
    }

    fn auth_kind(result: Result<impl std::fmt::Debug, AppError>) -> AuthError {
        match result {
            Err(AppError::Auth(kind)) => kind,
            other => panic!("Expected an auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn verify_credentials_accepts_username_and_email() {
        let (manager, _) = test_manager();
        let alice = register_alice(&manager).await;

        let by_username = manager.verify_credentials("alice", "secret123").await.unwrap();
        let by_email = manager.verify_credentials("Alice@X.com", "secret123").await.unwrap();

        assert_eq!(by_username.id, alice.id);
        assert_eq!(by_email.id, alice.id);
    }

    #[tokio::test]
    async fn verify_credentials_rejects_wrong_password() {
        let (manager, _) = test_manager();
        register_alice(&manager).await;

        let result = manager.verify_credentials("alice", "secret124").await;
        assert_eq!(auth_kind(result), AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn verify_credentials_reports_unknown_user() {
        let (manager, _) = test_manager();

        let result = manager.verify_credentials("nobody", "secret123").await;
        assert_eq!(auth_kind(result), AuthError::NotFound);
    }

    #[tokio::test]
    async fn verify_any_credentials_falls_through_blank_and_unknown() {
        let (manager, _) = test_manager();
        let alice = register_alice(&manager).await;

        let blank_username = manager
            .verify_any_credentials(&["", "alice@x.com"], "secret123")
            .await
            .unwrap();
        let wrong_username = manager
            .verify_any_credentials(&["nobody", "alice@x.com"], "secret123")
            .await
            .unwrap();

        assert_eq!(blank_username.id, alice.id);
        assert_eq!(wrong_username.id, alice.id);
        assert!(matches!(
            manager.verify_any_credentials(&["  ", ""], "secret123").await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(
            auth_kind(manager.verify_any_credentials(&["alice", "alice@x.com"], "nope").await),
            AuthError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn issue_token_pair_persists_refresh_token() {
        let (manager, store) = test_manager();
        let alice = register_alice(&manager).await;

        let tokens = manager.issue_token_pair(alice.id).await.unwrap();

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(tokens.refresh_token.as_str()));
    }

    #[tokio::test]
    async fn issue_token_pair_for_unknown_user_fails() {
        let (manager, _) = test_manager();

        let result = manager.issue_token_pair(Uuid::new_v4()).await;
        assert_eq!(auth_kind(result), AuthError::NotFound);
    }

    #[tokio::test]
    async fn refresh_rotates_to_a_different_token() {
        let (manager, _) = test_manager();
        let alice = register_alice(&manager).await;
        let first = manager.issue_token_pair(alice.id).await.unwrap();

        let second = manager
            .refresh_token_pair(Some(&first.refresh_token))
            .await
            .unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn rotated_refresh_token_cannot_be_reused() {
        let (manager, _) = test_manager();
        let alice = register_alice(&manager).await;
        let first = manager.issue_token_pair(alice.id).await.unwrap();
        manager.refresh_token_pair(Some(&first.refresh_token)).await.unwrap();

        let reused = manager.refresh_token_pair(Some(&first.refresh_token)).await;
        assert_eq!(auth_kind(reused), AuthError::TokenReuse);
    }

    #[tokio::test]
    async fn new_login_invalidates_previous_refresh_token() {
        let (manager, _) = test_manager();
        register_alice(&manager).await;
        let (_, first) = manager.login("alice", "secret123").await.unwrap();
        let (_, second) = manager.login("alice", "secret123").await.unwrap();

        let stale = manager.refresh_token_pair(Some(&first.refresh_token)).await;
        assert_eq!(auth_kind(stale), AuthError::TokenReuse);
        assert!(manager.refresh_token_pair(Some(&second.refresh_token)).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_rejects_missing_and_forged_tokens() {
        let (manager, _) = test_manager();

        assert_eq!(auth_kind(manager.refresh_token_pair(None).await), AuthError::MissingToken);
        assert_eq!(auth_kind(manager.refresh_token_pair(Some("  ")).await), AuthError::MissingToken);
        assert_eq!(
            auth_kind(manager.refresh_token_pair(Some("not.a.jwt")).await),
            AuthError::InvalidToken
        );
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let (manager, _) = test_manager();
        let alice = register_alice(&manager).await;
        let tokens = manager.issue_token_pair(alice.id).await.unwrap();

        let result = manager.refresh_token_pair(Some(&tokens.access_token)).await;
        assert_eq!(auth_kind(result), AuthError::InvalidToken);
    }

    #[tokio::test]
    async fn concurrent_refreshes_with_same_token_have_one_winner() {
        let (manager, _) = test_manager();
        let alice = register_alice(&manager).await;
        let tokens = manager.issue_token_pair(alice.id).await.unwrap();

        let (a, b) = tokio::join!(
            manager.refresh_token_pair(Some(&tokens.refresh_token)),
            manager.refresh_token_pair(Some(&tokens.refresh_token)),
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    }

    #[tokio::test]
    async fn logout_invalidates_refresh_token() {
        let (manager, _) = test_manager();
        let alice = register_alice(&manager).await;
        let tokens = manager.issue_token_pair(alice.id).await.unwrap();

        manager.logout(alice.id).await.unwrap();

        let result = manager.refresh_token_pair(Some(&tokens.refresh_token)).await;
        assert_eq!(auth_kind(result), AuthError::TokenReuse);
    }

    #[tokio::test]
    async fn verify_access_token_distinguishes_failures() {
        let (manager, _) = test_manager();
        let alice = register_alice(&manager).await;
        let tokens = manager.issue_token_pair(alice.id).await.unwrap();

        let claims = manager.verify_access_token(Some(&tokens.access_token)).await.unwrap();
        assert_eq!(claims.username, "alice");

        assert_eq!(auth_kind(manager.verify_access_token(None).await), AuthError::MissingToken);
        assert_eq!(
            auth_kind(manager.verify_access_token(Some("garbage")).await),
            AuthError::InvalidToken
        );

        // Same signing keys, but the store no longer knows the user
        let other = CredentialManager::new(
            Arc::new(InMemoryUserStore::new()),
            manager.jwt.clone(),
            manager.settings.clone(),
        );
        assert_eq!(
            auth_kind(other.verify_access_token(Some(&tokens.access_token)).await),
            AuthError::UserNotFound
        );
    }

    #[tokio::test]
    async fn reset_token_changes_password() {
        let (manager, _) = test_manager();
        let alice = register_alice(&manager).await;

        let token = manager.create_password_reset_token(&alice).await.unwrap();
        manager.consume_reset_token(&token, "newpass").await.unwrap();

        assert!(manager.verify_credentials("alice", "newpass").await.is_ok());
        assert_eq!(
            auth_kind(manager.verify_credentials("alice", "secret123").await),
            AuthError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let (manager, _) = test_manager();
        let alice = register_alice(&manager).await;
        let token = manager.create_password_reset_token(&alice).await.unwrap();

        manager.consume_reset_token(&token, "newpass").await.unwrap();
        let second = manager.consume_reset_token(&token, "another").await;

        assert_eq!(auth_kind(second), AuthError::InvalidOrExpiredToken);
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let (manager, store) = test_manager();
        let alice = register_alice(&manager).await;
        let token = manager.create_password_reset_token(&alice).await.unwrap();

        // Age the stored token past its ten minute window
        let expired = Utc::now() - Duration::minutes(11);
        store
            .set_password_reset(alice.id, Some(&hash_token(&token)), Some(expired))
            .await
            .unwrap();

        let result = manager.consume_reset_token(&token, "newpass").await;
        assert_eq!(auth_kind(result), AuthError::InvalidOrExpiredToken);
        assert!(manager.verify_credentials("alice", "secret123").await.is_ok());
    }

    #[tokio::test]
    async fn reset_token_expires_ten_minutes_after_issue() {
        let (manager, store) = test_manager();
        let alice = register_alice(&manager).await;
        let before = Utc::now();

        manager.create_password_reset_token(&alice).await.unwrap();

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        let expires = stored.password_reset_expires.unwrap();
        assert!(expires >= before + Duration::minutes(10));
        assert!(expires <= Utc::now() + Duration::minutes(10));
    }

    #[tokio::test]
    async fn new_reset_token_supersedes_previous() {
        let (manager, _) = test_manager();
        let alice = register_alice(&manager).await;

        let first = manager.create_password_reset_token(&alice).await.unwrap();
        let second = manager.create_password_reset_token(&alice).await.unwrap();

        assert_eq!(
            auth_kind(manager.consume_reset_token(&first, "newpass").await),
            AuthError::InvalidOrExpiredToken
        );
        assert!(manager.consume_reset_token(&second, "newpass").await.is_ok());
    }

    #[tokio::test]
    async fn stored_reset_token_is_a_digest() {
        let (manager, store) = test_manager();
        let alice = register_alice(&manager).await;

        let token = manager.create_password_reset_token(&alice).await.unwrap();

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.password_reset_token, Some(hash_token(&token)));
        assert_ne!(stored.password_reset_token.as_deref(), Some(token.as_str()));
    }
}
