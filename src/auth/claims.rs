/// JWT Claims structures
///
/// Access tokens carry enough identity for request handlers to work without
/// a user lookup; refresh tokens carry only the subject and a unique id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::user::User;

/// Claims of a short-lived access token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    pub username: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(user: &User, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user.id.to_string(),
            email: user.email.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// `AuthError::InvalidToken` if the subject is not a UUID
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        parse_subject(&self.sub)
    }

    pub fn is_expired(&self) -> bool {
        self.exp < chrono::Utc::now().timestamp()
    }
}

/// Claims of a long-lived refresh token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RefreshClaims {
    pub sub: String,
    /// Unique per issuance, so two tokens minted in the same second differ
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl RefreshClaims {
    pub fn new(user_id: Uuid, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        parse_subject(&self.sub)
    }
}

fn parse_subject(sub: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(sub).map_err(|_| AuthError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{NewUser, Role};

    fn user() -> User {
        User::new(NewUser {
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            full_name: "Alice Liddell".to_string(),
            password_hash: "hash".to_string(),
            avatar: None,
            role: Role::User,
        })
    }

    #[test]
    fn test_claims_creation() {
        let user = user();
        let claims = Claims::new(&user, 3600, "test".to_string());

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "alice@x.com");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.full_name, "Alice Liddell");
        assert_eq!(claims.iss, "test");
        assert!(!claims.is_expired());
        assert_eq!(claims.user_id().unwrap(), user.id);
    }

    #[test]
    fn test_full_name_serialises_camel_case() {
        let claims = Claims::new(&user(), 60, "test".to_string());
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["fullName"], "Alice Liddell");
    }

    #[test]
    fn test_invalid_user_id() {
        let mut claims = Claims::new(&user(), 3600, "test".to_string());
        claims.sub = "invalid-uuid".to_string();

        assert_eq!(claims.user_id(), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_refresh_claims_have_unique_ids() {
        let user_id = Uuid::new_v4();
        let first = RefreshClaims::new(user_id, 60, "test".to_string());
        let second = RefreshClaims::new(user_id, 60, "test".to_string());

        assert_ne!(first.jti, second.jti);
        assert_eq!(first.user_id().unwrap(), user_id);
    }
}
