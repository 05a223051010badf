/// JWT Token Generation and Validation
///
/// Access and refresh tokens are both HS256 JWTs, signed with separate
/// secrets so that one can never be presented as the other.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::{Claims, RefreshClaims};
use crate::configuration::JwtSettings;
use crate::error::AuthError;
use crate::user::User;

/// Generate a new access token for a user
///
/// # Errors
/// `AuthError::TokenGeneration` if signing fails
pub fn generate_access_token(user: &User, config: &JwtSettings) -> Result<String, AuthError> {
    let claims = Claims::new(user, config.access_token_expiry, config.issuer.clone());
    sign(&claims, &config.access_token_secret)
}

/// Validate and extract claims from an access token
///
/// # Errors
/// `AuthError::InvalidToken` if the token is malformed, expired, tampered
/// with or issued by someone else
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AuthError> {
    verify(token, &config.access_token_secret, &config.issuer)
}

pub fn generate_refresh_token(user_id: Uuid, config: &JwtSettings) -> Result<String, AuthError> {
    let claims = RefreshClaims::new(user_id, config.refresh_token_expiry, config.issuer.clone());
    sign(&claims, &config.refresh_token_secret)
}

pub fn validate_refresh_token(
    token: &str,
    config: &JwtSettings,
) -> Result<RefreshClaims, AuthError> {
    verify(token, &config.refresh_token_secret, &config.issuer)
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, AuthError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

fn verify<T: DeserializeOwned>(token: &str, secret: &str, issuer: &str) -> Result<T, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    // Tokens are minted and checked by the same service
    validation.leeway = 0;

    decode::<T>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("JWT validation error: {}", e);
            AuthError::InvalidToken
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{NewUser, Role};

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_token_secret: "test-access-secret-at-least-32-characters".to_string(),
            access_token_expiry: 3600,
            refresh_token_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    fn user() -> User {
        User::new(NewUser {
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            full_name: "Alice".to_string(),
            password_hash: "hash".to_string(),
            avatar: None,
            role: Role::User,
        })
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let config = get_test_config();
        let user = user();

        let token = generate_access_token(&user, &config).expect("Failed to generate token");
        let claims = validate_access_token(&token, &config).expect("Failed to validate token");

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "alice@x.com");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_invalid_token() {
        let config = get_test_config();
        let result = validate_access_token("invalid.token.here", &config);

        assert_eq!(result, Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();
        let token = generate_access_token(&user(), &config).expect("Failed to generate token");

        let tampered = format!("{}X", token);
        assert!(validate_access_token(&tampered, &config).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let token = generate_access_token(&user(), &config).expect("Failed to generate token");

        config.issuer = "wrong-issuer".to_string();
        assert!(validate_access_token(&token, &config).is_err());
    }

    #[test]
    fn test_expired_token() {
        let mut config = get_test_config();
        config.access_token_expiry = -120;
        let token = generate_access_token(&user(), &config).expect("Failed to generate token");

        assert_eq!(validate_access_token(&token, &config), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let config = get_test_config();
        let user = user();
        let refresh = generate_refresh_token(user.id, &config).expect("Failed to generate token");

        let claims = validate_refresh_token(&refresh, &config).expect("Failed to validate token");
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert!(validate_access_token(&refresh, &config).is_err());
    }

    #[test]
    fn test_refresh_tokens_differ_per_issuance() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let first = generate_refresh_token(user_id, &config).unwrap();
        let second = generate_refresh_token(user_id, &config).unwrap();
        assert_ne!(first, second);
    }
}
