//! Authentication module
//!
//! Handles JWT token generation/validation, password hashing, the
//! credential manager that owns refresh and reset token lifecycles, and
//! federated identity verification.

mod account;
mod claims;
mod directory;
mod identity;
mod jwt;
mod manager;
mod password;
mod recovery;
mod reset_token;

pub use account::Registration;
pub use claims::{Claims, RefreshClaims};
pub use identity::{ExternalIdentity, GoogleIdentityVerifier, IdentityVerifier};
pub use jwt::{
    generate_access_token, generate_refresh_token, validate_access_token, validate_refresh_token,
};
pub use manager::{AuthenticatedUser, CredentialManager, TokenPair};
pub use password::{hash_password, verify_password};
pub use recovery::{reset_url, MOBILE_OTP_SUBJECT, PASSWORD_RESET_SUBJECT};
pub use reset_token::{generate_otp, generate_reset_token, hash_token};
