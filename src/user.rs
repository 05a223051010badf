/// User identity record and its client-facing projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_AVATAR_URL: &str =
    "https://ik.imagekit.io/neg1amxgpy/Profile_Pic/default_awtar_MDnC7hgbv?updatedAt=1754414667374";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Full user record as persisted. Never serialised to clients directly;
/// use [`UserProfile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    /// bcrypt hash, never the plaintext
    pub password_hash: String,
    pub mobile_number: Option<String>,
    pub avatar: String,
    pub role: Role,
    /// The single currently valid refresh token
    pub refresh_token: Option<String>,
    /// SHA-256 hex digest of the outstanding reset token
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    /// bcrypt hash of the outstanding mobile OTP
    pub mobile_otp: Option<String>,
    pub mobile_otp_expires: Option<DateTime<Utc>>,
    /// Wrong guesses against the pending OTP
    pub mobile_otp_attempts: i32,
    pub is_mobile_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a user. Username and email must already be
/// normalised and the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub role: Role,
}

/// Self-service profile edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub mobile_number: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.username.is_none() && self.mobile_number.is_none()
    }
}

impl User {
    pub fn new(new_user: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            full_name: new_user.full_name,
            password_hash: new_user.password_hash,
            mobile_number: None,
            avatar: new_user.avatar.unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
            role: new_user.role,
            refresh_token: None,
            password_reset_token: None,
            password_reset_expires: None,
            mobile_otp: None,
            mobile_otp_expires: None,
            mobile_otp_attempts: 0,
            is_mobile_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether `identifier` names this user by email or username.
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.email == identifier || self.username == identifier
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }

    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile::from(self)
    }
}

/// What clients get to see of a user: no password, token, reset or OTP
/// fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub mobile_number: Option<String>,
    pub avatar: String,
    pub role: Role,
    pub is_mobile_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            mobile_number: user.mobile_number.clone(),
            avatar: user.avatar.clone(),
            role: user.role,
            is_mobile_verified: user.is_mobile_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// What anyone may see of an author
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
            created_at: user.created_at,
        }
    }
}
