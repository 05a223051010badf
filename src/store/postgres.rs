use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Page, UserStore};
use crate::error::DatabaseError;
use crate::user::{NewUser, ProfileChanges, Role, User};

const USER_COLUMNS: &str = r#"
    id, username, email, full_name, password_hash, mobile_number, avatar, role,
    refresh_token, password_reset_token, password_reset_expires,
    mobile_otp, mobile_otp_expires, mobile_otp_attempts, is_mobile_verified,
    created_at, updated_at
"#;

/// Postgres-backed user store
#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    full_name: String,
    password_hash: String,
    mobile_number: Option<String>,
    avatar: String,
    role: String,
    refresh_token: Option<String>,
    password_reset_token: Option<String>,
    password_reset_expires: Option<DateTime<Utc>>,
    mobile_otp: Option<String>,
    mobile_otp_expires: Option<DateTime<Utc>>,
    mobile_otp_attempts: i32,
    is_mobile_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(DatabaseError::UnexpectedError)?;

        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            password_hash: row.password_hash,
            mobile_number: row.mobile_number,
            avatar: row.avatar,
            role,
            refresh_token: row.refresh_token,
            password_reset_token: row.password_reset_token,
            password_reset_expires: row.password_reset_expires,
            mobile_otp: row.mobile_otp,
            mobile_otp_expires: row.mobile_otp_expires,
            mobile_otp_attempts: row.mobile_otp_attempts,
            is_mobile_verified: row.is_mobile_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_user(row: Option<UserRow>) -> Result<Option<User>, DatabaseError> {
    row.map(User::try_from).transpose()
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1 OR username = $1 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        into_user(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        into_user(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        into_user(row)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        into_user(row)
    }

    async fn list(&self, page: u32, limit: u32) -> Result<Page<User>, DatabaseError> {
        let offset = i64::from(page.max(1) - 1) * i64::from(limit);

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at, id LIMIT $1 OFFSET $2",
            USER_COLUMNS
        ))
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let docs = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(docs, total.max(0) as u64, page, limit))
    }

    async fn exists_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        let user = User::new(new_user);

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, full_name, password_hash, avatar, role,
                is_mobile_verified, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(&user.avatar)
        .bind(user.role.as_str())
        .bind(user.is_mobile_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, DatabaseError> {
        // A changed number starts unverified with no pending code
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET full_name = COALESCE($1, full_name),
                username = COALESCE($2, username),
                is_mobile_verified = CASE
                    WHEN $3::text IS NOT NULL AND $3 IS DISTINCT FROM mobile_number THEN false
                    ELSE is_mobile_verified END,
                mobile_otp = CASE
                    WHEN $3::text IS NOT NULL AND $3 IS DISTINCT FROM mobile_number THEN NULL
                    ELSE mobile_otp END,
                mobile_otp_expires = CASE
                    WHEN $3::text IS NOT NULL AND $3 IS DISTINCT FROM mobile_number THEN NULL
                    ELSE mobile_otp_expires END,
                mobile_number = COALESCE($3, mobile_number),
                updated_at = $4
            WHERE id = $5
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(changes.full_name.as_deref())
        .bind(changes.username.as_deref())
        .bind(changes.mobile_number.as_deref())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::UniqueConstraintViolation(_) => {
                DatabaseError::UniqueConstraintViolation("This username is already taken".to_string())
            }
            other => other,
        })?;

        into_user(row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(token)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $1, updated_at = $2
            WHERE id = $3 AND refresh_token = $4
            "#,
        )
        .bind(new_token)
        .bind(Utc::now())
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_password_reset(
        &self,
        id: Uuid,
        token_hash: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = $1, password_reset_expires = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(token_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn consume_password_reset(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET password_hash = $1,
                password_reset_token = NULL,
                password_reset_expires = NULL,
                updated_at = $2
            WHERE password_reset_token = $3 AND password_reset_expires > $2
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(new_password_hash)
        .bind(now)
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        into_user(row)
    }

    async fn set_mobile_otp(
        &self,
        id: Uuid,
        mobile_number: &str,
        otp_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET mobile_number = $1, mobile_otp = $2, mobile_otp_expires = $3,
                mobile_otp_attempts = 0, is_mobile_verified = false, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(mobile_number)
        .bind(otp_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_mobile_verified(&self, id: Uuid, otp_hash: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_mobile_verified = true, mobile_otp = NULL, mobile_otp_expires = NULL,
                mobile_otp_attempts = 0, updated_at = $1
            WHERE id = $2 AND mobile_otp = $3
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .bind(otp_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_failed_otp(
        &self,
        id: Uuid,
        otp_hash: &str,
        max_attempts: i32,
    ) -> Result<bool, DatabaseError> {
        // Right-hand sides see the row as it was before this update
        let discarded = sqlx::query_scalar::<_, bool>(
            r#"
            UPDATE users
            SET mobile_otp_attempts = mobile_otp_attempts + 1,
                mobile_otp = CASE WHEN mobile_otp_attempts + 1 >= $1 THEN NULL ELSE mobile_otp END,
                mobile_otp_expires = CASE
                    WHEN mobile_otp_attempts + 1 >= $1 THEN NULL
                    ELSE mobile_otp_expires END,
                updated_at = $2
            WHERE id = $3 AND mobile_otp = $4
            RETURNING mobile_otp IS NULL
            "#,
        )
        .bind(max_attempts)
        .bind(Utc::now())
        .bind(id)
        .bind(otp_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(discarded.unwrap_or(false))
    }
}
