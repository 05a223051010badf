use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    pub email_client: EmailClientSettings,
    pub google: GoogleSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Public origin used to build links in outgoing emails
    pub base_url: String,
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    /// Keep users in process memory instead of Postgres (local runs only)
    #[serde(default)]
    pub in_memory: bool,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// JWT signing settings. Access and refresh tokens use separate secrets.
#[derive(Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub access_token_secret: String,
    pub access_token_expiry: i64,  // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_secret: String,
    pub refresh_token_expiry: i64, // seconds (e.g., 864000 for 10 days)
    pub issuer: String,
}

/// Credential lifecycle settings
#[derive(Deserialize, Clone, Debug)]
pub struct AuthSettings {
    #[serde(default = "default_password_reset_expiry")]
    pub password_reset_expiry: i64,
    #[serde(default = "default_otp_expiry")]
    pub otp_expiry: i64,
    /// Wrong guesses after which a pending OTP is discarded
    #[serde(default = "default_max_otp_attempts")]
    pub max_otp_attempts: i32,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_password_reset_expiry() -> i64 {
    10 * 60
}

fn default_otp_expiry() -> i64 {
    10 * 60
}

fn default_max_otp_attempts() -> i32 {
    5
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            password_reset_expiry: default_password_reset_expiry(),
            otp_expiry: default_otp_expiry(),
            max_otp_attempts: default_max_otp_attempts(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    #[serde(default = "default_email_timeout")]
    pub timeout_milliseconds: u64,
}

fn default_email_timeout() -> u64 {
    10_000
}

impl EmailClientSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct GoogleSettings {
    pub client_id: String,
    #[serde(default = "default_tokeninfo_url")]
    pub tokeninfo_url: String,
}

fn default_tokeninfo_url() -> String {
    "https://oauth2.googleapis.com/tokeninfo".to_string()
}

impl Settings {
    /// Rejects settings the credential manager cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let jwt = &self.jwt;
        if jwt.access_token_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.access_token_secret".to_string()));
        }
        if jwt.refresh_token_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.refresh_token_secret".to_string()));
        }
        if jwt.access_token_secret == jwt.refresh_token_secret {
            return Err(ConfigError::InvalidValue(
                "access and refresh tokens must use different secrets".to_string(),
            ));
        }
        if jwt.access_token_expiry <= 0 || jwt.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue("token expiries must be positive".to_string()));
        }
        if self.auth.max_otp_attempts < 1 {
            return Err(ConfigError::InvalidValue(
                "auth.max_otp_attempts must be at least 1".to_string(),
            ));
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.bcrypt_cost must be within 4..=31, got {}",
                self.auth.bcrypt_cost
            )));
        }
        Ok(())
    }
}

/// Loads `configuration.yaml` (optional) and `APP_`-prefixed environment
/// variables, e.g. `APP_JWT__ACCESS_TOKEN_SECRET`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
