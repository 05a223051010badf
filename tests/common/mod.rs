#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use bolify::auth::{hash_password, CredentialManager, ExternalIdentity, IdentityVerifier};
use bolify::configuration::{ApplicationSettings, AuthSettings, Environment, JwtSettings};
use bolify::email_client::{EmailMessage, Mailer};
use bolify::error::{AuthError, EmailError};
use bolify::startup::run;
use bolify::store::{InMemoryUserStore, UserStore};
use bolify::user::{NewUser, Role};

pub const GOOGLE_TOKEN: &str = "google-id-token-for-carol";

/// Keeps every outgoing email for inspection
#[derive(Default)]
pub struct CapturingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

impl CapturingMailer {
    pub fn last(&self) -> Option<EmailMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

/// Accepts exactly one provider token
pub struct StubIdentityVerifier;

#[async_trait]
impl IdentityVerifier for StubIdentityVerifier {
    async fn verify(&self, provider_token: &str) -> Result<ExternalIdentity, AuthError> {
        if provider_token == GOOGLE_TOKEN {
            Ok(ExternalIdentity {
                email: "carol@gmail.com".to_string(),
                name: "Carol".to_string(),
                picture: None,
            })
        } else {
            Err(AuthError::InvalidExternalToken("token rejected".to_string()))
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryUserStore>,
    pub mailer: Arc<CapturingMailer>,
    pub client: reqwest::Client,
}

pub fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(InMemoryUserStore::new());
    let mailer = Arc::new(CapturingMailer::default());

    let manager = CredentialManager::new(
        store.clone(),
        JwtSettings {
            access_token_secret: "integration-access-secret-0123456789".to_string(),
            access_token_expiry: 900,
            refresh_token_secret: "integration-refresh-secret-0123456789".to_string(),
            refresh_token_expiry: 864000,
            issuer: "bolify-test".to_string(),
        },
        AuthSettings {
            bcrypt_cost: 4,
            ..AuthSettings::default()
        },
    );

    let application = ApplicationSettings {
        host: "127.0.0.1".to_string(),
        port,
        base_url: address.clone(),
        environment: Environment::Local,
    };

    let server = run(
        listener,
        manager,
        mailer.clone(),
        Arc::new(StubIdentityVerifier),
        application,
    )
    .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        mailer,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/auth/register",
            &json!({
                "fullName": "Test User",
                "email": email,
                "username": username,
                "password": password,
            }),
        )
        .await
    }

    pub async fn register_alice(&self) {
        let response = self.register("alice", "alice@x.com", "secret123").await;
        assert_eq!(201, response.status().as_u16());
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/auth/login",
            &json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Admins cannot register over HTTP, so they go straight into the store
    pub async fn create_admin(&self, username: &str, email: &str, password: &str) {
        let password_hash = hash_password(password, 4).await.expect("Failed to hash password");
        self.store
            .create(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                full_name: "Admin User".to_string(),
                password_hash,
                avatar: None,
                role: Role::Admin,
            })
            .await
            .expect("Failed to create admin");
    }

    /// Logs in and returns `(accessToken, refreshToken)`
    pub async fn login_tokens(&self, username: &str, password: &str) -> (String, String) {
        let response = self.login(username, password).await;
        assert_eq!(200, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse response");
        (
            body["data"]["accessToken"].as_str().unwrap().to_string(),
            body["data"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}
