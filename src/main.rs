use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use bolify::auth::{CredentialManager, GoogleIdentityVerifier, IdentityVerifier};
use bolify::configuration::{get_configuration, Settings};
use bolify::email_client::{EmailClient, Mailer, SenderEmail};
use bolify::startup::run;
use bolify::store::{InMemoryUserStore, PgUserStore, UserStore};
use bolify::telemetry::init_telemetry;

fn startup_error(kind: std::io::ErrorKind, message: &str) -> std::io::Error {
    std::io::Error::new(kind, message.to_string())
}

async fn build_store(configuration: &Settings) -> std::io::Result<Arc<dyn UserStore>> {
    if configuration.database.in_memory {
        tracing::warn!("Using the in-memory user store; data is lost on shutdown");
        return Ok(Arc::new(InMemoryUserStore::new()));
    }

    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            startup_error(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            startup_error(std::io::ErrorKind::Other, "Database migration error")
        })?;

    tracing::info!("Database connection pool created successfully");
    Ok(Arc::new(PgUserStore::new(pool)))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    configuration.validate().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let store = build_store(&configuration).await?;
    let manager = CredentialManager::new(
        store,
        configuration.jwt.clone(),
        configuration.auth.clone(),
    );

    let sender = SenderEmail::parse(configuration.email_client.sender_email.clone()).map_err(|e| {
        tracing::error!("Invalid sender email: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;
    let http_client = reqwest::Client::builder()
        .timeout(configuration.email_client.timeout())
        .build()
        .map_err(|e| {
            tracing::error!("Failed to build HTTP client: {}", e);
            startup_error(std::io::ErrorKind::Other, "HTTP client error")
        })?;

    let mailer: Arc<dyn Mailer> = Arc::new(EmailClient::new(
        configuration.email_client.base_url.clone(),
        sender,
        http_client.clone(),
    ));
    let identity: Arc<dyn IdentityVerifier> = Arc::new(GoogleIdentityVerifier::new(
        &configuration.google,
        http_client,
    ));

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(
        listener,
        manager,
        mailer,
        identity,
        configuration.application.clone(),
    )?;
    server.await
}
