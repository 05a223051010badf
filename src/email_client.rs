use async_trait::async_trait;
use serde::Serialize;

use crate::error::EmailError;
use crate::validators::is_valid_email;

/// A transactional email: recipient, subject and plain-text body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Outbound email collaborator
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// HTTP email API client
#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: SenderEmail,
}

#[derive(Clone, Debug)]
pub struct SenderEmail(String);

impl SenderEmail {
    pub fn parse(s: String) -> Result<Self, EmailError> {
        let email = is_valid_email(&s).map_err(|e| EmailError::InvalidRecipient(e.to_string()))?;
        Ok(Self(email))
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl EmailClient {
    pub fn new(base_url: String, sender: SenderEmail, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url,
            sender,
        }
    }
}

#[async_trait]
impl Mailer for EmailClient {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let url = format!("{}/email", self.base_url.trim_end_matches('/'));
        let request = SendEmailRequest {
            from: self.sender.inner(),
            to: &message.email,
            subject: &message.subject,
            text: &message.message,
        };

        self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send email: {}", e);
                EmailError::SendFailed(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("Email service returned error: {}", e);
                EmailError::ServiceUnavailable(e.to_string())
            })?;

        tracing::info!(subject = %message.subject, "Email dispatched");
        Ok(())
    }
}
