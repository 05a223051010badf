/// Federated Identity Verification
///
/// Turns a provider-issued ID token into a verified [`ExternalIdentity`].
/// The credential manager only consumes the verified identity.

use async_trait::async_trait;
use serde::Deserialize;

use crate::configuration::GoogleSettings;
use crate::error::AuthError;

/// Identity asserted by an external provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// # Errors
    /// `AuthError::InvalidExternalToken` if the provider rejects the token
    async fn verify(&self, provider_token: &str) -> Result<ExternalIdentity, AuthError>;
}

/// Verifies Google ID tokens through Google's tokeninfo endpoint
#[derive(Clone)]
pub struct GoogleIdentityVerifier {
    http_client: reqwest::Client,
    tokeninfo_url: String,
    client_id: String,
}

/// Subset of the tokeninfo response we rely on
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    email: Option<String>,
    /// Google returns this as the string "true" or as a boolean
    #[serde(default)]
    email_verified: Option<serde_json::Value>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleIdentityVerifier {
    pub fn new(settings: &GoogleSettings, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            tokeninfo_url: settings.tokeninfo_url.clone(),
            client_id: settings.client_id.clone(),
        }
    }
}

fn identity_from_token_info(
    info: TokenInfo,
    client_id: &str,
) -> Result<ExternalIdentity, AuthError> {
    if info.aud != client_id {
        return Err(AuthError::InvalidExternalToken("audience mismatch".to_string()));
    }

    let verified = match &info.email_verified {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s == "true",
        _ => false,
    };
    if !verified {
        return Err(AuthError::InvalidExternalToken("email not verified".to_string()));
    }

    let email = info
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AuthError::InvalidExternalToken("token carries no email".to_string()))?;

    let name = info
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    Ok(ExternalIdentity {
        email,
        name,
        picture: info.picture,
    })
}

#[async_trait]
impl IdentityVerifier for GoogleIdentityVerifier {
    async fn verify(&self, provider_token: &str) -> Result<ExternalIdentity, AuthError> {
        if provider_token.trim().is_empty() {
            return Err(AuthError::InvalidExternalToken("empty credential".to_string()));
        }

        let response = self
            .http_client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", provider_token)])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach identity provider: {}", e);
                AuthError::InvalidExternalToken("identity provider unreachable".to_string())
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Identity provider rejected token");
            return Err(AuthError::InvalidExternalToken("token rejected".to_string()));
        }

        let info = response.json::<TokenInfo>().await.map_err(|e| {
            tracing::warn!("Unreadable tokeninfo response: {}", e);
            AuthError::InvalidExternalToken("malformed provider response".to_string())
        })?;

        identity_from_token_info(info, &self.client_id)
    }
}
