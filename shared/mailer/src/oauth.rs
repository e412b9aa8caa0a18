use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, TokenResponse, TokenUrl};
use tokio::sync::Mutex;

/// One Azure AD app registration tied to a single sender mailbox.
#[derive(Debug, Clone)]
pub struct SenderCredentials {
    pub sender_email: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Caches a client-credentials token per sender so every send doesn't
/// pay for a fresh token round trip.
pub struct TokenCache {
    scope: String,
    cached: Mutex<HashMap<String, String>>,
}

impl TokenCache {
    pub fn new(scope: impl Into<String>) -> Self {
        Self { scope: scope.into(), cached: Mutex::new(HashMap::new()) }
    }

    pub async fn token_for(&self, creds: &SenderCredentials) -> Result<String> {
        if let Some(token) = self.cached.lock().await.get(&creds.sender_email).cloned() {
            return Ok(token);
        }

        let token = acquire_client_credentials_token(creds, &self.scope).await?;
        self.cached.lock().await.insert(creds.sender_email.clone(), token.clone());
        Ok(token)
    }

    /// Drops a cached token after a 401, forcing the next call to
    /// reacquire.
    pub async fn invalidate(&self, sender_email: &str) {
        self.cached.lock().await.remove(sender_email);
    }
}

async fn acquire_client_credentials_token(creds: &SenderCredentials, scope: &str) -> Result<String> {
    let auth_url = AuthUrl::new(format!(
        "https://login.microsoftonline.com/{}/oauth2/v2.0/authorize",
        creds.tenant_id
    ))
    .context("invalid auth url")?;
    let token_url = TokenUrl::new(format!(
        "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
        creds.tenant_id
    ))
    .context("invalid token url")?;

    let client = BasicClient::new(
        ClientId::new(creds.client_id.clone()),
        Some(ClientSecret::new(creds.client_secret.clone())),
        auth_url,
        Some(token_url),
    );

    let token = client
        .exchange_client_credentials()
        .add_scope(oauth2::Scope::new(scope.to_string()))
        .request_async(oauth2::reqwest::async_http_client)
        .await
        .with_context(|| format!("failed to acquire access token for {}", creds.sender_email))?;

    Ok(token.access_token().secret().clone())
}

pub type SharedTokenCache = Arc<TokenCache>;
