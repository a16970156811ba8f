//! Credential supplier for the compute service
//!
//! Every compute request asks its `TokenProvider` for a bearer token. The
//! client-credentials provider exchanges a service principal's id and secret
//! at the identity provider and caches the result until shortly before it
//! expires, so a stale token is never sent.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Identity provider authority host; the tenant id is appended
pub const AUTHORITY_HOST: &str = "https://login.microsoftonline.com/";

/// Resource scope of the compute service
pub const BATCH_RESOURCE: &str = "https://batch.core.windows.net/";

/// Tokens closer than this to expiry are refreshed before use
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Used when the identity provider omits `expires_in`
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

/// Supplies bearer tokens for outbound compute calls
///
/// Must be safe to call repeatedly and concurrently.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed token, for emulators and tests
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.expose_secret().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds; some authorities send it as a string
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

impl TokenResponse {
    fn lifetime(&self) -> Duration {
        let seconds = match &self.expires_in {
            Some(serde_json::Value::Number(n)) => n.as_u64(),
            Some(serde_json::Value::String(s)) => s.parse::<u64>().ok(),
            _ => None,
        };
        seconds.map(Duration::from_secs).unwrap_or(DEFAULT_LIFETIME)
    }
}

struct CachedToken {
    access_token: SecretString,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }
}

/// OAuth2 client-credentials token supplier
pub struct ClientCredentialsProvider {
    client: Client,
    authority_url: String,
    client_id: String,
    client_secret: SecretString,
    resource: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsProvider {
    /// Creates a provider for a tenant on the default authority
    ///
    /// # Arguments
    /// * `tenant_id` - Identity tenant of the service principal
    /// * `client_id` - Service principal application id
    /// * `client_secret` - Service principal secret
    pub fn new(tenant_id: &str, client_id: impl Into<String>, client_secret: SecretString) -> Self {
        Self::with_authority(
            format!("{}{}", AUTHORITY_HOST, tenant_id),
            client_id,
            client_secret,
            BATCH_RESOURCE,
        )
    }

    /// Creates a provider against an explicit authority URL and resource
    pub fn with_authority(
        authority_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        resource: impl Into<String>,
    ) -> Self {
        let authority_url = authority_url.into();
        Self {
            client: Client::new(),
            authority_url: authority_url.trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret,
            resource: resource.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn authority_url(&self) -> &str {
        &self.authority_url
    }

    /// Performs the token exchange at the identity provider
    async fn acquire(&self) -> Result<TokenResponse> {
        let url = format!("{}/oauth2/token", self.authority_url);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("resource", self.resource.as_str()),
        ];

        let response = self.client.post(&url).form(&form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::AuthError(format!(
                "token request to {} failed ({}): {}",
                url, status, body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ClientError::AuthError(format!("Failed to parse token response: {}", e)))
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.expose_secret().to_string());
        }

        debug!("Acquiring compute service token from {}", self.authority_url);
        let response = self.acquire().await?;
        let lifetime = response.lifetime();
        let access_token = response.access_token;

        // Lifetimes inside the refresh margin are never cached
        *cached = if lifetime > REFRESH_MARGIN {
            Some(CachedToken {
                access_token: SecretString::from(access_token.clone()),
                expires_at: Instant::now() + lifetime,
            })
        } else {
            None
        };

        Ok(access_token)
    }
}
