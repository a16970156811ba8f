//! Batchflow HTTP Clients
//!
//! Type-safe clients for the three remote boundaries the engine talks to:
//!
//! - [`BatchClient`]: the cluster-compute service (pools, jobs, tasks,
//!   task output files, supported node images)
//! - [`BlobClient`]: the blob object store (signed URLs, prefix listing)
//! - [`TokenProvider`]: bearer tokens from the identity provider
//!
//! # Example
//!
//! ```no_run
//! use batchflow_client::{BatchClient, ClientCredentialsProvider};
//! use secrecy::SecretString;
//! use std::sync::Arc;
//!
//! # async fn example() -> batchflow_client::Result<()> {
//! let tokens = ClientCredentialsProvider::new(
//!     "tenant-id",
//!     "client-id",
//!     SecretString::from("client-secret".to_string()),
//! );
//! let client = BatchClient::new("https://account.westus2.batch.azure.com", Arc::new(tokens));
//!
//! let pool = client.get_pool("TES-BATCH-POOL-01").await?;
//! println!("{} dedicated node(s)", pool.current_dedicated_nodes);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod blob;
pub mod error;
mod jobs;
mod pools;
pub mod sas;
mod tasks;

// Re-export commonly used types
pub use auth::{ClientCredentialsProvider, StaticToken, TokenProvider};
pub use blob::BlobClient;
pub use error::{ClientError, Result};
pub use sas::SasSigner;
pub use tasks::{STDERR_FILE, STDOUT_FILE};

use batchflow_core::dto::common::{BatchErrorBody, ODataPage, codes};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// REST API version of the compute service
pub const API_VERSION: &str = "2020-09-01.12.0";

/// Characters escaped inside a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Encode a resource id for use as one URL path segment
pub(crate) fn segment(id: &str) -> String {
    utf8_percent_encode(id, PATH_SEGMENT).to_string()
}

/// HTTP client for the compute service API
///
/// Every request asks the token provider for a fresh bearer token and
/// carries its own `client-request-id`.
#[derive(Clone)]
pub struct BatchClient {
    /// Account endpoint (e.g., "https://account.region.batch.azure.com")
    base_url: String,
    /// HTTP client instance
    client: Client,
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for BatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BatchClient {
    /// Create a new compute service client
    ///
    /// # Arguments
    /// * `base_url` - The account endpoint URL
    /// * `tokens` - Supplier of bearer tokens
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_client(base_url, Client::new(), tokens)
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        client: Client,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            tokens,
        }
    }

    /// Get the account endpoint URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start an authenticated request
    ///
    /// `api-version` is only added when the URL does not already carry it,
    /// which is the case for continuation links.
    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.tokens.token().await?;
        let request_id = Uuid::new_v4().to_string();
        debug!("{} {} (client-request-id {})", method, url, request_id);

        let mut builder = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("client-request-id", request_id)
            .header("return-client-request-id", "true");

        if !url.contains("api-version=") {
            builder = builder.query(&[("api-version", API_VERSION)]);
        }

        Ok(builder)
    }

    /// Follow `odata.nextLink` until the last page
    async fn get_all_pages<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next {
            let response = self.request(Method::GET, &url).await?.send().await?;
            let page: ODataPage<T> = self.handle_response(response).await?;
            items.extend(page.value);
            next = page.next_link;
        }

        Ok(items)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Turn a non-success response into a `ClientError`
    ///
    /// 409 responses carrying the pool/job idempotency codes become
    /// `AlreadyExists`; everything else keeps the remote code and message.
    async fn error_from_response(&self, response: reqwest::Response) -> ClientError {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let body = serde_json::from_str::<BatchErrorBody>(&text).ok();
        let code = body.as_ref().and_then(|b| b.code.clone());
        let message = body
            .as_ref()
            .and_then(|b| b.message_text().map(str::to_string))
            .unwrap_or(text);

        match code {
            Some(code)
                if status == StatusCode::CONFLICT
                    && (code == codes::POOL_EXISTS || code == codes::JOB_EXISTS) =>
            {
                ClientError::AlreadyExists { code, message }
            }
            code => ClientError::api_error(status.as_u16(), code, message),
        }
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (creates, deletes)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        Ok(())
    }

    /// Handle an API response whose body is plain text (task output files)
    async fn handle_text_response(&self, response: reqwest::Response) -> Result<String> {
        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        Ok(response.text().await?)
    }
}
