//! Object store client
//!
//! Produces signed, time-bounded URLs for blob objects and enumerates the
//! objects under a prefix. Listing is authorised with the same account SAS
//! that is handed out to compute nodes.

use chrono::Utc;
use regex::Regex;
use reqwest::Client;
use secrecy::SecretString;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{ClientError, Result};
use crate::sas::{READ_PERMISSIONS, SasSigner};

static BLOB_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Name>([^<]*)</Name>").expect("valid blob name pattern"));

static NEXT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<NextMarker>([^<]+)</NextMarker>").expect("valid marker pattern")
});

static XML_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9A-Fa-f]+|#[0-9]+|lt|gt|quot|apos|amp);").expect("valid entity pattern")
});

/// Listings are signed for this long; they are consumed immediately
const LISTING_SAS_TTL: Duration = Duration::from_secs(15 * 60);

/// HTTP client for the blob object store
#[derive(Debug)]
pub struct BlobClient {
    /// Service endpoint (e.g., "https://account.blob.core.windows.net")
    endpoint: String,
    signer: SasSigner,
    client: Client,
}

impl BlobClient {
    /// Create a client for the account's public endpoint
    ///
    /// # Arguments
    /// * `account` - Storage account name
    /// * `account_key` - Base64 storage account key
    pub fn new(account: &str, account_key: &SecretString) -> Result<Self> {
        Self::with_endpoint(
            format!("https://{}.blob.core.windows.net", account),
            account,
            account_key,
        )
    }

    /// Create a client against an explicit endpoint (emulators, sovereign clouds)
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        account: &str,
        account_key: &SecretString,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)
            .map_err(|e| ClientError::InvalidRequest(format!("bad endpoint {}: {}", endpoint, e)))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            signer: SasSigner::new(account, account_key)?,
            client: Client::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn signer(&self) -> &SasSigner {
        &self.signer
    }

    /// Builds `endpoint/container/path...` with each segment encoded
    fn object_url(&self, container: &str, object_path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ClientError::InvalidRequest(format!("{} cannot be a base URL", self.endpoint))
            })?;
            segments.pop_if_empty().push(container);
            if !object_path.is_empty() {
                segments.extend(object_path.split('/'));
            }
        }
        Ok(url)
    }

    fn expiry_after(ttl: Duration) -> Result<chrono::DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| ClientError::SigningError(format!("ttl out of range: {}", e)))?;
        Ok(Utc::now() + ttl)
    }

    /// Generate a URL granting read access to one object for `ttl`
    pub fn signed_url(&self, container: &str, object_path: &str, ttl: Duration) -> Result<String> {
        let mut url = self.object_url(container, object_path)?;
        let pairs = self
            .signer
            .account_sas_pairs(READ_PERMISSIONS, Self::expiry_after(ttl)?)?;
        url.query_pairs_mut().extend_pairs(pairs);

        Ok(url.to_string())
    }

    /// List the names of all objects under `prefix`, in the store's order
    ///
    /// A prefix matching nothing yields an empty list.
    pub async fn list_blobs(&self, container: &str, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut url = self.object_url(container, "")?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("restype", "container")
                    .append_pair("comp", "list")
                    .append_pair("prefix", prefix);
                if let Some(m) = &marker {
                    query.append_pair("marker", m);
                }
                query.extend_pairs(
                    self.signer
                        .account_sas_pairs(READ_PERMISSIONS, Self::expiry_after(LISTING_SAS_TTL)?)?,
                );
            }

            let response = self.client.get(url).send().await?;
            let status = response.status();
            let body = response.text().await?;

            if !status.is_success() {
                return Err(ClientError::api_error(status.as_u16(), None, body));
            }

            let page = parse_listing(&body);
            debug!(
                "Listed {} object(s) under {}/{}",
                page.names.len(),
                container,
                prefix
            );
            names.extend(page.names);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(names)
    }
}

struct ListingPage {
    names: Vec<String>,
    next_marker: Option<String>,
}

fn parse_listing(xml: &str) -> ListingPage {
    let names = BLOB_NAME
        .captures_iter(xml)
        .map(|c| unescape_xml(&c[1]).into_owned())
        .collect();
    let next_marker = NEXT_MARKER
        .captures(xml)
        .map(|c| unescape_xml(&c[1]).into_owned());

    ListingPage { names, next_marker }
}

/// Decodes predefined entities and character references in one pass
///
/// References to invalid code points are left as written.
fn unescape_xml(text: &str) -> std::borrow::Cow<'_, str> {
    XML_ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let entity = &caps[1];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "amp" => Some('&'),
            _ => {
                let code = match entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => entity[1..].parse::<u32>().ok(),
                };
                code.and_then(char::from_u32)
            }
        };
        decoded.map_or_else(|| caps[0].to_string(), String::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    fn client() -> BlobClient {
        BlobClient::new("samydata", &SecretString::from(STANDARD.encode("key"))).unwrap()
    }

    #[test]
    fn test_signed_url_points_at_object() {
        let url = client()
            .signed_url("tesk-tasks", "Env/env.json", Duration::from_secs(3600))
            .unwrap();

        assert!(url.starts_with("https://samydata.blob.core.windows.net/tesk-tasks/Env/env.json?"));
        assert!(url.contains("sp=rl"));
        assert!(url.contains("se="));
        assert!(url.contains("sig="));
    }

    #[test]
    fn test_signed_url_encodes_segments() {
        let url = client()
            .signed_url("apps", "my file.sh", Duration::from_secs(60))
            .unwrap();
        assert!(url.contains("/apps/my%20file.sh?"));
    }

    #[test]
    fn test_custom_endpoint_is_trimmed() {
        let client = BlobClient::with_endpoint(
            "http://127.0.0.1:10000/devstoreaccount1/",
            "devstoreaccount1",
            &SecretString::from(STANDARD.encode("key")),
        )
        .unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:10000/devstoreaccount1");

        let url = client
            .signed_url("c", "a.txt", Duration::from_secs(60))
            .unwrap();
        assert!(url.starts_with("http://127.0.0.1:10000/devstoreaccount1/c/a.txt?"));
    }

    #[test]
    fn test_parse_listing_names_and_marker() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://samydata.blob.core.windows.net/" ContainerName="tesk-tasks">
  <Prefix>Env</Prefix>
  <Blobs>
    <Blob><Name>Env/a.json</Name><Properties /></Blob>
    <Blob><Name>Env/b&amp;c.json</Name><Properties /></Blob>
  </Blobs>
  <NextMarker>2!84!MDAw</NextMarker>
</EnumerationResults>"#;

        let page = parse_listing(xml);
        assert_eq!(page.names, vec!["Env/a.json", "Env/b&c.json"]);
        assert_eq!(page.next_marker.as_deref(), Some("2!84!MDAw"));
    }

    #[test]
    fn test_parse_listing_last_page() {
        let xml = "<EnumerationResults><Blobs /><NextMarker /></EnumerationResults>";
        let page = parse_listing(xml);
        assert!(page.names.is_empty());
        assert!(page.next_marker.is_none());
    }

    #[test]
    fn test_parse_listing_decodes_character_references() {
        let xml = "<Blobs>\
            <Blob><Name>Env/my&#x20;file.json</Name></Blob>\
            <Blob><Name>Env/it&#39;s.json</Name></Blob>\
            <Blob><Name>Env/&amp;lt;raw&#xD800;.json</Name></Blob>\
            </Blobs>";

        let page = parse_listing(xml);
        assert_eq!(
            page.names,
            vec!["Env/my file.json", "Env/it's.json", "Env/&lt;raw&#xD800;.json"]
        );
    }
}
