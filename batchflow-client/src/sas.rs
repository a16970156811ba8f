//! Account shared access signatures for the object store
//!
//! Signs read/list access to blob objects with the storage account key so a
//! compute node can download artifacts without holding credentials.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretBox, SecretString};
use sha2::Sha256;
use std::fmt;
use url::form_urlencoded;

use crate::error::{ClientError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Storage service version the signature format follows
pub const SAS_VERSION: &str = "2019-12-12";

/// Read and list
pub const READ_PERMISSIONS: &str = "rl";

const SIGNED_SERVICES: &str = "b";
const SIGNED_RESOURCE_TYPES: &str = "sco";
const SIGNED_PROTOCOL: &str = "https";

/// Signs account SAS tokens with a storage account key
pub struct SasSigner {
    account: String,
    key: SecretBox<Vec<u8>>,
}

impl fmt::Debug for SasSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasSigner")
            .field("account", &self.account)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SasSigner {
    /// Creates a signer from the account name and its base64 account key
    pub fn new(account: impl Into<String>, account_key: &SecretString) -> Result<Self> {
        let key = STANDARD
            .decode(account_key.expose_secret().trim())
            .map_err(|e| ClientError::SigningError(format!("storage key is not base64: {}", e)))?;

        Ok(Self {
            account: account.into(),
            key: SecretBox::new(Box::new(key)),
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Query parameters of an account SAS valid until `expiry`
    pub fn account_sas_pairs(
        &self,
        permissions: &str,
        expiry: DateTime<Utc>,
    ) -> Result<Vec<(&'static str, String)>> {
        let expiry = expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string();

        // Empty lines are the unused start time and IP range
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}\n\n{}\n\n{}\n{}\n",
            self.account,
            permissions,
            SIGNED_SERVICES,
            SIGNED_RESOURCE_TYPES,
            expiry,
            SIGNED_PROTOCOL,
            SAS_VERSION
        );

        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret())
            .map_err(|e| ClientError::SigningError(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(vec![
            ("sv", SAS_VERSION.to_string()),
            ("ss", SIGNED_SERVICES.to_string()),
            ("srt", SIGNED_RESOURCE_TYPES.to_string()),
            ("sp", permissions.to_string()),
            ("se", expiry),
            ("spr", SIGNED_PROTOCOL.to_string()),
            ("sig", signature),
        ])
    }

    /// Encoded query string of an account SAS valid until `expiry`
    pub fn account_sas(&self, permissions: &str, expiry: DateTime<Utc>) -> Result<String> {
        let pairs = self.account_sas_pairs(permissions, expiry)?;
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &pairs {
            query.append_pair(name, value);
        }
        Ok(query.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signer(key: &str) -> SasSigner {
        SasSigner::new("samydata", &SecretString::from(STANDARD.encode(key))).unwrap()
    }

    #[test]
    fn test_rejects_non_base64_key() {
        let result = SasSigner::new("acct", &SecretString::from("not base64!".to_string()));
        assert!(matches!(result, Err(ClientError::SigningError(_))));
    }

    #[test]
    fn test_sas_carries_expected_parameters() {
        let expiry = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let sas = signer("secret-key").account_sas(READ_PERMISSIONS, expiry).unwrap();

        assert!(sas.starts_with("sv=2019-12-12&ss=b&srt=sco&sp=rl"));
        assert!(sas.contains("se=2030-01-02T03%3A04%3A05Z"));
        assert!(sas.contains("spr=https"));
        assert!(sas.contains("&sig="));
    }

    #[test]
    fn test_signature_depends_on_key_and_expiry() {
        let expiry = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2030, 1, 1, 1, 0, 0).unwrap();

        let a = signer("key-a").account_sas(READ_PERMISSIONS, expiry).unwrap();
        let a_again = signer("key-a").account_sas(READ_PERMISSIONS, expiry).unwrap();
        let b = signer("key-b").account_sas(READ_PERMISSIONS, expiry).unwrap();
        let a_later = signer("key-a").account_sas(READ_PERMISSIONS, later).unwrap();

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_ne!(a, a_later);
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", signer("super-secret"));
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("super-secret"));
    }
}
