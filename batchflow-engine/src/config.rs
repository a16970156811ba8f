//! Environment configuration
//!
//! All settings are resolved once at startup from named environment values
//! and are read-only for the rest of the session. A missing required value
//! is a configuration error raised before any remote call.

use batchflow_core::domain::pool::{ElevationLevel, ImageSelector};
use secrecy::SecretString;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Names of the environment variables the engine reads
pub mod vars {
    pub const AZURE_AD_TENANT_ID: &str = "AZURE_AD_TENANT_ID";
    pub const AZURE_AD_SP_CLIENT_ID: &str = "AZURE_AD_SP_CLIENT_ID";
    pub const AZURE_AD_SP_CLIENT_SECRET: &str = "AZURE_AD_SP_CLIENT_SECRET";

    pub const AZURE_BATCH_ACCOUNT_NAME: &str = "AZURE_BATCH_ACCOUNT_NAME";
    pub const AZURE_BATCH_ACCOUNT_URL: &str = "AZURE_BATCH_ACCOUNT_URL";
    pub const AZURE_BATCH_VM_IMAGE_ID: &str = "AZURE_BATCH_VM_IMAGE_ID";
    pub const AZURE_BATCH_VM_SIZE: &str = "AZURE_BATCH_VM_SIZE";
    pub const AZURE_BATCH_VM_NODE_COUNT: &str = "AZURE_BATCH_VM_NODE_COUNT";
    pub const AZURE_BATCH_VM_LOW_PRIORITY_NODE_COUNT: &str =
        "AZURE_BATCH_VM_LOW_PRIORITY_NODE_COUNT";
    pub const AZURE_BATCH_VM_IMAGE_PUBLISHER: &str = "AZURE_BATCH_VM_IMAGE_PUBLISHER";
    pub const AZURE_BATCH_VM_IMAGE_OFFER: &str = "AZURE_BATCH_VM_IMAGE_OFFER";
    pub const AZURE_BATCH_VM_IMAGE_SKU: &str = "AZURE_BATCH_VM_IMAGE_SKU";
    pub const AZURE_BATCH_JOB_TIMEOUT: &str = "AZURE_BATCH_JOB_TIMEOUT";
    pub const AZURE_BATCH_POLL_INTERVAL: &str = "AZURE_BATCH_POLL_INTERVAL";

    pub const AZURE_BATCH_USER_NAME: &str = "AZURE_BATCH_USER_NAME";
    pub const AZURE_BATCH_USER_PWD: &str = "AZURE_BATCH_USER_PWD";
    pub const AZURE_BATCH_USER_ELEVATION_LEVEL: &str = "AZURE_BATCH_USER_ELEVATION_LEVEL";

    pub const AZURE_STORAGE_ACCOUNT_NAME: &str = "AZURE_STORAGE_ACCOUNT_NAME";
    pub const AZURE_STORAGE_ACCOUNT_KEY: &str = "AZURE_STORAGE_ACCOUNT_KEY";
    pub const AZURE_STORAGE_APP_DIRECTORY: &str = "AZURE_STORAGE_APP_DIRECTORY";
    pub const AZURE_STORAGE_K8S_DIRECTORY: &str = "AZURE_STORAGE_K8S_DIRECTORY";
    pub const AZURE_STORAGE_TESK_TASKS_DIRECTORY: &str = "AZURE_STORAGE_TESK_TASKS_DIRECTORY";
    pub const AZURE_STORAGE_SAS_TTL: &str = "AZURE_STORAGE_SAS_TTL";

    pub const AZURE_ACR_NAME: &str = "AZURE_ACR_NAME";
    pub const AZURE_ACR_USER: &str = "AZURE_ACR_USER";
    pub const AZURE_ACR_USER_PWD: &str = "AZURE_ACR_USER_PWD";

    pub const TESK_API_ENDPOINT: &str = "TESK_API_ENDPOINT";
}

/// Configuration errors, raised before any remote call
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Container registry the pool pulls prefetched images from
#[derive(Debug)]
pub struct RegistryConfig {
    pub server: String,
    pub user: String,
    pub password: SecretString,
}

/// Account created on every pool node
#[derive(Debug)]
pub struct AdminUser {
    pub name: String,
    pub password: SecretString,
    pub elevation_level: ElevationLevel,
}

/// Process-wide session configuration
#[derive(Debug)]
pub struct EnvironmentConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,

    pub batch_account_name: String,
    pub batch_account_url: String,

    pub storage_account_name: String,
    pub storage_account_key: SecretString,
    /// Container holding start-task applications
    pub app_container: String,
    /// Container holding the deployment manifests
    pub k8s_container: String,
    /// Container holding the verification task payloads
    pub tesk_tasks_container: String,
    /// Lifetime of signed artifact URLs
    pub sas_ttl: Duration,

    pub registry: RegistryConfig,

    pub vm_image_id: String,
    pub vm_size: String,
    pub dedicated_node_count: u32,
    pub low_priority_node_count: u32,
    /// Node agent image the custom VM image must be compatible with
    pub image_selector: ImageSelector,

    pub admin: AdminUser,

    /// Endpoint the verification probes call on the node
    pub tesk_endpoint: String,

    /// How long the completion barrier waits for all tasks
    pub job_timeout: Duration,
    /// How often the completion barrier polls task state
    pub poll_interval: Duration,
}

impl EnvironmentConfig {
    /// Creates configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates configuration from any name -> value lookup
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let optional = |name: &'static str, default: &str| {
            get(name).unwrap_or_else(|| default.to_string())
        };
        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match get(name) {
                None => Ok(default),
                Some(value) => value.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                    name,
                    value,
                    reason: e.to_string(),
                }),
            }
        };
        let duration = |name: &'static str, default: u64, unit_secs: u64| -> Result<Duration, ConfigError> {
            let value = number(name, default)?;
            value
                .checked_mul(unit_secs)
                .map(Duration::from_secs)
                .ok_or_else(|| ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                    reason: "out of range".to_string(),
                })
        };
        let count = |name: &'static str, default: u64| -> Result<u32, ConfigError> {
            let value = number(name, default)?;
            u32::try_from(value).map_err(|e| ConfigError::Invalid {
                name,
                value: value.to_string(),
                reason: e.to_string(),
            })
        };

        let elevation_flag = optional(vars::AZURE_BATCH_USER_ELEVATION_LEVEL, "1");
        if !matches!(elevation_flag.trim(), "0" | "1") {
            return Err(ConfigError::Invalid {
                name: vars::AZURE_BATCH_USER_ELEVATION_LEVEL,
                value: elevation_flag,
                reason: "expected 0 (non-admin) or 1 (admin)".to_string(),
            });
        }

        Ok(Self {
            tenant_id: required(vars::AZURE_AD_TENANT_ID)?,
            client_id: required(vars::AZURE_AD_SP_CLIENT_ID)?,
            client_secret: SecretString::from(required(vars::AZURE_AD_SP_CLIENT_SECRET)?),
            batch_account_name: required(vars::AZURE_BATCH_ACCOUNT_NAME)?,
            batch_account_url: required(vars::AZURE_BATCH_ACCOUNT_URL)?,
            storage_account_name: required(vars::AZURE_STORAGE_ACCOUNT_NAME)?,
            storage_account_key: SecretString::from(required(vars::AZURE_STORAGE_ACCOUNT_KEY)?),
            app_container: required(vars::AZURE_STORAGE_APP_DIRECTORY)?,
            k8s_container: optional(vars::AZURE_STORAGE_K8S_DIRECTORY, "k8s"),
            tesk_tasks_container: optional(vars::AZURE_STORAGE_TESK_TASKS_DIRECTORY, "tesk-tasks"),
            sas_ttl: duration(vars::AZURE_STORAGE_SAS_TTL, 1, 3600)?,
            registry: RegistryConfig {
                server: required(vars::AZURE_ACR_NAME)?,
                user: required(vars::AZURE_ACR_USER)?,
                password: SecretString::from(required(vars::AZURE_ACR_USER_PWD)?),
            },
            vm_image_id: required(vars::AZURE_BATCH_VM_IMAGE_ID)?,
            vm_size: required(vars::AZURE_BATCH_VM_SIZE)?,
            dedicated_node_count: count(vars::AZURE_BATCH_VM_NODE_COUNT, 1)?,
            low_priority_node_count: count(vars::AZURE_BATCH_VM_LOW_PRIORITY_NODE_COUNT, 0)?,
            image_selector: ImageSelector {
                publisher: optional(vars::AZURE_BATCH_VM_IMAGE_PUBLISHER, "canonical"),
                offer: optional(vars::AZURE_BATCH_VM_IMAGE_OFFER, "ubuntuserver"),
                sku: optional(vars::AZURE_BATCH_VM_IMAGE_SKU, "18.04"),
            },
            admin: AdminUser {
                name: optional(vars::AZURE_BATCH_USER_NAME, "labuser"),
                password: SecretString::from(optional(vars::AZURE_BATCH_USER_PWD, "labtest!")),
                elevation_level: ElevationLevel::from_flag(&elevation_flag),
            },
            tesk_endpoint: optional(vars::TESK_API_ENDPOINT, "http://127.0.0.1:31882/v1/tasks"),
            job_timeout: duration(vars::AZURE_BATCH_JOB_TIMEOUT, 10, 60)?,
            poll_interval: Duration::from_secs(number(vars::AZURE_BATCH_POLL_INTERVAL, 5)?),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.batch_account_url).map_err(|e| ConfigError::Invalid {
            name: vars::AZURE_BATCH_ACCOUNT_URL,
            value: self.batch_account_url.clone(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid {
                name: vars::AZURE_BATCH_ACCOUNT_URL,
                value: self.batch_account_url.clone(),
                reason: "must start with http:// or https://".to_string(),
            });
        }

        if self.dedicated_node_count == 0 && self.low_priority_node_count == 0 {
            return Err(ConfigError::Invalid {
                name: vars::AZURE_BATCH_VM_NODE_COUNT,
                value: "0".to_string(),
                reason: "the pool needs at least one node".to_string(),
            });
        }

        if self.job_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: vars::AZURE_BATCH_JOB_TIMEOUT,
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: vars::AZURE_BATCH_POLL_INTERVAL,
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.sas_ttl.is_zero() {
            return Err(ConfigError::Invalid {
                name: vars::AZURE_STORAGE_SAS_TTL,
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
