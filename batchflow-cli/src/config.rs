//! Configuration module
//!
//! Resolves the environment once and wires the remote clients, the
//! resource locator and the workflow registry from it.

use anyhow::{Context, Result};
use batchflow_client::{BatchClient, BlobClient, ClientCredentialsProvider};
use batchflow_engine::{
    EnvironmentConfig, ResourceLocator, WorkflowContext, WorkflowRegistry, WorkflowSettings,
};
use std::sync::Arc;
use tracing::info;

/// Everything a command needs to talk to the services
pub struct Services {
    pub config: Arc<EnvironmentConfig>,
    pub compute: Arc<BatchClient>,
    pub locator: Arc<ResourceLocator>,
    pub registry: Arc<WorkflowRegistry>,
}

impl Services {
    /// Loads and validates the environment, then builds the clients
    pub fn from_env() -> Result<Self> {
        let config = EnvironmentConfig::from_env().context("Failed to load configuration")?;
        config.validate().context("Invalid configuration")?;
        info!(
            "Loaded configuration: batch account {}, storage account {}",
            config.batch_account_name, config.storage_account_name
        );

        let tokens = ClientCredentialsProvider::new(
            &config.tenant_id,
            config.client_id.clone(),
            config.client_secret.clone(),
        );
        let compute = Arc::new(BatchClient::new(
            config.batch_account_url.clone(),
            Arc::new(tokens),
        ));

        let store = BlobClient::new(&config.storage_account_name, &config.storage_account_key)
            .context("Failed to create object store client")?;
        let locator = Arc::new(ResourceLocator::with_ttl(Arc::new(store), config.sas_ttl));

        let context = WorkflowContext::new(Arc::clone(&locator), WorkflowSettings::from_config(&config));
        let registry = Arc::new(WorkflowRegistry::with_builtin(context)?);

        Ok(Self {
            config: Arc::new(config),
            compute,
            locator,
            registry,
        })
    }
}
