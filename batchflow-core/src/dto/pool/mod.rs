//! Pool DTOs

use serde::{Deserialize, Serialize};

use crate::domain::pool::{
    ContainerConfiguration, ElevationLevel, ImageReference, Pool, PoolDescriptor, StartTask,
    UserAccount, VirtualMachineConfiguration,
};
use crate::domain::task::ResourceFile;
use crate::dto::common::{MetadataItem, metadata_items, metadata_map};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRegistryWire {
    pub registry_server: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfigurationWire {
    #[serde(rename = "type")]
    pub kind: String,
    pub container_image_names: Vec<String>,
    pub container_registries: Vec<ContainerRegistryWire>,
}

impl From<&ContainerConfiguration> for ContainerConfigurationWire {
    fn from(config: &ContainerConfiguration) -> Self {
        Self {
            kind: "dockerCompatible".to_string(),
            container_image_names: config.image_names.clone(),
            container_registries: config
                .registries
                .iter()
                .map(|r| ContainerRegistryWire {
                    registry_server: r.registry_server.clone(),
                    username: r.user_name.clone(),
                    password: r.password.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineConfigurationWire {
    pub image_reference: ImageReference,
    #[serde(rename = "nodeAgentSKUId")]
    pub node_agent_sku_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_configuration: Option<ContainerConfigurationWire>,
}

impl From<&VirtualMachineConfiguration> for VirtualMachineConfigurationWire {
    fn from(config: &VirtualMachineConfiguration) -> Self {
        Self {
            image_reference: config.image_reference.clone(),
            node_agent_sku_id: config.node_agent_sku_id.clone(),
            container_configuration: config
                .container_configuration
                .as_ref()
                .map(ContainerConfigurationWire::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentityWire {
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTaskWire {
    pub command_line: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_files: Vec<ResourceFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_identity: Option<UserIdentityWire>,
    pub max_task_retry_count: i32,
    pub wait_for_success: bool,
}

impl From<&StartTask> for StartTaskWire {
    fn from(task: &StartTask) -> Self {
        Self {
            command_line: task.command_line.clone(),
            resource_files: task.resource_files.clone(),
            user_identity: task.user_name.as_ref().map(|name| UserIdentityWire {
                user_name: name.clone(),
            }),
            max_task_retry_count: task.max_task_retry_count,
            wait_for_success: task.wait_for_success,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinuxUserConfigurationWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccountWire {
    pub name: String,
    pub password: String,
    pub elevation_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linux_user_configuration: Option<LinuxUserConfigurationWire>,
}

impl From<&UserAccount> for UserAccountWire {
    fn from(account: &UserAccount) -> Self {
        let elevation_level = match account.elevation_level {
            ElevationLevel::Admin => "admin",
            ElevationLevel::NonAdmin => "nonadmin",
        };
        let linux_user_configuration = if account.uid.is_some() || account.gid.is_some() {
            Some(LinuxUserConfigurationWire {
                uid: account.uid,
                gid: account.gid,
            })
        } else {
            None
        };

        Self {
            name: account.name.clone(),
            password: account.password.clone(),
            elevation_level: elevation_level.to_string(),
            linux_user_configuration,
        }
    }
}

/// Body of `POST /pools`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolAddParameter {
    pub id: String,
    pub vm_size: String,
    pub virtual_machine_configuration: VirtualMachineConfigurationWire,
    pub target_dedicated_nodes: u32,
    pub target_low_priority_nodes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_task: Option<StartTaskWire>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_accounts: Vec<UserAccountWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<MetadataItem>>,
}

impl From<&PoolDescriptor> for PoolAddParameter {
    fn from(pool: &PoolDescriptor) -> Self {
        Self {
            id: pool.pool_id.clone(),
            vm_size: pool.vm_size.clone(),
            virtual_machine_configuration: VirtualMachineConfigurationWire::from(
                &pool.vm_configuration,
            ),
            target_dedicated_nodes: pool.dedicated_count,
            target_low_priority_nodes: pool.low_priority_count,
            start_task: pool.start_task.as_ref().map(StartTaskWire::from),
            user_accounts: pool.user_account.iter().map(UserAccountWire::from).collect(),
            metadata: metadata_items(&pool.metadata),
        }
    }
}

/// Body of `GET /pools/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    pub id: String,
    #[serde(default)]
    pub vm_size: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub current_dedicated_nodes: Option<u32>,
    #[serde(default)]
    pub current_low_priority_nodes: Option<u32>,
    #[serde(default)]
    pub target_dedicated_nodes: Option<u32>,
    #[serde(default)]
    pub target_low_priority_nodes: Option<u32>,
    #[serde(default)]
    pub metadata: Option<Vec<MetadataItem>>,
}

impl From<PoolInfo> for Pool {
    fn from(info: PoolInfo) -> Self {
        Self {
            id: info.id,
            vm_size: info.vm_size,
            state: info.state,
            current_dedicated_nodes: info.current_dedicated_nodes.unwrap_or(0),
            current_low_priority_nodes: info.current_low_priority_nodes.unwrap_or(0),
            target_dedicated_nodes: info.target_dedicated_nodes.unwrap_or(0),
            target_low_priority_nodes: info.target_low_priority_nodes.unwrap_or(0),
            metadata: metadata_map(info.metadata),
        }
    }
}
