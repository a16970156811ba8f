//! Pool domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::task::ResourceFile;

/// Reference to the OS image pool nodes boot from
///
/// Either a custom image (`virtual_machine_image_id`) or a marketplace
/// image (publisher/offer/sku/version).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_machine_image_id: Option<String>,
}

impl ImageReference {
    pub fn from_image_id(image_id: impl Into<String>) -> Self {
        Self {
            virtual_machine_image_id: Some(image_id.into()),
            ..Default::default()
        }
    }

    pub fn marketplace(
        publisher: impl Into<String>,
        offer: impl Into<String>,
        sku: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher: Some(publisher.into()),
            offer: Some(offer.into()),
            sku: Some(sku.into()),
            version: Some(version.into()),
            virtual_machine_image_id: None,
        }
    }
}

/// An image the compute service supports, with its node agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInformation {
    #[serde(rename = "nodeAgentSKUId")]
    pub node_agent_sku_id: String,
    pub image_reference: ImageReference,
    #[serde(default)]
    pub os_type: Option<String>,
    #[serde(default)]
    pub verification_type: Option<String>,
}

/// Expected publisher/offer/sku of the node agent image
///
/// Publisher and offer must match exactly; the sku only has to contain the
/// configured fragment (e.g. `18.04` matches `18.04-lts`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSelector {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
}

impl ImageSelector {
    pub fn matches(&self, image: &ImageInformation) -> bool {
        let reference = &image.image_reference;
        reference.publisher.as_deref() == Some(self.publisher.as_str())
            && reference.offer.as_deref() == Some(self.offer.as_str())
            && reference
                .sku
                .as_deref()
                .is_some_and(|sku| sku.contains(self.sku.as_str()))
    }
}

impl fmt::Display for ImageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/*{}*", self.publisher, self.offer, self.sku)
    }
}

/// Private container registry the nodes pull prefetched images from
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRegistry {
    pub registry_server: String,
    pub user_name: String,
    pub password: String,
}

impl fmt::Debug for ContainerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRegistry")
            .field("registry_server", &self.registry_server)
            .field("user_name", &self.user_name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Container images prefetched onto every node when it joins the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfiguration {
    pub image_names: Vec<String>,
    pub registries: Vec<ContainerRegistry>,
}

/// VM image plus the node agent that drives it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachineConfiguration {
    pub image_reference: ImageReference,
    pub node_agent_sku_id: String,
    pub container_configuration: Option<ContainerConfiguration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElevationLevel {
    Admin,
    NonAdmin,
}

impl ElevationLevel {
    /// `"1"` is admin, anything else non-admin
    pub fn from_flag(flag: &str) -> Self {
        if flag.trim() == "1" {
            ElevationLevel::Admin
        } else {
            ElevationLevel::NonAdmin
        }
    }
}

/// Local account created on every pool node
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub name: String,
    pub password: String,
    pub elevation_level: ElevationLevel,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl fmt::Debug for UserAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAccount")
            .field("name", &self.name)
            .field("password", &"[REDACTED]")
            .field("elevation_level", &self.elevation_level)
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .finish()
    }
}

/// Command every node runs as soon as it joins the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTask {
    pub command_line: String,
    pub resource_files: Vec<ResourceFile>,
    /// Account to run as; `None` runs as the pool's default identity
    pub user_name: Option<String>,
    pub max_task_retry_count: i32,
    /// Nodes only accept tasks once the start task succeeded
    pub wait_for_success: bool,
}

/// Pool to create on the compute service
///
/// Identity key is `pool_id`. Never mutated after creation by this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDescriptor {
    pub pool_id: String,
    pub vm_size: String,
    pub dedicated_count: u32,
    /// Spot capacity; zero unless configured
    pub low_priority_count: u32,
    pub vm_configuration: VirtualMachineConfiguration,
    pub start_task: Option<StartTask>,
    pub user_account: Option<UserAccount>,
    pub metadata: BTreeMap<String, String>,
}

/// A pool as observed on the compute service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub vm_size: Option<String>,
    pub state: Option<String>,
    pub current_dedicated_nodes: u32,
    pub current_low_priority_nodes: u32,
    pub target_dedicated_nodes: u32,
    pub target_low_priority_nodes: u32,
    pub metadata: BTreeMap<String, String>,
}

/// Result of ensuring a pool exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub pool_id: String,
    /// `false` when the pool already existed and was reused
    pub created: bool,
    pub dedicated_nodes: u32,
    pub low_priority_nodes: u32,
}
