//! Job DTOs

use serde::{Deserialize, Serialize};

use crate::domain::job::JobDescriptor;
use crate::dto::common::{MetadataItem, metadata_items};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInformation {
    pub pool_id: String,
}

/// Body of `POST /jobs`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAddParameter {
    pub id: String,
    pub pool_info: PoolInformation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<MetadataItem>>,
}

impl From<&JobDescriptor> for JobAddParameter {
    fn from(job: &JobDescriptor) -> Self {
        Self {
            id: job.job_id.clone(),
            pool_info: PoolInformation {
                pool_id: job.pool_id.clone(),
            },
            metadata: metadata_items(&job.metadata),
        }
    }
}
