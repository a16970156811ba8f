//! Shared wire types: pages, metadata items and error bodies

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One page of a list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ODataPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    /// Absolute URL of the next page, absent on the last one
    #[serde(rename = "odata.nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub name: String,
    pub value: String,
}

/// Converts a metadata map into wire items; empty maps are omitted
pub fn metadata_items(metadata: &BTreeMap<String, String>) -> Option<Vec<MetadataItem>> {
    if metadata.is_empty() {
        return None;
    }

    Some(
        metadata
            .iter()
            .map(|(name, value)| MetadataItem {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
    )
}

pub fn metadata_map(items: Option<Vec<MetadataItem>>) -> BTreeMap<String, String> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(|item| (item.name, item.value))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    #[serde(default)]
    pub lang: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub key: String,
    pub value: String,
}

/// Error body returned by the compute service on non-2xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<ErrorMessage>,
    #[serde(default)]
    pub values: Option<Vec<ErrorDetail>>,
}

impl BatchErrorBody {
    pub fn message_text(&self) -> Option<&str> {
        self.message.as_ref().map(|m| m.value.as_str())
    }
}

/// Error codes the compute service uses for idempotent creates
pub mod codes {
    pub const POOL_EXISTS: &str = "PoolExists";
    pub const JOB_EXISTS: &str = "JobExists";
    pub const TASK_EXISTS: &str = "TaskExists";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metadata_is_omitted() {
        assert!(metadata_items(&BTreeMap::new()).is_none());
    }

    #[test]
    fn test_metadata_round_trips_through_items() {
        let mut metadata = BTreeMap::new();
        metadata.insert("TaskRun".to_string(), "DESeq2Test".to_string());

        let items = metadata_items(&metadata);
        assert_eq!(items.as_ref().map(Vec::len), Some(1));
        assert_eq!(metadata_map(items), metadata);
    }

    #[test]
    fn test_error_body_parses_service_shape() {
        let body: BatchErrorBody = serde_json::from_str(
            r#"{"odata.metadata":"x","code":"PoolExists","message":{"lang":"en-US","value":"The specified pool already exists."}}"#,
        )
        .unwrap();

        assert_eq!(body.code.as_deref(), Some(codes::POOL_EXISTS));
        assert_eq!(body.message_text(), Some("The specified pool already exists."));
    }

    #[test]
    fn test_page_next_link() {
        let page: ODataPage<MetadataItem> = serde_json::from_str(
            r#"{"value":[{"name":"a","value":"b"}],"odata.nextLink":"https://acct/jobs/j/tasks?skiptoken=1"}"#,
        )
        .unwrap();

        assert_eq!(page.value.len(), 1);
        assert!(page.next_link.is_some());
    }
}
