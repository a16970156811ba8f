//! Integration tests for resource location against a signing store.

mod common;

use batchflow_engine::ResourceLocator;
use chrono::{DateTime, Utc};
use common::FakeStore;
use std::sync::Arc;
use url::Url;

fn expiry(signed_url: &str) -> DateTime<Utc> {
    let url = Url::parse(signed_url).unwrap();
    let (_, se) = url.query_pairs().find(|(name, _)| name == "se").unwrap();
    DateTime::parse_from_rfc3339(&se).unwrap().with_timezone(&Utc)
}

#[tokio::test]
async fn folder_prefix_selects_only_its_objects() {
    let store = FakeStore::new(&[
        ("tesk-tasks", "Env/a.json"),
        ("tesk-tasks", "Env/b.json"),
        ("tesk-tasks", "Other/c.json"),
    ]);
    let locator = ResourceLocator::new(Arc::new(store));

    let files = locator.get_resource_files("tesk-tasks", "Env").await.unwrap();

    let paths: Vec<_> = files.iter().map(|f| f.file_path.as_str()).collect();
    assert_eq!(paths, vec!["Env/a.json", "Env/b.json"]);

    let now = Utc::now();
    for file in &files {
        assert!(file.http_url.contains("/tesk-tasks/Env/"));
        assert!(expiry(&file.http_url) > now);
    }
}

#[tokio::test]
async fn unmatched_prefix_is_empty() {
    let locator = ResourceLocator::new(Arc::new(FakeStore::seeded()));
    let files = locator.get_resource_files("tesk-tasks", "Stdout").await.unwrap();
    assert!(files.is_empty());
}
