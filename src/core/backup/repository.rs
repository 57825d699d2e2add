// src/core/backup/repository.rs

//! Snapshot repository lifecycle (§4.3.2 step 6, §4.3.6, §6.3).

use crate::core::backup::state::{Backend, SYSTEM_INDICES};
use crate::core::errors::OperatorError;
use crate::core::opensearch_client::OpenSearchClient;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

pub const REPO_MUTATION_RETRIES: u32 = 3;
pub const REPO_MUTATION_WAIT: Duration = Duration::from_secs(3);

/// The index-exclusion list for every snapshot/restore call: the fixed
/// system indices plus this unit's node-lock index (§4.3.3).
pub fn excluded_indices(node_lock_index: &str) -> Vec<String> {
    let mut excluded: Vec<String> = SYSTEM_INDICES.iter().map(|s| s.to_string()).collect();
    excluded.push(node_lock_index.to_string());
    excluded
}

/// Renders the `"*, -<system-indices>"` index pattern consumed by
/// `_snapshot/{repo}/{id}` (§4.3.3).
pub fn index_pattern(node_lock_index: &str) -> String {
    let mut parts = vec!["*".to_string()];
    parts.extend(excluded_indices(node_lock_index).into_iter().map(|i| format!("-{i}")));
    parts.join(",")
}

fn repo_settings(backend: &Backend, bucket_or_container: &str, region_or_endpoint: Option<&str>) -> Value {
    match backend {
        Backend::S3 => json!({
            "type": "s3",
            "settings": {
                "bucket": bucket_or_container,
                "base_path": "opensearch-snapshots",
                "region": region_or_endpoint,
            }
        }),
        Backend::Azure => json!({
            "type": "azure",
            "settings": {
                "client": "default",
                "container": bucket_or_container,
                "base_path": "opensearch-snapshots",
            }
        }),
        Backend::Gcs => json!({ "type": "gcs" }),
    }
}

/// Registers or updates the repository (§4.3.2 step 6); retried with fixed
/// backoff on failure.
pub async fn register_repository(
    client: &OpenSearchClient,
    host: &str,
    repo: &str,
    backend: &Backend,
    bucket_or_container: &str,
    region_or_endpoint: Option<&str>,
) -> Result<(), OperatorError> {
    if matches!(backend, Backend::Gcs) {
        return Err(OperatorError::Unsupported("gcs".into()));
    }
    let body = repo_settings(backend, bucket_or_container, region_or_endpoint);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match client
            .request(
                Method::PUT,
                host,
                &format!("/_snapshot/{repo}"),
                Some(body.clone()),
                0,
                Duration::from_secs(10),
                &[],
            )
            .await
        {
            Ok(_) => {
                info!("registered snapshot repository {}", repo);
                return Ok(());
            }
            Err(e) if attempt < REPO_MUTATION_RETRIES => {
                tokio::time::sleep(REPO_MUTATION_WAIT).await;
                let _ = e;
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Deletes the repository; idempotent against a missing repo (§4.3.2
/// credentials-gone).
pub async fn delete_repository(client: &OpenSearchClient, host: &str, repo: &str) -> Result<(), OperatorError> {
    match client
        .request(
            Method::DELETE,
            host,
            &format!("/_snapshot/{repo}"),
            None,
            0,
            Duration::from_secs(10),
            &[],
        )
        .await
    {
        Ok(_) => Ok(()),
        Err(OperatorError::OpenSearchStatus { status, .. }) if status == 404 => Ok(()),
        Err(e) => Err(e),
    }
}
