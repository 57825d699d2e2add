// src/core/backup/snapshot.rs

//! Snapshot creation (§4.3.3).

use crate::core::backup::repository::index_pattern;
use crate::core::errors::OperatorError;
use crate::core::opensearch_client::{OpenSearchClient, DEFAULT_RETRIES};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::json;
use std::time::Duration;

/// `snapshot_id = now().utc().strftime("%Y-%m-%dT%H:%M:%SZ").lowercase()`
/// (§4.3.3 step 2).
pub fn snapshot_id(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%SZ").to_string().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    pub backup_id: String,
    pub status: String,
}

/// Invokes `PUT _snapshot/{repo}/{id}?wait_for_completion=false` with the
/// system-index exclusion rule (§4.3.3 step 3).
pub async fn take_snapshot(
    client: &OpenSearchClient,
    host: &str,
    repo: &str,
    node_lock_index: &str,
    now: DateTime<Utc>,
) -> Result<SnapshotHandle, OperatorError> {
    let id = snapshot_id(now);
    let body = json!({
        "indices": index_pattern(node_lock_index),
        "ignore_unavailable": true,
        "include_global_state": true,
    });
    client
        .request(
            Method::PUT,
            host,
            &format!("/_snapshot/{repo}/{id}?wait_for_completion=false"),
            Some(body),
            DEFAULT_RETRIES,
            Duration::from_secs(30),
            &[],
        )
        .await?;
    Ok(SnapshotHandle {
        backup_id: id,
        status: "IN_PROGRESS".to_string(),
    })
}
