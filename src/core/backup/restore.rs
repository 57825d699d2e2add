// src/core/backup/restore.rs

//! Restore (§4.3.4).

use crate::core::backup::repository::index_pattern;
use crate::core::backup::state::BackupServiceState;
use crate::core::errors::OperatorError;
use crate::core::opensearch_client::{OpenSearchClient, DEFAULT_RETRIES, RESTORE_TIMEOUT};
use crate::core::topology::{HealthColor, IndexInfo, IndexState};
use reqwest::Method;
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Success,
    SuccessWithWarning,
    PartialFailure { missing: Vec<String> },
}

impl RestoreOutcome {
    /// Human-readable status message published for this outcome (§4.3.4 step
    /// 5); `None` for the two success variants, which carry no status text.
    pub fn status_message(&self) -> Option<String> {
        match self {
            RestoreOutcome::PartialFailure { missing } => {
                Some(format!("Failed to restore {} indices.", missing.len()))
            }
            _ => None,
        }
    }
}

/// Step 2: closes any currently-open non-system indices the snapshot
/// contains, returning which ones could not be closed (§4.3.4).
pub async fn close_indices_for_restore(
    client: &OpenSearchClient,
    host: &str,
    snapshot_indices: &[String],
    current: &[IndexInfo],
) -> Vec<String> {
    let mut failed = Vec::new();
    let open: BTreeSet<&str> = current
        .iter()
        .filter(|i| i.state == IndexState::Open)
        .map(|i| i.name.as_str())
        .collect();

    for index in snapshot_indices {
        if !open.contains(index.as_str()) {
            continue;
        }
        if client
            .request(
                Method::POST,
                host,
                &format!("/{index}/_close"),
                None,
                DEFAULT_RETRIES,
                Duration::from_secs(10),
                &[],
            )
            .await
            .is_err()
        {
            failed.push(index.clone());
        }
    }
    failed
}

/// Step 3: submits the restore request.
pub async fn submit_restore(
    client: &OpenSearchClient,
    host: &str,
    repo: &str,
    snapshot_id: &str,
    node_lock_index: &str,
) -> Result<(), OperatorError> {
    let body = json!({
        "indices": index_pattern(node_lock_index),
        "ignore_unavailable": true,
        "include_global_state": false,
    });
    client
        .request(
            Method::POST,
            host,
            &format!("/_snapshot/{repo}/{snapshot_id}/_restore?wait_for_completion=true"),
            Some(body),
            DEFAULT_RETRIES,
            RESTORE_TIMEOUT,
            &[],
        )
        .await?;
    Ok(())
}

/// One `_cat/recovery` entry relevant to the sanity check in step 4.
#[derive(Debug, Clone)]
pub struct RecoveryEntry {
    pub index: String,
    pub recovery_type: String,
    pub repository: String,
    pub snapshot: String,
    pub stage: String,
}

/// Step 4: the set of `(type=snapshot, repository=repo, snapshot=id,
/// stage=done)` recoveries must cover `expected_indices`; returns the
/// missing subset (§4.3.4).
pub fn missing_recoveries(
    recoveries: &[RecoveryEntry],
    repo: &str,
    snapshot_id: &str,
    expected_indices: &[String],
) -> Vec<String> {
    let done: BTreeSet<&str> = recoveries
        .iter()
        .filter(|r| r.recovery_type == "snapshot" && r.repository == repo && r.snapshot == snapshot_id && r.stage == "done")
        .map(|r| r.index.as_str())
        .collect();

    expected_indices
        .iter()
        .filter(|idx| !done.contains(idx.as_str()))
        .cloned()
        .collect()
}

/// Step 5: green within 30s ⇒ success; yellow-without-relocating ⇒
/// success_with_warning; otherwise the caller should defer and retry.
pub fn classify_post_restore_health(health: HealthColor, missing: &[String]) -> Option<RestoreOutcome> {
    if !missing.is_empty() {
        return Some(RestoreOutcome::PartialFailure {
            missing: missing.to_vec(),
        });
    }
    match health {
        HealthColor::Green => Some(RestoreOutcome::Success),
        HealthColor::Yellow => Some(RestoreOutcome::SuccessWithWarning),
        _ => None,
    }
}

/// `SnapshotMissing` failure for step 1 (§4.3.4).
pub fn snapshot_missing_state() -> BackupServiceState {
    BackupServiceState::SnapshotMissing
}
