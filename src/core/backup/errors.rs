// src/core/backup/errors.rs

//! Error-classification table (§4.3.7): maps an OpenSearch error response
//! into a `BackupServiceState`.

use crate::core::backup::state::BackupServiceState;

/// One OpenSearch `root_cause` entry.
#[derive(Debug, Clone)]
pub struct RootCause<'a> {
    pub error_type: &'a str,
    pub reason: &'a str,
}

/// Classifies an OpenSearch error response per the §4.3.7 table. When no
/// root cause is present, falls back to inspecting the raw body for
/// in-progress/partial/incompatible/failed keywords.
pub fn classify_snapshot_error(root_cause: Option<RootCause<'_>>, body: &str) -> BackupServiceState {
    let Some(rc) = root_cause else {
        return classify_from_body(body);
    };

    match rc.error_type {
        "repository_exception" if rc.reason.contains("repository type does not exist") => {
            BackupServiceState::RepoNotCreated
        }
        "repository_exception" if rc.reason.contains("Could not determine repository generation") => {
            BackupServiceState::RepoCreationErr
        }
        "repository_exception" => BackupServiceState::RepoErrUnknown,
        "repository_missing_exception" => BackupServiceState::RepoMissing,
        "repository_verification_exception" if rc.reason.contains("is not accessible") => {
            BackupServiceState::RepoUnreachable
        }
        "illegal_argument_exception" => BackupServiceState::IllegalArgument,
        "snapshot_missing_exception" => BackupServiceState::SnapshotMissing,
        "snapshot_restore_exception" if rc.reason.contains("open index with same name already exists") => {
            BackupServiceState::SnapshotRestoreErrorIndexNotClosed
        }
        "snapshot_restore_exception" => BackupServiceState::SnapshotRestoreError,
        _ => classify_from_body(body),
    }
}

fn classify_from_body(body: &str) -> BackupServiceState {
    let lower = body.to_lowercase();
    if lower.contains("in_progress") {
        BackupServiceState::SnapshotInProgress
    } else if lower.contains("partial") {
        BackupServiceState::SnapshotPartiallyTaken
    } else if lower.contains("incompatible") {
        BackupServiceState::SnapshotIncompatibility
    } else if lower.contains("failed") {
        BackupServiceState::SnapshotFailedUnknown
    } else {
        BackupServiceState::ResponseFailedNetwork
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_exception_variants() {
        assert_eq!(
            classify_snapshot_error(
                Some(RootCause {
                    error_type: "repository_exception",
                    reason: "repository type does not exist",
                }),
                ""
            ),
            BackupServiceState::RepoNotCreated
        );
        assert_eq!(
            classify_snapshot_error(
                Some(RootCause {
                    error_type: "repository_exception",
                    reason: "Could not determine repository generation",
                }),
                ""
            ),
            BackupServiceState::RepoCreationErr
        );
        assert_eq!(
            classify_snapshot_error(
                Some(RootCause {
                    error_type: "repository_exception",
                    reason: "some other thing",
                }),
                ""
            ),
            BackupServiceState::RepoErrUnknown
        );
    }

    #[test]
    fn snapshot_restore_variants() {
        assert_eq!(
            classify_snapshot_error(
                Some(RootCause {
                    error_type: "snapshot_restore_exception",
                    reason: "open index with same name already exists",
                }),
                ""
            ),
            BackupServiceState::SnapshotRestoreErrorIndexNotClosed
        );
        assert_eq!(
            classify_snapshot_error(
                Some(RootCause {
                    error_type: "snapshot_restore_exception",
                    reason: "other",
                }),
                ""
            ),
            BackupServiceState::SnapshotRestoreError
        );
    }

    #[test]
    fn no_root_cause_inspects_body() {
        assert_eq!(
            classify_snapshot_error(None, "snapshot IN_PROGRESS right now"),
            BackupServiceState::SnapshotInProgress
        );
        assert_eq!(
            classify_snapshot_error(None, "completely unrelated text"),
            BackupServiceState::ResponseFailedNetwork
        );
    }
}
