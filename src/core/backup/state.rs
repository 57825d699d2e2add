// src/core/backup/state.rs

//! Backup entities (§3, §4.3): snapshot backends, credentials, and service
//! state.

use serde::{Deserialize, Serialize};

/// System indices excluded from every snapshot/restore operation (§4.3.3).
pub const SYSTEM_INDICES: [&str; 2] = [".opendistro_security", ".opensearch-sap-log-types-config"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    S3,
    Azure,
    Gcs,
}

/// Whether the active backend came from a local integrator relation or was
/// inherited from the main orchestrator over the peer-cluster relation
/// (§4.3.1 "`*_PCLUSTER` variant").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSource {
    Integrator,
    PeerCluster,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub tls_ca_chain: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureCredentials {
    pub storage_account: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcsCredentials {
    pub service_account_key: String,
}

/// `Snapshot Credentials`: a sum type tagged by backend (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SnapshotCredentials {
    S3(S3Credentials),
    Azure(AzureCredentials),
    Gcs(GcsCredentials),
}

impl SnapshotCredentials {
    pub fn backend(&self) -> Backend {
        match self {
            SnapshotCredentials::S3(_) => Backend::S3,
            SnapshotCredentials::Azure(_) => Backend::Azure,
            SnapshotCredentials::Gcs(_) => Backend::Gcs,
        }
    }
}

/// `BackupServiceState` (§3): sum type covering the backup subsystem's
/// observable states and error classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupServiceState {
    Success,
    SnapshotInProgress,
    SnapshotPartiallyTaken,
    SnapshotIncompatibility,
    SnapshotFailedUnknown,
    RestoreInProgress,
    SnapshotMissing,
    SnapshotRestoreError,
    SnapshotRestoreErrorIndexNotClosed,
    RepoNotCreated,
    RepoCreationErr,
    RepoErrUnknown,
    RepoMissing,
    RepoUnreachable,
    RepoNotCreatedAlreadyExists,
    IllegalArgument,
    ResponseFailedNetwork,
}
