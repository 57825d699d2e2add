// src/core/errors.rs

//! Defines the primary error type for the operator.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the operator.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait
/// implementations for the collaborators this crate calls out to (§1, §6).
#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("OpenSearch returned HTTP status {status}: {body}")]
    OpenSearchStatus { status: u16, body: String },

    #[error("OpenSearch call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport error talking to {addr}: {source}")]
    Transport { addr: String, source: String },

    #[error("JSON (de)serialization error: {0}")]
    Json(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cluster-manager role removal is forbidden once a cluster is formed")]
    CmRoleRemovalForbidden,

    #[error("cluster_manager and voting_only roles cannot be both set on the same nodes.")]
    CmVoRolesProvidedInvalid,

    #[error("data role removal forbidden: no other app in the fleet carries a data node")]
    DataRoleRemovalForbidden,

    #[error("node lock could not be acquired")]
    LockUnavailable,

    #[error("node lock held by a different unit")]
    LockNotOwned,

    #[error("backup relation conflict: more than one integrator relation is active")]
    BackupRelConflict,

    #[error("backup credentials are incorrect or unreachable: {0}")]
    BackupCredentialIncorrect(String),

    #[error("unsupported snapshot backend: {0}")]
    Unsupported(String),

    #[error("TLS is not fully configured for this unit")]
    TlsNotConfigured,

    #[error("quorum unmet: {0}")]
    QuorumUnmet(String),

    #[error("operation deferred: {0}")]
    Deferred(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Clone for OperatorError {
    fn clone(&self) -> Self {
        match self {
            Self::Io(e) => Self::Io(Arc::clone(e)),
            Self::HttpClient(s) => Self::HttpClient(s.clone()),
            Self::OpenSearchStatus { status, body } => Self::OpenSearchStatus {
                status: *status,
                body: body.clone(),
            },
            Self::Timeout(d) => Self::Timeout(*d),
            Self::Transport { addr, source } => Self::Transport {
                addr: addr.clone(),
                source: source.clone(),
            },
            Self::Json(s) => Self::Json(s.clone()),
            Self::InvalidConfig(s) => Self::InvalidConfig(s.clone()),
            Self::CmRoleRemovalForbidden => Self::CmRoleRemovalForbidden,
            Self::CmVoRolesProvidedInvalid => Self::CmVoRolesProvidedInvalid,
            Self::DataRoleRemovalForbidden => Self::DataRoleRemovalForbidden,
            Self::LockUnavailable => Self::LockUnavailable,
            Self::LockNotOwned => Self::LockNotOwned,
            Self::BackupRelConflict => Self::BackupRelConflict,
            Self::BackupCredentialIncorrect(s) => Self::BackupCredentialIncorrect(s.clone()),
            Self::Unsupported(s) => Self::Unsupported(s.clone()),
            Self::TlsNotConfigured => Self::TlsNotConfigured,
            Self::QuorumUnmet(s) => Self::QuorumUnmet(s.clone()),
            Self::Deferred(s) => Self::Deferred(s.clone()),
            Self::Internal(s) => Self::Internal(s.clone()),
        }
    }
}

impl PartialEq for OperatorError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Io(a), Self::Io(b)) => a.to_string() == b.to_string(),
            (Self::HttpClient(a), Self::HttpClient(b)) => a == b,
            (
                Self::OpenSearchStatus {
                    status: s1,
                    body: b1,
                },
                Self::OpenSearchStatus {
                    status: s2,
                    body: b2,
                },
            ) => s1 == s2 && b1 == b2,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::InvalidConfig(a), Self::InvalidConfig(b)) => a == b,
            (Self::BackupCredentialIncorrect(a), Self::BackupCredentialIncorrect(b)) => a == b,
            (Self::Unsupported(a), Self::Unsupported(b)) => a == b,
            (Self::QuorumUnmet(a), Self::QuorumUnmet(b)) => a == b,
            (Self::Deferred(a), Self::Deferred(b)) => a == b,
            (Self::Internal(a), Self::Internal(b)) => a == b,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl From<std::io::Error> for OperatorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<reqwest::Error> for OperatorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(std::time::Duration::from_secs(0))
        } else if let Some(status) = e.status() {
            Self::OpenSearchStatus {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            Self::HttpClient(e.to_string())
        }
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

impl From<url::ParseError> for OperatorError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidConfig(format!("invalid URL: {e}"))
    }
}

impl From<config::ConfigError> for OperatorError {
    fn from(e: config::ConfigError) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}
