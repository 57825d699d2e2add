// src/core/backup/mod.rs

//! Backup/Snapshot Coordinator (C9, §4.3): resolves the active object-storage
//! backend, registers/verifies the repository, runs snapshot/restore, and
//! propagates credentials and CA material across the fleet.

pub mod credentials;
pub mod errors;
pub mod repository;
pub mod restore;
pub mod snapshot;
pub mod state;

pub use errors::{classify_snapshot_error, RootCause};
pub use state::{Backend, BackendSource, BackupServiceState, SnapshotCredentials};

use crate::core::topology::HealthColor;

/// How many active integrator relations were detected for this app
/// (§4.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendResolution {
    None,
    Resolved(Backend, BackendSource),
    Conflict,
}

/// Resolves the active backend per §4.3.1's detection table.
pub fn resolve_backend(
    integrator_backends: &[Backend],
    peer_cluster_backend: Option<Backend>,
    is_main_orchestrator: bool,
) -> BackendResolution {
    if is_main_orchestrator {
        match integrator_backends.len() {
            0 => BackendResolution::None,
            1 => BackendResolution::Resolved(integrator_backends[0], BackendSource::Integrator),
            _ => BackendResolution::Conflict,
        }
    } else {
        match integrator_backends.len() {
            0 => match peer_cluster_backend {
                Some(b) => BackendResolution::Resolved(b, BackendSource::PeerCluster),
                None => BackendResolution::None,
            },
            1 => BackendResolution::Resolved(integrator_backends[0], BackendSource::Integrator),
            _ => BackendResolution::Conflict,
        }
    }
}

/// Ordered prerequisite check shared by every backup action (§4.3.6). The
/// first failing check's message is returned.
pub struct PrerequisiteInputs {
    pub is_leader: bool,
    pub deployment_ready: bool,
    pub in_upgrade: bool,
    pub backend: BackendResolution,
    pub cluster_reachable: bool,
    pub repo_created: bool,
    pub peer_cluster_bypass: bool,
    pub health: HealthColor,
    pub backup_or_restore_in_progress: bool,
}

pub fn check_prerequisites(inputs: &PrerequisiteInputs) -> Result<(), &'static str> {
    if !inputs.is_leader {
        return Err("only the leader may perform backup actions");
    }
    if !inputs.deployment_ready {
        return Err("deployment description is not ready");
    }
    if inputs.in_upgrade {
        return Err("an upgrade is in progress");
    }
    match inputs.backend {
        BackendResolution::None => return Err("no backup backend configured"),
        BackendResolution::Conflict => return Err("more than one backup backend is related"),
        BackendResolution::Resolved(..) => {}
    }
    if !inputs.cluster_reachable {
        return Err("cluster is not reachable");
    }
    if !inputs.repo_created && !inputs.peer_cluster_bypass {
        return Err("snapshot repository is not created");
    }
    match inputs.health {
        HealthColor::Green => {}
        HealthColor::Red => return Err("cluster health is RED"),
        HealthColor::YellowTemp => return Err("shards relocating"),
        HealthColor::Unknown => return Err("cluster health is unknown"),
        HealthColor::Yellow | HealthColor::Ignore => {}
    }
    if inputs.backup_or_restore_in_progress {
        return Err("a backup or restore operation is already in progress");
    }
    Ok(())
}
