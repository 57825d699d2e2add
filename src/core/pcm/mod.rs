// src/core/pcm/mod.rs

//! Peer-Cluster Manager (C6, §4.1): determines what this app is (main /
//! failover / other), derives start mode, and publishes the
//! `DeploymentDescription` that drives every other component.

pub mod promotion;
pub mod quorum;
pub mod reconcile;
pub mod state;

pub use state::{
    DeploymentDescription, DeploymentType, Directive, PeerClusterApp, PeerClusterConfig,
    PeerClusterOrchestrators, Profile, StartMode, State,
};

use crate::core::app::App;
use crate::core::errors::OperatorError;
use crate::core::node::Node;

/// Data carried by a peer-cluster relation-changed event, consumed by
/// `run_with_relation_data` (§4.1.6).
#[derive(Debug, Clone)]
pub struct PeerClusterRelationData {
    pub remote_cluster_name: Option<String>,
    pub cm_nodes: Vec<Node>,
}

/// Drives the per-app state machine: recomputes and (if changed) advances a
/// `DeploymentDescription` (§4.1.6).
pub struct PeerClusterManager {
    pub app: App,
}

impl PeerClusterManager {
    pub fn new(app: App) -> Self {
        Self { app }
    }

    /// `run()`: recompute the description from the current config, creating
    /// it on first evaluation (§4.1.1) or reconciling role changes against
    /// the prior one (§4.1.2), then re-derive `typ` (§4.1.3).
    pub fn run(
        &self,
        existing: Option<DeploymentDescription>,
        config: PeerClusterConfig,
        has_peer_cluster_relation: bool,
        fleet_has_other_data_node: bool,
        now: f64,
    ) -> Result<DeploymentDescription, OperatorError> {
        match existing {
            None => Ok(reconcile::new_cluster_setup(
                self.app.clone(),
                config,
                has_peer_cluster_relation,
                now,
            )),
            Some(mut desc) => {
                if desc.config.init_hold && !config.init_hold {
                    desc.config.init_hold = false;
                }
                let new_roles = config.roles.clone();
                reconcile::reconcile_roles(&mut desc, new_roles, fleet_has_other_data_node)?;
                reconcile::refresh_deployment_type(&mut desc, now);
                Ok(desc)
            }
        }
    }

    /// `run_with_relation_data(data)`: merges an inherited/validated cluster
    /// name and seeds CM nodes from a peer-cluster relation payload
    /// (§4.1.6).
    pub fn run_with_relation_data(
        &self,
        desc: &mut DeploymentDescription,
        data: PeerClusterRelationData,
    ) -> Result<(), OperatorError> {
        if desc.pending_directives.contains(&Directive::InheritClusterName) {
            if let Some(name) = data.remote_cluster_name.clone() {
                desc.config.cluster_name = name;
                desc.cluster_name_autogenerated = false;
            }
            desc.remove_directive(Directive::InheritClusterName);
        } else if desc.pending_directives.contains(&Directive::ValidateClusterName) {
            match &data.remote_cluster_name {
                Some(name) if *name == desc.config.cluster_name => {
                    desc.remove_directive(Directive::ValidateClusterName);
                }
                Some(_) => {
                    desc.set_blocked(
                        State::BlockedWrongRelatedCluster,
                        "related cluster name does not match this app's configured cluster_name",
                    );
                }
                None => {}
            }
        }

        if desc.pending_directives.contains(&Directive::WaitForPeerClusterRelation) {
            desc.remove_directive(Directive::WaitForPeerClusterRelation);
            if desc.state == State::BlockedWaitingForRelation {
                desc.set_active();
            }
        }

        Ok(())
    }

    /// `can_start(desc?)` (§4.1.6).
    pub fn can_start(desc: Option<&DeploymentDescription>) -> bool {
        desc.map(|d| d.can_start()).unwrap_or(false)
    }

    /// `promote_deployment_type()` (§4.1.4, §4.1.6).
    pub fn promote_deployment_type(
        desc: &mut DeploymentDescription,
        orchestrators: &mut PeerClusterOrchestrators,
        now: f64,
    ) {
        promotion::promote(desc, orchestrators, now);
    }

    /// `demote_deployment_type()` (§4.1.6).
    pub fn demote_deployment_type(desc: &mut DeploymentDescription) {
        promotion::demote(desc);
    }

    /// Whether this app should run the provider side of the relation wire
    /// protocol for the given peer: only a `MainOrchestrator`/
    /// `FailoverOrchestrator` offers the relation (§4.5).
    pub fn is_provider(typ: DeploymentType) -> bool {
        matches!(typ, DeploymentType::MainOrchestrator | DeploymentType::FailoverOrchestrator)
    }

    /// Whether this app should run the requirer side: any app without a CM
    /// role of its own consumes the relation (§4.5).
    pub fn is_consumer(typ: DeploymentType) -> bool {
        matches!(typ, DeploymentType::Other)
    }
}

/// Fleet-wide app census (§4.1.2/§4.1.5), used by the quorum check and by
/// the "at least one other app carries data" check on role removal.
pub fn apps_in_fleet(census: &crate::core::relation::provider::FleetCensus) -> Vec<PeerClusterApp> {
    census.apps.clone()
}
