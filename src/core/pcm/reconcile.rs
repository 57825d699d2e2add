// src/core/pcm/reconcile.rs

//! New-cluster setup (§4.1.1), existing-cluster reconcile (§4.1.2), and
//! deployment-type derivation (§4.1.3).

use crate::core::app::App;
use crate::core::errors::OperatorError;
use crate::core::node::Role;
use crate::core::pcm::state::{
    DeploymentDescription, DeploymentType, Directive, PeerClusterConfig, State, StartMode,
};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generates `"{app_name}-{4-char-random}"` in lowercase (§4.1.1).
pub fn generate_cluster_name(app_name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(char::from)
        .collect();
    format!("{}-{}", app_name, suffix).to_lowercase()
}

/// Builds the initial `DeploymentDescription` for an app with no prior
/// description (§4.1.1).
pub fn new_cluster_setup(
    app: App,
    mut config: PeerClusterConfig,
    has_peer_cluster_relation: bool,
    now: f64,
) -> DeploymentDescription {
    let mut pending = Vec::new();
    let mut state = State::Active;
    let mut message = String::new();
    let mut start = StartMode::WithGeneratedRoles;
    let mut autogenerated = false;

    if config.init_hold {
        if config.cluster_name.is_empty() {
            pending.push(Directive::InheritClusterName);
        } else {
            pending.push(Directive::ValidateClusterName);
        }
        if !has_peer_cluster_relation {
            pending.push(Directive::WaitForPeerClusterRelation);
            pending.push(Directive::ShowStatus);
            state = State::BlockedWaitingForRelation;
            message = "waiting for a peer-cluster-orchestrator relation".to_string();
        }
    } else {
        if config.cluster_name.is_empty() {
            config.cluster_name = generate_cluster_name(&app.name);
            autogenerated = true;
        }
        if config.roles.is_empty() {
            start = StartMode::WithGeneratedRoles;
        } else {
            start = StartMode::WithProvidedRoles;
            if !config.roles.contains(&Role::ClusterManager) {
                state = State::BlockedCannotStartWithRoles;
                message = "cannot start: provided roles do not include cluster_manager".to_string();
                pending.push(Directive::WaitForPeerClusterRelation);
            }
        }
    }

    let typ = derive_deployment_type(start, config.init_hold, &config.roles);
    let promotion_time = matches!(typ, DeploymentType::MainOrchestrator).then_some(now);

    DeploymentDescription {
        app,
        config,
        start,
        pending_directives: pending,
        typ,
        state,
        message,
        cluster_name_autogenerated: autogenerated,
        promotion_time,
    }
}

/// `has_cm = (start = WITH_GENERATED_ROLES) ∨ (cluster_manager ∈ roles)`
/// (§4.1.3).
pub fn derive_deployment_type(start: StartMode, init_hold: bool, roles: &[Role]) -> DeploymentType {
    let has_cm = matches!(start, StartMode::WithGeneratedRoles) || roles.contains(&Role::ClusterManager);
    if !has_cm {
        DeploymentType::Other
    } else if init_hold {
        DeploymentType::FailoverOrchestrator
    } else {
        DeploymentType::MainOrchestrator
    }
}

/// Re-evaluates `typ` for an existing description, stamping `promotion_time`
/// on first transition into MAIN_ORCHESTRATOR (§4.1.3).
pub fn refresh_deployment_type(desc: &mut DeploymentDescription, now: f64) {
    let typ = derive_deployment_type(desc.start, desc.config.init_hold, &desc.config.roles);
    desc.typ = typ;
    if matches!(typ, DeploymentType::MainOrchestrator) && desc.promotion_time.is_none() {
        desc.promotion_time = Some(now);
    }
}

/// Existing-cluster reconcile (§4.1.2): diffs the new config's roles against
/// the previous description, applying the role-change invariants I3–I5. On
/// success, mutates `desc` in place; on validation failure, blocks the
/// description (leaving its prior fields untouched) and returns the error.
pub fn reconcile_roles(
    desc: &mut DeploymentDescription,
    new_roles: Vec<Role>,
    fleet_has_other_data_node: bool,
) -> Result<(), OperatorError> {
    let prev_roles = desc.config.roles.clone();

    if prev_roles == new_roles {
        return Ok(());
    }

    let removing_cm = prev_roles.contains(&Role::ClusterManager) && !new_roles.contains(&Role::ClusterManager);
    if removing_cm && !new_roles.is_empty() {
        desc.set_blocked(
            State::BlockedCannotApplyNewRoles,
            "cannot remove the cluster_manager role from an existing deployment",
        );
        return Err(OperatorError::CmRoleRemovalForbidden);
    }

    if new_roles.contains(&Role::ClusterManager) && new_roles.contains(&Role::VotingOnly) {
        desc.set_blocked(
            State::BlockedCannotApplyNewRoles,
            "cluster_manager and voting_only roles cannot be both set on the same nodes.",
        );
        return Err(OperatorError::CmVoRolesProvidedInvalid);
    }

    let removing_data = prev_roles.contains(&Role::Data) && !new_roles.contains(&Role::Data);
    if removing_data && !fleet_has_other_data_node {
        desc.set_blocked(
            State::BlockedCannotApplyNewRoles,
            "cannot remove the data role: no other data node exists in the fleet",
        );
        return Err(OperatorError::DataRoleRemovalForbidden);
    }

    desc.config.roles = new_roles.clone();
    desc.start = if new_roles.is_empty() {
        StartMode::WithGeneratedRoles
    } else {
        StartMode::WithProvidedRoles
    };
    desc.set_active();

    if !desc.config.init_hold
        && desc.state == State::BlockedCannotStartWithRoles
        && (new_roles.contains(&Role::ClusterManager) || matches!(desc.start, StartMode::WithGeneratedRoles))
    {
        desc.set_active();
        desc.remove_directive(Directive::WaitForPeerClusterRelation);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pcm::state::Profile;

    fn app() -> App {
        App::new("m1", "opensearch")
    }

    #[test]
    fn init_hold_without_relation_blocks_and_waits() {
        let cfg = PeerClusterConfig::normalize("".into(), true, &[], Profile::Production).unwrap();
        let desc = new_cluster_setup(app(), cfg, false, 100.0);
        assert_eq!(desc.state, State::BlockedWaitingForRelation);
        assert!(desc.pending_directives.contains(&Directive::WaitForPeerClusterRelation));
        assert!(desc.pending_directives.contains(&Directive::InheritClusterName));
    }

    #[test]
    fn provided_roles_without_cm_blocks() {
        let cfg = PeerClusterConfig::normalize(
            "c".into(),
            false,
            &["data".into()],
            Profile::Production,
        )
        .unwrap();
        let desc = new_cluster_setup(app(), cfg, true, 100.0);
        assert_eq!(desc.state, State::BlockedCannotStartWithRoles);
    }

    #[test]
    fn empty_roles_generates_cluster_manager_deployment() {
        let cfg = PeerClusterConfig::normalize("".into(), false, &[], Profile::Production).unwrap();
        let desc = new_cluster_setup(app(), cfg, true, 100.0);
        assert_eq!(desc.typ, DeploymentType::MainOrchestrator);
        assert!(desc.cluster_name_autogenerated);
        assert_eq!(desc.promotion_time, Some(100.0));
    }

    /// I3 (role-removal forbids CM drop).
    #[test]
    fn removing_cluster_manager_role_is_forbidden() {
        let cfg = PeerClusterConfig::normalize(
            "c".into(),
            false,
            &["cluster_manager".into(), "data".into()],
            Profile::Production,
        )
        .unwrap();
        let mut desc = new_cluster_setup(app(), cfg, true, 0.0);
        let err = reconcile_roles(&mut desc, vec![Role::Data], true).unwrap_err();
        assert_eq!(err, OperatorError::CmRoleRemovalForbidden);
        assert_eq!(desc.state, State::BlockedCannotApplyNewRoles);
    }

    /// I4.
    #[test]
    fn cm_and_voting_only_together_is_forbidden() {
        let cfg = PeerClusterConfig::normalize(
            "c".into(),
            false,
            &["cluster_manager".into()],
            Profile::Production,
        )
        .unwrap();
        let mut desc = new_cluster_setup(app(), cfg, true, 0.0);
        let err = reconcile_roles(
            &mut desc,
            vec![Role::ClusterManager, Role::VotingOnly],
            true,
        )
        .unwrap_err();
        assert_eq!(err, OperatorError::CmVoRolesProvidedInvalid);
    }

    /// I5: data role removal forbidden without another fleet data node.
    #[test]
    fn removing_last_data_role_is_forbidden() {
        let cfg = PeerClusterConfig::normalize(
            "c".into(),
            false,
            &["cluster_manager".into(), "data".into()],
            Profile::Production,
        )
        .unwrap();
        let mut desc = new_cluster_setup(app(), cfg, true, 0.0);
        let err = reconcile_roles(&mut desc, vec![Role::ClusterManager], false).unwrap_err();
        assert_eq!(err, OperatorError::DataRoleRemovalForbidden);
    }

    #[test]
    fn removing_data_role_allowed_when_fleet_has_other_data_node() {
        let cfg = PeerClusterConfig::normalize(
            "c".into(),
            false,
            &["cluster_manager".into(), "data".into()],
            Profile::Production,
        )
        .unwrap();
        let mut desc = new_cluster_setup(app(), cfg, true, 0.0);
        reconcile_roles(&mut desc, vec![Role::ClusterManager], true).unwrap();
        assert_eq!(desc.state, State::Active);
        assert!(!desc.config.roles.contains(&Role::Data));
    }

    #[test]
    fn roles_empty_to_explicit_is_a_noop_when_unchanged() {
        let cfg = PeerClusterConfig::normalize("c".into(), false, &[], Profile::Production).unwrap();
        let mut desc = new_cluster_setup(app(), cfg, true, 0.0);
        let roles = desc.config.roles.clone();
        reconcile_roles(&mut desc, roles, true).unwrap();
        assert_eq!(desc.state, State::Active);
    }
}
