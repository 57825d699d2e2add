// src/core/lifecycle/gate.rs

//! Can-service-start gate (§4.2.4): evaluated sequentially, first failing
//! check defers.

use crate::core::pcm::{DeploymentDescription, DeploymentType, StartMode};
use crate::core::topology::HealthColor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateFailure {
    InsufficientMemory,
    NoDeploymentDescription,
    CannotStart,
    AdminUserNotConfigured,
    MustBeLeaderOrDataRole,
    ShardsRelocating,
}

pub struct GateInputs<'a> {
    pub memory_requirement_met: bool,
    pub desc: Option<&'a DeploymentDescription>,
    pub admin_user_configured: bool,
    pub security_index_initialised: bool,
    pub is_leader: bool,
    pub solo_app_cluster: bool,
    pub carries_data_role: bool,
    pub health: HealthColor,
    pub leader_unreachable: bool,
}

/// Evaluates the gate in order, returning the first failing check
/// (§4.2.4).
pub fn evaluate(inputs: &GateInputs) -> Result<(), GateFailure> {
    if !inputs.memory_requirement_met {
        return Err(GateFailure::InsufficientMemory);
    }

    let desc = inputs.desc.ok_or(GateFailure::NoDeploymentDescription)?;
    if !desc.can_start() {
        return Err(GateFailure::CannotStart);
    }

    if !inputs.admin_user_configured {
        return Err(GateFailure::AdminUserNotConfigured);
    }

    if !inputs.security_index_initialised {
        let is_main_leader = inputs.is_leader
            && (matches!(desc.typ, DeploymentType::MainOrchestrator) || inputs.solo_app_cluster);
        let is_generated_roles_unit = matches!(desc.start, StartMode::WithGeneratedRoles);
        if !(is_main_leader || is_generated_roles_unit || inputs.carries_data_role) {
            return Err(GateFailure::MustBeLeaderOrDataRole);
        }
    }

    if inputs.health == HealthColor::YellowTemp && !inputs.leader_unreachable {
        return Err(GateFailure::ShardsRelocating);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::App;
    use crate::core::pcm::{Profile, State};

    fn desc(start: StartMode, typ: DeploymentType) -> DeploymentDescription {
        DeploymentDescription {
            app: App::new("m", "a"),
            config: crate::core::pcm::PeerClusterConfig::normalize("c".into(), false, &[], Profile::Production)
                .unwrap(),
            start,
            pending_directives: vec![],
            typ,
            state: State::Active,
            message: String::new(),
            cluster_name_autogenerated: false,
            promotion_time: None,
        }
    }

    #[test]
    fn memory_check_runs_first() {
        let d = desc(StartMode::WithGeneratedRoles, DeploymentType::MainOrchestrator);
        let inputs = GateInputs {
            memory_requirement_met: false,
            desc: Some(&d),
            admin_user_configured: false,
            security_index_initialised: false,
            is_leader: false,
            solo_app_cluster: false,
            carries_data_role: false,
            health: HealthColor::Red,
            leader_unreachable: false,
        };
        assert_eq!(evaluate(&inputs), Err(GateFailure::InsufficientMemory));
    }

    #[test]
    fn generated_roles_unit_bypasses_leader_requirement() {
        let d = desc(StartMode::WithGeneratedRoles, DeploymentType::MainOrchestrator);
        let inputs = GateInputs {
            memory_requirement_met: true,
            desc: Some(&d),
            admin_user_configured: true,
            security_index_initialised: false,
            is_leader: false,
            solo_app_cluster: false,
            carries_data_role: false,
            health: HealthColor::Green,
            leader_unreachable: false,
        };
        assert_eq!(evaluate(&inputs), Ok(()));
    }

    #[test]
    fn non_leader_non_data_unit_blocked_before_security_index() {
        let d = desc(StartMode::WithProvidedRoles, DeploymentType::Other);
        let inputs = GateInputs {
            memory_requirement_met: true,
            desc: Some(&d),
            admin_user_configured: true,
            security_index_initialised: false,
            is_leader: false,
            solo_app_cluster: false,
            carries_data_role: false,
            health: HealthColor::Green,
            leader_unreachable: false,
        };
        assert_eq!(evaluate(&inputs), Err(GateFailure::MustBeLeaderOrDataRole));
    }

    #[test]
    fn yellow_temp_blocks_unless_leader_unreachable() {
        let d = desc(StartMode::WithGeneratedRoles, DeploymentType::MainOrchestrator);
        let inputs = GateInputs {
            memory_requirement_met: true,
            desc: Some(&d),
            admin_user_configured: true,
            security_index_initialised: true,
            is_leader: true,
            solo_app_cluster: true,
            carries_data_role: true,
            health: HealthColor::YellowTemp,
            leader_unreachable: false,
        };
        assert_eq!(evaluate(&inputs), Err(GateFailure::ShardsRelocating));

        let inputs2 = GateInputs {
            leader_unreachable: true,
            ..inputs
        };
        assert_eq!(evaluate(&inputs2), Ok(()));
    }
}
