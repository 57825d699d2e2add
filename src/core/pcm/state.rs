// src/core/pcm/state.rs

//! PCM entities (§3, §4.1): `PeerClusterConfig`, `DeploymentDescription`,
//! `Directive`, `State`, and the fleet-wide registries.

use crate::core::app::App;
use crate::core::node::{Role, Temperature};
use serde::{Deserialize, Serialize};

/// User-provided configuration for this app's participation in the fleet
/// (§3 `PeerClusterConfig`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerClusterConfig {
    pub cluster_name: String,
    pub init_hold: bool,
    pub roles: Vec<Role>,
    pub data_temperature: Option<Temperature>,
    pub profile: Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Production,
    Staging,
    Testing,
}

impl PeerClusterConfig {
    /// Normalizes `data.<temp>` shorthands into `roles=[..,"data"]` plus
    /// `data_temperature`, enforcing "at most one temperature" from §3.
    pub fn normalize(
        cluster_name: String,
        init_hold: bool,
        raw_roles: &[String],
        profile: Profile,
    ) -> Result<Self, &'static str> {
        let mut roles = Vec::new();
        let mut data_temperature = None;

        for raw in raw_roles {
            if let Some(temp_str) = raw.strip_prefix("data.") {
                let temp = Temperature::parse(temp_str).ok_or("unknown data temperature")?;
                if data_temperature.is_some() && data_temperature != Some(temp) {
                    return Err("at most one data temperature may be specified");
                }
                data_temperature = Some(temp);
                if !roles.contains(&Role::Data) {
                    roles.push(Role::Data);
                }
            } else {
                let role = Role::parse(raw).ok_or("unknown role")?;
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
        }

        Ok(Self {
            cluster_name,
            init_hold,
            roles,
            data_temperature,
            profile,
        })
    }
}

/// Pending work item the PCM emits for the lifecycle controller and status
/// publisher to consume (§3 `Directive`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    None,
    ShowStatus,
    WaitForPeerClusterRelation,
    InheritClusterName,
    ValidateClusterName,
    Reconfigure,
}

/// Directives that block the lifecycle controller from starting (§4.1.6
/// `can_start`).
const BLOCKING_DIRECTIVES: [Directive; 4] = [
    Directive::WaitForPeerClusterRelation,
    Directive::Reconfigure,
    Directive::ValidateClusterName,
    Directive::InheritClusterName,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Active,
    BlockedWaitingForRelation,
    BlockedWrongRelatedCluster,
    BlockedCannotStartWithRoles,
    BlockedCannotApplyNewRoles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentType {
    MainOrchestrator,
    FailoverOrchestrator,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartMode {
    WithProvidedRoles,
    WithGeneratedRoles,
}

/// The authoritative per-app record driving every other component (§3
/// `DeploymentDescription`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDescription {
    pub app: App,
    pub config: PeerClusterConfig,
    pub start: StartMode,
    pub pending_directives: Vec<Directive>,
    pub typ: DeploymentType,
    pub state: State,
    pub message: String,
    pub cluster_name_autogenerated: bool,
    pub promotion_time: Option<f64>,
}

impl DeploymentDescription {
    /// `state=ACTIVE ⇒ message=""`; non-ACTIVE states carry a non-empty
    /// message (§3 invariant).
    pub fn invariant_holds(&self) -> bool {
        match self.state {
            State::Active => self.message.is_empty(),
            _ => !self.message.is_empty(),
        }
    }

    pub fn set_blocked(&mut self, state: State, message: impl Into<String>) {
        self.state = state;
        self.message = message.into();
    }

    pub fn set_active(&mut self) {
        self.state = State::Active;
        self.message.clear();
    }

    /// `true` iff no directive in the blocking set is pending (§4.1.6).
    pub fn can_start(&self) -> bool {
        !self
            .pending_directives
            .iter()
            .any(|d| BLOCKING_DIRECTIVES.contains(d))
    }

    pub fn queue(&mut self, directive: Directive) {
        if !self.pending_directives.contains(&directive) {
            self.pending_directives.push(directive);
        }
    }

    pub fn remove_directive(&mut self, directive: Directive) {
        self.pending_directives.retain(|d| *d != directive);
    }
}

/// Per-app registry of which related apps act as main/failover orchestrator
/// (§3 `PeerClusterOrchestrators`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerClusterOrchestrators {
    pub main_rel_id: i64,
    pub main_app: Option<App>,
    pub failover_rel_id: i64,
    pub failover_app: Option<App>,
}

impl PeerClusterOrchestrators {
    pub fn new() -> Self {
        Self {
            main_rel_id: -1,
            main_app: None,
            failover_rel_id: -1,
            failover_app: None,
        }
    }

    /// Invariant: a given App cannot simultaneously be both main and
    /// failover within the same record.
    pub fn invariant_holds(&self) -> bool {
        match (&self.main_app, &self.failover_app) {
            (Some(a), Some(b)) => a != b,
            _ => true,
        }
    }

    /// Atomically copies failover→main and clears failover (§3, §4.1.4).
    pub fn promote_failover(&mut self) {
        self.main_rel_id = self.failover_rel_id;
        self.main_app = self.failover_app.take();
        self.failover_rel_id = -1;
        self.failover_app = None;
    }
}

/// `{app, planned_units, units[], roles[]}` used as the fleet-wide census
/// (§3 `PeerClusterApp`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerClusterApp {
    pub app: App,
    pub planned_units: u32,
    pub units: Vec<String>,
    pub roles: Vec<Role>,
}
